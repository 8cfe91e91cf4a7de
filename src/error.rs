use thiserror::Error;

#[derive(Error, Debug)]
pub enum TilerError {
    #[error("Ошибка ввода-вывода: {0}")]
    Io(#[from] std::io::Error),

    #[error("Не удалось подключиться к X серверу: {0}")]
    X11Connect(#[from] x11rb::errors::ConnectError),

    #[error("Ошибка соединения с X сервером: {0}")]
    X11Connection(#[from] x11rb::errors::ConnectionError),

    #[error("Ошибка ответа X сервера: {0}")]
    X11Reply(#[from] x11rb::errors::ReplyError),

    #[error("Не удалось создать служебное окно X: {0}")]
    X11Id(#[from] x11rb::errors::ReplyOrIdError),

    #[error("Ошибка D-Bus: {0}")]
    DBus(#[from] zbus::Error),

    #[error("Раскладка для {0} окон не поддерживается (допустимо 1–4)")]
    UnsupportedCount(usize),

    #[error("Хост недоступен: {0}")]
    HostUnavailable(String),
}

impl TilerError {
    pub fn host_unavailable<T>(msg: impl Into<String>) -> Result<T> {
        Err(TilerError::HostUnavailable(msg.into()))
    }
}

pub type Result<T> = std::result::Result<T, TilerError>;

// Удобные макросы для создания ошибок
#[macro_export]
macro_rules! tiler_error {
    (host_unavailable, $($arg:tt)*) => {
        $crate::error::TilerError::HostUnavailable(format!($($arg)*))
    };
}
