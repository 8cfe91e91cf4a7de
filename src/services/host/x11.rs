use crate::error::{Result, TilerError};
use crate::tiler_error;
use crate::events::{WindowEvent, WindowId, WindowInfo};
use crate::layout::{MutationRequest, ScreenGeometry};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use x11rb::connection::Connection;
use x11rb::protocol::randr::{ConnectionExt as _, MonitorInfo};
use x11rb::protocol::xproto::{
    Atom, AtomEnum, ChangeWindowAttributesAux, ClientMessageEvent, ConfigureWindowAux,
    ConnectionExt as _, CreateWindowAux, EventMask, MapState, PropMode, Window, WindowClass,
};
use x11rb::protocol::Event;
use x11rb::rust_connection::RustConnection;
use x11rb::wrapper::ConnectionExt as _;

use super::r#trait::WindowHost;

// _MOTIF_WM_HINTS: flags, functions, decorations, input_mode, status
const MWM_HINTS_DECORATIONS: u32 = 1 << 1;
const MWM_NO_DECORATIONS: [u32; 5] = [MWM_HINTS_DECORATIONS, 0, 0, 0, 0];

x11rb::atom_manager! {
    pub Atoms: AtomsCookie {
        _NET_CLIENT_LIST,
        _NET_WM_NAME,
        _MOTIF_WM_HINTS,
        _GAMESCOPE_TILER_WAKE,
        UTF8_STRING,
    }
}

/// Хост поверх X11: список окон из _NET_CLIENT_LIST, изменения через ConfigureWindow
pub struct X11Host {
    conn: RustConnection,
    root: Window,
    atoms: Atoms,
    display: Option<String>,
    /// Оконный менеджер ведёт _NET_CLIENT_LIST
    ewmh: bool,
    /// Служебное окно соединения событий; ClientMessage в него будит цикл событий
    wake: Mutex<Option<Window>>,
}

impl X11Host {
    pub fn connect(display_name: Option<&str>) -> Result<Self> {
        let shown = display_name.unwrap_or("$DISPLAY");
        info!("Подключение к X серверу {}", shown);

        let (conn, screen_num) = x11rb::connect(display_name)?;
        let root = match conn.setup().roots.get(screen_num) {
            Some(screen) => screen.root,
            None => return TilerError::host_unavailable(format!("экран {} не найден", screen_num)),
        };
        let atoms = Atoms::new(&conn)?.reply()?;
        let ewmh = read_client_list(&conn, root, &atoms)?.is_some();

        if ewmh {
            info!("Оконный менеджер поддерживает EWMH, отслеживаем _NET_CLIENT_LIST");
        } else {
            warn!("_NET_CLIENT_LIST отсутствует, отслеживаем отображаемые окна корня");
        }

        Ok(Self {
            conn,
            root,
            atoms,
            display: display_name.map(str::to_string),
            ewmh,
            wake: Mutex::new(None),
        })
    }

    fn client_windows(&self) -> Result<Vec<Window>> {
        if let Some(clients) = read_client_list(&self.conn, self.root, &self.atoms)? {
            return Ok(clients);
        }

        let tree = self.conn.query_tree(self.root)?.reply()?;
        let mut viewable = Vec::with_capacity(tree.children.len());
        for child in tree.children {
            let attrs = self.conn.get_window_attributes(child)?.reply()?;
            if attrs.map_state == MapState::VIEWABLE && !attrs.override_redirect {
                viewable.push(child);
            }
        }
        Ok(viewable)
    }

    fn window_info(&self, window: Window) -> Result<WindowInfo> {
        let class_reply = self
            .conn
            .get_property(false, window, AtomEnum::WM_CLASS, AtomEnum::STRING, 0, 1024)?
            .reply()?;
        let class = parse_wm_class(&class_reply.value).unwrap_or_default();

        let mut title_reply = self
            .conn
            .get_property(false, window, self.atoms._NET_WM_NAME, self.atoms.UTF8_STRING, 0, 1024)?
            .reply()?;
        if title_reply.value.is_empty() {
            title_reply = self
                .conn
                .get_property(false, window, AtomEnum::WM_NAME, AtomEnum::STRING, 0, 1024)?
                .reply()?;
        }
        let title = String::from_utf8_lossy(&title_reply.value).into_owned();

        Ok(WindowInfo::new(WindowId(window)).with_class(class).with_title(title))
    }

    /// Активный монитор по RandR или None, если мониторов нет
    fn active_monitor(&self) -> Result<Option<ScreenGeometry>> {
        let reply = self.conn.randr_get_monitors(self.root, true)?.reply()?;
        Ok(pick_monitor(&reply.monitors))
    }

    fn event_loop(
        conn: RustConnection,
        root: Window,
        atoms: Atoms,
        mut translator: EventTranslator,
        tx: mpsc::UnboundedSender<WindowEvent>,
    ) -> Result<()> {
        let mask = if translator.ewmh {
            EventMask::PROPERTY_CHANGE
        } else {
            EventMask::SUBSTRUCTURE_NOTIFY
        };
        conn.change_window_attributes(root, &ChangeWindowAttributesAux::new().event_mask(mask))?;
        conn.flush()?;

        translator.clients = read_client_list(&conn, root, &atoms)?.unwrap_or_default();

        loop {
            let event = conn.wait_for_event()?;
            let step = translator.translate(&event, || {
                Ok(read_client_list(&conn, root, &atoms)?.unwrap_or_default())
            })?;

            match step {
                LoopStep::Stop => {
                    debug!("Получен сигнал остановки, завершаем цикл событий X11");
                    return Ok(());
                }
                LoopStep::Skip => {}
                LoopStep::Emit(batch) => {
                    for event in batch {
                        debug!("X11 событие окна: {}", event);
                        if tx.send(event).is_err() {
                            break;
                        }
                    }
                }
            }

            if tx.is_closed() {
                debug!("Подписчик на события X11 закрыт, завершаем цикл событий");
                return Ok(());
            }
        }
    }
}

#[async_trait::async_trait]
impl WindowHost for X11Host {
    fn name(&self) -> &'static str {
        "x11"
    }

    async fn screen_size(&self) -> Result<ScreenGeometry> {
        match self.active_monitor() {
            Ok(Some(screen)) => return Ok(screen),
            Ok(None) => debug!("RandR не сообщил ни одного монитора, берём геометрию корня"),
            Err(e) => debug!("RandR недоступен ({}), берём геометрию корня", e),
        }

        let geometry = self.conn.get_geometry(self.root)?.reply()?;
        Ok(ScreenGeometry::new(geometry.width as u32, geometry.height as u32))
    }

    async fn list_windows(&self) -> Result<Vec<WindowInfo>> {
        let mut windows = Vec::new();
        for window in self.client_windows()? {
            // Окно могло исчезнуть между чтением списка и запросом свойств
            match self.window_info(window) {
                Ok(info) => windows.push(info),
                Err(e) => debug!("Пропускаем окно 0x{:08x}: {}", window, e),
            }
        }
        Ok(windows)
    }

    async fn apply(&self, requests: &[MutationRequest]) -> Result<()> {
        for request in requests {
            let window = request.window.value();

            if request.no_border {
                self.conn.change_property32(
                    PropMode::REPLACE,
                    window,
                    self.atoms._MOTIF_WM_HINTS,
                    self.atoms._MOTIF_WM_HINTS,
                    &MWM_NO_DECORATIONS,
                )?;
            }

            let geometry = request.geometry;
            let aux = ConfigureWindowAux::new()
                .x(geometry.x)
                .y(geometry.y)
                .width(geometry.width)
                .height(geometry.height);
            self.conn.configure_window(window, &aux)?;
        }

        self.conn.flush()?;
        Ok(())
    }

    fn subscribe(&self) -> Result<mpsc::UnboundedReceiver<WindowEvent>> {
        let (tx, rx) = mpsc::unbounded_channel();

        // Отдельное соединение: wait_for_event блокирует и не должно мешать запросам
        let (conn, screen_num) = x11rb::connect(self.display.as_deref())?;
        let root = conn
            .setup()
            .roots
            .get(screen_num)
            .map(|screen| screen.root)
            .ok_or_else(|| tiler_error!(host_unavailable, "экран {} не найден", screen_num))?;

        // Окно живёт, пока живёт соединение событий
        let wake = conn.generate_id()?;
        conn.create_window(
            0,
            wake,
            root,
            -1,
            -1,
            1,
            1,
            0,
            WindowClass::INPUT_ONLY,
            0,
            &CreateWindowAux::new(),
        )?;
        conn.flush()?;

        let atoms = self.atoms;
        let translator = EventTranslator::new(self.ewmh, wake, &atoms);
        *self.wake.lock() = Some(wake);

        tokio::task::spawn_blocking(move || {
            if let Err(e) = Self::event_loop(conn, root, atoms, translator, tx) {
                error!("Цикл событий X11 завершился с ошибкой: {}", e);
            }
        });

        Ok(rx)
    }

    fn shutdown(&self) {
        let Some(wake) = self.wake.lock().take() else {
            return;
        };

        debug!("Будим цикл событий X11 через окно 0x{:08x}", wake);
        let message = ClientMessageEvent::new(32, wake, self.atoms._GAMESCOPE_TILER_WAKE, [0u32; 5]);
        let sent = self
            .conn
            .send_event(false, wake, EventMask::NO_EVENT, message)
            .map(|_| ())
            .and_then(|_| self.conn.flush());
        if let Err(e) = sent {
            warn!("Не удалось остановить цикл событий X11: {}", e);
        }
    }
}

impl Drop for X11Host {
    fn drop(&mut self) {
        self.shutdown();
        info!("X11Host завершает работу");
    }
}

/// Что делать циклу событий после очередного события X
#[derive(Debug, PartialEq)]
enum LoopStep {
    Emit(Vec<WindowEvent>),
    Skip,
    Stop,
}

/// Перевод событий X в события окон; хранит последний снимок списка клиентов
struct EventTranslator {
    ewmh: bool,
    wake: Window,
    wake_atom: Atom,
    client_list_atom: Atom,
    clients: Vec<Window>,
}

impl EventTranslator {
    fn new(ewmh: bool, wake: Window, atoms: &Atoms) -> Self {
        Self {
            ewmh,
            wake,
            wake_atom: atoms._GAMESCOPE_TILER_WAKE,
            client_list_atom: atoms._NET_CLIENT_LIST,
            clients: Vec::new(),
        }
    }

    /// `read_clients` вызывается только при изменении _NET_CLIENT_LIST
    fn translate<F>(&mut self, event: &Event, read_clients: F) -> Result<LoopStep>
    where
        F: FnOnce() -> Result<Vec<Window>>,
    {
        let step = match event {
            Event::ClientMessage(e) if e.window == self.wake && e.type_ == self.wake_atom => LoopStep::Stop,
            Event::PropertyNotify(e) if self.ewmh && e.atom == self.client_list_atom => {
                let current = read_clients()?;
                let events = diff_client_lists(&self.clients, &current);
                self.clients = current;
                if events.is_empty() {
                    LoopStep::Skip
                } else {
                    LoopStep::Emit(events)
                }
            }
            Event::MapNotify(e) if !self.ewmh && !e.override_redirect => {
                LoopStep::Emit(vec![WindowEvent::added(WindowId(e.window))])
            }
            Event::UnmapNotify(e) if !self.ewmh => LoopStep::Emit(vec![WindowEvent::removed(WindowId(e.window))]),
            _ => LoopStep::Skip,
        };
        Ok(step)
    }
}

/// Содержимое _NET_CLIENT_LIST или None, если свойство не выставлено
fn read_client_list(conn: &RustConnection, root: Window, atoms: &Atoms) -> Result<Option<Vec<Window>>> {
    let reply = conn
        .get_property(false, root, atoms._NET_CLIENT_LIST, AtomEnum::WINDOW, 0, u32::MAX)?
        .reply()?;

    if reply.type_ == x11rb::NONE {
        return Ok(None);
    }
    Ok(Some(reply.value32().map(|v| v.collect()).unwrap_or_default()))
}

/// Основной монитор, иначе первый; мониторы нулевого размера пропускаются
fn pick_monitor(monitors: &[MonitorInfo]) -> Option<ScreenGeometry> {
    let usable = || monitors.iter().filter(|m| m.width > 0 && m.height > 0);
    let monitor = usable().find(|m| m.primary).or_else(|| usable().next())?;

    Some(
        ScreenGeometry::new(monitor.width as u32, monitor.height as u32)
            .with_origin(monitor.x as i32, monitor.y as i32),
    )
}

/// Класс из WM_CLASS ("instance\0class\0"). Если класса нет, берём instance.
fn parse_wm_class(raw: &[u8]) -> Option<String> {
    let mut parts = raw.split(|&b| b == 0).filter(|p| !p.is_empty());
    let instance = parts.next()?;
    let class = parts.next().unwrap_or(instance);
    Some(String::from_utf8_lossy(class).into_owned())
}

/// События добавления/удаления по двум снимкам списка клиентов
fn diff_client_lists(previous: &[Window], current: &[Window]) -> Vec<WindowEvent> {
    let removed = previous
        .iter()
        .filter(|w| !current.contains(w))
        .map(|&w| WindowEvent::removed(WindowId(w)));
    let added = current
        .iter()
        .filter(|w| !previous.contains(w))
        .map(|&w| WindowEvent::added(WindowId(w)));
    removed.chain(added).collect()
}
