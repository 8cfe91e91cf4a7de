use serde::{Deserialize, Serialize};
use std::fmt;

/// Идентификатор окна в хосте (XID для X11, внутренний номер для dry-run)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WindowId(pub u32);

impl WindowId {
    pub fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

/// Информация об окне
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindowInfo {
    pub id: WindowId,
    pub class: String,
    pub title: String,
}

impl WindowInfo {
    pub fn new(id: WindowId) -> Self {
        Self {
            id,
            class: String::new(),
            title: String::new(),
        }
    }

    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.class = class.into();
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Совпадает ли класс окна с целевым (без учёта регистра ASCII, KWin хранит класс в нижнем регистре)
    pub fn matches_class(&self, class: &str) -> bool {
        !self.class.is_empty() && self.class.eq_ignore_ascii_case(class)
    }
}

impl fmt::Display for WindowInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.class.is_empty() {
            write!(f, "{} \"{}\"", self.id, self.title)
        } else {
            write!(f, "{} \"{}\" ({})", self.id, self.title, self.class)
        }
    }
}

/// Событие жизненного цикла окна
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowEvent {
    pub window: WindowId,
    pub timestamp: std::time::Instant,
    pub event_type: WindowEventType,
}

impl WindowEvent {
    pub fn new(window: WindowId, event_type: WindowEventType) -> Self {
        Self {
            window,
            timestamp: std::time::Instant::now(),
            event_type,
        }
    }

    pub fn added(window: WindowId) -> Self {
        Self::new(window, WindowEventType::Added)
    }

    pub fn removed(window: WindowId) -> Self {
        Self::new(window, WindowEventType::Removed)
    }
}

impl fmt::Display for WindowEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?}: {} ({}ms ago)",
            self.event_type,
            self.window,
            self.timestamp.elapsed().as_millis()
        )
    }
}

/// Тип события окна
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WindowEventType {
    Added,
    Removed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_info_creation() {
        let window = WindowInfo::new(WindowId(0x2a00004))
            .with_class("gamescope")
            .with_title("Player 1");

        assert_eq!(window.id, WindowId(0x2a00004));
        assert_eq!(window.class, "gamescope");
        assert_eq!(window.title, "Player 1");
        assert_eq!(window.to_string(), "0x02a00004 \"Player 1\" (gamescope)");
    }

    #[test]
    fn test_class_matching() {
        let window = WindowInfo::new(WindowId(1)).with_class("Gamescope");

        assert!(window.matches_class("gamescope"));
        assert!(window.matches_class("GAMESCOPE"));
        assert!(!window.matches_class("gamescope-wl"));
        assert!(!window.matches_class("steam"));

        let classless = WindowInfo::new(WindowId(2));
        assert!(!classless.matches_class(""));
    }

    #[test]
    fn test_window_event_creation() {
        let added = WindowEvent::added(WindowId(7));
        let removed = WindowEvent::removed(WindowId(7));

        assert_eq!(added.window, WindowId(7));
        assert_eq!(added.event_type, WindowEventType::Added);
        assert_eq!(removed.event_type, WindowEventType::Removed);
    }
}
