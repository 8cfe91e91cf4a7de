use crate::error::Result;
use crate::events::{WindowEvent, WindowId, WindowInfo};
use crate::layout::{MutationRequest, ScreenGeometry, MAX_TILED};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{interval, Duration};
use tracing::{debug, info};

use super::r#trait::WindowHost;

/// Хост без оконного менеджера: окна живут в памяти, изменения только логируются
pub struct DryRunHost {
    screen: ScreenGeometry,
    state: Arc<DryRunState>,
    simulation: Option<Simulation>,
}

#[derive(Debug, Clone)]
struct Simulation {
    class: String,
    period: Duration,
}

#[derive(Default)]
struct DryRunState {
    windows: RwLock<Vec<WindowInfo>>,
    applied: RwLock<Vec<Vec<MutationRequest>>>,
    events: Mutex<Option<mpsc::UnboundedSender<WindowEvent>>>,
    next_id: AtomicU32,
}

impl DryRunState {
    fn add_window(&self, class: &str, title: &str) -> WindowId {
        let id = WindowId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let window = WindowInfo::new(id).with_class(class).with_title(title);
        debug!("[DRY RUN] Добавлено окно {}", window);
        self.windows.write().push(window);
        self.emit(WindowEvent::added(id));
        id
    }

    fn remove_window(&self, id: WindowId) -> bool {
        let removed = {
            let mut windows = self.windows.write();
            let before = windows.len();
            windows.retain(|w| w.id != id);
            windows.len() != before
        };

        if removed {
            debug!("[DRY RUN] Удалено окно {}", id);
            self.emit(WindowEvent::removed(id));
        }
        removed
    }

    fn emit(&self, event: WindowEvent) {
        if let Some(tx) = self.events.lock().as_ref() {
            if tx.send(event).is_err() {
                debug!("[DRY RUN] Подписчик закрыт, событие не доставлено");
            }
        }
    }

    fn is_closed(&self) -> bool {
        self.events.lock().as_ref().map_or(true, |tx| tx.is_closed())
    }
}

impl DryRunHost {
    pub fn new(screen: ScreenGeometry) -> Self {
        Self {
            screen,
            state: Arc::new(DryRunState::default()),
            simulation: None,
        }
    }

    /// После подписки периодически открывать и закрывать окна класса `class`
    pub fn with_simulation(mut self, class: &str, period: Duration) -> Self {
        self.simulation = Some(Simulation {
            class: class.to_string(),
            period,
        });
        self
    }

    pub fn add_window(&self, class: &str, title: &str) -> WindowId {
        self.state.add_window(class, title)
    }

    pub fn remove_window(&self, id: WindowId) -> bool {
        self.state.remove_window(id)
    }

    /// Все применённые пачки изменений, по одной на вызов `apply`
    pub fn applied(&self) -> Vec<Vec<MutationRequest>> {
        self.state.applied.read().clone()
    }

    /// Закрыть поток событий: подписчик получит конец канала
    pub fn close_events(&self) {
        self.state.events.lock().take();
    }

    async fn simulate(state: Arc<DryRunState>, simulation: Simulation) {
        info!(
            "Dry-run: эмулируем окна класса '{}' каждые {}мс",
            simulation.class,
            simulation.period.as_millis()
        );

        let mut ticker = interval(simulation.period);
        let mut spawned: Vec<WindowId> = Vec::new();
        let mut growing = true;

        // Постороннее окно, которое раскладка не должна трогать
        state.add_window("konsole", "Terminal - dry_run");

        loop {
            ticker.tick().await;
            if state.is_closed() {
                break;
            }

            if growing {
                let title = format!("Player {} - dry_run", spawned.len() + 1);
                spawned.push(state.add_window(&simulation.class, &title));
                // Доходим до MAX_TILED + 1, чтобы показать переполнение
                if spawned.len() > MAX_TILED {
                    growing = false;
                }
            } else {
                if let Some(id) = spawned.pop() {
                    state.remove_window(id);
                }
                if spawned.is_empty() {
                    growing = true;
                }
            }
        }

        debug!("Dry-run симуляция остановлена");
    }
}

#[async_trait::async_trait]
impl WindowHost for DryRunHost {
    fn name(&self) -> &'static str {
        "dry-run"
    }

    async fn screen_size(&self) -> Result<ScreenGeometry> {
        Ok(self.screen)
    }

    async fn list_windows(&self) -> Result<Vec<WindowInfo>> {
        Ok(self.state.windows.read().clone())
    }

    async fn apply(&self, requests: &[MutationRequest]) -> Result<()> {
        for request in requests {
            info!("[DRY RUN] {}", request);
        }
        self.state.applied.write().push(requests.to_vec());
        Ok(())
    }

    fn subscribe(&self) -> Result<mpsc::UnboundedReceiver<WindowEvent>> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.state.events.lock() = Some(tx);

        if let Some(simulation) = self.simulation.clone() {
            tokio::spawn(Self::simulate(Arc::clone(&self.state), simulation));
        }

        Ok(rx)
    }

    fn shutdown(&self) {
        self.close_events();
    }
}
