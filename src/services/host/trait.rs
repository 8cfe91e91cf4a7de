use crate::config::Config;
use crate::error::Result;
use crate::events::{WindowEvent, WindowInfo};
use crate::layout::{MutationRequest, ScreenGeometry};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use super::{DryRunHost, X11Host};

/// Trait for the window manager the tiler drives
#[async_trait::async_trait]
pub trait WindowHost: Send + Sync {
    /// Human-readable backend name
    fn name(&self) -> &'static str;

    /// Geometry of the active screen, queried fresh on every call
    async fn screen_size(&self) -> Result<ScreenGeometry>;

    /// All managed windows, in host order
    async fn list_windows(&self) -> Result<Vec<WindowInfo>>;

    /// Execute border/geometry mutations
    async fn apply(&self, requests: &[MutationRequest]) -> Result<()>;

    /// Subscribe to window-added and window-removed events.
    /// Events arrive serially on the returned channel and are never dropped.
    fn subscribe(&self) -> Result<mpsc::UnboundedReceiver<WindowEvent>>;

    /// Stop the event source; the subscriber sees the channel close
    fn shutdown(&self) {}
}

/// Factory function to create the host backend based on the dry_run flag
pub fn create_host(config: Arc<Config>, dry_run: bool) -> Result<Arc<dyn WindowHost>> {
    if dry_run {
        Ok(Arc::new(
            DryRunHost::new(ScreenGeometry::new(1920, 1080))
                .with_simulation(&config.target.class, Duration::from_millis(config.host.simulation_interval_ms)),
        ))
    } else {
        Ok(Arc::new(X11Host::connect(config.host.display.as_deref())?))
    }
}
