//! Host window-manager seam.
//!
//! Backends here only read screen/window state, deliver window lifecycle
//! events and execute mutation requests. Deciding which window goes where is
//! the job of `layout::plan_retile`, driven by the Tiler service.

mod dry_run;
mod r#trait;
mod x11;

pub use self::dry_run::DryRunHost;
pub use self::r#trait::{create_host, WindowHost};
pub use self::x11::X11Host;
