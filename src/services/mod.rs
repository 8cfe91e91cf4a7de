pub mod host;
pub mod kwin_script;
pub mod tiler;

pub use host::create_host;
pub use kwin_script::KwinScript;
pub use tiler::Tiler;
