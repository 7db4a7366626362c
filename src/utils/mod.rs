pub mod logger;
pub mod settings;

pub use logger::setup_logging;
pub use settings::{Settings, load_settings};
