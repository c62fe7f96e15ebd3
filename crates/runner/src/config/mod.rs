pub mod loader;
pub mod types;

pub use loader::{ConfigError, load_config, load_default_config};
pub use types::RunnerConfigFile;
