mod config_file;
mod resolve_config;

pub use config_file::*;
pub use resolve_config::*;
