mod get_unified_diff;
mod logging;
mod semaphore;
mod terminal;

pub use get_unified_diff::*;
pub use logging::*;
pub use semaphore::*;
pub use terminal::*;
