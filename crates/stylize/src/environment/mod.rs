#[macro_use]
mod environment;
mod canonicalized_path_buf;
mod real_environment;
#[cfg(test)]
mod test_environment;

pub use canonicalized_path_buf::*;
pub use environment::*;
pub use real_environment::*;

#[cfg(test)]
pub use test_environment::*;
