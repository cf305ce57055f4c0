#![deny(clippy::print_stderr)]
#![deny(clippy::print_stdout)]
#![deny(clippy::unused_async)]

#[macro_use]
mod environment;

use environment::RealEnvironment;
use environment::RealEnvironmentOptions;
use run_cli::AppError;
use std::time::Duration;
use utils::LogLevel;

mod arg_parser;
mod configuration;
mod exclusions;
mod file_sources;
mod format;
mod formatters;
mod patch;
mod pipeline;
mod run_cli;
mod stats;
mod utils;

#[cfg(test)]
mod test_helpers;

fn main() {
  let rt = match tokio::runtime::Builder::new_multi_thread().enable_time().build() {
    Ok(rt) => rt,
    Err(err) => exit_with_error(&AppError::from(anyhow::Error::from(err))),
  };
  let result = rt.block_on(run());
  // don't wait on formatters that are still running after timing out
  rt.shutdown_timeout(Duration::from_secs(1));
  if let Err(err) = result {
    exit_with_error(&err);
  }
}

async fn run() -> Result<(), AppError> {
  let args = arg_parser::parse_args(std::env::args().collect())?;
  let environment = RealEnvironment::new(&RealEnvironmentOptions {
    log_level: if args.verbose { LogLevel::Verbose } else { LogLevel::Info },
  });
  run_cli::run_cli(&args, &environment, &run_cli::get_builtin_formatter_list).await
}

fn exit_with_error(err: &AppError) -> ! {
  let result = format!("{:#}", err.inner);
  #[allow(clippy::print_stderr)]
  if !result.is_empty() {
    eprintln!("{}", result);
  }
  std::process::exit(err.exit_code);
}
