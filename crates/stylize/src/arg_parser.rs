use anyhow::Result;
use clap::ArgMatches;
use clap::error::ErrorKind;
use thiserror::Error;

pub struct CliArgs {
  pub command: CliCommand,
  pub verbose: bool,
}

#[derive(Debug, PartialEq, Eq)]
pub enum CliCommand {
  Run(RunArgs),
  Help(String),
  Version,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct RunArgs {
  pub dir: Option<String>,
  pub excludes: Vec<String>,
  pub git_diffbase: Option<String>,
  /// File path to write the patch to or `-` for stdout.
  pub patch_output: Option<String>,
  pub in_place: bool,
  pub parallelism: Option<usize>,
  pub timeout_secs: Option<u64>,
  pub config: Option<String>,
  pub clang_style: Option<String>,
}

#[derive(Debug, Error)]
#[error(transparent)]
pub struct ParseArgsError(#[from] anyhow::Error);

pub fn parse_args(args: Vec<String>) -> Result<CliArgs, ParseArgsError> {
  inner_parse_args(args).map_err(ParseArgsError)
}

fn inner_parse_args(args: Vec<String>) -> Result<CliArgs> {
  let matches = match create_cli_parser().try_get_matches_from(&args) {
    Ok(matches) => matches,
    Err(err) => {
      return match err.kind() {
        ErrorKind::DisplayHelp => Ok(CliArgs {
          command: CliCommand::Help(err.render().to_string()),
          verbose: false,
        }),
        ErrorKind::DisplayVersion => Ok(CliArgs {
          command: CliCommand::Version,
          verbose: false,
        }),
        _ => Err(err.into()),
      };
    }
  };

  Ok(CliArgs {
    command: CliCommand::Run(parse_run_args(&matches)),
    verbose: matches.get_flag("verbose"),
  })
}

fn parse_run_args(matches: &ArgMatches) -> RunArgs {
  RunArgs {
    dir: matches.get_one::<String>("dir").map(String::from),
    excludes: values_to_vec(matches.get_many("exclude")),
    git_diffbase: matches.get_one::<String>("git-diffbase").map(String::from),
    patch_output: matches.get_one::<String>("patch-output").map(String::from),
    in_place: matches.get_flag("in-place"),
    parallelism: matches.get_one::<u64>("parallelism").map(|value| *value as usize),
    timeout_secs: matches.get_one::<u64>("timeout").copied(),
    config: matches.get_one::<String>("config").map(String::from),
    clang_style: matches.get_one::<String>("clang-style").map(String::from),
  }
}

fn values_to_vec(values: Option<clap::parser::ValuesRef<String>>) -> Vec<String> {
  values.map(|x| x.map(std::string::ToString::to_string).collect()).unwrap_or_default()
}

pub fn create_cli_parser() -> clap::Command {
  use clap::Arg;
  use clap::ArgAction;
  use clap::Command;

  Command::new("stylize")
    .bin_name("stylize")
    .version(env!("CARGO_PKG_VERSION"))
    .about("Runs the installed source code formatters over a directory tree.")
    .arg(
      Arg::new("dir")
        .long("dir")
        .value_name("DIR")
        .help("Root directory to process. Defaults to the current directory.")
        .num_args(1),
    )
    .arg(
      Arg::new("exclude")
        .long("exclude")
        .value_name("PATH")
        .help("Path, relative to the root directory, to skip. May be specified multiple times.")
        .action(ArgAction::Append)
        .num_args(1),
    )
    .arg(
      Arg::new("git-diffbase")
        .long("git-diffbase")
        .value_name("REF")
        .help("Only process files that changed since this git reference.")
        .num_args(1),
    )
    .arg(
      Arg::new("patch-output")
        .long("patch-output")
        .value_name("FILE")
        .help("Writes a patch of the needed changes to this file, or stdout when `-`.")
        .num_args(1),
    )
    .arg(
      Arg::new("in-place")
        .short('i')
        .long("in-place")
        .help("Formats the files instead of only checking them.")
        .conflicts_with("patch-output")
        .action(ArgAction::SetTrue),
    )
    .arg(
      Arg::new("parallelism")
        .long("parallelism")
        .value_name("N")
        .help("Maximum number of files formatted at once. Defaults to the number of available cores.")
        .value_parser(clap::value_parser!(u64).range(1..))
        .num_args(1),
    )
    .arg(
      Arg::new("timeout")
        .long("timeout")
        .value_name("SECONDS")
        .help("Fails formatting a file when it takes longer than this.")
        .value_parser(clap::value_parser!(u64).range(1..))
        .num_args(1),
    )
    .arg(
      Arg::new("config")
        .long("config")
        .short('c')
        .value_name("FILE")
        .help("Path to the JSON configuration file. Defaults to .stylize.json in the root directory when it exists.")
        .num_args(1),
    )
    .arg(
      Arg::new("clang-style")
        .long("clang-style")
        .value_name("STYLE")
        .help("Style passed to clang-format (ex. `file` or `google`).")
        .num_args(1),
    )
    .arg(
      Arg::new("verbose")
        .long("verbose")
        .help("Prints additional diagnostic information.")
        .action(ArgAction::SetTrue),
    )
}
