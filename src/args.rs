use std::path::PathBuf;

use structopt::clap::AppSettings;
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(
name = "SchemaMigrator",
version = env ! ("CARGO_PKG_VERSION"),
about = "Applies ordered MySQL schema migrations, verifies every change against the live catalog and records an audit trail of each run.",
setting = AppSettings::ColoredHelp,
)]
pub struct Args {
    /// Activate verbose mode
    #[structopt(short = "v", long = "verbose")]
    pub verbose: bool,

    /// Activate quiet mode
    #[structopt(short = "q", long = "quiet")]
    pub quiet: bool,

    /// Revert the most recently applied migration
    #[structopt(short = "u", long = "undo")]
    pub undo: bool,

    /// Fail verification on statements the tracker cannot inspect
    #[structopt(short = "s", long = "strict")]
    pub strict: bool,

    /// List pending migrations without applying them
    #[structopt(short = "l", long = "list")]
    pub list: bool,

    /// Path to the config file
    #[structopt(short = "c", long = "config", default_value = "config.toml", parse(from_os_str))]
    pub config: PathBuf,
}
