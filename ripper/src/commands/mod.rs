mod inspect;
mod rip;

pub use inspect::Inspect;
pub use rip::Rip;

use clap::{ArgAction, ColorChoice, Parser, Subcommand};

/// Rip lossless albums from a music catalog into tagged .m4a files.
#[derive(Debug, Clone, Parser)]
#[command(version, about)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// When to output colored text.
    #[arg(long, global = true, default_value_t = ColorChoice::Auto)]
    pub color: ColorChoice,

    /// Print debug logs, use twice for trace logs.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Only print warnings and errors.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    Inspect(Inspect),
    Rip(Rip),
}
