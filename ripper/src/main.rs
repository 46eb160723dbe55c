use clap::{ColorChoice, Parser};
use kdam::{term, term::Colorizer};
use ripper::{Args, Commands, Logger};
use std::{
    io::{IsTerminal, stderr},
    process,
};

fn run() -> anyhow::Result<()> {
    let args = Args::parse();

    let color = match args.color {
        ColorChoice::Always => true,
        ColorChoice::Auto => stderr().is_terminal(),
        ColorChoice::Never => false,
    };
    term::init(color);
    colored::control::set_override(color);
    Logger::init(ripper::level(args.verbose, args.quiet));

    match args.command {
        Commands::Inspect(args) => args.execute()?,
        Commands::Rip(args) => args.execute()?,
    }

    Ok(())
}

fn main() {
    if let Err(e) = run() {
        eprintln!("{}: {}", "error".colorize("bold red"), e);
        process::exit(1);
    }
}
