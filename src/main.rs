use clap::Parser;
use cssprite::cli::{Cli, Commands};
use cssprite::output::Printer;
use env_logger::Env;
use miette::Result;

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let printer = Printer::new();

    match cli.command {
        Commands::Build(args) => {
            cssprite::cli::build::run(args, &printer)?;
        }
        Commands::List(args) => cssprite::cli::list::run(args, &printer)?,
        Commands::Init(args) => cssprite::cli::init::run(args, &printer)?,
        Commands::Completions(args) => cssprite::cli::completions::run(args)?,
    }

    Ok(())
}
