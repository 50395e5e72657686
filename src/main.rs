use clap::Parser;

use vctp::cli::{self, Cli, Commands};
use vctp::error::Error;

fn main() -> Result<(), Error> {
    let cli = Cli::parse();

    match &cli.command {
        None => {}
        Some(Commands::List { rsrc }) => cli::list(&cli, rsrc)?,
        Some(Commands::Dump { rsrc, xml, format }) => cli::dump(&cli, rsrc, xml, format)?,
        Some(Commands::Extract { rsrc, xml }) => cli::extract(&cli, rsrc, xml)?,
        Some(Commands::Create { xml, rsrc }) => cli::create(&cli, xml, rsrc)?,
        Some(Commands::Info { rsrc }) => cli::info(&cli, rsrc)?,
        Some(Commands::Password { rsrc }) => cli::password(&cli, rsrc)?,
    }

    Ok(())
}
