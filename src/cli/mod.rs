use std::fs;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use colored::{Color, Colorize};
use itertools::Itertools;
use pretty_hex::*;

use crate::catalog::Catalog;
use crate::envelope;
use crate::error::Error;
use crate::text::{self, Format, TextNode};
use crate::version::LvVersion;

/// VCTP connector-catalog tool: inspect, project to text, and rebuild the
/// VCTP block carried inside a resource file.
#[derive(Parser)]
#[command(version = "0.1.0")]
#[command(about, long_about)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Verbosity level for logging/debugging
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the block directory and, for the VCTP block, a catalog summary.
    #[command(arg_required_else_help = true)]
    List {
        #[arg(long, value_name = "FILE")]
        rsrc: PathBuf,
    },

    /// Project the VCTP block to structured text.
    #[command(arg_required_else_help = true)]
    Dump {
        #[arg(long, value_name = "FILE")]
        rsrc: PathBuf,

        #[arg(long, value_name = "OUT")]
        xml: PathBuf,

        /// Per-connector projection format.
        #[arg(long, default_value = "inline")]
        format: String,
    },

    /// Like `dump`, restricted to opaque-mode records; writes sibling binary
    /// payload files next to the output tree.
    #[command(arg_required_else_help = true)]
    Extract {
        #[arg(long, value_name = "FILE")]
        rsrc: PathBuf,

        #[arg(long, value_name = "OUT")]
        xml: PathBuf,
    },

    /// Load a textual projection and write the re-synthesized VCTP block.
    #[command(arg_required_else_help = true)]
    Create {
        #[arg(long, value_name = "IN")]
        xml: PathBuf,

        #[arg(long, value_name = "OUT")]
        rsrc: PathBuf,
    },

    /// Print the outer envelope's resource headers and file-type.
    #[command(arg_required_else_help = true)]
    Info {
        #[arg(long, value_name = "FILE")]
        rsrc: PathBuf,
    },

    /// Out of scope for the core; reports `Error::NotImplemented`.
    #[command(arg_required_else_help = true)]
    Password {
        #[arg(long, value_name = "FILE")]
        rsrc: PathBuf,
    },
}

macro_rules! debug {
    ($cli: expr, $msg:literal) => {
        if $cli.verbose > 2 {
            println!("{}{}", "D : ".bold().color(Color::BrightBlack), $msg.color(Color::BrightBlack));
        }
    };
    ($cli:expr, $argmsg:literal, $($arg:tt)*) => {
        if $cli.verbose > 2 {
            println!("{}{}", "D : ".bold().color(Color::BrightBlack), format!($argmsg, $($arg)*).color(Color::BrightBlack));
        }
    }
}

macro_rules! error {
    ($msg:literal, $($arg:tt)*) => {
        println!("{}{}", "E : ".bold().red(), format!($msg, $($arg)*).red());
    };
}

pub(crate) use debug;
pub(crate) use error;

fn default_version() -> LvVersion {
    LvVersion::default()
}

fn load_vctp_bytes(cli: &Cli, rsrc: &PathBuf) -> Result<Vec<u8>, Error> {
    let data = fs::read(rsrc)?;
    debug!(cli, "read {} bytes from {}", data.len(), rsrc.display());
    let (offset, len) = envelope::locate_block(&data, envelope::VCTP_BLOCK_NAME)?;
    debug!(cli, "VCTP block at offset {}, length {}", offset, len);
    Ok(data[offset..offset + len].to_vec())
}

pub fn list(cli: &Cli, rsrc: &PathBuf) -> Result<(), Error> {
    let data = fs::read(rsrc)?;
    let (header, blocks) = envelope::read_block_directory(&data)?;
    println!("file type: {}", String::from_utf8_lossy(&header.file_type));
    for block in &blocks {
        println!("  {} (count={}, offset={})", String::from_utf8_lossy(&block.name), block.count, block.offset);
    }

    let (offset, len) = match envelope::locate_block(&data, envelope::VCTP_BLOCK_NAME) {
        Ok(v) => v,
        Err(e) => {
            debug!(cli, "no VCTP block: {}", e);
            return Ok(());
        }
    };
    let (catalog, diagnostics) = Catalog::parse(&data[offset..offset + len], default_version())?;
    println!("VCTP: {} records", catalog.len());
    for connector in catalog.iter() {
        let main_type = connector
            .main_type()
            .map(|m| format!("{m:?}"))
            .unwrap_or_else(|_| "?".to_string());
        let label = connector
            .label
            .as_deref()
            .map(|l| String::from_utf8_lossy(l).into_owned())
            .unwrap_or_default();
        println!(
            "  [{:>4}] {:<14} tag=0x{:02X} {}",
            connector.index, main_type, connector.type_tag, label
        );
        if let crate::connector::Payload::Opaque(bytes) = &connector.payload {
            if cli.verbose > 1 && !bytes.is_empty() {
                let cfg = HexConfig {
                    title: false,
                    ..HexConfig::default()
                };
                println!("{}", textwrap::indent(&format!("{:?}", bytes.hex_conf(cfg)), "        "));
            }
        }
    }
    // Diagnostics read best grouped by the record they belong to.
    let sorted = diagnostics.iter().sorted_by_key(|d| d.index);
    let groups = sorted.chunk_by(|d| d.index);
    for (index, group) in &groups {
        for diag in group {
            error!("[{}] {}", index, diag.message);
        }
    }
    Ok(())
}

pub fn dump(cli: &Cli, rsrc: &PathBuf, xml: &PathBuf, format: &str) -> Result<(), Error> {
    let format: Format = format.parse()?;
    let vctp = load_vctp_bytes(cli, rsrc)?;
    let (catalog, diagnostics) = Catalog::parse(&vctp, default_version())?;
    for diag in &diagnostics {
        debug!(cli, "[{}] {}", diag.index, diag.message);
    }
    let mut tree = text::catalog_to_text(&catalog, format);
    let dir = xml.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| std::path::Path::new("."));
    text::write_text_tree(&mut tree, dir)?;
    fs::write(xml, serde_json::to_string_pretty(&tree)?)?;
    Ok(())
}

pub fn extract(cli: &Cli, rsrc: &PathBuf, xml: &PathBuf) -> Result<(), Error> {
    dump(cli, rsrc, xml, "bin")
}

pub fn create(cli: &Cli, xml: &PathBuf, rsrc: &PathBuf) -> Result<(), Error> {
    let raw = fs::read_to_string(xml)?;
    let mut tree: TextNode = serde_json::from_str(&raw)?;
    text::read_text_tree(&mut tree, xml.parent().unwrap_or_else(|| std::path::Path::new(".")))?;
    let catalog = text::text_to_catalog(&tree, default_version())?;
    debug!(cli, "loaded {} records from {}", catalog.len(), xml.display());
    let bytes = catalog.emit(default_version())?;
    fs::write(rsrc, bytes)?;
    Ok(())
}

pub fn info(_cli: &Cli, rsrc: &PathBuf) -> Result<(), Error> {
    let data = fs::read(rsrc)?;
    let (header, blocks) = envelope::read_block_directory(&data)?;
    println!("file type : {}", String::from_utf8_lossy(&header.file_type));
    println!("extension : {}", envelope::extension_for(header.file_type).unwrap_or("?"));
    println!("next_offset: {}", header.next_offset);
    println!("size       : {}", header.size);
    println!("blocks     : {}", blocks.len());
    Ok(())
}

pub fn password(_cli: &Cli, _rsrc: &PathBuf) -> Result<(), Error> {
    Err(Error::NotImplemented("password-protected block decoding is out of scope".into()))
}
