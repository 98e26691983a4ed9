//! Command line arguments

use clap::{Parser, ValueEnum};
use core_types::GameVariant;
use std::path::PathBuf;

/// Game whose usecode rules apply
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum VariantArg {
    /// Ultima 8
    U8,
    /// Crusader: No Remorse
    Remorse,
    /// Crusader: No Regret
    Regret,
}

impl From<VariantArg> for GameVariant {
    fn from(arg: VariantArg) -> Self {
        match arg {
            VariantArg::U8 => GameVariant::Ultima8,
            VariantArg::Remorse => GameVariant::Remorse,
            VariantArg::Regret => GameVariant::Regret,
        }
    }
}

/// Decimal or `0x`-prefixed hexadecimal word
pub fn parse_u16(s: &str) -> Result<u16, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("'{s}' is not a 16-bit number: {e}"))
}

/// Run a usecode function from an image file
#[derive(Parser, Debug)]
#[command(name = "usecode-run", version, about)]
pub struct Cli {
    /// Usecode image file
    #[arg(short, long)]
    pub image: PathBuf,

    /// Class of the entry function
    #[arg(short, long, value_parser = parse_u16)]
    pub class: u16,

    /// Entry offset within the class
    #[arg(short, long, default_value = "0", value_parser = parse_u16)]
    pub offset: u16,

    /// Game variant; overrides the config file
    #[arg(long, value_enum)]
    pub variant: Option<VariantArg>,

    /// Machine configuration as a JSON file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Give up after this many kernel ticks
    #[arg(long, default_value_t = 10_000)]
    pub max_ticks: u32,

    /// Log every executed instruction
    #[arg(long)]
    pub trace: bool,

    /// Print the entry class instead of running it
    #[arg(short, long)]
    pub disassemble: bool,
}
