//! CLI argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Parse a string as a hex or decimal u32
fn parse_hex_u32(s: &str) -> Result<u32, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<u32>().map_err(|e| format!("Invalid number: {}", e))
    }
}

/// Parse a string as a hex or decimal u16
fn parse_hex_u16(s: &str) -> Result<u16, String> {
    let value = parse_hex_u32(s)?;
    u16::try_from(value).map_err(|_| format!("Value too large: {}", s))
}

#[derive(Parser)]
#[command(name = "flashmap")]
#[command(
    author,
    version,
    about = "Flash area map tool for dual-flash MCUboot boards",
    long_about = None
)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Board description (TOML format)
    /// Defaults to the built-in CY8CPROTO-062-4343W layout
    #[arg(short, long, global = true)]
    pub board: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the flash areas of the board
    Layout {
        /// Also print the board as TOML
        #[arg(long)]
        toml: bool,
    },

    /// Show the image slot to area id mapping
    Slots,

    /// List the erase sectors of an area
    Sectors {
        /// Area name (bootloader, primary0, secondary0, primary1, ...)
        area: String,
    },

    /// Show where the radio firmware and calibration blobs are mapped
    Radio,

    /// Pack radio firmware and calibration into a slot payload
    RadioPack {
        /// Radio firmware binary
        #[arg(short, long)]
        firmware: PathBuf,

        /// Calibration (CLM) binary
        #[arg(short, long)]
        calibration: PathBuf,

        /// Output file
        #[arg(short, long)]
        out: PathBuf,

        /// Leave out the zeroed header space in front of the firmware
        #[arg(long)]
        no_header: bool,
    },

    /// Dry-run the boot handoff on a simulated platform
    Boot {
        /// Address of the verified image in the primary slot
        #[arg(long, value_parser = parse_hex_u32, default_value = "0x10018000")]
        image_offset: u32,

        /// Image header size
        #[arg(long, value_parser = parse_hex_u16, default_value = "0x400")]
        header_size: u16,

        /// Image payload size
        #[arg(long, value_parser = parse_hex_u32, default_value = "0")]
        image_size: u32,

        /// Simulate a console that never drains
        #[arg(long)]
        stuck_console: bool,
    },

    /// Write, read back and erase every area on simulated devices
    Selftest,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_u32() {
        assert_eq!(parse_hex_u32("0x10018000"), Ok(0x1001_8000));
        assert_eq!(parse_hex_u32("1024"), Ok(1024));
        assert!(parse_hex_u32("0xZZ").is_err());
    }

    #[test]
    fn test_parse_hex_u16_range() {
        assert_eq!(parse_hex_u16("0x400"), Ok(0x400));
        assert!(parse_hex_u16("0x10000").is_err());
    }

    #[test]
    fn test_boot_defaults() {
        let cli = Cli::try_parse_from(["flashmap", "boot"]).unwrap();
        match cli.command {
            Commands::Boot {
                image_offset,
                header_size,
                ..
            } => {
                assert_eq!(image_offset, 0x1001_8000);
                assert_eq!(header_size, 0x400);
            }
            _ => panic!("expected boot"),
        }
    }

    #[test]
    fn test_global_board_and_verbose() {
        let args = ["flashmap", "sectors", "primary0", "-vv", "--board", "b.toml"];
        let cli = Cli::try_parse_from(args).unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.board, Some(PathBuf::from("b.toml")));
        assert!(matches!(cli.command, Commands::Sectors { ref area } if area == "primary0"));
    }
}
