//! flashmap - Flash area map tool for dual-flash MCUboot boards
//!
//! Inspects the flash area layout of a board (built in or loaded from a
//! TOML board file), packs the radio firmware payload for its external
//! flash slot, and exercises the flash area layer and boot handoff on
//! simulated devices.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use flashmap_core::config::BoardConfig;
use std::path::Path;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Set log level based on verbosity
    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    let board = load_board(cli.board.as_deref())?;
    log::info!("Using board {} ({} areas)", board.name, board.areas.len());

    match cli.command {
        Commands::Layout { toml } => commands::layout::cmd_layout(&board, toml),
        Commands::Slots => commands::layout::cmd_slots(&board),
        Commands::Sectors { area } => commands::layout::cmd_sectors(&board, &area),
        Commands::Radio => commands::radio::cmd_radio(&board),
        Commands::RadioPack {
            firmware,
            calibration,
            out,
            no_header,
        } => commands::radio::cmd_pack(&board, &firmware, &calibration, &out, !no_header),
        Commands::Boot {
            image_offset,
            header_size,
            image_size,
            stuck_console,
        } => commands::boot::cmd_boot(image_offset, header_size, image_size, stuck_console),
        Commands::Selftest => commands::selftest::cmd_selftest(&board),
    }
}

/// Load the board file, or fall back to the built-in layout
fn load_board(path: Option<&Path>) -> Result<BoardConfig, Box<dyn std::error::Error>> {
    match path {
        Some(path) => {
            let board = BoardConfig::from_toml_file(path)?;
            log::debug!("Loaded board from {:?}", path);
            Ok(board)
        }
        None => Ok(BoardConfig::default()),
    }
}
