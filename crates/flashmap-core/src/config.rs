//! Board configuration files
//!
//! A board layout can be loaded from TOML instead of using the built-in
//! constants:
//!
//! ```toml
//! name = "cy8cproto-062-4343w"
//!
//! [internal]
//! base = 0x10000000
//! size = "0x200000"
//! erase_size = 512
//!
//! [external]
//! base = 0x18000000
//! size = "64 MiB"
//! erase_size = "256 KiB"
//!
//! [[area]]
//! id = "bootloader"
//! device = "internal"
//! offset = 0x0
//! size = 0x18000
//!
//! [radio]
//! slot = "primary1"
//! firmware_size = 421098
//! calibration_size = 7222
//! ```
//!
//! Numbers are accepted as integers, hex strings or sizes with a unit.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use std::string::{String, ToString};

use heapless::Vec;

use crate::area::{AreaId, FlashArea, FlashDevice};
use crate::board::{self, BoardLayout, DeviceGeometry};
use crate::radio::RadioBlobLayout;
use crate::registry::{Registry, MAX_AREAS};

/// Errors loading a board configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read or written
    #[error("failed to access board file: {0}")]
    Io(#[from] std::io::Error),
    /// TOML syntax or schema error
    #[error("failed to parse board file: {0}")]
    Parse(#[from] toml::de::Error),
    /// Unknown area name
    #[error("unknown flash area '{0}'")]
    UnknownArea(String),
    /// Unknown device name
    #[error("unknown flash device '{0}'")]
    UnknownDevice(String),
    /// Layout failed validation
    #[error("invalid board layout: {0}")]
    Layout(#[from] crate::error::Error),
}

#[derive(Debug, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct BoardFile {
    name: Option<String>,
    internal: DeviceFile,
    external: DeviceFile,
    area: Vec<AreaFile, MAX_AREAS>,
    radio: Option<RadioFile>,
}

#[derive(Debug, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct DeviceFile {
    #[serde(deserialize_with = "deserialize_hex_u32")]
    base: u32,
    #[serde(deserialize_with = "deserialize_size")]
    size: u32,
    #[serde(deserialize_with = "deserialize_size")]
    erase_size: u32,
}

#[derive(Debug, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct AreaFile {
    id: String,
    device: String,
    #[serde(deserialize_with = "deserialize_hex_u32")]
    offset: u32,
    #[serde(deserialize_with = "deserialize_size")]
    size: u32,
}

#[derive(Debug, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct RadioFile {
    slot: String,
    #[serde(deserialize_with = "deserialize_size")]
    firmware_size: u32,
    #[serde(deserialize_with = "deserialize_size")]
    calibration_size: u32,
    #[serde(default = "default_header_size", deserialize_with = "deserialize_size")]
    header_size: u32,
    #[serde(default = "default_signature_size", deserialize_with = "deserialize_size")]
    signature_size: u32,
    #[serde(default = "default_align", deserialize_with = "deserialize_size")]
    align: u32,
}

fn default_header_size() -> u32 {
    board::IMAGE_HEADER_SIZE
}

fn default_signature_size() -> u32 {
    board::IMAGE_SIGNATURE_SIZE
}

fn default_align() -> u32 {
    board::RADIO_BLOB_ALIGN
}

#[derive(serde::Deserialize)]
#[serde(untagged)]
enum HexOrInt {
    Int(u32),
    Str(String),
}

/// Deserialize a u32 that can be hex (0x...) or decimal
fn deserialize_hex_u32<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::Deserialize;

    match HexOrInt::deserialize(deserializer)? {
        HexOrInt::Int(n) => Ok(n),
        HexOrInt::Str(s) => parse_number(&s).map_err(serde::de::Error::custom),
    }
}

/// Deserialize a size that can be a number or a string like "256 KiB"
fn deserialize_size<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::Deserialize;

    match HexOrInt::deserialize(deserializer)? {
        HexOrInt::Int(n) => Ok(n),
        HexOrInt::Str(s) => parse_size(&s).map_err(serde::de::Error::custom),
    }
}

/// Parse a number that can be hex (0x...) or decimal
fn parse_number(s: &str) -> Result<u32, String> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(&hex.replace('_', ""), 16)
            .map_err(|e| std::format!("invalid hex: {}", e))
    } else {
        s.parse().map_err(|e| std::format!("invalid number: {}", e))
    }
}

/// Parse a size string like "64 MiB", "0x40000" or "512"
fn parse_size(s: &str) -> Result<u32, String> {
    if let Ok(n) = parse_number(s) {
        return Ok(n);
    }

    let lower = s.trim().to_lowercase();
    let (num, multiplier) = if let Some(n) = lower.strip_suffix("mib") {
        (n.trim(), 1024 * 1024)
    } else if let Some(n) = lower.strip_suffix("kib") {
        (n.trim(), 1024)
    } else if let Some(n) = lower.strip_suffix('b') {
        (n.trim(), 1)
    } else {
        return Err(std::format!("invalid size: {}", s));
    };

    let num: u32 = num.parse().map_err(|_| std::format!("invalid size: {}", s))?;
    num.checked_mul(multiplier)
        .ok_or_else(|| std::format!("size too large: {}", s))
}

/// Board layout loaded from a file
#[derive(Debug, Clone)]
pub struct BoardConfig {
    /// Board name
    pub name: String,
    /// On-chip flash geometry
    pub internal: DeviceGeometry,
    /// Serial flash geometry
    pub external: DeviceGeometry,
    /// Flash areas
    pub areas: Vec<FlashArea, MAX_AREAS>,
    /// Slot holding the radio blobs
    pub radio_slot: AreaId,
    /// Radio payload layout
    pub radio: RadioBlobLayout,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self::from_layout(&BoardLayout::DEFAULT)
    }
}

impl BoardConfig {
    /// Copy a compile-time layout
    pub fn from_layout(layout: &BoardLayout<'_>) -> Self {
        Self {
            name: layout.name.to_string(),
            internal: layout.internal,
            external: layout.external,
            areas: layout.areas.iter().take(MAX_AREAS).copied().collect(),
            radio_slot: layout.radio_slot,
            radio: layout.radio,
        }
    }

    /// Load a board file
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse a board description
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let file: BoardFile = toml::from_str(content)?;

        let mut areas = Vec::new();
        for area in &file.area {
            let id: AreaId = area
                .id
                .parse()
                .map_err(|_| ConfigError::UnknownArea(area.id.clone()))?;
            let device: FlashDevice = area
                .device
                .parse()
                .map_err(|_| ConfigError::UnknownDevice(area.device.clone()))?;
            // Same capacity as `file.area`, cannot overflow
            let _ = areas.push(FlashArea::new(id, device, area.offset, area.size));
        }

        let (radio_slot, radio) = match &file.radio {
            Some(radio) => (
                radio
                    .slot
                    .parse()
                    .map_err(|_| ConfigError::UnknownArea(radio.slot.clone()))?,
                RadioBlobLayout::packed(
                    radio.header_size,
                    radio.firmware_size,
                    radio.calibration_size,
                    radio.signature_size,
                    radio.align,
                )?,
            ),
            None => (board::RADIO_SLOT, board::RADIO_LAYOUT),
        };

        let geometry = |d: &DeviceFile| DeviceGeometry {
            base: d.base,
            size: d.size,
            erase_size: d.erase_size,
        };

        Ok(Self {
            name: file.name.unwrap_or_else(|| "custom".to_string()),
            internal: geometry(&file.internal),
            external: geometry(&file.external),
            areas,
            radio_slot,
            radio,
        })
    }

    /// Borrow as a board layout
    pub fn layout(&self) -> BoardLayout<'_> {
        BoardLayout {
            name: &self.name,
            internal: self.internal,
            external: self.external,
            areas: &self.areas,
            radio_slot: self.radio_slot,
            radio: self.radio,
        }
    }

    /// Build the validated registry for this board
    pub fn registry(&self) -> Result<Registry, ConfigError> {
        Ok(Registry::from_board(&self.layout())?)
    }

    /// Render as a board file
    pub fn to_toml_string(&self) -> String {
        let mut out = String::new();
        // Writing to a String cannot fail
        let _ = writeln!(out, "name = \"{}\"", self.name);
        for (section, dev) in [("internal", &self.internal), ("external", &self.external)] {
            let _ = writeln!(out, "\n[{}]", section);
            let _ = writeln!(out, "base = 0x{:08X}", dev.base);
            let _ = writeln!(out, "size = 0x{:X}", dev.size);
            let _ = writeln!(out, "erase_size = 0x{:X}", dev.erase_size);
        }
        for area in &self.areas {
            let _ = writeln!(out, "\n[[area]]");
            let _ = writeln!(out, "id = \"{}\"", area.id);
            let _ = writeln!(out, "device = \"{}\"", area.device);
            let _ = writeln!(out, "offset = 0x{:X}", area.offset);
            let _ = writeln!(out, "size = 0x{:X}", area.size);
        }
        let _ = writeln!(out, "\n[radio]");
        let _ = writeln!(out, "slot = \"{}\"", self.radio_slot);
        let _ = writeln!(out, "header_size = 0x{:X}", self.radio.header_size);
        let _ = writeln!(out, "firmware_size = {}", self.radio.firmware_size);
        let _ = writeln!(out, "calibration_size = {}", self.radio.calibration_size);
        let _ = writeln!(out, "signature_size = 0x{:X}", self.radio.signature_size);
        let _ = writeln!(out, "align = {}", self.radio.align);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::slot::ImageIndex;

    const BOARD: &str = r#"
name = "test-board"

[internal]
base = 0x10000000
size = "2 MiB"
erase_size = 512

[external]
base = "0x18000000"
size = "64 MiB"
erase_size = "256 KiB"

[[area]]
id = "bootloader"
device = "internal"
offset = 0
size = "0x18000"

[[area]]
id = "primary0"
device = "internal"
offset = "0x18000"
size = "0x1C0000"

[[area]]
id = "secondary0"
device = "external"
offset = 0
size = "0x1C0000"

[[area]]
id = "scratch"
device = "external0"
offset = "0x1C0000"
size = "0x40000"

[radio]
slot = "secondary0"
firmware_size = 1000
calibration_size = 100
"#;

    #[test]
    fn test_parse_board_file() {
        let config = BoardConfig::from_toml_str(BOARD).unwrap();
        assert_eq!(config.name, "test-board");
        assert_eq!(config.internal.size, 0x20_0000);
        assert_eq!(config.external.erase_size, 0x4_0000);
        assert_eq!(config.areas.len(), 4);
        assert_eq!(config.radio_slot, AreaId::Secondary(ImageIndex::FIRST));
        assert_eq!(config.radio.header_size, board::IMAGE_HEADER_SIZE);

        let registry = config.registry().unwrap();
        let scratch = registry.open(AreaId::Scratch).unwrap();
        assert_eq!(scratch.device, FlashDevice::External(0));
        assert_eq!(scratch.offset, 0x1C_0000);
    }

    #[test]
    fn test_round_trip_default_board() {
        let config = BoardConfig::default();
        let text = config.to_toml_string();
        let parsed = BoardConfig::from_toml_str(&text).unwrap();
        assert_eq!(parsed.areas, config.areas);
        assert_eq!(parsed.internal, config.internal);
        assert_eq!(parsed.external, config.external);
        assert_eq!(parsed.radio, config.radio);

        let registry = parsed.registry().unwrap();
        assert_eq!(registry.len(), BoardLayout::DEFAULT.areas.len());
    }

    #[test]
    fn test_shipped_board_matches_builtin() {
        let text = include_str!("../../../boards/cy8cproto-062-4343w.toml");
        let config = BoardConfig::from_toml_str(text).unwrap();
        let builtin = BoardConfig::default();
        assert_eq!(config.name, builtin.name);
        assert_eq!(config.areas, builtin.areas);
        assert_eq!(config.radio_slot, builtin.radio_slot);
        assert_eq!(config.radio, builtin.radio);
        assert!(config.registry().is_ok());
    }

    #[test]
    fn test_radio_align_survives_round_trip() {
        let text = BOARD.replace(
            "calibration_size = 100",
            "calibration_size = 100\nalign = 4096",
        );
        let config = BoardConfig::from_toml_str(&text).unwrap();
        assert_eq!(config.radio.align, 4096);
        assert_eq!(config.radio.calibration_offset() % 4096, 0);

        let again = BoardConfig::from_toml_str(&config.to_toml_string()).unwrap();
        assert_eq!(again.radio, config.radio);
    }

    #[test]
    fn test_oversized_radio_blob_rejected() {
        let text = BOARD.replace("firmware_size = 1000", "firmware_size = \"0xFFFFFFFF\"");
        assert!(matches!(
            BoardConfig::from_toml_str(&text),
            Err(ConfigError::Layout(Error::LayoutTooLarge))
        ));
    }

    #[test]
    fn test_unknown_names() {
        let bad_area = BOARD.replace("\"scratch\"", "\"nvram\"");
        assert!(matches!(
            BoardConfig::from_toml_str(&bad_area),
            Err(ConfigError::UnknownArea(name)) if name == "nvram"
        ));

        let bad_device = BOARD.replace("\"external0\"", "\"sdcard\"");
        assert!(matches!(
            BoardConfig::from_toml_str(&bad_device),
            Err(ConfigError::UnknownDevice(_))
        ));
    }

    #[test]
    fn test_overlapping_areas_rejected() {
        let overlap = BOARD.replace("offset = \"0x1C0000\"", "offset = \"0x180000\"");
        let config = BoardConfig::from_toml_str(&overlap).unwrap();
        assert!(matches!(
            config.registry(),
            Err(ConfigError::Layout(Error::LayoutError))
        ));
    }

    #[test]
    fn test_parse_numbers() {
        assert_eq!(parse_number("0x1000"), Ok(0x1000));
        assert_eq!(parse_number("4096"), Ok(4096));
        assert!(parse_number("0xZZ").is_err());
        assert_eq!(parse_size("256 KiB"), Ok(0x4_0000));
        assert_eq!(parse_size("64MiB"), Ok(0x400_0000));
        assert!(parse_size("8 GiB").is_err());
    }
}
