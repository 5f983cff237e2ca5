//! Slot / image index mapping
//!
//! The verification engine addresses storage as (image index, slot role)
//! pairs. These helpers translate those pairs to flash area ids and back.
//! All of them are pure functions.

use crate::area::AreaId;
use crate::error::{Error, Result};

/// Number of firmware images managed concurrently
pub const IMAGE_COUNT: u8 = 2;

/// Index of a managed firmware image, always in `[0, IMAGE_COUNT)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ImageIndex(u8);

impl ImageIndex {
    /// The first (and in single-image builds, only) image
    pub const FIRST: Self = Self(0);

    /// Create a checked image index
    pub const fn new(index: u8) -> Result<Self> {
        if index < IMAGE_COUNT {
            Ok(Self(index))
        } else {
            Err(Error::InvalidImageIndex)
        }
    }

    /// Raw index value
    pub const fn get(self) -> u8 {
        self.0
    }

    /// Iterate over every managed image
    pub fn all() -> impl Iterator<Item = ImageIndex> {
        (0..IMAGE_COUNT).map(Self)
    }
}

impl TryFrom<i32> for ImageIndex {
    type Error = Error;

    fn try_from(value: i32) -> Result<Self> {
        u8::try_from(value)
            .map_err(|_| Error::InvalidImageIndex)
            .and_then(Self::new)
    }
}

/// Role of a slot within one image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotRole {
    /// Currently bootable slot
    Primary,
    /// Staged upgrade candidate
    Secondary,
    /// Swap scratch space
    Scratch,
}

impl SlotRole {
    /// Engine slot number
    pub const fn to_raw(self) -> i32 {
        match self {
            Self::Primary => 0,
            Self::Secondary => 1,
            Self::Scratch => 2,
        }
    }

    /// Decode an engine slot number
    pub const fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(Self::Primary),
            1 => Some(Self::Secondary),
            2 => Some(Self::Scratch),
            _ => None,
        }
    }
}

impl core::fmt::Display for SlotRole {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Primary => write!(f, "primary"),
            Self::Secondary => write!(f, "secondary"),
            Self::Scratch => write!(f, "scratch"),
        }
    }
}

/// Map an image slot to its flash area id
///
/// Scratch is shared by all images.
pub const fn slot_to_area_id(image: ImageIndex, role: SlotRole) -> AreaId {
    match role {
        SlotRole::Primary => AreaId::Primary(image),
        SlotRole::Secondary => AreaId::Secondary(image),
        SlotRole::Scratch => AreaId::Scratch,
    }
}

/// Map a flash area id back to the slot it plays for `image`
pub fn area_id_to_slot(image: ImageIndex, id: AreaId) -> Result<SlotRole> {
    match id {
        AreaId::Primary(owner) if owner == image => Ok(SlotRole::Primary),
        AreaId::Secondary(owner) if owner == image => Ok(SlotRole::Secondary),
        _ => Err(Error::NotASlot),
    }
}

/// Integer form of [`slot_to_area_id`], -1 on invalid input
pub fn slot_to_area_id_raw(image: i32, slot: i32) -> i32 {
    let Ok(image) = ImageIndex::try_from(image) else {
        log::debug!("slot_to_area_id: invalid image index {}", image);
        return -1;
    };
    match SlotRole::from_raw(slot) {
        Some(role) => slot_to_area_id(image, role).to_raw() as i32,
        None => -1,
    }
}

/// Integer form of [`area_id_to_slot`], -1 on invalid input
pub fn area_id_to_slot_raw(image: i32, area_id: i32) -> i32 {
    let Ok(image) = ImageIndex::try_from(image) else {
        return -1;
    };
    let Ok(raw) = u8::try_from(area_id) else {
        return -1;
    };
    AreaId::from_raw(raw)
        .and_then(|id| area_id_to_slot(image, id))
        .map(SlotRole::to_raw)
        .unwrap_or(-1)
}

/// Single-image form of [`slot_to_area_id`]
pub const fn slot_to_area_id_single(role: SlotRole) -> AreaId {
    slot_to_area_id(ImageIndex::FIRST, role)
}

/// Single-image form of [`area_id_to_slot`]
pub fn area_id_to_slot_single(id: AreaId) -> Result<SlotRole> {
    area_id_to_slot(ImageIndex::FIRST, id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_index_checked() {
        assert!(ImageIndex::new(0).is_ok());
        assert!(ImageIndex::new(1).is_ok());
        assert_eq!(ImageIndex::new(2), Err(Error::InvalidImageIndex));
        assert_eq!(ImageIndex::try_from(-1), Err(Error::InvalidImageIndex));
        assert_eq!(ImageIndex::all().count(), IMAGE_COUNT as usize);
    }

    #[test]
    fn test_slot_ids_are_distinct() {
        let mut seen = [false; 256];
        for image in ImageIndex::all() {
            for role in [SlotRole::Primary, SlotRole::Secondary] {
                let raw = slot_to_area_id(image, role).to_raw() as usize;
                assert!(!seen[raw], "duplicate area id {}", raw);
                seen[raw] = true;
            }
        }
    }

    #[test]
    fn test_area_id_to_slot_is_left_inverse() {
        for image in ImageIndex::all() {
            for role in [SlotRole::Primary, SlotRole::Secondary] {
                let id = slot_to_area_id(image, role);
                assert_eq!(area_id_to_slot(image, id), Ok(role));
            }
        }
    }

    #[test]
    fn test_scratch_is_shared() {
        for image in ImageIndex::all() {
            assert_eq!(slot_to_area_id(image, SlotRole::Scratch), AreaId::Scratch);
            assert_eq!(area_id_to_slot(image, AreaId::Scratch), Err(Error::NotASlot));
        }
    }

    #[test]
    fn test_foreign_slots_rejected() {
        let first = ImageIndex::FIRST;
        let second = ImageIndex::new(1).unwrap();
        assert_eq!(
            area_id_to_slot(first, AreaId::Primary(second)),
            Err(Error::NotASlot)
        );
        assert_eq!(
            area_id_to_slot(second, AreaId::Bootloader),
            Err(Error::NotASlot)
        );
    }

    #[test]
    fn test_raw_forms() {
        assert_eq!(slot_to_area_id_raw(0, 0), 1);
        assert_eq!(slot_to_area_id_raw(0, 1), 2);
        assert_eq!(slot_to_area_id_raw(1, 0), 4);
        assert_eq!(slot_to_area_id_raw(1, 1), 5);
        assert_eq!(slot_to_area_id_raw(1, 2), 3);
        assert_eq!(slot_to_area_id_raw(2, 0), -1);
        assert_eq!(slot_to_area_id_raw(0, 7), -1);

        assert_eq!(area_id_to_slot_raw(0, 1), 0);
        assert_eq!(area_id_to_slot_raw(0, 2), 1);
        assert_eq!(area_id_to_slot_raw(1, 5), 1);
        assert_eq!(area_id_to_slot_raw(0, 4), -1);
        assert_eq!(area_id_to_slot_raw(0, 0), -1);
        assert_eq!(area_id_to_slot_raw(0, 300), -1);
    }

    #[test]
    fn test_single_image_helpers() {
        assert_eq!(
            slot_to_area_id_single(SlotRole::Secondary),
            AreaId::Secondary(ImageIndex::FIRST)
        );
        assert_eq!(
            area_id_to_slot_single(AreaId::Primary(ImageIndex::FIRST)),
            Ok(SlotRole::Primary)
        );
    }
}
