//! Boot handoff
//!
//! Once the verification engine has picked an image, the boot stage hands
//! the hardware over to the application core: flush the console, release
//! every peripheral the bootloader owns, and start the application at the
//! first byte after the image header. This happens once per boot cycle.

use bitflags::bitflags;

use super::header::ImageHeader;
use crate::driver::ExternalFlash;
use crate::error::{Error, Result};
use crate::spi::QspiController;

/// Bounded wait for the console to drain before it is released
pub const CONSOLE_FLUSH_TIMEOUT_MS: u32 = 100;

bitflags! {
    /// Hardware owned by the boot stage
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Resources: u8 {
        /// Debug console (retargeted stdio)
        const CONSOLE      = 1 << 0;
        /// Console UART receive port
        const UART_RX_PORT = 1 << 1;
        /// Console UART transmit port
        const UART_TX_PORT = 1 << 2;
        /// Quad-SPI bus to the serial flash
        const QSPI_BUS     = 1 << 3;
    }
}

/// Verified image chosen by the verification engine
#[derive(Debug, PartialEq, Eq)]
pub struct BootResponse {
    /// Absolute address of the image header
    pub image_offset: u32,
    /// Parsed image header
    pub header: ImageHeader,
}

impl BootResponse {
    /// Address of the first instruction after the header
    pub fn entry_address(&self) -> Result<u32> {
        self.image_offset
            .checked_add(self.header.hdr_size() as u32)
            .ok_or(Error::InvalidImage)
    }
}

/// Board services the handoff needs
pub trait BootPlatform {
    /// Wait up to `timeout_ms` for pending console output to go out
    ///
    /// Returns `false` if the wait timed out.
    fn flush_console(&mut self, timeout_ms: u32) -> bool;

    /// Release one peripheral
    fn release(&mut self, resource: Resources);

    /// Start the application core at `entry`
    fn start_app_core(&mut self, entry: u32);

    /// Sleep until the next interrupt
    fn wait_for_interrupt(&mut self);
}

/// Handoff progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootState {
    /// Waiting for a verified image
    Verifying,
    /// Application core started
    Booted {
        /// Entry address the application was started at
        entry: u32,
    },
}

/// One-shot handoff state machine
#[derive(Debug)]
pub struct BootHandoff {
    state: BootState,
}

impl Default for BootHandoff {
    fn default() -> Self {
        Self::new()
    }
}

/// Releases peripherals on drop, in flag order
struct ReleaseGuard<'a, P: BootPlatform> {
    platform: &'a mut P,
    pending: Resources,
}

impl<P: BootPlatform> Drop for ReleaseGuard<'_, P> {
    fn drop(&mut self) {
        for resource in self.pending.iter() {
            log::debug!("releasing {:?}", resource);
            self.platform.release(resource);
        }
        self.pending = Resources::empty();
    }
}

impl BootHandoff {
    /// Start in the verifying state
    pub const fn new() -> Self {
        Self {
            state: BootState::Verifying,
        }
    }

    /// Current state
    pub fn state(&self) -> BootState {
        self.state
    }

    /// Hand the hardware to the application described by `response`
    ///
    /// Returns the entry address the application core was started at.
    pub fn hand_off<P: BootPlatform>(
        &mut self,
        platform: &mut P,
        response: BootResponse,
    ) -> Result<u32> {
        if let BootState::Booted { entry } = self.state {
            log::error!("handoff already done (entry 0x{:08X})", entry);
            return Err(Error::AlreadyBooted);
        }
        if !response.header.is_valid() {
            return Err(Error::InvalidImage);
        }
        let entry = response.entry_address().inspect_err(|_| {
            log::error!(
                "image at 0x{:08X} with header 0x{:X} overflows the address space",
                response.image_offset,
                response.header.hdr_size()
            );
        })?;

        log::info!(
            "starting application {} at 0x{:08X}",
            response.header.version(),
            entry
        );

        {
            let guard = ReleaseGuard {
                platform: &mut *platform,
                pending: Resources::all(),
            };
            if !guard.platform.flush_console(CONSOLE_FLUSH_TIMEOUT_MS) {
                log::warn!("console flush timed out");
            }
        }

        platform.start_app_core(entry);
        self.state = BootState::Booted { entry };
        Ok(entry)
    }
}

/// Boot stage epilogue: hand off if there is an image, then sleep forever
///
/// Without a bootable image the stage parks right away; recovery is left
/// to the watchdog.
pub fn boot_or_park<P: BootPlatform>(platform: &mut P, response: Option<BootResponse>) -> ! {
    let mut handoff = BootHandoff::new();
    match response {
        Some(response) => {
            if let Err(e) = handoff.hand_off(platform, response) {
                log::error!("boot handoff failed: {}", e);
            }
        }
        None => log::error!("no bootable image found"),
    }
    park(platform)
}

/// Probe the serial flash, or park the boot stage if it does not come up
///
/// Secondary slots live on the serial flash, so the engine cannot run
/// without it.
pub fn bring_up_or_halt<C: QspiController, P: BootPlatform>(
    ctrl: C,
    platform: &mut P,
) -> ExternalFlash<C> {
    match ExternalFlash::probe(ctrl) {
        Ok(flash) => flash,
        Err(e) => {
            log::error!("serial flash bring-up failed: {}", e);
            park(platform)
        }
    }
}

fn park<P: BootPlatform>(platform: &mut P) -> ! {
    loop {
        platform.wait_for_interrupt();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boot::header::ImageVersion;
    use std::vec::Vec;

    #[derive(Debug, PartialEq)]
    enum Event {
        Flush(u32),
        Release(Resources),
        Start(u32),
    }

    #[derive(Default)]
    struct Recorder {
        events: Vec<Event>,
        drained: bool,
    }

    impl BootPlatform for Recorder {
        fn flush_console(&mut self, timeout_ms: u32) -> bool {
            self.events.push(Event::Flush(timeout_ms));
            self.drained
        }
        fn release(&mut self, resource: Resources) {
            self.events.push(Event::Release(resource));
        }
        fn start_app_core(&mut self, entry: u32) {
            self.events.push(Event::Start(entry));
        }
        fn wait_for_interrupt(&mut self) {
            panic!("parked");
        }
    }

    fn response(image_offset: u32, hdr_size: u16) -> BootResponse {
        BootResponse {
            image_offset,
            header: ImageHeader::new(hdr_size, 0x1000, ImageVersion::new(1, 0, 0, 0)),
        }
    }

    #[test]
    fn test_entry_after_header() {
        let mut platform = Recorder::default();
        let mut handoff = BootHandoff::new();
        let entry = handoff
            .hand_off(&mut platform, response(0x1001_8000, 0x400))
            .unwrap();
        assert_eq!(entry, 0x1001_8400);
        assert_eq!(handoff.state(), BootState::Booted { entry: 0x1001_8400 });
    }

    #[test]
    fn test_release_before_start() {
        let mut platform = Recorder::default();
        BootHandoff::new()
            .hand_off(&mut platform, response(0x1001_8000, 0x400))
            .unwrap();
        assert_eq!(
            platform.events,
            [
                Event::Flush(CONSOLE_FLUSH_TIMEOUT_MS),
                Event::Release(Resources::CONSOLE),
                Event::Release(Resources::UART_RX_PORT),
                Event::Release(Resources::UART_TX_PORT),
                Event::Release(Resources::QSPI_BUS),
                Event::Start(0x1001_8400),
            ]
        );
    }

    #[test]
    fn test_second_handoff_rejected() {
        let mut platform = Recorder {
            drained: true,
            ..Default::default()
        };
        let mut handoff = BootHandoff::new();
        handoff
            .hand_off(&mut platform, response(0x1001_8000, 0x400))
            .unwrap();
        assert_eq!(
            handoff.hand_off(&mut platform, response(0x1001_8000, 0x400)),
            Err(Error::AlreadyBooted)
        );
        let starts = platform
            .events
            .iter()
            .filter(|e| matches!(e, Event::Start(_)))
            .count();
        assert_eq!(starts, 1);
    }

    #[test]
    fn test_overflowing_entry_is_invalid() {
        let mut platform = Recorder::default();
        let mut handoff = BootHandoff::new();
        assert_eq!(
            handoff.hand_off(&mut platform, response(u32::MAX - 0x10, 0x400)),
            Err(Error::InvalidImage)
        );
        assert_eq!(handoff.state(), BootState::Verifying);
        assert!(platform.events.is_empty());
    }

    #[test]
    #[should_panic(expected = "parked")]
    fn test_park_without_image() {
        let mut platform = Recorder::default();
        boot_or_park(&mut platform, None);
    }
}
