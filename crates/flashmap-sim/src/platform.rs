//! Simulated boot platform

use flashmap_core::boot::{BootPlatform, Resources};

/// Something the boot handoff asked the platform to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformEvent {
    /// Console flush with the given timeout
    FlushConsole {
        /// Timeout passed by the handoff
        timeout_ms: u32,
    },
    /// Peripheral released
    Release(Resources),
    /// Application core started
    StartAppCore {
        /// Entry address
        entry: u32,
    },
    /// Wait for interrupt
    WaitForInterrupt,
}

/// Boot platform that records every request
#[derive(Debug, Default)]
pub struct SimPlatform {
    events: Vec<PlatformEvent>,
    console_stuck: bool,
    park_limit: Option<u32>,
    parks: u32,
}

impl SimPlatform {
    /// Create a platform whose console drains immediately
    pub fn new() -> Self {
        Self::default()
    }

    /// Make console flushes time out
    pub fn with_stuck_console(mut self) -> Self {
        self.console_stuck = true;
        self
    }

    /// Panic after `limit` waits for interrupt, to get out of a park loop
    pub fn with_park_limit(mut self, limit: u32) -> Self {
        self.park_limit = Some(limit);
        self
    }

    /// Recorded events in order
    pub fn events(&self) -> &[PlatformEvent] {
        &self.events
    }

    /// Every resource released so far
    pub fn released(&self) -> Resources {
        self.events
            .iter()
            .filter_map(|e| match e {
                PlatformEvent::Release(r) => Some(*r),
                _ => None,
            })
            .fold(Resources::empty(), |acc, r| acc | r)
    }

    /// Entry address of the started application, if any
    pub fn started_at(&self) -> Option<u32> {
        self.events.iter().find_map(|e| match e {
            PlatformEvent::StartAppCore { entry } => Some(*entry),
            _ => None,
        })
    }
}

impl BootPlatform for SimPlatform {
    fn flush_console(&mut self, timeout_ms: u32) -> bool {
        self.events.push(PlatformEvent::FlushConsole { timeout_ms });
        !self.console_stuck
    }

    fn release(&mut self, resource: Resources) {
        self.events.push(PlatformEvent::Release(resource));
    }

    fn start_app_core(&mut self, entry: u32) {
        log::info!("sim: application core started at 0x{:08X}", entry);
        self.events.push(PlatformEvent::StartAppCore { entry });
    }

    fn wait_for_interrupt(&mut self) {
        self.events.push(PlatformEvent::WaitForInterrupt);
        self.parks += 1;
        if let Some(limit) = self.park_limit {
            if self.parks >= limit {
                panic!("sim: parked after {} waits", self.parks);
            }
        }
    }
}
