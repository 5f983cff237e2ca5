//! Boot handoff dry run

use flashmap_core::boot::{BootHandoff, BootResponse, BootState, ImageHeader, ImageVersion};
use flashmap_sim::{PlatformEvent, SimPlatform};

/// Run the handoff for an image at `image_offset` and print every step
pub fn cmd_boot(
    image_offset: u32,
    header_size: u16,
    image_size: u32,
    stuck_console: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut platform = SimPlatform::new();
    if stuck_console {
        platform = platform.with_stuck_console();
    }

    let header = ImageHeader::new(header_size, image_size, ImageVersion::new(0, 0, 0, 0));
    let response = BootResponse {
        image_offset,
        header,
    };

    let mut handoff = BootHandoff::new();
    handoff.hand_off(&mut platform, response)?;

    println!("Boot handoff");
    println!("============");
    println!("Image:    {:#010X}, version {}", image_offset, header.version());
    println!(
        "Header:   {:#X} bytes, load 0x{:08X}, TLV {:#X}, flags 0x{:08X}",
        header.hdr_size(),
        header.load_addr(),
        header.protect_tlv_size(),
        header.flags()
    );
    println!();
    for (i, event) in platform.events().iter().enumerate() {
        println!("{:>2}. {}", i + 1, describe(event));
    }
    if let BootState::Booted { entry } = handoff.state() {
        println!("\nApplication core entry: {:#010X}", entry);
    }

    Ok(())
}

fn describe(event: &PlatformEvent) -> String {
    match event {
        PlatformEvent::FlushConsole { timeout_ms } => {
            format!("flush console (timeout {} ms)", timeout_ms)
        }
        PlatformEvent::Release(resources) => format!("release {:?}", resources),
        PlatformEvent::StartAppCore { entry } => {
            format!("start application core at {:#010X}", entry)
        }
        PlatformEvent::WaitForInterrupt => "wait for interrupt".to_string(),
    }
}
