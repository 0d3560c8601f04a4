//! Print what a PCM device can do, straight from HW_REFINE.

use anyhow::Result;
use clap::Parser;
use kpcm::{open_device, Flags, Format, HwParams, Param};
use std::os::fd::AsRawFd;

#[derive(Parser, Debug)]
#[command(about = "Show the capabilities of a PCM device")]
struct Args {
    /// Sound card index.
    #[arg(short = 'c', long, default_value_t = 0)]
    card: u32,

    /// PCM device index on the card.
    #[arg(short = 'd', long, default_value_t = 0)]
    device: u32,
}

fn sign_support(caps: &HwParams, unsigned: Format, signed: Format) -> &'static str {
    match (
        caps.test(Param::Format, unsigned as u32),
        caps.test(Param::Format, signed as u32),
    ) {
        (true, true) => "Unsigned and Signed",
        (true, false) => "Unsigned only",
        (false, true) => "Signed only",
        (false, false) => "Not supported",
    }
}

fn print_range(caps: &HwParams, label: &str, param: Param) {
    let (min, max) = caps.get_interval(param);
    println!("{label}: min: {min}, max: {max}");
}

fn print_caps(caps: &HwParams) {
    println!(
        "MMAP access: {}",
        if caps.test(Param::Access, kpcm::Access::MmapInterleaved as u32) { "Yes" } else { "No" }
    );
    print_range(caps, "Sample bits", Param::SampleBits);

    println!("8-bits: {}", sign_support(caps, Format::U8, Format::S8));
    println!("16-bits:");
    println!("  Little Endian: {}", sign_support(caps, Format::U16LE, Format::S16LE));
    println!("  Big Endian: {}", sign_support(caps, Format::U16BE, Format::S16BE));
    println!("32-bits:");
    println!("  Little Endian: {}", sign_support(caps, Format::U32LE, Format::S32LE));
    println!("  Big Endian: {}", sign_support(caps, Format::U32BE, Format::S32BE));

    print_range(caps, "Channels", Param::Channels);
    print_range(caps, "Rate (frames/s)", Param::Rate);
    print_range(caps, "Period size (frames)", Param::PeriodSize);
    print_range(caps, "Periods", Param::Periods);
    print_range(caps, "Buffer size (frames)", Param::BufferSize);
}

fn main() -> Result<()> {
    let args = Args::parse();

    for (label, flags) in [
        ("Playback", Flags::NONBLOCK),
        ("Capture", Flags::INPUT | Flags::NONBLOCK),
    ] {
        println!("=== {label} ===");
        match open_device(args.card, args.device, flags) {
            Ok(fd) => match HwParams::refine(fd.as_raw_fd()) {
                Ok(caps) => print_caps(&caps),
                Err(e) => println!("no capabilities: {e}"),
            },
            Err(e) => println!("not available: {e}"),
        }
        println!();
    }

    Ok(())
}
