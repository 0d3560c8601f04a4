//! Low-latency PCM playback and capture on the Linux kernel sound ABI.
//!
//! This crate talks to `/dev/snd/pcmC*D*{p,c}` directly — ioctls and
//! memory mappings against the kernel's ring-buffer interface — with no
//! alsa-lib in the address space and no mixing or resampling in the hot
//! path.
//!
//! The usual shape of a playback loop:
//!
//! ```no_run
//! use kpcm::{Config, Flags, Pcm, SyncFlags};
//!
//! # fn main() -> kpcm::Result<()> {
//! let mut pcm = Pcm::open(&Config { flags: Flags::MMAP, ..Config::default() })?;
//! let silence = vec![0u8; pcm.frames_to_bytes(pcm.buffer_size())];
//! pcm.start()?;
//! loop {
//!     pcm.wait(-1)?;
//!     pcm.sync(SyncFlags::GET)?;
//!     pcm.write(&silence[..pcm.frames_to_bytes(pcm.avail())])?;
//! }
//! # }
//! ```
//!
//! For interrupt-free operation (`Flags::NOIRQ`) the stream is paced from
//! a clock instead: see [`TimerWakeup`] for the timerfd-driven scheduler
//! with drift correction, and [`deadline`] for the SCHED_DEADLINE
//! variant.

cfg_if::cfg_if! {
    if #[cfg(not(target_os = "linux"))] {
        compile_error!("kpcm speaks the Linux kernel sound ABI and only builds on Linux");
    }
}

/// Stream direction.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Direction {
    Playback,
    Capture,
}

impl Direction {
    #[inline]
    pub fn input() -> Direction {
        Direction::Capture
    }
    #[inline]
    pub fn output() -> Direction {
        Direction::Playback
    }
}

mod error;
pub use error::{Error, Result};

pub mod ioctl;

mod hw_params;
pub use hw_params::{Access, Format, HwParams, Param};

mod pcm;
pub use pcm::{open_device, Config, Flags, Frames, Pcm, SFrames, State, SyncFlags};

mod transfer;

pub mod poll;
pub use poll::PollFlags;

mod deviation;
pub use deviation::DeviationAverage;

mod smooth;
pub use smooth::SmoothCorrection;

mod timer;
pub use timer::TimerWakeup;

pub mod deadline;

pub mod mix;
