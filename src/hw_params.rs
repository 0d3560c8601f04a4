//! Hardware-parameter negotiation.
//!
//! The kernel refines a [`HwParams`] block by intersecting it with what the
//! hardware allows, so a request starts from "everything allowed" and names
//! only the parameters it wants pinned. Masks are 256-bit sets indexed by
//! value; intervals are `[min, max]` ranges.

use crate::error::{Error, Result};
use crate::ioctl;
use libc::c_uint;
use std::mem;
use std::os::fd::RawFd;

/// Hardware parameter id, mirroring the kernel's numbering.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u32)]
pub enum Param {
    Access = ioctl::SNDRV_PCM_HW_PARAM_ACCESS,
    Format = ioctl::SNDRV_PCM_HW_PARAM_FORMAT,
    Subformat = ioctl::SNDRV_PCM_HW_PARAM_SUBFORMAT,
    SampleBits = ioctl::SNDRV_PCM_HW_PARAM_SAMPLE_BITS,
    FrameBits = ioctl::SNDRV_PCM_HW_PARAM_FRAME_BITS,
    Channels = ioctl::SNDRV_PCM_HW_PARAM_CHANNELS,
    Rate = ioctl::SNDRV_PCM_HW_PARAM_RATE,
    PeriodTime = ioctl::SNDRV_PCM_HW_PARAM_PERIOD_TIME,
    PeriodSize = ioctl::SNDRV_PCM_HW_PARAM_PERIOD_SIZE,
    PeriodBytes = ioctl::SNDRV_PCM_HW_PARAM_PERIOD_BYTES,
    Periods = ioctl::SNDRV_PCM_HW_PARAM_PERIODS,
    BufferTime = ioctl::SNDRV_PCM_HW_PARAM_BUFFER_TIME,
    BufferSize = ioctl::SNDRV_PCM_HW_PARAM_BUFFER_SIZE,
    BufferBytes = ioctl::SNDRV_PCM_HW_PARAM_BUFFER_BYTES,
    TickTime = ioctl::SNDRV_PCM_HW_PARAM_TICK_TIME,
}

impl Param {
    fn is_mask(self) -> bool {
        (self as c_uint) >= ioctl::SNDRV_PCM_HW_PARAM_FIRST_MASK
            && (self as c_uint) <= ioctl::SNDRV_PCM_HW_PARAM_LAST_MASK
    }

    fn is_interval(self) -> bool {
        (self as c_uint) >= ioctl::SNDRV_PCM_HW_PARAM_FIRST_INTERVAL
            && (self as c_uint) <= ioctl::SNDRV_PCM_HW_PARAM_LAST_INTERVAL
    }
}

/// Linear PCM sample formats, 1:1 with the kernel ids.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u32)]
pub enum Format {
    S8 = ioctl::SNDRV_PCM_FORMAT_S8,
    U8 = ioctl::SNDRV_PCM_FORMAT_U8,
    S16LE = ioctl::SNDRV_PCM_FORMAT_S16_LE,
    S16BE = ioctl::SNDRV_PCM_FORMAT_S16_BE,
    U16LE = ioctl::SNDRV_PCM_FORMAT_U16_LE,
    U16BE = ioctl::SNDRV_PCM_FORMAT_U16_BE,
    S32LE = ioctl::SNDRV_PCM_FORMAT_S32_LE,
    S32BE = ioctl::SNDRV_PCM_FORMAT_S32_BE,
    U32LE = ioctl::SNDRV_PCM_FORMAT_U32_LE,
    U32BE = ioctl::SNDRV_PCM_FORMAT_U32_BE,
}

impl Format {
    /// Bytes per sample.
    pub fn bytes(self) -> u32 {
        match self {
            Format::S8 | Format::U8 => 1,
            Format::S16LE | Format::S16BE | Format::U16LE | Format::U16BE => 2,
            Format::S32LE | Format::S32BE | Format::U32LE | Format::U32BE => 4,
        }
    }
}

/// Buffer access type. Only the interleaved variants are supported.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u32)]
pub enum Access {
    MmapInterleaved = ioctl::SNDRV_PCM_ACCESS_MMAP_INTERLEAVED,
    RwInterleaved = ioctl::SNDRV_PCM_ACCESS_RW_INTERLEAVED,
}

/// A hardware-parameter block in the kernel's wire format.
#[derive(Copy, Clone)]
pub struct HwParams(pub(crate) ioctl::snd_pcm_hw_params);

impl HwParams {
    /// A block allowing every configuration.
    ///
    /// All mask bits set, all intervals `[0, UINT_MAX]`, `rmask` fully set
    /// so the kernel refines every parameter. Parameters left out of a
    /// request must stay wide open; the kernel treats a missing range as
    /// disallowed, not as "don't care".
    pub fn any() -> Self {
        let mut p: ioctl::snd_pcm_hw_params = unsafe { mem::zeroed() };
        for m in p.masks.iter_mut() {
            m.bits = [u32::MAX; 8];
        }
        for i in p.intervals.iter_mut() {
            i.min = 0;
            i.max = c_uint::MAX;
            i.flags = 0;
        }
        p.rmask = c_uint::MAX;
        p.cmask = 0;
        p.info = c_uint::MAX;
        // SAMPLE_BITS and RATE already carry these; rate_den is 1 anyway
        p.msbits = 0;
        p.rate_num = 0;
        p.rate_den = 0;
        HwParams(p)
    }

    /// Ask the kernel to narrow the block to what `fd`'s hardware allows.
    pub fn refine(fd: RawFd) -> Result<Self> {
        let mut p = HwParams::any();
        unsafe { ioctl::pcm_hw_refine(fd, &mut p.0) }.map_err(|errno| {
            Error::ParameterRejected { what: "hardware parameter refine", errno }
        })?;
        Ok(p)
    }

    pub(crate) fn set_no_period_wakeup(&mut self) {
        self.0.flags |= ioctl::SNDRV_PCM_HW_PARAMS_NO_PERIOD_WAKEUP;
    }

    fn interval(&self, param: Param) -> &ioctl::snd_interval {
        &self.0.intervals[(param as c_uint - ioctl::SNDRV_PCM_HW_PARAM_FIRST_INTERVAL) as usize]
    }

    fn interval_mut(&mut self, param: Param) -> &mut ioctl::snd_interval {
        &mut self.0.intervals[(param as c_uint - ioctl::SNDRV_PCM_HW_PARAM_FIRST_INTERVAL) as usize]
    }

    fn mask(&self, param: Param) -> &ioctl::snd_mask {
        &self.0.masks[(param as c_uint - ioctl::SNDRV_PCM_HW_PARAM_FIRST_MASK) as usize]
    }

    /// Pin an interval parameter to `[min, max]`, closed on both ends.
    pub fn set_interval(&mut self, param: Param, min: u32, max: u32) {
        let i = self.interval_mut(param);
        i.min = min;
        i.max = max;
        // closed range of integers: openmin/openmax/empty off
        i.flags = ioctl::SND_INTERVAL_INTEGER;
    }

    /// Pin a mask parameter to exactly one value.
    pub fn set_mask(&mut self, param: Param, value: u32) {
        let m = &mut self.0.masks[(param as c_uint - ioctl::SNDRV_PCM_HW_PARAM_FIRST_MASK) as usize];
        m.bits = [0; 8];
        m.bits[(value >> 5) as usize] |= 1 << (value & 31);
    }

    /// Pin any parameter to a single value, dispatching on its kind.
    pub fn set(&mut self, param: Param, value: u32) {
        if param.is_interval() {
            self.set_interval(param, value, value);
        } else if param.is_mask() {
            self.set_mask(param, value);
        }
    }

    /// Range of an interval parameter. After HW_PARAMS, min equals max.
    pub fn get_interval(&self, param: Param) -> (u32, u32) {
        let i = self.interval(param);
        // integer intervals come back from refine with closed ends
        debug_assert_eq!(i.flags & ioctl::SND_INTERVAL_OPENMIN, 0);
        debug_assert_eq!(i.flags & ioctl::SND_INTERVAL_OPENMAX, 0);
        (i.min, i.max)
    }

    /// Whether `value` is still allowed for a mask parameter.
    pub fn get_mask(&self, param: Param, value: u32) -> bool {
        self.mask(param).bits[(value >> 5) as usize] & (1 << (value & 31)) != 0
    }

    /// Single-value read, dispatching on parameter kind: interval
    /// parameters yield their minimum, mask parameters 1 or 0 for `value`.
    pub fn get(&self, param: Param, value: u32) -> u32 {
        if param.is_interval() {
            self.get_interval(param).0
        } else {
            self.get_mask(param, value) as u32
        }
    }

    pub fn min(&self, param: Param) -> u32 {
        self.get_interval(param).0
    }

    pub fn max(&self, param: Param) -> u32 {
        self.get_interval(param).1
    }

    /// Whether the hardware supports `value` for a mask parameter.
    pub fn test(&self, param: Param, value: u32) -> bool {
        self.get_mask(param, value)
    }
}

impl std::fmt::Debug for HwParams {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("HwParams")
            .field("channels", &self.get_interval(Param::Channels))
            .field("rate", &self.get_interval(Param::Rate))
            .field("period_size", &self.get_interval(Param::PeriodSize))
            .field("periods", &self.get_interval(Param::Periods))
            .field("buffer_size", &self.get_interval(Param::BufferSize))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn any_allows_everything() {
        let p = HwParams::any();
        for param in [
            Param::SampleBits,
            Param::Channels,
            Param::Rate,
            Param::PeriodSize,
            Param::Periods,
            Param::BufferSize,
        ] {
            assert_eq!(p.get_interval(param), (0, u32::MAX));
        }
        for value in [0u32, 1, 13, 31, 32, 200, 255] {
            assert!(p.get_mask(Param::Format, value));
            assert!(p.get_mask(Param::Access, value));
        }
        assert_eq!(p.0.rmask, u32::MAX);
        assert_eq!(p.0.cmask, 0);
    }

    #[test]
    fn set_mask_pins_one_value() {
        let mut p = HwParams::any();
        p.set(Param::Format, Format::S16LE as u32);
        for value in 0..=255u32 {
            assert_eq!(p.get_mask(Param::Format, value), value == Format::S16LE as u32);
        }
        // other masks untouched
        assert!(p.get_mask(Param::Access, 7));
    }

    #[test]
    fn set_mask_crosses_word_boundary() {
        let mut p = HwParams::any();
        p.set_mask(Param::Format, 37);
        assert!(p.get_mask(Param::Format, 37));
        assert!(!p.get_mask(Param::Format, 5));
        assert!(!p.get_mask(Param::Format, 36));
    }

    #[test]
    fn set_pins_interval_to_value() {
        let mut p = HwParams::any();
        p.set(Param::Rate, 44100);
        assert_eq!(p.get_interval(Param::Rate), (44100, 44100));
        assert_eq!(p.min(Param::Rate), 44100);
        assert_eq!(p.max(Param::Rate), 44100);
    }

    #[test]
    fn format_widths() {
        assert_eq!(Format::S8.bytes(), 1);
        assert_eq!(Format::U16BE.bytes(), 2);
        assert_eq!(Format::S16LE.bytes(), 2);
        assert_eq!(Format::U32LE.bytes(), 4);
    }

    #[test]
    fn kernel_ids_are_stable() {
        assert_eq!(Format::S16LE as u32, 2);
        assert_eq!(Format::U32BE as u32, 13);
        assert_eq!(Access::MmapInterleaved as u32, 0);
        assert_eq!(Access::RwInterleaved as u32, 3);
        assert_eq!(Param::PeriodSize as u32, 13);
        assert_eq!(Param::BufferSize as u32, 17);
    }
}
