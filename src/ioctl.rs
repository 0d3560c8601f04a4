//! Kernel sound ABI: structs, constants and ioctl bindings.
//!
//! Everything in this module must stay bit-exact with the kernel's
//! `sound/asound.h`. The structs are shared with the kernel either through
//! ioctl copies or through memory mappings of the PCM character device.

#![allow(non_camel_case_types)]

use libc::{c_int, c_uint, c_void, timespec};
use nix::{ioctl_none, ioctl_read, ioctl_readwrite, ioctl_write_ptr};
use std::mem;

/// Frame counter as the kernel sees it (`snd_pcm_uframes_t`).
pub type snd_pcm_uframes_t = libc::c_ulong;
/// Signed frame count (`snd_pcm_sframes_t`).
pub type snd_pcm_sframes_t = libc::c_long;
pub type snd_pcm_state_t = c_int;

/*
 * mmap offsets of the shared areas
 */

pub const SNDRV_PCM_MMAP_OFFSET_DATA: c_uint = 0x0000_0000;
pub const SNDRV_PCM_MMAP_OFFSET_STATUS: c_uint = 0x8000_0000;
pub const SNDRV_PCM_MMAP_OFFSET_CONTROL: c_uint = 0x8100_0000;

/*
 * PCM states
 */

pub const SNDRV_PCM_STATE_OPEN: snd_pcm_state_t = 0;
pub const SNDRV_PCM_STATE_SETUP: snd_pcm_state_t = 1;
pub const SNDRV_PCM_STATE_PREPARED: snd_pcm_state_t = 2;
pub const SNDRV_PCM_STATE_RUNNING: snd_pcm_state_t = 3;
pub const SNDRV_PCM_STATE_XRUN: snd_pcm_state_t = 4;
pub const SNDRV_PCM_STATE_DRAINING: snd_pcm_state_t = 5;
pub const SNDRV_PCM_STATE_PAUSED: snd_pcm_state_t = 6;
pub const SNDRV_PCM_STATE_SUSPENDED: snd_pcm_state_t = 7;
pub const SNDRV_PCM_STATE_DISCONNECTED: snd_pcm_state_t = 8;

/*
 * Hardware parameter ids
 *
 * Ids 0..=2 index `masks`, ids 8..=19 index `intervals`. The gap is
 * reserved by the kernel.
 */

pub const SNDRV_PCM_HW_PARAM_ACCESS: c_uint = 0;
pub const SNDRV_PCM_HW_PARAM_FORMAT: c_uint = 1;
pub const SNDRV_PCM_HW_PARAM_SUBFORMAT: c_uint = 2;
pub const SNDRV_PCM_HW_PARAM_FIRST_MASK: c_uint = SNDRV_PCM_HW_PARAM_ACCESS;
pub const SNDRV_PCM_HW_PARAM_LAST_MASK: c_uint = SNDRV_PCM_HW_PARAM_SUBFORMAT;

pub const SNDRV_PCM_HW_PARAM_SAMPLE_BITS: c_uint = 8;
pub const SNDRV_PCM_HW_PARAM_FRAME_BITS: c_uint = 9;
pub const SNDRV_PCM_HW_PARAM_CHANNELS: c_uint = 10;
pub const SNDRV_PCM_HW_PARAM_RATE: c_uint = 11;
pub const SNDRV_PCM_HW_PARAM_PERIOD_TIME: c_uint = 12;
pub const SNDRV_PCM_HW_PARAM_PERIOD_SIZE: c_uint = 13;
pub const SNDRV_PCM_HW_PARAM_PERIOD_BYTES: c_uint = 14;
pub const SNDRV_PCM_HW_PARAM_PERIODS: c_uint = 15;
pub const SNDRV_PCM_HW_PARAM_BUFFER_TIME: c_uint = 16;
pub const SNDRV_PCM_HW_PARAM_BUFFER_SIZE: c_uint = 17;
pub const SNDRV_PCM_HW_PARAM_BUFFER_BYTES: c_uint = 18;
pub const SNDRV_PCM_HW_PARAM_TICK_TIME: c_uint = 19;
pub const SNDRV_PCM_HW_PARAM_FIRST_INTERVAL: c_uint = SNDRV_PCM_HW_PARAM_SAMPLE_BITS;
pub const SNDRV_PCM_HW_PARAM_LAST_INTERVAL: c_uint = SNDRV_PCM_HW_PARAM_TICK_TIME;

const MASK_COUNT: usize =
    (SNDRV_PCM_HW_PARAM_LAST_MASK - SNDRV_PCM_HW_PARAM_FIRST_MASK + 1) as usize;
const INTERVAL_COUNT: usize =
    (SNDRV_PCM_HW_PARAM_LAST_INTERVAL - SNDRV_PCM_HW_PARAM_FIRST_INTERVAL + 1) as usize;

/// Disables period interrupts when set in `snd_pcm_hw_params.flags`.
pub const SNDRV_PCM_HW_PARAMS_NO_PERIOD_WAKEUP: c_uint = 1 << 2;

/*
 * Access types and formats (linear PCM only)
 */

pub const SNDRV_PCM_ACCESS_MMAP_INTERLEAVED: c_uint = 0;
pub const SNDRV_PCM_ACCESS_RW_INTERLEAVED: c_uint = 3;

pub const SNDRV_PCM_FORMAT_S8: c_uint = 0;
pub const SNDRV_PCM_FORMAT_U8: c_uint = 1;
pub const SNDRV_PCM_FORMAT_S16_LE: c_uint = 2;
pub const SNDRV_PCM_FORMAT_S16_BE: c_uint = 3;
pub const SNDRV_PCM_FORMAT_U16_LE: c_uint = 4;
pub const SNDRV_PCM_FORMAT_U16_BE: c_uint = 5;
pub const SNDRV_PCM_FORMAT_S32_LE: c_uint = 10;
pub const SNDRV_PCM_FORMAT_S32_BE: c_uint = 11;
pub const SNDRV_PCM_FORMAT_U32_LE: c_uint = 12;
pub const SNDRV_PCM_FORMAT_U32_BE: c_uint = 13;

/*
 * Timestamp modes
 */

pub const SNDRV_PCM_TSTAMP_ENABLE: c_int = 1;
pub const SNDRV_PCM_TSTAMP_TYPE_MONOTONIC: c_uint = 1;

/*
 * SYNC_PTR request flags
 */

pub const SNDRV_PCM_SYNC_PTR_HWSYNC: c_uint = 1 << 0;
pub const SNDRV_PCM_SYNC_PTR_APPL: c_uint = 1 << 1;
pub const SNDRV_PCM_SYNC_PTR_AVAIL_MIN: c_uint = 1 << 2;

/// 256-bit set of allowed values for a mask parameter.
#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct snd_mask {
    pub bits: [u32; 8],
}

/// Allowed range of an interval parameter.
///
/// The kernel declares `openmin`/`openmax`/`integer`/`empty` as one-bit
/// fields in a single storage unit; on the little-endian ABIs this crate
/// targets they occupy the low bits of `flags` in declaration order.
#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct snd_interval {
    pub min: c_uint,
    pub max: c_uint,
    pub flags: c_uint,
}

pub const SND_INTERVAL_OPENMIN: c_uint = 1 << 0;
pub const SND_INTERVAL_OPENMAX: c_uint = 1 << 1;
pub const SND_INTERVAL_INTEGER: c_uint = 1 << 2;
pub const SND_INTERVAL_EMPTY: c_uint = 1 << 3;

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct snd_pcm_hw_params {
    pub flags: c_uint,
    pub masks: [snd_mask; MASK_COUNT],
    pub mres: [snd_mask; 5],
    pub intervals: [snd_interval; INTERVAL_COUNT],
    pub ires: [snd_interval; 9],
    pub rmask: c_uint,
    pub cmask: c_uint,
    pub info: c_uint,
    pub msbits: c_uint,
    pub rate_num: c_uint,
    pub rate_den: c_uint,
    pub fifo_size: snd_pcm_uframes_t,
    pub reserved: [u8; 64],
}

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct snd_pcm_sw_params {
    pub tstamp_mode: c_int,
    pub period_step: c_uint,
    pub sleep_min: c_uint,
    pub avail_min: snd_pcm_uframes_t,
    pub xfer_align: snd_pcm_uframes_t,
    pub start_threshold: snd_pcm_uframes_t,
    pub stop_threshold: snd_pcm_uframes_t,
    pub silence_threshold: snd_pcm_uframes_t,
    pub silence_size: snd_pcm_uframes_t,
    pub boundary: snd_pcm_uframes_t,
    pub proto: c_uint,
    pub tstamp_type: c_uint,
    pub reserved: [u8; 56],
}

/// Read-only area updated by the kernel.
#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct snd_pcm_mmap_status {
    pub state: snd_pcm_state_t,
    pub pad1: c_int,
    pub hw_ptr: snd_pcm_uframes_t,
    pub tstamp: timespec,
    pub suspended_state: snd_pcm_state_t,
    pub audio_tstamp: timespec,
}

/// Read-write area consumed by the kernel.
#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct snd_pcm_mmap_control {
    pub appl_ptr: snd_pcm_uframes_t,
    pub avail_min: snd_pcm_uframes_t,
}

/// The kernel pads status and control to 64-byte unions inside
/// `snd_pcm_sync_ptr`; padded structs give the identical layout without
/// union field access.
#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct snd_pcm_sync_ptr_status {
    pub status: snd_pcm_mmap_status,
    reserved: [u8; 64 - mem::size_of::<snd_pcm_mmap_status>()],
}

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct snd_pcm_sync_ptr_control {
    pub control: snd_pcm_mmap_control,
    reserved: [u8; 64 - mem::size_of::<snd_pcm_mmap_control>()],
}

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct snd_pcm_sync_ptr {
    pub flags: c_uint,
    pub s: snd_pcm_sync_ptr_status,
    pub c: snd_pcm_sync_ptr_control,
}

impl Default for snd_pcm_sync_ptr {
    fn default() -> Self {
        unsafe { mem::zeroed() }
    }
}

/// Interleaved transfer descriptor for READI/WRITEI.
#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct snd_xferi {
    pub result: snd_pcm_sframes_t,
    pub buf: *mut c_void,
    pub frames: snd_pcm_uframes_t,
}

/// Full status block returned by the STATUS ioctl. Only `trigger_tstamp`
/// is interesting here; the rest duplicates what SYNC_PTR already gives.
#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct snd_pcm_status {
    pub state: snd_pcm_state_t,
    pub trigger_tstamp: timespec,
    pub tstamp: timespec,
    pub appl_ptr: snd_pcm_uframes_t,
    pub hw_ptr: snd_pcm_uframes_t,
    pub delay: snd_pcm_sframes_t,
    pub avail: snd_pcm_uframes_t,
    pub avail_max: snd_pcm_uframes_t,
    pub overrange: snd_pcm_uframes_t,
    pub suspended_state: snd_pcm_state_t,
    pub audio_tstamp_data: c_uint,
    pub audio_tstamp: timespec,
    pub driver_tstamp: timespec,
    pub audio_tstamp_accuracy: c_uint,
    pub reserved: [u8; 52 - 2 * mem::size_of::<timespec>()],
}

impl Default for snd_pcm_status {
    fn default() -> Self {
        unsafe { mem::zeroed() }
    }
}

impl Default for snd_pcm_sw_params {
    fn default() -> Self {
        unsafe { mem::zeroed() }
    }
}

/*
 * ioctl bindings ('A' is the PCM ioctl magic)
 */

ioctl_write_ptr!(pcm_ttstamp, b'A', 0x03, c_int);
ioctl_readwrite!(pcm_hw_refine, b'A', 0x10, snd_pcm_hw_params);
ioctl_readwrite!(pcm_hw_params, b'A', 0x11, snd_pcm_hw_params);
ioctl_readwrite!(pcm_sw_params, b'A', 0x13, snd_pcm_sw_params);
ioctl_read!(pcm_status, b'A', 0x20, snd_pcm_status);
ioctl_none!(pcm_hwsync, b'A', 0x22);
ioctl_readwrite!(pcm_sync_ptr, b'A', 0x23, snd_pcm_sync_ptr);
ioctl_none!(pcm_prepare, b'A', 0x40);
ioctl_none!(pcm_start, b'A', 0x42);
ioctl_none!(pcm_drop, b'A', 0x43);
ioctl_write_ptr!(pcm_writei_frames, b'A', 0x50, snd_xferi);
ioctl_read!(pcm_readi_frames, b'A', 0x51, snd_xferi);

#[cfg(test)]
mod tests {
    use super::*;

    // Layout must match a 64-bit sound/asound.h build exactly; a size
    // mismatch means every ioctl after it corrupts memory.
    #[test]
    #[cfg(target_pointer_width = "64")]
    fn abi_struct_sizes() {
        assert_eq!(mem::size_of::<snd_mask>(), 32);
        assert_eq!(mem::size_of::<snd_interval>(), 12);
        assert_eq!(mem::size_of::<snd_pcm_hw_params>(), 608);
        assert_eq!(mem::size_of::<snd_pcm_sw_params>(), 136);
        assert_eq!(mem::size_of::<snd_pcm_mmap_status>(), 56);
        assert_eq!(mem::size_of::<snd_pcm_mmap_control>(), 16);
        assert_eq!(mem::size_of::<snd_pcm_sync_ptr>(), 136);
        assert_eq!(mem::size_of::<snd_pcm_status>(), 152);
    }

    #[test]
    fn sync_ptr_blocks_are_64_bytes() {
        assert_eq!(mem::size_of::<snd_pcm_sync_ptr_status>(), 64);
        assert_eq!(mem::size_of::<snd_pcm_sync_ptr_control>(), 64);
    }
}
