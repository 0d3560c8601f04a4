//! PCM device handle: open/close, parameter setup, pointer
//! synchronization and availability.
//!
//! A [`Pcm`] owns the character-device fd, the status/control areas shared
//! with the kernel and, for the mmap strategy, the audio data buffer. The
//! status area is written by the kernel and only read here; the control
//! area is written here and read by the kernel. Both `hw_ptr` and
//! `appl_ptr` are free-running counters that wrap at `boundary`, a
//! kernel-chosen power-of-two multiple of the buffer size — not at the
//! buffer size itself.

use crate::error::{Error, Result};
use crate::hw_params::{Access, Format, HwParams, Param};
use crate::ioctl;
use crate::transfer::TransferMode;
use crate::Direction;
use libc::timespec;
use nix::errno::Errno;
use std::fs::OpenOptions;
use std::os::fd::{AsRawFd, OwnedFd, RawFd};
use std::os::unix::fs::OpenOptionsExt;
use std::{fmt, mem, ptr};

/// Frame count, matching the kernel's `snd_pcm_uframes_t`.
pub type Frames = ioctl::snd_pcm_uframes_t;
/// Signed frame count, matching `snd_pcm_sframes_t`.
pub type SFrames = ioctl::snd_pcm_sframes_t;

bitflags::bitflags! {
    /// Configuration flags. The low nibble is reserved for open-time
    /// flags; the rest select features of the data path.
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct Flags: u32 {
        /// Capture instead of playback.
        const INPUT = 0x01;
        /// Open the device non-blocking.
        const NONBLOCK = 0x02;
        /// Map the audio buffer and copy into it directly.
        const MMAP = 0x10;
        /// Disable period interrupts; a clock must drive the stream.
        const NOIRQ = 0x20;
        /// Use CLOCK_MONOTONIC for kernel timestamps.
        const MONOTONIC = 0x40;
    }
}

bitflags::bitflags! {
    /// Flags for [`Pcm::sync`]. The empty set ("SET") pushes `appl_ptr`
    /// and `avail_min` to the kernel without reading anything back.
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct SyncFlags: u32 {
        /// Ask the driver for an up-to-date `hw_ptr`.
        const HWSYNC = ioctl::SNDRV_PCM_SYNC_PTR_HWSYNC;
        const APPL = ioctl::SNDRV_PCM_SYNC_PTR_APPL;
        const AVAIL_MIN = ioctl::SNDRV_PCM_SYNC_PTR_AVAIL_MIN;
        /// Fetch `appl_ptr` and `avail_min` back from the kernel.
        const GET = Self::APPL.bits() | Self::AVAIL_MIN.bits();
    }
}

/// Stream configuration for [`Pcm::open`].
///
/// Zero means "use the default" for `period_count` (2), `avail_min`
/// (one period), `start_threshold` (1) and `stop_threshold`
/// (`Frames::MAX`, which suppresses xrun detection entirely — this
/// crate never recovers from xrun, it avoids it).
#[derive(Debug, Clone)]
pub struct Config {
    pub card: u32,
    pub device: u32,
    pub flags: Flags,
    pub format: Format,
    pub channels: u32,
    pub rate: u32,
    pub period_size: Frames,
    pub period_count: u32,
    pub avail_min: Frames,
    pub start_threshold: Frames,
    pub stop_threshold: Frames,
    pub silence_threshold: Frames,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            card: 0,
            device: 0,
            flags: Flags::empty(),
            format: Format::S16LE,
            channels: 2,
            rate: 44100,
            period_size: 1024,
            period_count: 0,
            avail_min: 0,
            start_threshold: 0,
            stop_threshold: 0,
            silence_threshold: 0,
        }
    }
}

/// PCM device states as reported by the kernel.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum State {
    Open = ioctl::SNDRV_PCM_STATE_OPEN as isize,
    Setup = ioctl::SNDRV_PCM_STATE_SETUP as isize,
    Prepared = ioctl::SNDRV_PCM_STATE_PREPARED as isize,
    Running = ioctl::SNDRV_PCM_STATE_RUNNING as isize,
    XRun = ioctl::SNDRV_PCM_STATE_XRUN as isize,
    Draining = ioctl::SNDRV_PCM_STATE_DRAINING as isize,
    Paused = ioctl::SNDRV_PCM_STATE_PAUSED as isize,
    Suspended = ioctl::SNDRV_PCM_STATE_SUSPENDED as isize,
    Disconnected = ioctl::SNDRV_PCM_STATE_DISCONNECTED as isize,
}

impl State {
    fn from_raw(raw: ioctl::snd_pcm_state_t) -> State {
        match raw {
            ioctl::SNDRV_PCM_STATE_OPEN => State::Open,
            ioctl::SNDRV_PCM_STATE_SETUP => State::Setup,
            ioctl::SNDRV_PCM_STATE_PREPARED => State::Prepared,
            ioctl::SNDRV_PCM_STATE_RUNNING => State::Running,
            ioctl::SNDRV_PCM_STATE_XRUN => State::XRun,
            ioctl::SNDRV_PCM_STATE_DRAINING => State::Draining,
            ioctl::SNDRV_PCM_STATE_PAUSED => State::Paused,
            ioctl::SNDRV_PCM_STATE_SUSPENDED => State::Suspended,
            ioctl::SNDRV_PCM_STATE_DISCONNECTED => State::Disconnected,
            other => panic!("kernel reported unknown PCM state {other}"),
        }
    }
}

fn pagesize() -> usize {
    unsafe { libc::sysconf(libc::_SC_PAGESIZE) as usize }
}

/// A region of kernel driver memory mapped into this process.
pub(crate) struct DriverMemory<S> {
    pub(crate) ptr: *mut S,
    size: libc::size_t,
}

impl<S> DriverMemory<S> {
    pub(crate) fn new(fd: RawFd, count: usize, offs: libc::off_t, writable: bool) -> std::result::Result<Self, Errno> {
        let mut total = count * mem::size_of::<S>();
        let ps = pagesize();
        debug_assert!(total > 0);
        if total % ps != 0 {
            total += ps - total % ps
        }
        let prot = if writable {
            libc::PROT_READ | libc::PROT_WRITE
        } else {
            libc::PROT_READ
        };
        let p = unsafe {
            libc::mmap(ptr::null_mut(), total, prot, libc::MAP_FILE | libc::MAP_SHARED, fd, offs)
        };
        if p.is_null() || p == libc::MAP_FAILED {
            return Err(Errno::last());
        }
        Ok(DriverMemory { ptr: p as *mut S, size: total })
    }
}

impl<S> fmt::Debug for DriverMemory<S> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "DriverMemory({:?})", self.ptr)
    }
}

unsafe impl<S> Send for DriverMemory<S> {}

impl<S> Drop for DriverMemory<S> {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.ptr as *mut libc::c_void, self.size);
        }
    }
}

/// Where the status/control areas live.
///
/// Either both are mapped straight from the driver, or both alias into one
/// allocated SYNC_PTR block refreshed by ioctl. There is no mixed state.
#[derive(Debug)]
enum SyncRegion {
    Mapped {
        status: DriverMemory<ioctl::snd_pcm_mmap_status>,
        control: DriverMemory<ioctl::snd_pcm_mmap_control>,
    },
    SyncPtr(Box<ioctl::snd_pcm_sync_ptr>),
}

impl SyncRegion {
    /// Try to map status (read-only) and control (read-write); fall back
    /// to an allocated SYNC_PTR block if the driver refuses either map.
    fn new(fd: RawFd) -> SyncRegion {
        let status = DriverMemory::new(fd, 1, ioctl::SNDRV_PCM_MMAP_OFFSET_STATUS as libc::off_t, false);
        let control = DriverMemory::new(fd, 1, ioctl::SNDRV_PCM_MMAP_OFFSET_CONTROL as libc::off_t, true);
        match (status, control) {
            (Ok(status), Ok(control)) => SyncRegion::Mapped { status, control },
            _ => {
                log::debug!("status/control mmap refused, falling back to SYNC_PTR");
                SyncRegion::SyncPtr(Box::new(ioctl::snd_pcm_sync_ptr::default()))
            }
        }
    }
}

/// An open PCM stream.
pub struct Pcm {
    // declared before `fd` so unmapping precedes close on drop
    sync: SyncRegion,
    pub(crate) data: TransferMode,
    fd: OwnedFd,
    dir: Direction,
    bytes_per_frame: u32,
    buffer_size: Frames,
    boundary: Frames,
}

/// Open the PCM character device node itself, without any configuration.
///
/// Used by [`Pcm::open`] and by capability probes that only want an fd for
/// HW_REFINE.
pub fn open_device(card: u32, device: u32, flags: Flags) -> Result<OwnedFd> {
    let path = format!(
        "/dev/snd/pcmC{}D{}{}",
        card,
        device,
        if flags.contains(Flags::INPUT) { 'c' } else { 'p' }
    );
    let custom = if flags.contains(Flags::NONBLOCK) { libc::O_NONBLOCK } else { 0 };
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .custom_flags(custom)
        .open(&path)
        .map_err(|e| Error::DeviceOpen {
            path,
            errno: e.raw_os_error().map(Errno::from_raw).unwrap_or(Errno::EIO),
        })?;
    Ok(file.into())
}

impl Pcm {
    /// Open and configure a stream.
    ///
    /// Negotiates hardware parameters (access, format, channels, rate,
    /// period geometry), then software parameters (timestamps and
    /// thresholds), maps the data buffer when [`Flags::MMAP`] is set, and
    /// establishes the status/control areas. On any failure everything
    /// acquired so far is released.
    pub fn open(config: &Config) -> Result<Pcm> {
        let fd = open_device(config.card, config.device, config.flags)?;
        let dir = if config.flags.contains(Flags::INPUT) {
            Direction::Capture
        } else {
            Direction::Playback
        };

        // hardware parameters
        let access = if config.flags.contains(Flags::MMAP) {
            Access::MmapInterleaved
        } else {
            Access::RwInterleaved
        };
        let mut hw = HwParams::any();
        if config.flags.contains(Flags::NOIRQ) {
            hw.set_no_period_wakeup();
        }
        // subformat stays open: STANDARD is the only choice and it is zero
        hw.set(Param::Access, access as u32);
        hw.set(Param::Format, config.format as u32);
        hw.set(Param::Channels, config.channels);
        hw.set(Param::Rate, config.rate);
        hw.set(Param::PeriodSize, config.period_size as u32);
        let period_count = if config.period_count == 0 { 2 } else { config.period_count };
        hw.set(Param::Periods, period_count);
        unsafe { ioctl::pcm_hw_params(fd.as_raw_fd(), &mut hw.0) }.map_err(|errno| {
            Error::ParameterRejected { what: "hardware parameters", errno }
        })?;
        // we assume the kernel did not move the pinned values
        let bytes_per_frame = config.channels * config.format.bytes();
        let buffer_size = config.period_size * period_count as Frames;

        // software parameters
        let mut sw = ioctl::snd_pcm_sw_params::default();
        sw.tstamp_mode = ioctl::SNDRV_PCM_TSTAMP_ENABLE;
        if config.flags.contains(Flags::MONOTONIC) {
            sw.tstamp_type = ioctl::SNDRV_PCM_TSTAMP_TYPE_MONOTONIC;
            let mode = sw.tstamp_type as libc::c_int;
            unsafe { ioctl::pcm_ttstamp(fd.as_raw_fd(), &mode) }.map_err(|errno| {
                Error::ParameterRejected { what: "timestamp type", errno }
            })?;
        }
        let avail_min = if config.avail_min == 0 { config.period_size } else { config.avail_min };
        let start_threshold =
            if config.start_threshold == 0 { 1 } else { config.start_threshold };
        // xruns are not handled; parking the stop threshold at the top
        // keeps the device running across late wakeups
        let stop_threshold =
            if config.stop_threshold == 0 { Frames::MAX } else { config.stop_threshold };
        sw.period_step = 1;
        sw.avail_min = avail_min;
        sw.start_threshold = start_threshold;
        sw.stop_threshold = stop_threshold;
        sw.silence_threshold = config.silence_threshold;
        sw.silence_size = 0;
        unsafe { ioctl::pcm_sw_params(fd.as_raw_fd(), &mut sw) }.map_err(|errno| {
            Error::ParameterRejected { what: "software parameters", errno }
        })?;
        let boundary = sw.boundary;

        // audio data buffer
        let data = if config.flags.contains(Flags::MMAP) {
            let bytes = buffer_size as usize * bytes_per_frame as usize;
            let mem = DriverMemory::new(
                fd.as_raw_fd(),
                bytes,
                ioctl::SNDRV_PCM_MMAP_OFFSET_DATA as libc::off_t,
                true,
            )
            .map_err(|errno| Error::Map { what: "data buffer", errno })?;
            TransferMode::Mmap(mem)
        } else {
            TransferMode::Ioctl
        };

        let sync = SyncRegion::new(fd.as_raw_fd());

        let mut pcm = Pcm { sync, data, fd, dir, bytes_per_frame, buffer_size, boundary };
        pcm.set_appl_ptr(0);
        pcm.set_avail_min(avail_min);
        Ok(pcm)
    }

    pub fn direction(&self) -> Direction {
        self.dir
    }

    /// Frames in the hardware buffer.
    pub fn buffer_size(&self) -> Frames {
        self.buffer_size
    }

    /// Wrap value of `hw_ptr`/`appl_ptr`, chosen by the kernel. Always a
    /// power-of-two multiple of the buffer size.
    pub fn boundary(&self) -> Frames {
        self.boundary
    }

    pub fn bytes_per_frame(&self) -> u32 {
        self.bytes_per_frame
    }

    pub fn frames_to_bytes(&self, frames: Frames) -> usize {
        frames as usize * self.bytes_per_frame as usize
    }

    pub fn bytes_to_frames(&self, bytes: usize) -> Frames {
        (bytes / self.bytes_per_frame as usize) as Frames
    }

    /// Reconcile `hw_ptr`, `appl_ptr` and `avail_min` with the kernel.
    ///
    /// With mapped status/control, GET and SET are free (the memory is
    /// shared) and only [`SyncFlags::HWSYNC`] costs an ioctl. On the
    /// SYNC_PTR fallback every call is an ioctl and the kernel refreshes
    /// the block in place.
    pub fn sync(&mut self, flags: SyncFlags) -> Result<()> {
        match &mut self.sync {
            SyncRegion::Mapped { .. } => {
                if flags.contains(SyncFlags::HWSYNC) {
                    unsafe { ioctl::pcm_hwsync(self.fd.as_raw_fd()) }.map_err(Error::Sync)?;
                }
            }
            SyncRegion::SyncPtr(sp) => {
                sp.flags = flags.bits();
                unsafe { ioctl::pcm_sync_ptr(self.fd.as_raw_fd(), sp.as_mut() as *mut _) }
                    .map_err(Error::Sync)?;
            }
        }
        Ok(())
    }

    /// Frames the hardware has processed, wrapping at [`Pcm::boundary`].
    pub fn hw_ptr(&self) -> Frames {
        match &self.sync {
            SyncRegion::Mapped { status, .. } => unsafe {
                ptr::read_volatile(ptr::addr_of!((*status.ptr).hw_ptr))
            },
            SyncRegion::SyncPtr(sp) => sp.s.status.hw_ptr,
        }
    }

    /// Timestamp of the last hardware pointer update.
    ///
    /// On mapped status this is a plain memory read; a timespec is too
    /// wide to read atomically, so it can tear against an interrupt. Use
    /// [`Pcm::sync`] through the SYNC_PTR fallback, or
    /// `TimerWakeup::predict_hw_ptr`, when `hw_ptr` and the timestamp are
    /// needed as a consistent pair.
    pub fn htstamp(&self) -> timespec {
        match &self.sync {
            SyncRegion::Mapped { status, .. } => unsafe {
                ptr::read_volatile(ptr::addr_of!((*status.ptr).tstamp))
            },
            SyncRegion::SyncPtr(sp) => sp.s.status.tstamp,
        }
    }

    pub fn state(&self) -> State {
        let raw = match &self.sync {
            SyncRegion::Mapped { status, .. } => unsafe {
                ptr::read_volatile(ptr::addr_of!((*status.ptr).state))
            },
            SyncRegion::SyncPtr(sp) => sp.s.status.state,
        };
        State::from_raw(raw)
    }

    /// RUNNING, or DRAINING on playback (frames still flowing out).
    pub fn is_running(&self) -> bool {
        match self.state() {
            State::Running => true,
            State::Draining => self.dir == Direction::Playback,
            _ => false,
        }
    }

    /// Frames the application has produced or consumed, wrapping at
    /// [`Pcm::boundary`].
    pub fn appl_ptr(&self) -> Frames {
        match &self.sync {
            SyncRegion::Mapped { control, .. } => unsafe {
                ptr::read_volatile(ptr::addr_of!((*control.ptr).appl_ptr))
            },
            SyncRegion::SyncPtr(sp) => sp.c.control.appl_ptr,
        }
    }

    /// Set `appl_ptr`. Push it to the kernel with `sync(SyncFlags::empty())`
    /// when on the SYNC_PTR fallback; mapped control is observed directly.
    ///
    /// The write is a single word; the kernel picks it up without a fence
    /// (assumed coherent on the architectures this crate targets).
    pub fn set_appl_ptr(&mut self, value: Frames) {
        match &mut self.sync {
            SyncRegion::Mapped { control, .. } => unsafe {
                ptr::write_volatile(ptr::addr_of_mut!((*control.ptr).appl_ptr), value)
            },
            SyncRegion::SyncPtr(sp) => sp.c.control.appl_ptr = value,
        }
    }

    pub fn avail_min(&self) -> Frames {
        match &self.sync {
            SyncRegion::Mapped { control, .. } => unsafe {
                ptr::read_volatile(ptr::addr_of!((*control.ptr).avail_min))
            },
            SyncRegion::SyncPtr(sp) => sp.c.control.avail_min,
        }
    }

    pub fn set_avail_min(&mut self, value: Frames) {
        match &mut self.sync {
            SyncRegion::Mapped { control, .. } => unsafe {
                ptr::write_volatile(ptr::addr_of_mut!((*control.ptr).avail_min), value)
            },
            SyncRegion::SyncPtr(sp) => sp.c.control.avail_min = value,
        }
    }

    /// Prepare the stream and trigger it.
    pub fn start(&mut self) -> Result<()> {
        unsafe { ioctl::pcm_prepare(self.fd.as_raw_fd()) }
            .map_err(|errno| Error::Scheduler { what: "prepare", errno })?;
        unsafe { ioctl::pcm_start(self.fd.as_raw_fd()) }
            .map_err(|errno| Error::Scheduler { what: "start", errno })?;
        Ok(())
    }

    /// Stop immediately, dropping pending frames (the kernel's DROP).
    pub fn stop(&mut self) -> Result<()> {
        unsafe { ioctl::pcm_drop(self.fd.as_raw_fd()) }
            .map_err(|errno| Error::Scheduler { what: "drop", errno })?;
        Ok(())
    }

    /// Monotonic timestamp of the last START/STOP/PAUSE transition.
    pub fn trigger_tstamp(&self) -> Result<timespec> {
        let mut status = ioctl::snd_pcm_status::default();
        unsafe { ioctl::pcm_status(self.fd.as_raw_fd(), &mut status) }
            .map_err(|errno| Error::Scheduler { what: "status", errno })?;
        Ok(status.trigger_tstamp)
    }

    /// Frames ready for the application: writable room on playback,
    /// readable frames on capture.
    pub fn avail(&self) -> Frames {
        match self.dir {
            Direction::Playback => {
                playback_avail(self.hw_ptr(), self.appl_ptr(), self.buffer_size, self.boundary)
            }
            Direction::Capture => capture_avail(self.hw_ptr(), self.appl_ptr(), self.boundary),
        }
    }

    /// Frames queued ahead of the hardware: pending playout on playback,
    /// unread captured frames on capture.
    pub fn filled(&self) -> Frames {
        stream_filled(self.dir, self.hw_ptr(), self.appl_ptr(), self.boundary)
    }
}

impl AsRawFd for Pcm {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}

impl fmt::Debug for Pcm {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Pcm")
            .field("fd", &self.fd.as_raw_fd())
            .field("direction", &self.dir)
            .field("bytes_per_frame", &self.bytes_per_frame)
            .field("buffer_size", &self.buffer_size)
            .field("boundary", &self.boundary)
            .finish()
    }
}

impl Drop for Pcm {
    fn drop(&mut self) {
        // the mapped strategy keeps the device filled straight from our
        // buffer; stop it before the mapping goes away
        if matches!(self.data, TransferMode::Mmap(_)) {
            unsafe {
                let _ = ioctl::pcm_drop(self.fd.as_raw_fd());
            }
        }
    }
}

/// Frames readable on a capture stream.
///
/// Negative intermediate means `hw_ptr` wrapped at the boundary before
/// `appl_ptr` did.
pub(crate) fn capture_avail(hw: Frames, appl: Frames, boundary: Frames) -> Frames {
    let avail = hw.wrapping_sub(appl);
    if (avail as SFrames) < 0 {
        avail.wrapping_add(boundary)
    } else {
        avail
    }
}

/// Frames writable on a playback stream.
///
/// Two corrections: negative means `hw_ptr` wrapped first; `avail >=
/// boundary` means `appl_ptr` wrapped first.
pub(crate) fn playback_avail(hw: Frames, appl: Frames, buffer_size: Frames, boundary: Frames) -> Frames {
    let avail = hw.wrapping_add(buffer_size).wrapping_sub(appl);
    if (avail as SFrames) < 0 {
        avail.wrapping_add(boundary)
    } else if avail >= boundary {
        avail.wrapping_sub(boundary)
    } else {
        avail
    }
}

/// Frames sitting between the two pointers: queued for the hardware on
/// playback, waiting for the application on capture.
pub(crate) fn stream_filled(dir: Direction, hw: Frames, appl: Frames, boundary: Frames) -> Frames {
    let filled = match dir {
        Direction::Playback => appl.wrapping_sub(hw),
        Direction::Capture => hw.wrapping_sub(appl),
    };
    if (filled as SFrames) < 0 {
        filled.wrapping_add(boundary)
    } else {
        filled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const B: Frames = 128;
    const BUF: Frames = 64;

    #[test]
    fn playback_avail_simple() {
        // hardware consumed 10, application wrote 30: 64 - 20 in flight
        assert_eq!(playback_avail(10, 30, BUF, B), 44);
        assert_eq!(playback_avail(0, 0, BUF, B), BUF);
    }

    #[test]
    fn playback_avail_hw_wrapped_first() {
        // hw reset past the boundary, appl not yet
        assert_eq!(playback_avail(10, B - 5, BUF, B), 79);
    }

    #[test]
    fn playback_avail_appl_wrapped_first() {
        // appl reset past the boundary while hw is still high
        let hw = B - 4;
        let appl = 6; // wrote 10 frames across the wrap
        let avail = playback_avail(hw, appl, BUF, B);
        assert!(avail < B);
        assert_eq!(avail, BUF - 10);
    }

    #[test]
    fn capture_avail_wrap() {
        assert_eq!(capture_avail(30, 10, B), 20);
        // hw wrapped, appl did not
        assert_eq!(capture_avail(2, B - 6, B), 8);
    }

    // playback_avail + filled == buffer_size (mod boundary)
    #[test]
    fn playback_avail_filled_complementary() {
        for (hw, appl) in [(0, 0), (10, 30), (10, B - 5), (B - 4, 6), (100, 100), (63, 127)] {
            let avail = playback_avail(hw, appl, BUF, B);
            let filled = stream_filled(Direction::Playback, hw, appl, B);
            assert_eq!((avail + filled) % B, BUF % B, "hw={hw} appl={appl}");
        }
    }

    // capture_avail + filled == 0 (mod boundary)
    #[test]
    fn capture_avail_filled_complementary() {
        for (hw, appl) in [(0, 0), (30, 10), (2, B - 6), (100, 40), (127, 127)] {
            let avail = capture_avail(hw, appl, B);
            let filled = stream_filled(Direction::Capture, hw, appl, B);
            assert_eq!((avail + filled) % B, 0, "hw={hw} appl={appl}");
        }
    }

    #[test]
    fn flag_values_are_part_of_the_abi() {
        assert_eq!(Flags::INPUT.bits(), 0x01);
        assert_eq!(Flags::NONBLOCK.bits(), 0x02);
        assert_eq!(Flags::MMAP.bits(), 0x10);
        assert_eq!(Flags::NOIRQ.bits(), 0x20);
        assert_eq!(Flags::MONOTONIC.bits(), 0x40);
        assert_eq!(SyncFlags::GET.bits(), 6);
        assert_eq!(SyncFlags::HWSYNC.bits(), 1);
    }

    // Needs a sound card on card 0; run with --ignored on a machine that
    // has one.
    #[test]
    #[ignore]
    fn open_configure_close() {
        let config = Config {
            period_size: 1024,
            period_count: 4,
            ..Config::default()
        };
        let pcm = Pcm::open(&config).unwrap();
        assert_eq!(pcm.bytes_per_frame(), 4);
        assert_eq!(pcm.buffer_size(), 4096);
        assert!(pcm.boundary() >= pcm.buffer_size());
        assert_eq!(pcm.boundary() % pcm.buffer_size(), 0);
        assert_eq!(pcm.state(), State::Setup);
        assert_eq!(pcm.appl_ptr(), 0);
    }
}
