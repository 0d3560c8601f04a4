//! Timer-driven wakeup scheduling.
//!
//! With period interrupts disabled ([`Flags::NOIRQ`]) the application has
//! to pace itself from a clock. A timerfd on CLOCK_MONOTONIC fires once
//! per scheduling period, phase-locked to the stream's trigger timestamp.
//! The OS timer and the audio clock inevitably drift apart; every wakeup
//! measures how many frames are actually queued against how many should
//! be, feeds the deviation into an averaging filter, and pays significant
//! drift back a frame or two per period through [`SmoothCorrection`] —
//! never as one audible jump.

use crate::deviation::DeviationAverage;
use crate::error::{Error, Result};
use crate::ioctl;
use crate::pcm::{open_device, Config, Flags, Frames, Pcm, SyncFlags};
use crate::poll::{poll, PollFlags};
use crate::smooth::SmoothCorrection;
use crate::HwParams;
use nix::errno::Errno;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};

const NSEC_PER_SEC: u64 = 1_000_000_000;

/// Deviations within this many frames are treated as timer jitter.
const ALLOWED_DEVIATION: i64 = 16;

fn timespec_to_ns(ts: &libc::timespec) -> i64 {
    ts.tv_sec as i64 * NSEC_PER_SEC as i64 + ts.tv_nsec as i64
}

fn timespec_from_ns(ns: u64) -> libc::timespec {
    libc::timespec {
        tv_sec: (ns / NSEC_PER_SEC) as libc::time_t,
        tv_nsec: (ns % NSEC_PER_SEC) as _,
    }
}

fn timespec_add_ns(ts: &mut libc::timespec, ns: u64) {
    let total = ts.tv_nsec as u64 + ns;
    ts.tv_sec += (total / NSEC_PER_SEC) as libc::time_t;
    ts.tv_nsec = (total % NSEC_PER_SEC) as _;
}

fn monotonic_now() -> libc::timespec {
    let mut now = libc::timespec { tv_sec: 0, tv_nsec: 0 };
    unsafe {
        libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut now);
    }
    now
}

/// Timer-driven scheduler for one PCM stream.
#[derive(Debug)]
pub struct TimerWakeup {
    fd: OwnedFd,
    period_size: Frames,
    frame_ns: u64,
    period_ns: u64,
    /// Target number of queued frames at each wakeup: half a period, so
    /// jitter has half a period of slack in both directions.
    expected: Frames,
    /// Wakeups since the last correction started.
    n_wakeups: u64,
    avg: DeviationAverage,
    smooth: SmoothCorrection,
}

impl TimerWakeup {
    /// Open a stream for timer-driven scheduling.
    ///
    /// `period_size` is the *scheduling* period, i.e. how many frames each
    /// timer tick covers. The hardware period is made as large as the
    /// device allows — with interrupts off it only bounds the buffer — and
    /// the buffer gets every period the hardware can hold. `avail_min` is
    /// parked at the maximum so the PCM fd itself never wakes anybody;
    /// the timer is the only clock. NOIRQ and MONOTONIC are forced on.
    pub fn open(config: &Config, period_size: Frames) -> Result<(TimerWakeup, Pcm)> {
        // probe-only open to learn the hardware limits
        let probe_fd = open_device(
            config.card,
            config.device,
            (config.flags & Flags::INPUT) | Flags::NONBLOCK,
        )?;
        let caps = HwParams::refine(probe_fd.as_raw_fd())?;
        drop(probe_fd);

        let mut cfg = config.clone();
        cfg.flags |= Flags::NOIRQ | Flags::MONOTONIC;
        cfg.period_size = caps.max(crate::Param::PeriodSize) as Frames;
        cfg.period_count = caps.max(crate::Param::BufferSize) / cfg.period_size as u32;
        cfg.avail_min = Frames::MAX;
        cfg.start_threshold = 0;
        cfg.stop_threshold = 0;
        cfg.silence_threshold = 0;

        let pcm = Pcm::open(&cfg)?;

        let fd = unsafe {
            libc::timerfd_create(libc::CLOCK_MONOTONIC, libc::TFD_NONBLOCK)
        };
        let fd = Errno::result(fd)
            .map_err(|errno| Error::Scheduler { what: "timerfd_create", errno })?;
        let fd = unsafe { OwnedFd::from_raw_fd(fd) };

        let frame_ns = NSEC_PER_SEC / cfg.rate as u64;
        let period_ns = frame_ns * period_size as u64;
        let periods_per_sec = (cfg.rate as u64 / period_size as u64) as usize;
        log::debug!(
            "timer wakeup: {periods_per_sec} periods/s, period {period_ns} ns, \
             hardware period {} frames",
            cfg.period_size
        );

        Ok((
            TimerWakeup {
                fd,
                period_size,
                frame_ns,
                period_ns,
                expected: period_size / 2,
                n_wakeups: 0,
                avg: DeviationAverage::new(periods_per_sec + 1, ALLOWED_DEVIATION),
                smooth: SmoothCorrection::new(),
            },
            pcm,
        ))
    }

    /// Scheduling period in frames.
    pub fn period_size(&self) -> Frames {
        self.period_size
    }

    /// Scheduling period in nanoseconds.
    pub fn period_ns(&self) -> u64 {
        self.period_ns
    }

    /// Start the stream and arm the timer.
    ///
    /// The first expiry lands half a period after the trigger timestamp
    /// and repeats every period. One period is marked as already written
    /// so the stream has data in front of the hardware from tick one.
    pub fn start(&mut self, pcm: &mut Pcm) -> Result<()> {
        pcm.start()?;
        let mut value = pcm.trigger_tstamp()?;
        timespec_add_ns(&mut value, self.period_ns / 2);
        let spec = libc::itimerspec {
            it_interval: timespec_from_ns(self.period_ns),
            it_value: value,
        };
        let r = unsafe {
            libc::timerfd_settime(self.fd.as_raw_fd(), libc::TFD_TIMER_ABSTIME, &spec, std::ptr::null_mut())
        };
        if let Err(errno) = Errno::result(r) {
            let _ = pcm.stop();
            return Err(Error::Scheduler { what: "timerfd_settime", errno });
        }

        let appl = pcm.appl_ptr().wrapping_add(self.period_size);
        pcm.set_appl_ptr(appl);
        pcm.sync(SyncFlags::empty())?;
        Ok(())
    }

    /// Block until the timer expires and consume the expiration count.
    pub fn wait(&self) -> Result<u64> {
        let mut fds = [libc::pollfd {
            fd: self.fd.as_raw_fd(),
            events: PollFlags::POLLIN.bits(),
            revents: 0,
        }];
        poll(&mut fds, -1)?;
        let mut ticks: u64 = 0;
        let r = unsafe {
            libc::read(self.fd.as_raw_fd(), &mut ticks as *mut u64 as *mut libc::c_void, 8)
        };
        if r != 8 {
            return Err(Error::Scheduler { what: "timerfd read", errno: Errno::last() });
        }
        Ok(ticks)
    }

    /// One wakeup's worth of work: account the drift and transfer one
    /// period, stretched or shrunk by the current correction.
    ///
    /// Call after [`TimerWakeup::wait`] and a `sync(HWSYNC | GET)` so the
    /// pointers are fresh. `buf` must hold at least `period_size` plus
    /// the worst-case correction (one extra period is plenty); on
    /// playback, when the correction is positive the caller is expected
    /// to have duplicated the last frame into the slack so the stretch
    /// does not click.
    pub fn write(&mut self, pcm: &mut Pcm, buf: &mut [u8]) -> Result<usize> {
        self.n_wakeups += 1;

        // deviation from the expected fill level at this tick
        let diff = self.expected as i64 - pcm.filled() as i64;
        log::trace!("fill deviation: {diff}");

        // Deviations keep being accounted while a correction is running,
        // but a new correction cannot start until it has been paid out.
        let correction = self.avg.calculate(diff);
        if correction != 0 && !self.smooth.active() {
            self.avg.reset();
            log::debug!(
                "drift of {correction} frames, correcting across {} wakeups",
                self.n_wakeups
            );
            self.smooth.start(correction, self.n_wakeups);
            self.n_wakeups = 0;
        }

        let delta = self.smooth.get();
        let frames = (self.period_size as i64 + delta) as Frames;
        let bytes = pcm.frames_to_bytes(frames).min(buf.len());
        debug_assert_eq!(bytes, pcm.frames_to_bytes(frames), "wakeup buffer too small");
        match pcm.direction() {
            crate::Direction::Playback => pcm.write(&buf[..bytes]),
            crate::Direction::Capture => pcm.read(&mut buf[..bytes]),
        }
    }

    /// Estimate where the hardware pointer is *right now*.
    ///
    /// The last interrupt's `hw_ptr`/`tstamp` pair is fetched through the
    /// SYNC_PTR ioctl — reading them out of mapped status can tear
    /// against an interrupt — and extrapolated by the time elapsed since.
    pub fn predict_hw_ptr(&self, pcm: &Pcm) -> Result<Frames> {
        let mut sp = ioctl::snd_pcm_sync_ptr::default();
        sp.flags = (SyncFlags::APPL | SyncFlags::AVAIL_MIN).bits();
        unsafe { ioctl::pcm_sync_ptr(pcm.as_raw_fd(), &mut sp) }.map_err(Error::Sync)?;

        let now = monotonic_now();
        let elapsed_ns = timespec_to_ns(&now) - timespec_to_ns(&sp.s.status.tstamp);
        let estimate = (elapsed_ns.max(0) as u64 / self.frame_ns) as Frames;
        Ok(sp.s.status.hw_ptr.wrapping_add(estimate))
    }
}

impl AsRawFd for TimerWakeup {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timespec_round_trips() {
        let ts = timespec_from_ns(3 * NSEC_PER_SEC + 250);
        assert_eq!(ts.tv_sec, 3);
        assert_eq!(ts.tv_nsec, 250);
        assert_eq!(timespec_to_ns(&ts), 3_000_000_250);
    }

    #[test]
    fn add_ns_carries_into_seconds() {
        let mut ts = libc::timespec { tv_sec: 1, tv_nsec: 900_000_000 };
        timespec_add_ns(&mut ts, 200_000_000);
        assert_eq!(ts.tv_sec, 2);
        assert_eq!(ts.tv_nsec, 100_000_000);
    }

    #[test]
    fn period_geometry() {
        // rate 44100, scheduling period 441: 22675 ns/frame, 100 ticks/s
        let frame_ns = NSEC_PER_SEC / 44100;
        assert_eq!(frame_ns, 22675);
        assert_eq!(frame_ns * 441, 9_999_675);
        assert_eq!(44100 / 441, 100);
    }
}
