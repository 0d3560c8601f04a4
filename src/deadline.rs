//! Deadline-scheduler driven wakeups.
//!
//! Instead of a timerfd, SCHED_DEADLINE replenishes the audio thread's
//! runtime once per period; the loop's wait primitive becomes
//! `sched_yield` until the next replenishment. No user-space timer, and
//! the kernel guarantees the budget.

use crate::error::{Error, Result};
use crate::pcm::{Pcm, SyncFlags};
use crate::timer::TimerWakeup;
use nix::errno::Errno;
use std::mem;

/// Runtime and deadline granted per period. Two milliseconds comfortably
/// covers a mix-and-transfer step on anything this crate targets.
const RUNTIME_NS: u64 = 2_000_000;
const DEADLINE_NS: u64 = 2_000_000;

#[repr(C)]
#[derive(Debug, Copy, Clone, Default)]
#[allow(non_camel_case_types)]
struct sched_attr {
    size: u32,
    sched_policy: u32,
    sched_flags: u64,
    sched_nice: i32,
    sched_priority: u32,
    sched_runtime: u64,
    sched_deadline: u64,
    sched_period: u64,
}

fn sched_setattr(attr: &sched_attr) -> std::result::Result<(), Errno> {
    // glibc has no wrapper for sched_setattr; pid 0 is the calling thread
    let r = unsafe { libc::syscall(libc::SYS_sched_setattr, 0usize, attr as *const sched_attr, 0usize) };
    Errno::result(r).map(drop)
}

/// Start the stream and install SCHED_DEADLINE on the current thread.
///
/// After this returns the caller loops on `sched_yield` (see
/// [`yield_period`]), syncs the pointers and calls
/// [`TimerWakeup::write`] exactly as in the timerfd mode.
///
/// The phase of the first replenishment relative to the trigger is
/// unknown, so `appl_ptr` is primed one and a half periods ahead of the
/// hardware to absorb that uncertainty.
pub fn start(timer: &TimerWakeup, pcm: &mut Pcm) -> Result<()> {
    let attr = sched_attr {
        size: mem::size_of::<sched_attr>() as u32,
        sched_policy: libc::SCHED_DEADLINE as u32,
        sched_runtime: RUNTIME_NS,
        sched_deadline: DEADLINE_NS,
        sched_period: timer.period_ns(),
        ..sched_attr::default()
    };

    pcm.start()?;

    sched_setattr(&attr)
        .map_err(|errno| Error::Scheduler { what: "sched_setattr", errno })?;

    pcm.sync(SyncFlags::GET | SyncFlags::HWSYNC)?;
    let appl = pcm
        .hw_ptr()
        .wrapping_add(timer.period_size() + timer.period_size() / 2);
    pcm.set_appl_ptr(appl);
    pcm.sync(SyncFlags::empty())?;

    Ok(())
}

/// Give the CPU back until SCHED_DEADLINE's next replenishment.
pub fn yield_period() {
    unsafe {
        libc::sched_yield();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attr_matches_kernel_layout() {
        assert_eq!(mem::size_of::<sched_attr>(), 48);
        let attr = sched_attr {
            size: mem::size_of::<sched_attr>() as u32,
            sched_policy: libc::SCHED_DEADLINE as u32,
            sched_runtime: RUNTIME_NS,
            sched_deadline: DEADLINE_NS,
            sched_period: 10_000_000,
            ..sched_attr::default()
        };
        assert_eq!(attr.sched_policy, 6);
        assert_eq!(attr.sched_flags, 0);
        assert_eq!(attr.sched_priority, 0);
    }
}
