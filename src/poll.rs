//! Tiny poll ffi
//!
//! A tiny wrapper around libc's poll system call, used to block on the
//! PCM fd (interrupt-driven mode) or the timer fd.

use crate::error::{Error, Result};
use crate::pcm::Pcm;
use crate::Direction;
use libc::pollfd;
use nix::errno::Errno;
use std::os::fd::AsRawFd;

bitflags::bitflags! {
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct PollFlags: libc::c_short {
        const POLLIN = libc::POLLIN;
        const POLLPRI = libc::POLLPRI;
        const POLLOUT = libc::POLLOUT;
        const POLLERR = libc::POLLERR;
        const POLLHUP = libc::POLLHUP;
        const POLLNVAL = libc::POLLNVAL;
    }
}

/// Wrapper around the libc poll call. `timeout_ms < 0` blocks forever.
pub fn poll(fds: &mut [pollfd], timeout_ms: i32) -> Result<usize> {
    let r = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, timeout_ms) };
    if r >= 0 {
        Ok(r as usize)
    } else {
        Err(Error::Scheduler { what: "poll", errno: Errno::last() })
    }
}

impl Pcm {
    /// A pollfd for this stream: POLLOUT on playback, POLLIN on capture.
    pub fn poll_descriptor(&self) -> pollfd {
        let events = match self.direction() {
            Direction::Playback => PollFlags::POLLOUT,
            Direction::Capture => PollFlags::POLLIN,
        };
        pollfd { fd: self.as_raw_fd(), events: events.bits(), revents: 0 }
    }

    /// Block until the device wants a transfer, or `timeout_ms` passes.
    /// Returns the events that fired (empty on timeout).
    pub fn wait(&self, timeout_ms: i32) -> Result<PollFlags> {
        let mut fds = [self.poll_descriptor()];
        poll(&mut fds, timeout_ms)?;
        Ok(PollFlags::from_bits_truncate(fds[0].revents))
    }
}
