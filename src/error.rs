//! Error reporting.
//!
//! Every fallible call reports at its own boundary and carries the raw
//! `errno` from the kernel; nothing here retries or recovers.

use nix::errno::Errno;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The PCM character device could not be opened.
    #[error("cannot open {path}: {errno}")]
    DeviceOpen { path: String, errno: Errno },

    /// The kernel rejected a HW_REFINE, HW_PARAMS or SW_PARAMS request.
    #[error("{what} rejected by kernel: {errno}")]
    ParameterRejected { what: &'static str, errno: Errno },

    /// Mapping the audio data buffer failed. Status/control map failures
    /// are not reported through here; they fall back to SYNC_PTR.
    #[error("mmap of {what} failed: {errno}")]
    Map { what: &'static str, errno: Errno },

    /// A READI/WRITEI transfer failed. `EPIPE` means the stream xrun'ed.
    #[error("frame transfer failed: {0}")]
    Transfer(Errno),

    /// Pointer synchronization with the kernel failed.
    #[error("pointer synchronization failed: {0}")]
    Sync(Errno),

    /// A timerfd, poll, scheduling-policy or status operation failed.
    #[error("{what}: {errno}")]
    Scheduler { what: &'static str, errno: Errno },
}

impl Error {
    /// True when a transfer failed because the stream under- or over-ran.
    pub fn is_xrun(&self) -> bool {
        matches!(self, Error::Transfer(Errno::EPIPE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xrun_is_epipe_only() {
        assert!(Error::Transfer(Errno::EPIPE).is_xrun());
        assert!(!Error::Transfer(Errno::EIO).is_xrun());
        assert!(!Error::Sync(Errno::EPIPE).is_xrun());
    }
}
