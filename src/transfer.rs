//! Frame transfer between user buffers and the device.
//!
//! Two strategies sit behind [`Pcm::write`] and [`Pcm::read`]: copying
//! through the mapped ring buffer with an explicit `appl_ptr` advance, or
//! handing the whole buffer to the kernel with an interleaved-transfer
//! ioctl. The strategy is fixed at open time by [`crate::Flags::MMAP`].

use crate::error::{Error, Result};
use crate::ioctl;
use crate::pcm::{DriverMemory, Frames, Pcm, SyncFlags};
use crate::Direction;
use std::ptr;

/// The selected transfer strategy, tag-dispatched on the hot path.
#[derive(Debug)]
pub(crate) enum TransferMode {
    /// Audio buffer mapped from the driver; we copy and advance
    /// `appl_ptr` ourselves.
    Mmap(DriverMemory<u8>),
    /// Kernel-mediated READI/WRITEI; the kernel advances `appl_ptr`.
    Ioctl,
}

impl Pcm {
    /// Play `buf` (interleaved frames). Returns frames transferred.
    ///
    /// `buf.len()` must be a whole number of frames; a trailing partial
    /// frame is ignored.
    pub fn write(&mut self, buf: &[u8]) -> Result<usize> {
        let frames = self.bytes_to_frames(buf.len());
        self.transfer(buf.as_ptr() as *mut u8, frames)
    }

    /// Capture into `buf` (interleaved frames). Returns frames transferred.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let frames = self.bytes_to_frames(buf.len());
        self.transfer(buf.as_mut_ptr(), frames)
    }

    fn transfer(&mut self, buf: *mut u8, frames: Frames) -> Result<usize> {
        match self.data {
            TransferMode::Mmap(_) => self.mmap_transfer(buf, frames),
            TransferMode::Ioctl => self.ioctl_transfer(buf, frames),
        }
    }

    /// Copy through the mapped ring buffer.
    ///
    /// The ring index is `appl_ptr % buffer_size`; the pointer itself
    /// wraps at `boundary`. Each contiguous chunk is copied, then
    /// `appl_ptr` advances and is pushed to the kernel — copy first,
    /// advance second, never the reverse.
    fn mmap_transfer(&mut self, buf: *mut u8, frames: Frames) -> Result<usize> {
        let base = match &self.data {
            TransferMode::Mmap(mem) => mem.ptr,
            TransferMode::Ioctl => unreachable!("mmap transfer on ioctl stream"),
        };
        let buffer_size = self.buffer_size();
        let mut remaining = frames.min(buffer_size);
        let total = remaining;
        let mut user_offset: Frames = 0;

        while remaining > 0 {
            let ring_offset = self.appl_ptr() % buffer_size;
            // frames until the ring wraps back to offset zero
            let continuous = buffer_size - ring_offset;
            let copy = remaining.min(continuous);

            let bytes = self.frames_to_bytes(copy);
            let ring = unsafe { base.add(self.frames_to_bytes(ring_offset)) };
            let user = unsafe { buf.add(self.frames_to_bytes(user_offset)) };
            unsafe {
                match self.direction() {
                    Direction::Capture => ptr::copy_nonoverlapping(ring, user, bytes),
                    Direction::Playback => ptr::copy_nonoverlapping(user as *const u8, ring, bytes),
                }
            }

            self.update_appl_ptr(copy)?;
            user_offset += copy;
            remaining -= copy;
        }

        Ok(total as usize)
    }

    /// Advance `appl_ptr` by `frames`, wrapping at the boundary, and push
    /// the new value to the kernel.
    pub(crate) fn update_appl_ptr(&mut self, frames: Frames) -> Result<()> {
        let mut appl = self.appl_ptr().wrapping_add(frames);
        if appl > self.boundary() {
            appl -= self.boundary();
        }
        self.set_appl_ptr(appl);
        self.sync(SyncFlags::empty())
    }

    /// Kernel-mediated interleaved transfer. The kernel owns the
    /// `appl_ptr` advance in this mode.
    fn ioctl_transfer(&mut self, buf: *mut u8, frames: Frames) -> Result<usize> {
        use std::os::fd::AsRawFd;

        let mut x = ioctl::snd_xferi {
            result: 0,
            buf: buf as *mut libc::c_void,
            frames,
        };
        let res = match self.direction() {
            Direction::Capture => unsafe { ioctl::pcm_readi_frames(self.as_raw_fd(), &mut x) },
            Direction::Playback => unsafe { ioctl::pcm_writei_frames(self.as_raw_fd(), &x) },
        };
        // EPIPE here is the xrun indication; no recovery is attempted
        res.map_err(Error::Transfer)?;
        Ok(x.result as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ring/boundary arithmetic mirrored here as plain numbers, so the
    // chunking of a transfer can be checked without a device
    fn chunks(mut appl: Frames, buffer_size: Frames, boundary: Frames, frames: Frames) -> (Vec<(Frames, Frames)>, Frames) {
        let mut remaining = frames.min(buffer_size);
        let mut out = Vec::new();
        while remaining > 0 {
            let ring = appl % buffer_size;
            let copy = remaining.min(buffer_size - ring);
            out.push((ring, copy));
            appl = appl.wrapping_add(copy);
            if appl > boundary {
                appl -= boundary;
            }
            remaining -= copy;
        }
        (out, appl)
    }

    #[test]
    fn transfer_splits_at_ring_wrap() {
        // start 16 frames before the ring wraps: two chunks
        let (parts, appl) = chunks(48, 64, 128 * 64, 32);
        assert_eq!(parts, vec![(48, 16), (0, 16)]);
        assert_eq!(appl, 80);
    }

    #[test]
    fn transfer_clamps_to_buffer_size() {
        let (parts, _) = chunks(0, 64, 128 * 64, 1000);
        let copied: Frames = parts.iter().map(|p| p.1).sum();
        assert_eq!(copied, 64);
    }

    #[test]
    fn appl_ptr_advances_mod_boundary() {
        let boundary = 4096 * 1024;
        // two full-buffer writes from zero: appl ends at 8192
        let (_, appl) = chunks(0, 4096, boundary, 4096);
        let (_, appl) = chunks(appl, 4096, boundary, 4096);
        assert_eq!(appl, 8192);
    }

    #[test]
    fn appl_ptr_wraps_at_boundary() {
        let boundary: Frames = 128;
        let (parts, appl) = chunks(120, 64, boundary, 16);
        // ring offset is appl % buffer_size, independent of the boundary wrap
        assert_eq!(parts, vec![(56, 8), (0, 8)]);
        assert_eq!(appl, 8);
    }
}
