//! Audio buffer pool abstraction.
//!
//! The pool owns a fixed number of sector-sized sample buffers. A producer
//! acquires a free buffer, fills it, sets its sample count and submits it for
//! playback; the output side returns it to the free list once played.
//! Each buffer has exactly one owner at a time.

use crate::storage::Sector;

/// A fixed-capacity PCM buffer borrowed from a [`BufferPool`].
pub trait AudioBuffer {
    /// Raw sector storage of the buffer.
    fn sector(&self) -> &Sector;

    /// Mutable raw sector storage, the target of storage reads.
    fn sector_mut(&mut self) -> &mut Sector;

    /// Number of playable samples the output side will consume.
    fn sample_count(&self) -> u32;

    /// Set the playable sample count. Must be called before submission.
    fn set_sample_count(&mut self, count: u32);
}

/// Producer side of the hardware-facing buffer pool.
pub trait BufferPool {
    /// Handle to one pooled buffer.
    type Buffer: AudioBuffer;

    /// Take a free buffer.
    ///
    /// With `blocking == false` this returns `None` immediately when every
    /// buffer is in use. With `blocking == true` it waits for playback to
    /// free one; `None` then means the pool has been shut down.
    fn acquire(&mut self, blocking: bool) -> Option<Self::Buffer>;

    /// Hand a filled buffer to playback. Ownership leaves the caller.
    fn submit(&mut self, buffer: Self::Buffer);
}
