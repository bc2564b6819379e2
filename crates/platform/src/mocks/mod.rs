//! Mock implementations for testing
//!
//! This module provides in-memory implementations of [`BlockDevice`] and
//! [`BufferPool`] for use in unit and integration tests and in the host
//! simulator.

#![allow(clippy::indexing_slicing)] // Safety: every index below is bounds-checked or a handle minted by this module
#![allow(clippy::arithmetic_side_effects)] // Safety: host-only bookkeeping counters

use crate::audio::{AudioBuffer, BufferPool};
use crate::audio_config::SECTOR_SIZE;
use crate::storage::{BlockDevice, Sector};

// ---------------------------------------------------------------------------
// Buffer pool
// ---------------------------------------------------------------------------

/// A pooled buffer with a stable identity.
pub struct MockBuffer {
    id: usize,
    data: Box<Sector>,
    sample_count: u32,
}

impl MockBuffer {
    /// Identity of the buffer within its pool.
    pub fn id(&self) -> usize {
        self.id
    }
}

impl AudioBuffer for MockBuffer {
    fn sector(&self) -> &Sector {
        &self.data
    }

    fn sector_mut(&mut self) -> &mut Sector {
        &mut self.data
    }

    fn sample_count(&self) -> u32 {
        self.sample_count
    }

    fn set_sample_count(&mut self, count: u32) {
        self.sample_count = count;
    }
}

/// Snapshot of one buffer handed to playback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    /// Which pool buffer carried the data.
    pub buffer_id: usize,
    /// Sample count the producer set.
    pub sample_count: u32,
    /// First four payload bytes (little-endian), the sector tag written by
    /// [`tagged_sector`].
    pub tag: u32,
}

/// Bounded buffer pool that records every submission.
///
/// Submitted buffers are "playing" until [`drain_playback`](Self::drain_playback)
/// returns them to the free list, unless the pool was built with
/// [`recycling`](Self::recycling).
pub struct MockBufferPool {
    free: Vec<MockBuffer>,
    playing: Vec<MockBuffer>,
    submissions: Vec<Submission>,
    auto_recycle: bool,
    exhausted: bool,
    acquire_calls: usize,
}

impl MockBufferPool {
    /// Pool with `capacity` buffers that stay in playback until drained.
    pub fn new(capacity: usize) -> Self {
        let free = (0..capacity)
            .rev()
            .map(|id| MockBuffer { id, data: Box::new([0u8; SECTOR_SIZE]), sample_count: 0 })
            .collect();
        Self {
            free,
            playing: Vec::new(),
            submissions: Vec::new(),
            auto_recycle: false,
            exhausted: false,
            acquire_calls: 0,
        }
    }

    /// Pool whose buffers are played out instantly on submission.
    pub fn recycling(capacity: usize) -> Self {
        Self { auto_recycle: true, ..Self::new(capacity) }
    }

    /// Force every `acquire` to fail while `exhausted` is set.
    pub fn set_exhausted(&mut self, exhausted: bool) {
        self.exhausted = exhausted;
    }

    /// Return all playing buffers to the free list.
    pub fn drain_playback(&mut self) -> usize {
        let n = self.playing.len();
        self.free.append(&mut self.playing);
        n
    }

    /// Every buffer submitted so far, in submission order.
    pub fn submissions(&self) -> &[Submission] {
        &self.submissions
    }

    /// Number of buffers currently free.
    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    /// Number of submitted buffers not yet drained.
    pub fn playing_count(&self) -> usize {
        self.playing.len()
    }

    /// Number of `acquire` calls, successful or not.
    pub fn acquire_calls(&self) -> usize {
        self.acquire_calls
    }
}

impl BufferPool for MockBufferPool {
    type Buffer = MockBuffer;

    /// A blocking acquire cannot wait for a host thread, so it behaves like
    /// a non-blocking one and `None` stands for a closed pool.
    fn acquire(&mut self, _blocking: bool) -> Option<MockBuffer> {
        self.acquire_calls += 1;
        if self.exhausted {
            return None;
        }
        self.free.pop()
    }

    fn submit(&mut self, buffer: MockBuffer) {
        let mut tag = [0u8; 4];
        tag.copy_from_slice(&buffer.data[..4]);
        self.submissions.push(Submission {
            buffer_id: buffer.id,
            sample_count: buffer.sample_count,
            tag: u32::from_le_bytes(tag),
        });
        if self.auto_recycle {
            self.free.insert(0, buffer);
        } else {
            self.playing.push(buffer);
        }
    }
}

// ---------------------------------------------------------------------------
// Block device
// ---------------------------------------------------------------------------

/// Build a sector whose first four bytes hold `tag` (little-endian) and whose
/// footer reports `sample_count` playable samples.
pub fn tagged_sector(tag: u32, sample_count: u8) -> Sector {
    let mut sector = [0u8; SECTOR_SIZE];
    sector[..4].copy_from_slice(&tag.to_le_bytes());
    sector[crate::audio_config::SECTOR_FOOTER_OFFSET] = sample_count;
    sector
}

/// Error from [`MockBlockDevice::read_sync`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror_no_std::Error)]
pub enum MockIoError {
    /// The sector lies past the end of the image.
    #[error("sector {0} is outside the image")]
    OutOfRange(u32),
    /// Failure injected with [`MockBlockDevice::fail_sector`].
    #[error("injected read failure at sector {0}")]
    Injected(u32),
}

/// Handle of a read issued against a [`MockBlockDevice`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockReadHandle(usize);

#[derive(Debug)]
struct PendingRead {
    sector: u32,
    polls_left: u32,
    complete: bool,
    /// Issued past the end of the image; never completes.
    out_of_range: bool,
}

/// In-memory sector image with controllable read completion.
///
/// Data is copied into the caller's buffer when the read is issued; only the
/// *completion* is deferred. Two modes:
///
/// - latency: a read completes on its `latency + 1`-th poll
/// - manual: a read completes only after [`complete`](Self::complete)
///
/// A read of a sector past the end of the image never completes, in either
/// mode, matching `FileBlockDevice`.
pub struct MockBlockDevice {
    sectors: Vec<Sector>,
    reads: Vec<PendingRead>,
    latency: u32,
    manual: bool,
    failing: Vec<u32>,
    sync_reads: Vec<u32>,
}

impl MockBlockDevice {
    /// Device serving `sectors`; reads complete on their first poll.
    pub fn new(sectors: Vec<Sector>) -> Self {
        Self {
            sectors,
            reads: Vec::new(),
            latency: 0,
            manual: false,
            failing: Vec::new(),
            sync_reads: Vec::new(),
        }
    }

    /// Device serving a flat byte image, zero-padding the last sector.
    pub fn from_image(image: &[u8]) -> Self {
        let sectors = image
            .chunks(SECTOR_SIZE)
            .map(|chunk| {
                let mut sector = [0u8; SECTOR_SIZE];
                sector[..chunk.len()].copy_from_slice(chunk);
                sector
            })
            .collect();
        Self::new(sectors)
    }

    /// Each read needs `polls` unsuccessful polls before it completes.
    #[must_use]
    pub fn with_latency(mut self, polls: u32) -> Self {
        self.latency = polls;
        self
    }

    /// Reads complete only when the test says so.
    #[must_use]
    pub fn manual_completion(mut self) -> Self {
        self.manual = true;
        self
    }

    /// Make every read of `sector` fail: sync reads return an error, async
    /// reads never complete.
    pub fn fail_sector(&mut self, sector: u32) {
        self.failing.push(sector);
    }

    /// Complete the read behind `handle`.
    pub fn complete(&mut self, handle: MockReadHandle) {
        if let Some(read) = self.reads.get_mut(handle.0) {
            read.complete = !read.out_of_range;
        }
    }

    /// Complete the oldest outstanding read of `sector`. Returns `false` if
    /// there is none.
    pub fn complete_sector(&mut self, sector: u32) -> bool {
        match self.reads.iter_mut().find(|r| r.sector == sector && !r.complete && !r.out_of_range) {
            Some(read) => {
                read.complete = true;
                true
            }
            None => false,
        }
    }

    /// Complete every outstanding read.
    pub fn complete_all(&mut self) {
        for read in &mut self.reads {
            if !read.out_of_range && !self.failing.contains(&read.sector) {
                read.complete = true;
            }
        }
    }

    /// Sectors requested asynchronously, in issue order.
    pub fn issued_sectors(&self) -> Vec<u32> {
        self.reads.iter().map(|r| r.sector).collect()
    }

    /// Sectors requested synchronously, in issue order.
    pub fn sync_reads(&self) -> &[u32] {
        &self.sync_reads
    }

    /// Number of issued reads not yet complete.
    pub fn pending_count(&self) -> usize {
        self.reads.iter().filter(|r| !r.complete).count()
    }

    fn copy_sector(&self, sector: u32, out: &mut Sector) -> bool {
        match usize::try_from(sector).ok().and_then(|i| self.sectors.get(i)) {
            Some(data) => {
                out.copy_from_slice(data);
                true
            }
            None => {
                out.fill(0);
                false
            }
        }
    }
}

impl BlockDevice for MockBlockDevice {
    type Error = MockIoError;
    type Handle = MockReadHandle;

    fn read_sync(&mut self, sector: u32, out: &mut Sector) -> Result<(), MockIoError> {
        self.sync_reads.push(sector);
        if self.failing.contains(&sector) {
            return Err(MockIoError::Injected(sector));
        }
        if self.copy_sector(sector, out) {
            Ok(())
        } else {
            Err(MockIoError::OutOfRange(sector))
        }
    }

    fn read_async(&mut self, sector: u32, out: &mut Sector) -> MockReadHandle {
        let out_of_range = !self.copy_sector(sector, out);
        self.reads.push(PendingRead {
            sector,
            polls_left: self.latency,
            complete: false,
            out_of_range,
        });
        MockReadHandle(self.reads.len() - 1)
    }

    fn poll(&mut self, handle: MockReadHandle) -> bool {
        let stalled = self.manual
            || self
                .reads
                .get(handle.0)
                .is_some_and(|r| r.out_of_range || self.failing.contains(&r.sector));
        let Some(read) = self.reads.get_mut(handle.0) else {
            return false;
        };
        if read.complete {
            return true;
        }
        if stalled {
            return false;
        }
        if read.polls_left == 0 {
            read.complete = true;
            return true;
        }
        read.polls_left -= 1;
        false
    }
}
