//! BGM playlist.
//!
//! Enqueue inserts at the *front*: the most recently enqueued track plays
//! first. With looping on, every track handed out by [`Playlist::advance`]
//! is moved to the back, so the order cycles indefinitely.

use heapless::Deque;
use platform::audio_config::PLAYLIST_CAPACITY;

/// Errors returned by `Playlist` operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror_no_std::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PlaylistError {
    /// The playlist already holds its compile-time capacity of tracks.
    #[error("playlist is full")]
    Full,
}

/// Fixed-capacity queue of BGM track ids.
pub struct Playlist<const N: usize = PLAYLIST_CAPACITY> {
    queue: Deque<u16, N>,
    looping: bool,
}

impl<const N: usize> Playlist<N> {
    /// Empty playlist with looping enabled.
    pub const fn new() -> Self {
        Self { queue: Deque::new(), looping: true }
    }

    /// Drop every queued track.
    pub fn clear(&mut self) {
        self.queue.clear();
    }

    /// Queue `track_id` so that it plays before everything already queued.
    ///
    /// # Errors
    ///
    /// Returns [`PlaylistError::Full`] when `N` tracks are already queued.
    pub fn enqueue(&mut self, track_id: u16) -> Result<(), PlaylistError> {
        self.queue.push_front(track_id).map_err(|_| PlaylistError::Full)
    }

    /// Enable or disable looping.
    pub fn set_loop(&mut self, looping: bool) {
        self.looping = looping;
    }

    /// Whether advanced tracks are re-queued at the back.
    pub fn is_looping(&self) -> bool {
        self.looping
    }

    /// Take the next track to play.
    ///
    /// Returns `None` when the playlist is empty.
    pub fn advance(&mut self) -> Option<u16> {
        let track_id = self.queue.pop_front()?;
        if self.looping {
            // Cannot fail: pop_front just freed a slot.
            let _ = self.queue.push_back(track_id);
        }
        Some(track_id)
    }

    /// Number of queued tracks.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// `true` when nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Queued track ids in play order.
    pub fn iter(&self) -> impl Iterator<Item = u16> + '_ {
        self.queue.iter().copied()
    }
}

impl<const N: usize> Default for Playlist<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn most_recent_enqueue_plays_first() {
        let mut p: Playlist<8> = Playlist::new();
        p.set_loop(false);
        p.enqueue(1).unwrap();
        p.enqueue(2).unwrap();
        assert_eq!(p.advance(), Some(2));
        assert_eq!(p.advance(), Some(1));
        assert_eq!(p.advance(), None);
    }

    #[test]
    fn looping_cycles_forever() {
        let mut p: Playlist<8> = Playlist::new();
        p.enqueue(1).unwrap();
        p.enqueue(2).unwrap();
        p.set_loop(true);
        let order: Vec<_> = (0..6).map(|_| p.advance().unwrap()).collect();
        assert_eq!(order, vec![2, 1, 2, 1, 2, 1]);
        assert_eq!(p.len(), 2);
    }

    #[test]
    fn looping_single_track_repeats() {
        let mut p: Playlist<2> = Playlist::new();
        p.enqueue(9).unwrap();
        assert_eq!(p.advance(), Some(9));
        assert_eq!(p.advance(), Some(9));
    }

    #[test]
    fn loops_by_default() {
        assert!(Playlist::<4>::new().is_looping());
    }

    #[test]
    fn clear_empties_playlist() {
        let mut p: Playlist<4> = Playlist::new();
        p.enqueue(1).unwrap();
        p.enqueue(2).unwrap();
        p.clear();
        assert!(p.is_empty());
        assert_eq!(p.advance(), None);
    }

    #[test]
    fn full_playlist_rejects_enqueue() {
        let mut p: Playlist<2> = Playlist::new();
        p.enqueue(1).unwrap();
        p.enqueue(2).unwrap();
        assert_eq!(p.enqueue(3), Err(PlaylistError::Full));
        assert_eq!(p.iter().collect::<Vec<_>>(), vec![2, 1]);
    }

    #[test]
    fn disabling_loop_mid_cycle_stops_requeue() {
        let mut p: Playlist<4> = Playlist::new();
        p.enqueue(1).unwrap();
        p.enqueue(2).unwrap();
        assert_eq!(p.advance(), Some(2)); // re-queued
        p.set_loop(false);
        assert_eq!(p.advance(), Some(1));
        assert_eq!(p.advance(), Some(2));
        assert_eq!(p.advance(), None);
    }
}
