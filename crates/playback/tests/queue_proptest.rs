//! Property-based tests for the SFX slot and the playlist.

// Test files legitimately index and unwrap; allow at file level.
#![allow(clippy::unwrap_used, clippy::indexing_slicing, clippy::arithmetic_side_effects)]

use playback::{Playlist, PlaylistError, SfxSlot};
use proptest::collection::vec;
use proptest::prelude::*;

proptest! {
    /// The slot ends up holding the first request that reached the highest
    /// priority seen, and `request` reports exactly the strict raises.
    #[test]
    fn sfx_slot_keeps_first_highest_priority(requests in vec((any::<u16>(), any::<u8>()), 1..40)) {
        let mut slot = SfxSlot::new();
        let mut best: Option<(u16, u8)> = None;
        for &(id, prio) in &requests {
            let accepted = slot.request(id, prio);
            let raises = best.map_or(true, |(_, p)| prio > p);
            prop_assert_eq!(accepted, raises);
            if raises {
                best = Some((id, prio));
            }
        }
        let pending = slot.take().unwrap();
        let (id, prio) = best.unwrap();
        prop_assert_eq!((pending.track_id, pending.priority), (id, prio));
        prop_assert!(slot.take().is_none());
    }

    /// Without looping, tracks come out in reverse enqueue order, once each.
    #[test]
    fn playlist_plays_newest_first(ids in vec(any::<u16>(), 0..32)) {
        let mut playlist: Playlist = Playlist::new();
        playlist.set_loop(false);
        for &id in &ids {
            playlist.enqueue(id).unwrap();
        }
        let played: Vec<u16> = core::iter::from_fn(|| playlist.advance()).collect();
        let expected: Vec<u16> = ids.iter().rev().copied().collect();
        prop_assert_eq!(played, expected);
    }

    /// With looping, the same cycle repeats indefinitely.
    #[test]
    fn looping_playlist_cycles(ids in vec(any::<u16>(), 1..16), rounds in 1usize..4) {
        let mut playlist: Playlist<16> = Playlist::new();
        for &id in &ids {
            playlist.enqueue(id).unwrap();
        }
        let cycle: Vec<u16> = ids.iter().rev().copied().collect();
        for _ in 0..rounds {
            let played: Vec<u16> = (0..ids.len()).map(|_| playlist.advance().unwrap()).collect();
            prop_assert_eq!(&played, &cycle);
        }
        prop_assert_eq!(playlist.len(), ids.len());
    }

    /// A full playlist refuses further tracks without disturbing its contents.
    #[test]
    fn full_playlist_rejects(extra in any::<u16>()) {
        let mut playlist: Playlist<4> = Playlist::new();
        for id in 0..4 {
            playlist.enqueue(id).unwrap();
        }
        prop_assert_eq!(playlist.enqueue(extra), Err(PlaylistError::Full));
        prop_assert_eq!(playlist.iter().collect::<Vec<_>>(), vec![3, 2, 1, 0]);
    }
}
