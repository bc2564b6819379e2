//! Single-slot, priority-preemptable sound-effect request.
//!
//! At most one request is pending. A new request replaces the pending one
//! only if its priority is strictly higher; ties keep the resident request.
//! A request that has already started streaming is no longer in the slot and
//! cannot be preempted.

/// A pending sound-effect request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SfxRequest {
    /// Track to play.
    pub track_id: u16,
    /// Higher wins.
    pub priority: u8,
}

/// The pending-request cell.
#[derive(Debug, Default)]
pub struct SfxSlot {
    pending: Option<SfxRequest>,
}

impl SfxSlot {
    /// Empty slot.
    pub const fn new() -> Self {
        Self { pending: None }
    }

    /// Offer a request.
    ///
    /// Returns `false` and leaves the slot untouched if the pending request's
    /// priority is greater than or equal to `priority`.
    pub fn request(&mut self, track_id: u16, priority: u8) -> bool {
        if let Some(resident) = self.pending {
            if resident.priority >= priority {
                debug!(
                    "sfx {} (prio {}) rejected: {} (prio {}) pending",
                    track_id, priority, resident.track_id, resident.priority
                );
                return false;
            }
        }
        self.pending = Some(SfxRequest { track_id, priority });
        true
    }

    /// Remove and return the pending request.
    pub fn take(&mut self) -> Option<SfxRequest> {
        self.pending.take()
    }

    /// Peek at the pending request.
    pub fn pending(&self) -> Option<SfxRequest> {
        self.pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_slot_accepts_any_priority() {
        let mut slot = SfxSlot::new();
        assert!(slot.request(3, 0));
        assert_eq!(slot.pending(), Some(SfxRequest { track_id: 3, priority: 0 }));
    }

    #[test]
    fn equal_priority_keeps_resident() {
        let mut slot = SfxSlot::new();
        assert!(slot.request(10, 5));
        assert!(!slot.request(11, 5));
        assert_eq!(slot.pending(), Some(SfxRequest { track_id: 10, priority: 5 }));
    }

    #[test]
    fn higher_priority_replaces_resident() {
        let mut slot = SfxSlot::new();
        assert!(slot.request(10, 5));
        assert!(!slot.request(11, 5));
        assert!(slot.request(12, 6));
        assert_eq!(slot.pending(), Some(SfxRequest { track_id: 12, priority: 6 }));
    }

    #[test]
    fn lower_priority_is_dropped() {
        let mut slot = SfxSlot::new();
        assert!(slot.request(1, 9));
        assert!(!slot.request(2, 1));
        assert_eq!(slot.take().map(|r| r.track_id), Some(1));
    }

    #[test]
    fn take_empties_slot() {
        let mut slot = SfxSlot::new();
        slot.request(4, 2);
        assert_eq!(slot.take(), Some(SfxRequest { track_id: 4, priority: 2 }));
        assert_eq!(slot.take(), None);
        assert!(slot.request(5, 0), "empty slot accepts again after take");
    }
}
