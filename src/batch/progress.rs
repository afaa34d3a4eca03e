use crate::models::{BatchSlot, SlotStatus};

#[derive(Debug, Clone, Default)]
pub struct BatchProgress {
    slots: Vec<Option<BatchSlot>>,
}

impl BatchProgress {
    pub fn new(size: usize) -> Self {
        Self {
            slots: vec![None; size],
        }
    }

    /// Replaces the snapshot for `slot.index`. Updates for unknown indices
    /// are ignored.
    pub fn apply(&mut self, slot: BatchSlot) -> bool {
        match self.slots.get_mut(slot.index) {
            Some(entry) => {
                *entry = Some(slot);
                true
            }
            None => false,
        }
    }

    pub fn slot(&self, index: usize) -> Option<&BatchSlot> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    pub fn settled(&self) -> usize {
        self.slots
            .iter()
            .flatten()
            .filter(|slot| slot.is_terminal())
            .count()
    }

    pub fn count(&self, status: SlotStatus) -> usize {
        self.slots
            .iter()
            .flatten()
            .filter(|slot| slot.status == status)
            .count()
    }

    pub fn is_complete(&self) -> bool {
        !self.slots.is_empty() && self.settled() == self.slots.len()
    }

    pub fn fraction(&self) -> f64 {
        if self.slots.is_empty() {
            return 0.0;
        }
        self.settled() as f64 / self.slots.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(index: usize, status: SlotStatus) -> BatchSlot {
        let mut slot = BatchSlot::pending(index, "");
        slot.status = status;
        slot
    }

    #[test]
    fn test_progress_tracks_latest_snapshot() {
        let mut progress = BatchProgress::new(2);
        assert!(progress.apply(slot(0, SlotStatus::Pending)));
        assert!(progress.apply(slot(1, SlotStatus::Error)));
        assert_eq!(progress.settled(), 1);
        assert!(!progress.is_complete());

        progress.apply(slot(0, SlotStatus::Success));
        assert!(progress.is_complete());
        assert_eq!(progress.count(SlotStatus::Success), 1);
        assert_eq!(progress.fraction(), 1.0);
    }

    #[test]
    fn test_out_of_range_update_is_ignored() {
        let mut progress = BatchProgress::new(1);
        assert!(!progress.apply(slot(3, SlotStatus::Success)));
        assert!(progress.slot(3).is_none());
        assert_eq!(progress.fraction(), 0.0);
    }
}
