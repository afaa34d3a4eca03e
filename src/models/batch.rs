use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotStatus {
    Pending,
    Success,
    Error,
}

impl SlotStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SlotStatus::Pending)
    }
}

/// One image request inside a batch. Owned and mutated only by the task
/// running that request; everyone else sees clones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSlot {
    pub index: usize,
    pub status: SlotStatus,
    pub message: String,
    pub retries: u32,
    pub seed: Option<u64>,
    pub image_url: Option<String>,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl BatchSlot {
    pub fn pending(index: usize, message: impl Into<String>) -> Self {
        Self {
            index,
            status: SlotStatus::Pending,
            message: message.into(),
            retries: 0,
            seed: None,
            image_url: None,
            error: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn elapsed_secs(&self) -> Option<f64> {
        self.finished_at
            .map(|end| (end - self.started_at).num_milliseconds() as f64 / 1000.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub batch_id: String,
    pub slots: Vec<BatchSlot>,
}

impl BatchReport {
    pub fn all_settled(&self) -> bool {
        self.slots.iter().all(BatchSlot::is_terminal)
    }

    pub fn succeeded(&self) -> impl Iterator<Item = &BatchSlot> {
        self.slots
            .iter()
            .filter(|slot| slot.status == SlotStatus::Success)
    }

    pub fn failed(&self) -> impl Iterator<Item = &BatchSlot> {
        self.slots
            .iter()
            .filter(|slot| slot.status == SlotStatus::Error)
    }

    pub fn images(&self) -> Vec<Option<&str>> {
        self.slots
            .iter()
            .map(|slot| slot.image_url.as_deref())
            .collect()
    }
}
