use std::time::Duration;

/// Tunables for a batch deletion run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeletionSettings {
    /// Pause before each file. Makes progress visible for small batches.
    pub item_delay: Duration,
}

impl DeletionSettings {
    pub fn with_item_delay(item_delay: Duration) -> Self {
        Self { item_delay }
    }
}
