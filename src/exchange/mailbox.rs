use std::sync::{Arc, Mutex};

use super::error::Result;

/// Single-slot mailbox holding one serialized record.
///
/// `write` replaces the slot atomically: a concurrent `read` sees either the
/// previous record or the new one, never a mix. `read` does not consume the
/// record; it returns `None` while nothing has been written yet.
#[allow(async_fn_in_trait)]
pub trait Mailbox {
    async fn write(&self, record: &[u8]) -> Result<()>;

    async fn read(&self) -> Result<Option<Vec<u8>>>;

    /// Human-readable location, for logs
    fn describe(&self) -> String;
}

/// In-process mailbox. Clones share the same slot.
#[derive(Debug, Clone, Default)]
pub struct MemoryMailbox {
    slot: Arc<Mutex<Option<Vec<u8>>>>,
}

impl MemoryMailbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop the record, as if the shared file were deleted
    pub fn clear(&self) {
        *self.lock() = None;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Vec<u8>>> {
        // A panic while holding the lock cannot leave a half-written Vec behind
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Mailbox for MemoryMailbox {
    async fn write(&self, record: &[u8]) -> Result<()> {
        *self.lock() = Some(record.to_vec());
        Ok(())
    }

    async fn read(&self) -> Result<Option<Vec<u8>>> {
        Ok(self.lock().clone())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
