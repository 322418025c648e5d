//! At-most-one in-flight resolution per keyword.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::OwnedMutexGuard;

use crate::config::ConflictPolicy;
use crate::error::{MonitorError, Result};
use crate::model::KeywordId;

/// Async mutexes keyed by keyword id.
///
/// Entries nobody holds or waits on are pruned on the next acquisition.
#[derive(Debug, Default)]
pub struct KeywordLocks {
    slots: Mutex<HashMap<KeywordId, Arc<tokio::sync::Mutex<()>>>>,
}

/// Held for the duration of one keyword resolution.
#[derive(Debug)]
pub struct KeywordGuard {
    keyword_id: KeywordId,
    _guard: OwnedMutexGuard<()>,
}

impl KeywordGuard {
    pub fn keyword_id(&self) -> KeywordId {
        self.keyword_id
    }
}

impl KeywordLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for `keyword_id`.
    ///
    /// # Errors
    ///
    /// Under [`ConflictPolicy::Reject`], returns
    /// [`MonitorError::ResolutionInProgress`] if the keyword is already
    /// locked. Under [`ConflictPolicy::Queue`] this waits instead.
    pub async fn acquire(
        &self,
        keyword_id: KeywordId,
        policy: ConflictPolicy,
    ) -> Result<KeywordGuard> {
        let slot = self.slot(keyword_id);
        let guard = match policy {
            ConflictPolicy::Reject => slot
                .try_lock_owned()
                .map_err(|_| MonitorError::ResolutionInProgress(keyword_id))?,
            ConflictPolicy::Queue => {
                if let Ok(guard) = Arc::clone(&slot).try_lock_owned() {
                    guard
                } else {
                    tracing::debug!(keyword_id, "waiting for in-flight resolution");
                    slot.lock_owned().await
                }
            }
        };
        Ok(KeywordGuard {
            keyword_id,
            _guard: guard,
        })
    }

    /// Number of keywords currently tracked (held, awaited, or not yet pruned).
    pub fn tracked(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn slot(&self, keyword_id: KeywordId) -> Arc<tokio::sync::Mutex<()>> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.retain(|_, slot| Arc::strong_count(slot) > 1);
        Arc::clone(slots.entry(keyword_id).or_default())
    }
}
