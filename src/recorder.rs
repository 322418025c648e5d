//! Persist resolved rank outcomes.

use std::sync::Arc;

use chrono::NaiveDateTime;

use crate::error::Result;
use crate::model::{Keyword, KeywordId, RankOutcome, RankingRecord};
use crate::store::RankLedger;

/// What one successful recording wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRank {
    /// Keyword with its advanced rank fields.
    pub keyword: Keyword,
    /// The appended history entry.
    pub record: RankingRecord,
}

/// Writes outcomes to the rank ledger.
///
/// The ledger applies the keyword update and the history append in one
/// transaction; callers additionally hold the keyword's lock so no two
/// recordings for one keyword interleave.
#[derive(Clone)]
pub struct RankRecorder {
    ledger: Arc<dyn RankLedger>,
}

impl RankRecorder {
    pub fn new(ledger: Arc<dyn RankLedger>) -> Self {
        Self { ledger }
    }

    /// Record `outcome` for `keyword_id` as observed at `observed_at`.
    ///
    /// The history entry stores the matched URL, or an empty link when the
    /// site was not found.
    pub fn record(
        &self,
        keyword_id: KeywordId,
        outcome: &RankOutcome,
        observed_at: NaiveDateTime,
    ) -> Result<RecordedRank> {
        let link = if outcome.is_ranked() {
            outcome.url.as_str()
        } else {
            ""
        };
        let (keyword, record) = self
            .ledger
            .record_rank(keyword_id, outcome.rank, link, observed_at)?;
        tracing::debug!(
            keyword_id,
            rank = keyword.rank,
            previous = keyword.previous,
            top_rank = keyword.top_rank,
            "rank recorded"
        );
        Ok(RecordedRank { keyword, record })
    }
}

impl std::fmt::Debug for RankRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RankRecorder").finish_non_exhaustive()
    }
}
