//! Racing resolutions of the same keyword.
//!
//! A slow stub fetcher keeps the first resolution in flight while a second
//! one starts, so the per-keyword lock decides what happens.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use seo_monitor::model::{KeywordId, RecordOrder};
use seo_monitor::store::sqlite::{NewEngine, NewSite};
use seo_monitor::store::{KeywordStore, RankLedger, RankingHistoryStore};
use seo_monitor::{ConflictPolicy, MonitorError, RankResolver, SqliteStore};
use seo_monitor_search::{PageFetcher, Route, SearchError};

/// Answers after a delay; the n-th call ranks the site at `ranks[n]`.
struct SlowFetcher {
    delay: Duration,
    ranks: Vec<usize>,
    calls: AtomicUsize,
}

#[async_trait]
impl PageFetcher for SlowFetcher {
    async fn fetch(&self, _url: &str, _route: &Route) -> Result<String, SearchError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        let position = self.ranks.get(call).copied().unwrap_or(1);
        let items: String = (1..=position)
            .map(|p| {
                let link = if p == position {
                    "http://www.mysite.com/".to_string()
                } else {
                    format!("http://other{p}.com/")
                };
                format!(r#"<h3 class="r"><a href="{link}">r{p}</a></h3>"#)
            })
            .collect();
        Ok(format!("<html><body>{items}</body></html>"))
    }
}

fn seeded() -> (Arc<SqliteStore>, KeywordId) {
    let store = Arc::new(SqliteStore::open_in_memory().expect("store"));
    let engine = store
        .add_engine(NewEngine {
            name: "Google",
            base_url: "https://www.google.com",
            short_name: None,
            group: None,
        })
        .expect("engine");
    let site = store
        .add_site(NewSite {
            name: "Mine",
            url: "mysite.com",
            location: "all",
            language: "en",
        })
        .expect("site");
    let keyword = store
        .add_keyword(site.id, engine.id, "widgets")
        .expect("keyword");
    (store, keyword.id)
}

fn slow(ranks: Vec<usize>) -> Arc<SlowFetcher> {
    Arc::new(SlowFetcher {
        delay: Duration::from_millis(150),
        ranks,
        calls: AtomicUsize::new(0),
    })
}

#[tokio::test]
async fn reject_policy_keeps_exactly_one_record() {
    let (store, keyword_id) = seeded();
    let fetcher = slow(vec![3, 1]);
    let resolver = RankResolver::new(store.clone(), fetcher.clone())
        .with_conflict_policy(ConflictPolicy::Reject);

    let (a, b) = tokio::join!(
        resolver.resolve_keyword_rank(keyword_id),
        resolver.resolve_keyword_rank(keyword_id)
    );

    let (ok, rejected): (Vec<_>, Vec<_>) = [a, b].into_iter().partition(Result::is_ok);
    assert_eq!(ok.len(), 1);
    assert_eq!(rejected.len(), 1);
    assert!(matches!(
        rejected[0],
        Err(MonitorError::ResolutionInProgress(id)) if id == keyword_id
    ));
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);

    let records = store
        .list_records(keyword_id, RecordOrder::NewestFirst, None)
        .expect("records");
    assert_eq!(records.len(), 1);
    let keyword = store.get_keyword(keyword_id).expect("keyword");
    assert_eq!((keyword.rank, keyword.previous, keyword.top_rank), (3, 0, 3));
}

#[tokio::test]
async fn queue_policy_serializes_both_resolutions() {
    let (store, keyword_id) = seeded();
    let fetcher = slow(vec![3, 1]);
    let resolver = RankResolver::new(store.clone(), fetcher.clone())
        .with_conflict_policy(ConflictPolicy::Queue);

    let (a, b) = tokio::join!(
        resolver.resolve_keyword_rank(keyword_id),
        resolver.resolve_keyword_rank(keyword_id)
    );
    let mut ranks = vec![a.expect("first").rank, b.expect("second").rank];
    ranks.sort_unstable();
    assert_eq!(ranks, vec![1, 3]);

    let records = store
        .list_records(keyword_id, RecordOrder::OldestFirst, None)
        .expect("records");
    assert_eq!(
        records.iter().map(|r| r.rank).collect::<Vec<_>>(),
        vec![3, 1]
    );
    // The second write saw the first one's result as its previous rank.
    let keyword = store.get_keyword(keyword_id).expect("keyword");
    assert_eq!((keyword.rank, keyword.previous, keyword.top_rank), (1, 3, 1));
}

#[test]
fn racing_ledger_writes_never_interleave() {
    let (store, keyword_id) = seeded();
    let at = |minute: u32| -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 8, 1)
            .and_then(|d| d.and_hms_opt(10, minute, 0))
            .expect("valid")
    };

    let ranks = [7u32, 0, 4, 9, 2, 0, 5, 3];
    std::thread::scope(|scope| {
        for (i, rank) in ranks.iter().enumerate() {
            let store = Arc::clone(&store);
            scope.spawn(move || {
                store
                    .record_rank(keyword_id, *rank, "", at(u32::try_from(i).expect("small")))
                    .expect("record");
            });
        }
    });

    // Replay the history in write order: every step must agree with the
    // final live fields.
    let mut history = store
        .list_records(keyword_id, RecordOrder::OldestFirst, None)
        .expect("records");
    history.sort_by_key(|r| r.id);
    assert_eq!(history.len(), ranks.len());

    let written: Vec<u32> = history.iter().map(|r| r.rank).collect();
    let keyword = store.get_keyword(keyword_id).expect("keyword");
    assert_eq!(keyword.rank, written[written.len() - 1]);
    assert_eq!(keyword.previous, written[written.len() - 2]);
    assert_eq!(
        keyword.top_rank,
        written.iter().copied().filter(|r| *r > 0).min().unwrap_or(0)
    );
}
