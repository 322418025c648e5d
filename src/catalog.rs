//! Site, engine and keyword maintenance.
//!
//! A site's keyword list is edited as a whole (one keyword per line); the
//! sync computes which (engine, text) keywords to add and which to drop.

use std::collections::HashSet;

use crate::error::{MonitorError, Result};
use crate::model::{EngineId, Keyword, KeywordFilter, KeywordId, SiteId};
use crate::store::{KeywordStore, SqliteStore};

/// Keyword changes needed to reach a desired (engines × texts) set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeywordPlan {
    pub add: Vec<(EngineId, String)>,
    pub remove: Vec<KeywordId>,
}

impl KeywordPlan {
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty()
    }
}

/// Outcome of [`sync_site_keywords`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub added: usize,
    pub removed: usize,
}

/// Split free text into keyword lines: trimmed, non-blank, first occurrence wins.
pub fn parse_keyword_lines(input: &str) -> Vec<String> {
    normalize_keywords(input.lines())
}

fn normalize_keywords<'a>(texts: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    texts
        .into_iter()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .filter(|t| seen.insert(t.to_string()))
        .map(str::to_string)
        .collect()
}

/// Diff `existing` keywords against every pairing of `engine_ids` and `texts`.
///
/// Existing keywords whose engine or text is no longer wanted are removed;
/// wanted pairs not yet tracked are added. Output order follows the inputs.
pub fn plan_keyword_sync(
    existing: &[Keyword],
    engine_ids: &[EngineId],
    texts: &[String],
) -> KeywordPlan {
    let texts = normalize_keywords(texts.iter().map(String::as_str));
    let mut engines = Vec::new();
    for id in engine_ids {
        if !engines.contains(id) {
            engines.push(*id);
        }
    }

    let wanted: HashSet<(EngineId, &str)> = engines
        .iter()
        .flat_map(|e| texts.iter().map(move |t| (*e, t.as_str())))
        .collect();
    let have: HashSet<(EngineId, &str)> = existing
        .iter()
        .map(|k| (k.engine_id, k.text.as_str()))
        .collect();

    let remove = existing
        .iter()
        .filter(|k| !wanted.contains(&(k.engine_id, k.text.as_str())))
        .map(|k| k.id)
        .collect();

    let mut add = Vec::new();
    for engine_id in &engines {
        for text in &texts {
            if !have.contains(&(*engine_id, text.as_str())) {
                add.push((*engine_id, text.clone()));
            }
        }
    }

    KeywordPlan { add, remove }
}

/// Make a site track exactly `texts` on exactly `engine_ids`.
///
/// Keywords dropped by the change lose their rank history.
///
/// # Errors
///
/// [`MonitorError::NotFound`] for an unknown site or engine.
pub fn sync_site_keywords(
    store: &SqliteStore,
    site_id: SiteId,
    engine_ids: &[EngineId],
    texts: &[String],
) -> Result<SyncReport> {
    let existing = store.list_keywords(&KeywordFilter::all().site(site_id))?;
    let plan = plan_keyword_sync(&existing, engine_ids, texts);

    let mut engines = engine_ids.to_vec();
    engines.sort_unstable();
    engines.dedup();
    store.apply_keyword_sync(site_id, &engines, &plan.add, &plan.remove)?;

    let report = SyncReport {
        added: plan.add.len(),
        removed: plan.remove.len(),
    };
    tracing::info!(
        site_id,
        added = report.added,
        removed = report.removed,
        "site keywords updated"
    );
    Ok(report)
}

/// Delete a search engine unless a site or keyword still uses it.
///
/// # Errors
///
/// [`MonitorError::EngineInUse`] while referenced, [`MonitorError::NotFound`]
/// for an unknown id.
pub fn remove_engine(store: &SqliteStore, engine_id: EngineId) -> Result<()> {
    store.delete_engine(engine_id).map_err(MonitorError::from)
}

/// Delete a site with its keywords and their history.
pub fn remove_site(store: &SqliteStore, site_id: SiteId) -> Result<()> {
    store.delete_site(site_id).map_err(MonitorError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RecordOrder;
    use crate::store::sqlite::{NewEngine, NewSite};
    use crate::store::{RankingHistoryStore, SiteLookup};
    use chrono::NaiveDate;

    fn kw(id: KeywordId, engine_id: EngineId, text: &str) -> Keyword {
        Keyword {
            id,
            text: text.to_string(),
            site_id: 1,
            engine_id,
            rank: 0,
            previous: 0,
            top_rank: 0,
            last_check: None,
        }
    }

    fn lines(texts: &[&str]) -> Vec<String> {
        texts.iter().map(|t| (*t).to_string()).collect()
    }

    #[test]
    fn parse_lines_trims_and_dedupes() {
        assert_eq!(
            parse_keyword_lines("widgets\n  blue widgets \n\nwidgets\r\n"),
            lines(&["widgets", "blue widgets"])
        );
    }

    #[test]
    fn plan_adds_every_engine_text_pair() {
        let plan = plan_keyword_sync(&[], &[1, 2], &lines(&["a", "b"]));
        assert_eq!(
            plan.add,
            vec![
                (1, "a".to_string()),
                (1, "b".to_string()),
                (2, "a".to_string()),
                (2, "b".to_string())
            ]
        );
        assert!(plan.remove.is_empty());
    }

    #[test]
    fn plan_removes_dropped_texts_and_engines() {
        let existing = vec![kw(10, 1, "a"), kw(11, 1, "old"), kw(12, 2, "a")];
        let plan = plan_keyword_sync(&existing, &[1], &lines(&["a", "new"]));
        assert_eq!(plan.remove, vec![11, 12]);
        assert_eq!(plan.add, vec![(1, "new".to_string())]);
    }

    #[test]
    fn unchanged_input_is_a_no_op() {
        let existing = vec![kw(10, 1, "a")];
        let plan = plan_keyword_sync(&existing, &[1, 1], &lines(&[" a ", "a"]));
        assert!(plan.is_empty());
    }

    fn store_with_site() -> (SqliteStore, SiteId, EngineId, EngineId) {
        let store = SqliteStore::open_in_memory().expect("store");
        let google = store
            .add_engine(NewEngine {
                name: "Google",
                base_url: "https://www.google.com",
                short_name: None,
                group: None,
            })
            .expect("google");
        let bing = store
            .add_engine(NewEngine {
                name: "Bing",
                base_url: "https://www.bing.com",
                short_name: None,
                group: None,
            })
            .expect("bing");
        let site = store
            .add_site(NewSite {
                name: "Site",
                url: "http://mysite.com",
                location: "all",
                language: "en",
            })
            .expect("site");
        (store, site.id, google.id, bing.id)
    }

    #[test]
    fn sync_applies_and_drops_history() {
        let (store, site, google, bing) = store_with_site();
        let report =
            sync_site_keywords(&store, site, &[google, bing], &lines(&["widgets", "gadgets"]))
                .expect("sync");
        assert_eq!(report, SyncReport { added: 4, removed: 0 });

        let dropped = store
            .list_keywords(&KeywordFilter::all().engine(bing).text("gadgets"))
            .expect("list")
            .remove(0);
        let when = NaiveDate::from_ymd_opt(2024, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .expect("valid");
        store
            .append_record(dropped.id, 3, "http://mysite.com", when)
            .expect("record");

        let report = sync_site_keywords(&store, site, &[google], &lines(&["widgets", "gadgets"]))
            .expect("resync");
        assert_eq!(report, SyncReport { added: 0, removed: 2 });
        assert!(store
            .list_records(dropped.id, RecordOrder::NewestFirst, None)
            .expect("records")
            .is_empty());
        assert_eq!(
            store.get_site(site).map(|s| s.engine_ids).expect("site"),
            vec![google]
        );
    }

    #[test]
    fn sync_unknown_engine_is_not_found() {
        let (store, site, _google, _bing) = store_with_site();
        let err = sync_site_keywords(&store, site, &[999], &lines(&["a"])).unwrap_err();
        assert!(matches!(err, MonitorError::NotFound(_)));
        assert!(store
            .list_keywords(&KeywordFilter::all())
            .expect("list")
            .is_empty());
    }

    #[test]
    fn engine_removal_guard() {
        let (store, site, google, bing) = store_with_site();
        sync_site_keywords(&store, site, &[google], &lines(&["widgets"])).expect("sync");

        let err = remove_engine(&store, google).unwrap_err();
        assert!(matches!(err, MonitorError::EngineInUse(id) if id == google));
        remove_engine(&store, bing).expect("unused engine");

        remove_site(&store, site).expect("site");
        remove_engine(&store, google).expect("no longer referenced");
    }
}
