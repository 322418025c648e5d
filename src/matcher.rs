//! Locate a target site among extracted SERP entries.

use seo_monitor_search::ResultEntry;
use seo_monitor_search::host::normalize_host;

use crate::model::{RankOutcome, RankStatus};

/// Message attached when the results page yielded no entries at all.
pub const NO_LINKS_MESSAGE: &str = "No links found in the returned search page";

/// Find the first entry whose host equals the target's host.
///
/// Hosts are compared after normalisation (lowercase, no scheme, no leading
/// `www.`, no port). The rank is the entry's 1-based position. Not finding
/// the site is a successful outcome with rank 0; only a target without a
/// usable host yields [`RankStatus::Error`].
pub fn match_rank(entries: &[ResultEntry], target_url: &str) -> RankOutcome {
    let Some(target_host) = normalize_host(target_url) else {
        return RankOutcome {
            rank: 0,
            url: String::new(),
            title: String::new(),
            status: RankStatus::Error,
            message: Some(format!("site URL '{target_url}' has no host to match")),
        };
    };

    if entries.is_empty() {
        return unranked(NO_LINKS_MESSAGE.to_string());
    }

    let hit = entries.iter().enumerate().find(|(_, entry)| {
        normalize_host(&entry.link).is_some_and(|host| host == target_host)
    });

    match hit {
        Some((idx, entry)) => RankOutcome {
            rank: u32::try_from(idx + 1).unwrap_or(u32::MAX),
            url: entry.link.clone(),
            title: entry.title.clone(),
            status: RankStatus::Success,
            message: None,
        },
        None => unranked(format!(
            "{target_host} not found in {} results",
            entries.len()
        )),
    }
}

fn unranked(message: String) -> RankOutcome {
    RankOutcome {
        rank: 0,
        url: String::new(),
        title: String::new(),
        status: RankStatus::Success,
        message: Some(message),
    }
}
