//! Visit tracking.
//!
//! Events are appended to the `analytics` document as they arrive and never
//! changed afterwards. Rollups are recomputed from the raw log on every query;
//! there is no stored aggregate.
//!
//! `visitorId` is whatever the browser sent. Unique-visitor counts are a rough
//! engagement signal, not something to bill or authorise on.

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use crate::models::{AnalyticsEvent, AnalyticsRollup, DailyVisits, PageViews, ReferrerCount};
use crate::repos::{RepoError, RepoResult};
use crate::store::{mutate, read_document, DocumentStore, ANALYTICS_DOC};

pub const DEFAULT_ROLLUP_DAYS: i64 = 30;
/// Longest window a caller may ask for; a century covers every stored event.
pub const MAX_WINDOW_DAYS: i64 = 36_500;
pub const TOP_REFERRERS: usize = 10;
const UNKNOWN_PAGE: &str = "unknown";

/// An event as received, before it gets an id and timestamp.
#[derive(Debug, Clone, Default)]
pub struct NewEvent {
    pub visitor_id: String,
    pub page: String,
    pub action: String,
    pub user_agent: String,
    pub ip_address: String,
    pub referrer: Option<String>,
    pub session_id: String,
}

#[derive(Clone)]
pub struct AnalyticsLog {
    store: Arc<dyn DocumentStore>,
}

impl AnalyticsLog {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Append one event stamped with the current time.
    pub fn record(&self, event: NewEvent) -> RepoResult<AnalyticsEvent> {
        self.record_at(event, Utc::now())
    }

    pub fn record_at(&self, event: NewEvent, at: DateTime<Utc>) -> RepoResult<AnalyticsEvent> {
        mutate(self.store.as_ref(), ANALYTICS_DOC, Vec::new, |events: &mut Vec<AnalyticsEvent>| {
            let stored = AnalyticsEvent {
                id: crate::repos::next_id(events.iter().map(|e| e.id)),
                visitor_id: event.visitor_id.clone(),
                page: event.page.clone(),
                action: event.action.clone(),
                user_agent: event.user_agent.clone(),
                ip_address: event.ip_address.clone(),
                referrer: event.referrer.clone().filter(|r| !r.is_empty()),
                session_id: event.session_id.clone(),
                timestamp: at.to_rfc3339_opts(SecondsFormat::Millis, true),
            };
            events.push(stored.clone());
            Ok::<_, RepoError>(stored)
        })
    }

    pub fn events(&self) -> RepoResult<Vec<AnalyticsEvent>> {
        let (events, _) = read_document(self.store.as_ref(), ANALYTICS_DOC, Vec::new)?;
        Ok(events)
    }

    /// Rollup over the trailing `days` days ending now.
    pub fn rollup(&self, days: i64) -> RepoResult<AnalyticsRollup> {
        let events = self.events()?;
        Ok(rollup_events(&events, Utc::now(), days))
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// Aggregate `events` that fall inside `[now - days, now]`.
///
/// Page views are ordered by count (highest first, ties by page), days
/// ascending, referrers by count and capped at [`TOP_REFERRERS`]. Events
/// whose timestamp does not parse are skipped.
pub fn rollup_events(events: &[AnalyticsEvent], now: DateTime<Utc>, days: i64) -> AnalyticsRollup {
    let cutoff = now
        .checked_sub_signed(Duration::days(days.clamp(0, MAX_WINDOW_DAYS)))
        .unwrap_or(DateTime::<Utc>::MIN_UTC);

    let mut pages: HashMap<&str, u64> = HashMap::new();
    let mut daily: BTreeMap<String, (HashSet<&str>, u64)> = BTreeMap::new();
    let mut referrers: HashMap<&str, u64> = HashMap::new();

    for event in events {
        let Some(at) = parse_timestamp(&event.timestamp) else {
            continue;
        };
        if at < cutoff {
            continue;
        }

        let page = if event.page.is_empty() {
            UNKNOWN_PAGE
        } else {
            event.page.as_str()
        };
        *pages.entry(page).or_default() += 1;

        let day = daily.entry(at.format("%Y-%m-%d").to_string()).or_default();
        day.0.insert(event.visitor_id.as_str());
        day.1 += 1;

        if let Some(referrer) = event.referrer.as_deref().filter(|r| !r.is_empty()) {
            *referrers.entry(referrer).or_default() += 1;
        }
    }

    let mut page_views: Vec<PageViews> = pages
        .into_iter()
        .map(|(page, views)| PageViews {
            page: page.to_string(),
            views,
        })
        .collect();
    page_views.sort_by(|a, b| b.views.cmp(&a.views).then_with(|| a.page.cmp(&b.page)));

    let daily_visits = daily
        .into_iter()
        .map(|(date, (visitors, total))| DailyVisits {
            date,
            unique_visitors: visitors.len() as u64,
            total_views: total,
        })
        .collect();

    let mut top_referrers: Vec<ReferrerCount> = referrers
        .into_iter()
        .map(|(referrer, visits)| ReferrerCount {
            referrer: referrer.to_string(),
            visits,
        })
        .collect();
    top_referrers.sort_by(|a, b| b.visits.cmp(&a.visits).then_with(|| a.referrer.cmp(&b.referrer)));
    top_referrers.truncate(TOP_REFERRERS);

    AnalyticsRollup {
        page_views,
        daily_visits,
        top_referrers,
    }
}
