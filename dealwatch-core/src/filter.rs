use crate::types::{Post, SeenIdSet};
use chrono::{DateTime, Duration, Utc};

/// Lowercase flair substrings that disqualify a post outright.
#[derive(Debug, Clone, Default)]
pub struct ExcludedFlairSet {
    patterns: Vec<String>,
}

impl ExcludedFlairSet {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            patterns: patterns
                .into_iter()
                .map(|p| p.as_ref().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    pub fn excludes(&self, flair: &str) -> bool {
        let flair = flair.to_lowercase();
        self.patterns
            .iter()
            .any(|pattern| flair.contains(pattern.as_str()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectReason {
    AlreadySeen,
    Stale,
    ExcludedFlair,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterDecision {
    Accept,
    Reject(RejectReason),
}

impl FilterDecision {
    pub fn is_accept(&self) -> bool {
        matches!(self, FilterDecision::Accept)
    }
}

#[derive(Debug, Clone)]
pub struct PostFilter {
    retention: Duration,
    excluded: ExcludedFlairSet,
}

impl PostFilter {
    pub fn new(retention: Duration, excluded: ExcludedFlairSet) -> Self {
        Self {
            retention,
            excluded,
        }
    }

    /// Pure decision; rules are checked in order and the first hit wins.
    pub fn evaluate(&self, post: &Post, seen: &SeenIdSet, now: DateTime<Utc>) -> FilterDecision {
        if seen.contains(&post.id) {
            return FilterDecision::Reject(RejectReason::AlreadySeen);
        }

        // A window reaching past the calendar's start means nothing is stale.
        if let Some(cutoff) = now.checked_sub_signed(self.retention) {
            if post.created_utc < cutoff {
                return FilterDecision::Reject(RejectReason::Stale);
            }
        }

        if self.excluded.excludes(post.flair_text()) {
            return FilterDecision::Reject(RejectReason::ExcludedFlair);
        }

        FilterDecision::Accept
    }

    /// Like [`evaluate`](Self::evaluate), but an accepted post is marked as seen
    /// right away, before classification has a chance to drop it.
    pub fn admit(&self, post: &Post, seen: &mut SeenIdSet, now: DateTime<Utc>) -> FilterDecision {
        let decision = self.evaluate(post, seen, now);
        if decision.is_accept() {
            seen.insert(post.id.clone());
        }
        decision
    }
}
