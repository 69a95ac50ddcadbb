use crate::notifier::{alert_body, Notifier, ALERT_SUBJECT};
use chrono::{DateTime, Utc};
use deal_store::{DealLedger, DedupStore};
use dealwatch_core::{
    extract_price, AppConfig, Classification, Classifier, CoreError, DealRecord, ErrorExt,
    ErrorReporter, FilterDecision, Post, PostFilter, PostSource, RejectReason, SeenIdSet,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What happened to a single fetched post.
#[derive(Debug, Clone, PartialEq)]
pub enum PostOutcome {
    Rejected(RejectReason),
    /// Accepted and marked seen, but no keyword matched.
    Uncategorized,
    Matched(DealRecord),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub fetched: usize,
    pub accepted: usize,
    pub already_seen: usize,
    pub stale: usize,
    pub excluded: usize,
    pub uncategorized: usize,
    pub recorded: usize,
    pub highlighted: usize,
    pub alerts_failed: usize,
    pub failed_sources: Vec<String>,
    pub seen_total: usize,
}

impl CycleReport {
    fn count_rejection(&mut self, reason: RejectReason) {
        match reason {
            RejectReason::AlreadySeen => self.already_seen += 1,
            RejectReason::Stale => self.stale += 1,
            RejectReason::ExcludedFlair => self.excluded += 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CycleSettings {
    pub sources: Vec<String>,
    pub fetch_limit: u32,
    /// Order in which category groups are written to the ledger.
    pub category_order: Vec<String>,
}

impl CycleSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            sources: config.sources.subreddits.clone(),
            fetch_limit: config.sources.fetch_limit,
            category_order: config.matching.category_names(),
        }
    }
}

/// One pass over every source: filter, classify, alert, persist.
pub struct ScrapeCycle {
    source: Arc<dyn PostSource>,
    notifier: Arc<dyn Notifier>,
    filter: PostFilter,
    classifier: Classifier,
    dedup: DedupStore,
    ledger: DealLedger,
    settings: CycleSettings,
    reporter: ErrorReporter,
}

impl ScrapeCycle {
    pub fn new(
        source: Arc<dyn PostSource>,
        notifier: Arc<dyn Notifier>,
        filter: PostFilter,
        classifier: Classifier,
        dedup: DedupStore,
        ledger: DealLedger,
        settings: CycleSettings,
    ) -> Self {
        Self {
            source,
            notifier,
            filter,
            classifier,
            dedup,
            ledger,
            settings,
            reporter: ErrorReporter::new(),
        }
    }

    pub fn from_config(
        config: &AppConfig,
        source: Arc<dyn PostSource>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self::new(
            source,
            notifier,
            config.matching.post_filter(),
            config.matching.classifier(),
            DedupStore::new(&config.storage.seen_ids_path),
            DealLedger::new(&config.storage.ledger_path),
            CycleSettings::from_config(config),
        )
    }

    pub fn ledger(&self) -> &DealLedger {
        &self.ledger
    }

    /// Decision for one post. Marks accepted posts as seen; has no other side effect.
    pub fn process_post(
        &self,
        post: &Post,
        seen: &mut SeenIdSet,
        now: DateTime<Utc>,
    ) -> PostOutcome {
        if let FilterDecision::Reject(reason) = self.filter.admit(post, seen, now) {
            return PostOutcome::Rejected(reason);
        }

        match self.classifier.classify_title(&post.title) {
            Classification::Uncategorized => PostOutcome::Uncategorized,
            Classification::Category { name, is_target } => {
                let price = extract_price(&post.title);
                PostOutcome::Matched(DealRecord::from_post(post, name, price, is_target))
            }
        }
    }

    pub async fn run(&self, now: DateTime<Utc>) -> Result<CycleReport, CoreError> {
        let mut seen = self.dedup.load().await?;
        let mut report = CycleReport::default();
        let mut matched: HashMap<String, Vec<DealRecord>> = HashMap::new();

        for source in &self.settings.sources {
            let posts = match self.source.fetch_new(source, self.settings.fetch_limit).await {
                Ok(posts) => posts,
                Err(e) => {
                    warn!("Skipping r/{} this cycle: {}", source, e.user_friendly_message());
                    // Permanent failures (missing or forbidden subreddit) need a config change.
                    if e.is_transient() {
                        self.reporter.report_warning(&e);
                    } else {
                        self.reporter.report_error(&e);
                    }
                    report.failed_sources.push(source.clone());
                    continue;
                }
            };

            report.fetched += posts.len();
            for post in &posts {
                match self.process_post(post, &mut seen, now) {
                    PostOutcome::Rejected(reason) => report.count_rejection(reason),
                    PostOutcome::Uncategorized => {
                        report.accepted += 1;
                        debug!("No part keyword in '{}'", post.title);
                        report.uncategorized += 1;
                    }
                    PostOutcome::Matched(record) => {
                        report.accepted += 1;
                        if record.highlight {
                            report.highlighted += 1;
                            self.send_alert(&record, &mut report).await;
                        }
                        matched
                            .entry(record.category.clone())
                            .or_default()
                            .push(record);
                    }
                }
            }
        }

        let records = self.ordered(matched);
        // Ledger first: if it fails the ids stay unsaved and the posts come back next cycle.
        report.recorded = self.ledger.append(&records).await?;
        self.dedup.save(&seen).await?;
        report.seen_total = seen.len();

        info!(
            "Cycle done: {} fetched, {} recorded ({} highlighted), {} uncategorized, \
             {} seen, {} stale, {} excluded, {} sources failed",
            report.fetched,
            report.recorded,
            report.highlighted,
            report.uncategorized,
            report.already_seen,
            report.stale,
            report.excluded,
            report.failed_sources.len()
        );
        Ok(report)
    }

    async fn send_alert(&self, record: &DealRecord, report: &mut CycleReport) {
        let body = alert_body(&record.title, &record.url);
        if let Err(e) = self.notifier.alert(ALERT_SUBJECT, &body).await {
            report.alerts_failed += 1;
            self.reporter.report_warning(&CoreError::from(e));
        }
    }

    /// Groups in configured category order, arrival order within a group.
    fn ordered(&self, mut matched: HashMap<String, Vec<DealRecord>>) -> Vec<DealRecord> {
        let mut records = Vec::new();
        for category in &self.settings.category_order {
            if let Some(group) = matched.remove(category) {
                records.extend(group);
            }
        }

        let mut rest: Vec<_> = matched.into_iter().collect();
        rest.sort_by(|a, b| a.0.cmp(&b.0));
        for (_, group) in rest {
            records.extend(group);
        }
        records
    }
}
