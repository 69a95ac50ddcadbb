#[cfg(test)]
mod tests {
    use crate::{
        Clock, Notifier, PostOutcome, ScheduleSettings, Scheduler, SchedulerState, ScrapeCycle,
        ALERT_SUBJECT,
    };
    use async_trait::async_trait;
    use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
    use deal_store::LedgerSnapshot;
    use dealwatch_core::{
        AppConfig, CoreError, NotificationError, Post, PostSource, RejectReason, SeenIdSet,
        SourceError,
    };
    use std::collections::{HashMap, HashSet};
    use std::ops::Deref;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::sync::Notify;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    /// Scratch directory removed on drop.
    struct TempDir(PathBuf);

    impl Deref for TempDir {
        type Target = Path;

        fn deref(&self) -> &Path {
            &self.0
        }
    }

    impl Drop for TempDir {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.0);
        }
    }

    fn temp_dir() -> TempDir {
        TempDir(std::env::temp_dir().join(format!("dealwatch_test_{}", uuid::Uuid::new_v4())))
    }

    fn post(id: &str, source: &str, title: &str) -> Post {
        Post {
            id: id.to_string(),
            title: title.to_string(),
            url: format!("https://deals.test/{}", id),
            source: source.to_string(),
            flair: None,
            created_utc: now() - ChronoDuration::hours(1),
        }
    }

    #[derive(Default)]
    struct FakeSource {
        posts: HashMap<String, Vec<Post>>,
        failing: HashSet<String>,
        panics: bool,
        /// 1-based call number that panics.
        panic_on_call: Option<usize>,
        calls: AtomicUsize,
    }

    impl FakeSource {
        fn with_posts(mut self, source: &str, posts: Vec<Post>) -> Self {
            self.posts.insert(source.to_string(), posts);
            self
        }

        fn failing(mut self, source: &str) -> Self {
            self.failing.insert(source.to_string());
            self
        }
    }

    #[async_trait]
    impl PostSource for FakeSource {
        async fn fetch_new(&self, source: &str, _limit: u32) -> Result<Vec<Post>, CoreError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.panics || self.panic_on_call == Some(call) {
                panic!("source exploded");
            }
            if self.failing.contains(source) {
                return Err(SourceError::ServerError { status_code: 503 }.into());
            }
            Ok(self.posts.get(source).cloned().unwrap_or_default())
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        alerts: Mutex<Vec<(String, String)>>,
        digests: Mutex<Vec<usize>>,
        fail_alerts: bool,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn alert(&self, subject: &str, body: &str) -> Result<(), NotificationError> {
            self.alerts
                .lock()
                .unwrap()
                .push((subject.to_string(), body.to_string()));
            if self.fail_alerts {
                return Err(NotificationError::DeliveryFailed {
                    channel: "test".to_string(),
                    reason: "offline".to_string(),
                });
            }
            Ok(())
        }

        async fn digest(&self, snapshot: &LedgerSnapshot) -> Result<(), NotificationError> {
            self.digests.lock().unwrap().push(snapshot.row_count);
            Ok(())
        }
    }

    struct FakeClock {
        now: DateTime<Utc>,
        sleeps: Mutex<Vec<Duration>>,
        /// After this many sleeps the clock signals `done` and never wakes again.
        sleep_limit: usize,
        done: Notify,
    }

    impl FakeClock {
        fn new() -> Self {
            Self::stopping_after(usize::MAX)
        }

        fn stopping_after(sleep_limit: usize) -> Self {
            Self {
                now: now(),
                sleeps: Mutex::new(Vec::new()),
                sleep_limit,
                done: Notify::new(),
            }
        }
    }

    #[async_trait]
    impl Clock for FakeClock {
        fn now(&self) -> DateTime<Utc> {
            self.now
        }

        async fn sleep(&self, duration: Duration) {
            let count = {
                let mut sleeps = self.sleeps.lock().unwrap();
                sleeps.push(duration);
                sleeps.len()
            };
            if count >= self.sleep_limit {
                self.done.notify_one();
                std::future::pending::<()>().await;
            }
        }
    }

    fn config(dir: &Path, sources: &[&str]) -> AppConfig {
        let mut config = AppConfig::default();
        config.sources.subreddits = sources.iter().map(|s| s.to_string()).collect();
        config.storage.seen_ids_path = dir.join("seen_ids.txt");
        config.storage.ledger_path = dir.join("deals.csv");
        config.schedule.digest_every_cycles = 2;
        config
    }

    fn cycle(
        config: &AppConfig,
        source: Arc<FakeSource>,
        notifier: Arc<RecordingNotifier>,
    ) -> ScrapeCycle {
        ScrapeCycle::from_config(config, source, notifier)
    }

    fn settings() -> ScheduleSettings {
        ScheduleSettings {
            interval: Duration::from_secs(30 * 60),
            error_cooldown: Duration::from_secs(5 * 60),
            digest_every_cycles: 2,
        }
    }

    #[test]
    fn test_process_post_outcomes() {
        let dir = temp_dir();
        let config = config(&dir, &["buildapcsales"]);
        let cycle = cycle(
            &config,
            Arc::new(FakeSource::default()),
            Arc::new(RecordingNotifier::default()),
        );
        let mut seen = SeenIdSet::new();

        let gpu = post("a1", "buildapcsales", "[GPU] RTX 4080 Super FE $999.99");
        match cycle.process_post(&gpu, &mut seen, now()) {
            PostOutcome::Matched(record) => {
                assert_eq!(record.category, "GPU");
                assert_eq!(record.price, "$999.99");
                assert!(record.highlight);
            }
            other => panic!("expected a match, got {:?}", other),
        }
        assert_eq!(
            cycle.process_post(&gpu, &mut seen, now()),
            PostOutcome::Rejected(RejectReason::AlreadySeen)
        );

        let chatter = post("a2", "buildapcsales", "Weekly discussion thread");
        assert_eq!(
            cycle.process_post(&chatter, &mut seen, now()),
            PostOutcome::Uncategorized
        );
        assert!(seen.contains("a2"));
    }

    #[tokio::test]
    async fn test_repeated_cycle_records_nothing_new() {
        let dir = temp_dir();
        let config = config(&dir, &["buildapcsales"]);
        let source = Arc::new(FakeSource::default().with_posts(
            "buildapcsales",
            vec![
                post("p1", "buildapcsales", "[RAM] DDR5 32GB $89"),
                post("p2", "buildapcsales", "[SSD] Samsung 990 Pro 2TB $159"),
            ],
        ));
        let cycle = cycle(&config, source, Arc::new(RecordingNotifier::default()));

        let first = cycle.run(now()).await.unwrap();
        assert_eq!(first.accepted, 2);
        assert_eq!(first.recorded, 2);
        assert_eq!(first.seen_total, 2);

        let second = cycle.run(now()).await.unwrap();
        assert_eq!(second.fetched, 2);
        assert_eq!(second.already_seen, 2);
        assert_eq!(second.recorded, 0);
        assert_eq!(second.seen_total, 2);

        assert_eq!(cycle.ledger().rows().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_rows_follow_category_order_then_arrival() {
        let dir = temp_dir();
        let config = config(&dir, &["buildapcsales", "hardwareswap"]);
        let source = Arc::new(
            FakeSource::default()
                .with_posts(
                    "buildapcsales",
                    vec![
                        post("r1", "buildapcsales", "[RAM] DDR5 32GB $89"),
                        post("g1", "buildapcsales", "[GPU] RX 7900 GRE $529"),
                    ],
                )
                .with_posts(
                    "hardwareswap",
                    vec![post("r2", "hardwareswap", "[H] DDR4 64GB kit [W] PayPal")],
                ),
        );
        let cycle = cycle(&config, source, Arc::new(RecordingNotifier::default()));
        cycle.run(now()).await.unwrap();

        let rows = cycle.ledger().rows().await.unwrap();
        let order: Vec<(&str, &str)> = rows
            .iter()
            .map(|row| (row[1].as_str(), row[6].as_str()))
            .collect();
        assert_eq!(
            order,
            vec![
                ("GPU", "buildapcsales"),
                ("RAM", "buildapcsales"),
                ("RAM", "hardwareswap"),
            ]
        );
    }

    #[tokio::test]
    async fn test_ledger_grows_by_each_cycles_new_rows() {
        let dir = temp_dir();
        let config = config(&dir, &["buildapcsales"]);
        let notifier = Arc::new(RecordingNotifier::default());

        let first = cycle(
            &config,
            Arc::new(FakeSource::default().with_posts(
                "buildapcsales",
                vec![post("p1", "buildapcsales", "[RAM] DDR5 32GB $89")],
            )),
            notifier.clone(),
        );
        first.run(now()).await.unwrap();

        let second = cycle(
            &config,
            Arc::new(FakeSource::default().with_posts(
                "buildapcsales",
                vec![
                    post("p1", "buildapcsales", "[RAM] DDR5 32GB $89"),
                    post("p3", "buildapcsales", "[HDD] WD Red Plus 8TB $149"),
                ],
            )),
            notifier,
        );
        let report = second.run(now()).await.unwrap();
        assert_eq!(report.recorded, 1);

        let text = std::fs::read_to_string(dir.join("deals.csv")).unwrap();
        let lines: Vec<&str> = text.split("\r\n").filter(|l| !l.is_empty()).collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("highlight,part,created"));
        assert!(lines[1].contains("DDR5"));
        assert!(lines[2].contains("WD Red Plus"));
    }

    #[tokio::test]
    async fn test_filtered_posts_are_counted() {
        let dir = temp_dir();
        let config = config(&dir, &["hardwareswap"]);

        let mut stale = post("old", "hardwareswap", "[GPU] RTX 3080 $400");
        stale.created_utc = now() - ChronoDuration::days(40);
        let mut closed = post("closed", "hardwareswap", "[GPU] RTX 3090 $600");
        closed.flair = Some("CLOSED".to_string());
        let chatter = post("chat", "hardwareswap", "Weekly discussion thread");

        let source = Arc::new(
            FakeSource::default().with_posts("hardwareswap", vec![stale, closed, chatter]),
        );
        let cycle = cycle(&config, source, Arc::new(RecordingNotifier::default()));
        let report = cycle.run(now()).await.unwrap();

        assert_eq!(report.fetched, 3);
        assert_eq!(report.accepted, 1);
        assert_eq!(report.stale, 1);
        assert_eq!(report.excluded, 1);
        assert_eq!(report.uncategorized, 1);
        assert_eq!(report.recorded, 0);
        // Only the accepted post is remembered.
        assert_eq!(report.seen_total, 1);

        let saved = std::fs::read_to_string(dir.join("seen_ids.txt")).unwrap();
        assert_eq!(saved.trim(), "chat");
    }

    #[tokio::test]
    async fn test_failing_source_is_skipped() {
        let dir = temp_dir();
        let config = config(&dir, &["techdeals", "buildapcsales"]);
        let source = Arc::new(
            FakeSource::default()
                .failing("techdeals")
                .with_posts(
                    "buildapcsales",
                    vec![post("p1", "buildapcsales", "[RAM] DDR5 32GB $89")],
                ),
        );
        let cycle = cycle(&config, source.clone(), Arc::new(RecordingNotifier::default()));
        let report = cycle.run(now()).await.unwrap();

        assert_eq!(report.failed_sources, vec!["techdeals".to_string()]);
        assert_eq!(report.recorded, 1);
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_target_deal_triggers_alert() {
        let dir = temp_dir();
        let config = config(&dir, &["buildapcsales"]);
        let source = Arc::new(FakeSource::default().with_posts(
            "buildapcsales",
            vec![
                post("t1", "buildapcsales", "[CPU] Intel Core i5-14600K $199"),
                post("n1", "buildapcsales", "[RAM] DDR5 32GB $89"),
            ],
        ));
        let notifier = Arc::new(RecordingNotifier::default());
        let cycle = cycle(&config, source, notifier.clone());
        let report = cycle.run(now()).await.unwrap();

        assert_eq!(report.highlighted, 1);
        let alerts = notifier.alerts.lock().unwrap().clone();
        assert_eq!(
            alerts,
            vec![(
                ALERT_SUBJECT.to_string(),
                "[CPU] Intel Core i5-14600K $199\nhttps://deals.test/t1".to_string()
            )]
        );

        let rows = cycle.ledger().rows().await.unwrap();
        assert_eq!(rows[0][0], "YES");
        assert_eq!(rows[0][1], "CPU");
        assert_eq!(rows[1][0], "");
    }

    #[tokio::test]
    async fn test_alert_failure_does_not_block_recording() {
        let dir = temp_dir();
        let config = config(&dir, &["buildapcsales"]);
        let source = Arc::new(FakeSource::default().with_posts(
            "buildapcsales",
            vec![post("t1", "buildapcsales", "[GPU] RTX 4080 Super $949")],
        ));
        let notifier = Arc::new(RecordingNotifier {
            fail_alerts: true,
            ..RecordingNotifier::default()
        });
        let cycle = cycle(&config, source, notifier);
        let report = cycle.run(now()).await.unwrap();

        assert_eq!(report.alerts_failed, 1);
        assert_eq!(report.recorded, 1);
        assert_eq!(report.seen_total, 1);
    }

    #[tokio::test]
    async fn test_digest_fires_once_per_threshold() {
        let dir = temp_dir();
        let config = config(&dir, &["buildapcsales"]);
        let source = Arc::new(FakeSource::default().with_posts(
            "buildapcsales",
            vec![post("p1", "buildapcsales", "[RAM] DDR5 32GB $89")],
        ));
        let notifier = Arc::new(RecordingNotifier::default());
        let clock = Arc::new(FakeClock::new());
        let mut scheduler = Scheduler::new(
            cycle(&config, source, notifier.clone()),
            clock,
            notifier.clone(),
            settings(),
        );

        let first = scheduler.tick().await;
        assert!(first.succeeded());
        assert!(!first.digest_sent);
        assert_eq!(first.next_delay, Duration::from_secs(30 * 60));
        assert_eq!(scheduler.completed_cycles(), 1);

        let second = scheduler.tick().await;
        assert!(second.digest_sent);
        assert_eq!(scheduler.completed_cycles(), 0);

        let third = scheduler.tick().await;
        assert!(!third.digest_sent);
        assert_eq!(scheduler.completed_cycles(), 1);

        assert_eq!(*notifier.digests.lock().unwrap(), vec![1]);
        assert_eq!(scheduler.state(), SchedulerState::Idle);
    }

    #[tokio::test]
    async fn test_failed_cycle_uses_cooldown() {
        let dir = temp_dir();
        let config = config(&dir, &["buildapcsales"]);
        // A directory where the ledger file should be makes every append fail.
        std::fs::create_dir_all(&config.storage.ledger_path).unwrap();

        let source = Arc::new(FakeSource::default().with_posts(
            "buildapcsales",
            vec![post("p1", "buildapcsales", "[RAM] DDR5 32GB $89")],
        ));
        let notifier = Arc::new(RecordingNotifier::default());
        let mut scheduler = Scheduler::new(
            cycle(&config, source, notifier.clone()),
            Arc::new(FakeClock::new()),
            notifier,
            settings(),
        );

        let outcome = scheduler.tick().await;
        assert!(!outcome.succeeded());
        assert_eq!(outcome.next_delay, Duration::from_secs(5 * 60));
        assert_eq!(scheduler.completed_cycles(), 0);
        // Seen ids are only saved after the ledger write succeeds.
        assert!(!config.storage.seen_ids_path.exists());
    }

    #[tokio::test]
    async fn test_panicking_cycle_is_contained() {
        let dir = temp_dir();
        let config = config(&dir, &["buildapcsales"]);
        let source = Arc::new(FakeSource {
            panics: true,
            ..FakeSource::default()
        });
        let notifier = Arc::new(RecordingNotifier::default());
        let mut scheduler = Scheduler::new(
            cycle(&config, source, notifier.clone()),
            Arc::new(FakeClock::new()),
            notifier,
            settings(),
        );

        let outcome = scheduler.tick().await;
        assert!(!outcome.succeeded());
        assert_eq!(outcome.next_delay, Duration::from_secs(5 * 60));
        assert_eq!(scheduler.state(), SchedulerState::Idle);
    }

    #[tokio::test]
    async fn test_run_sleeps_interval_after_success_and_cooldown_after_failure() {
        let dir = temp_dir();
        let config = config(&dir, &["buildapcsales"]);
        let source = Arc::new(FakeSource {
            panic_on_call: Some(2),
            ..FakeSource::default().with_posts(
                "buildapcsales",
                vec![post("p1", "buildapcsales", "[RAM] DDR5 32GB $89")],
            )
        });
        let notifier = Arc::new(RecordingNotifier::default());
        let clock = Arc::new(FakeClock::stopping_after(3));
        let mut scheduler = Scheduler::new(
            cycle(&config, source.clone(), notifier.clone()),
            clock.clone(),
            notifier,
            settings(),
        );

        tokio::select! {
            _ = scheduler.run() => unreachable!("run never returns"),
            _ = clock.done.notified() => {}
        }

        let interval = Duration::from_secs(30 * 60);
        let cooldown = Duration::from_secs(5 * 60);
        assert_eq!(
            *clock.sleeps.lock().unwrap(),
            vec![interval, cooldown, interval]
        );
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_missing_subreddit_is_skipped_like_transient_failures() {
        struct MissingSub;

        #[async_trait]
        impl PostSource for MissingSub {
            async fn fetch_new(&self, source: &str, _limit: u32) -> Result<Vec<Post>, CoreError> {
                if source == "gone" {
                    return Err(SourceError::SubredditNotFound {
                        subreddit: source.to_string(),
                    }
                    .into());
                }
                Ok(vec![post("p1", source, "[RAM] DDR5 32GB $89")])
            }
        }

        let dir = temp_dir();
        let config = config(&dir, &["gone", "buildapcsales"]);
        let cycle = ScrapeCycle::from_config(
            &config,
            Arc::new(MissingSub),
            Arc::new(RecordingNotifier::default()),
        );
        let report = cycle.run(now()).await.unwrap();

        assert_eq!(report.failed_sources, vec!["gone".to_string()]);
        assert_eq!(report.recorded, 1);
    }
}
