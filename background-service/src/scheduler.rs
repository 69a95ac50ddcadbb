use crate::clock::Clock;
use crate::cycle::{CycleReport, ScrapeCycle};
use crate::notifier::Notifier;
use dealwatch_core::{AppConfig, CoreError, ErrorExt, ErrorReporter, NotificationError};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
}

/// Result of one [`Scheduler::tick`].
#[derive(Debug)]
pub struct TickOutcome {
    /// `None` when the cycle failed or panicked.
    pub report: Option<CycleReport>,
    pub next_delay: Duration,
    pub digest_sent: bool,
}

impl TickOutcome {
    pub fn succeeded(&self) -> bool {
        self.report.is_some()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ScheduleSettings {
    pub interval: Duration,
    pub error_cooldown: Duration,
    pub digest_every_cycles: u32,
}

impl ScheduleSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            interval: config.schedule.interval(),
            error_cooldown: config.schedule.error_cooldown(),
            digest_every_cycles: config.schedule.digest_every_cycles,
        }
    }
}

/// Runs scrape cycles back to back, one at a time, and sends the periodic digest.
pub struct Scheduler {
    cycle: ScrapeCycle,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn Notifier>,
    settings: ScheduleSettings,
    completed_cycles: u32,
    state: SchedulerState,
    reporter: ErrorReporter,
}

impl Scheduler {
    pub fn new(
        cycle: ScrapeCycle,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn Notifier>,
        settings: ScheduleSettings,
    ) -> Self {
        Self {
            cycle,
            clock,
            notifier,
            settings,
            completed_cycles: 0,
            state: SchedulerState::Idle,
            reporter: ErrorReporter::new(),
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Successful cycles since the last digest.
    pub fn completed_cycles(&self) -> u32 {
        self.completed_cycles
    }

    pub async fn tick(&mut self) -> TickOutcome {
        self.state = SchedulerState::Running;
        let now = self.clock.now();
        let result = AssertUnwindSafe(self.cycle.run(now)).catch_unwind().await;
        self.state = SchedulerState::Idle;

        let report = match result {
            Ok(Ok(report)) => report,
            Ok(Err(e)) => {
                self.reporter.report_error(&e);
                return self.failed(Some(&e));
            }
            Err(panic) => {
                error!("Scrape cycle panicked: {}", panic_message(panic.as_ref()));
                return self.failed(None);
            }
        };

        self.completed_cycles += 1;
        let mut digest_sent = false;
        if self.completed_cycles >= self.settings.digest_every_cycles {
            self.completed_cycles = 0;
            digest_sent = self.send_digest().await;
        }

        TickOutcome {
            report: Some(report),
            next_delay: self.settings.interval,
            digest_sent,
        }
    }

    /// Ticks forever. Cancel by dropping the future.
    pub async fn run(&mut self) {
        info!(
            "Scheduler started: every {:?}, cooldown {:?}, digest every {} cycles",
            self.settings.interval, self.settings.error_cooldown, self.settings.digest_every_cycles
        );
        loop {
            let outcome = self.tick().await;
            self.clock.sleep(outcome.next_delay).await;
        }
    }

    fn failed(&self, error: Option<&CoreError>) -> TickOutcome {
        let cooldown = self.settings.error_cooldown;
        match error {
            Some(e) if e.is_transient() => {
                warn!("Cycle failed ({}), retrying in {:?}", e.error_code(), cooldown)
            }
            Some(e) => warn!(
                "Cycle failed ({}) and will likely fail again until fixed; retrying in {:?}",
                e.error_code(),
                cooldown
            ),
            None => warn!("Cycle failed, retrying in {:?}", cooldown),
        }
        if let Some(wait) = error.and_then(|e| e.retry_after()) {
            if wait > cooldown {
                warn!("Source asked for {:?}, longer than the cooldown", wait);
            }
        }
        TickOutcome {
            report: None,
            next_delay: self.settings.error_cooldown,
            digest_sent: false,
        }
    }

    async fn send_digest(&self) -> bool {
        let snapshot = match self.cycle.ledger().snapshot().await {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => {
                let path = self.cycle.ledger().path().display();
                let e = NotificationError::DigestUnavailable {
                    reason: format!("{} does not exist yet", path),
                };
                self.reporter.report_warning(&CoreError::from(e));
                return false;
            }
            Err(e) => {
                self.reporter.report_warning(&CoreError::from(e));
                return false;
            }
        };

        match self.notifier.digest(&snapshot).await {
            Ok(()) => {
                info!("Digest sent with {} deals", snapshot.row_count);
                true
            }
            Err(e) => {
                self.reporter.report_warning(&CoreError::from(e));
                false
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
