pub mod clock;
pub mod cycle;
pub mod notifier;
pub mod scheduler;

pub use clock::{Clock, SystemClock};
pub use cycle::{CycleReport, CycleSettings, PostOutcome, ScrapeCycle};
pub use notifier::{
    alert_body, DesktopNotifier, EmailNotifier, LogNotifier, Notifier, NotifierSet, WebhookNotifier,
    ALERT_SUBJECT, DIGEST_SUBJECT,
};
pub use scheduler::{ScheduleSettings, Scheduler, SchedulerState, TickOutcome};

#[cfg(test)]
mod tests;
