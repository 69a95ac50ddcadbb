//! Application configuration.
//!
//! Settings come from a TOML file where every section is optional and falls
//! back to the values the scraper has always shipped with. Reddit and webhook
//! secrets are read from the environment (a `.env` file is loaded by the binary).

use crate::classify::{Classifier, PartKeywordTable, TargetModelList};
use crate::error::ConfigError;
use crate::filter::{ExcludedFlairSet, PostFilter};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

pub const CONFIG_PATH_ENV: &str = "DEALWATCH_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "dealwatch.toml";
/// Upper bound for `matching.retention_days`, about a century.
pub const MAX_RETENTION_DAYS: i64 = 36_500;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub reddit: RedditConfig,
    pub sources: SourcesConfig,
    pub schedule: ScheduleConfig,
    pub matching: MatchingConfig,
    pub storage: StorageConfig,
    pub notify: NotifyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedditConfig {
    pub user_agent: String,
    pub timeout_secs: u64,
    #[serde(skip_serializing)]
    pub client_id: Option<String>,
    #[serde(skip_serializing)]
    pub client_secret: Option<String>,
    #[serde(skip_serializing)]
    pub username: Option<String>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
}

impl Default for RedditConfig {
    fn default() -> Self {
        Self {
            user_agent: "dealwatch/0.1".to_string(),
            timeout_secs: 30,
            client_id: None,
            client_secret: None,
            username: None,
            password: None,
        }
    }
}

impl RedditConfig {
    /// All four script-app credentials are present.
    pub fn has_credentials(&self) -> bool {
        self.client_id.is_some()
            && self.client_secret.is_some()
            && self.username.is_some()
            && self.password.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    pub subreddits: Vec<String>,
    pub fetch_limit: u32,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            subreddits: ["buildapcsales", "hardwareswap", "techdeals", "pcdeals"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            fetch_limit: 50,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub interval_minutes: u64,
    pub error_cooldown_minutes: u64,
    /// Completed cycles between digests; 48 × 30 min is roughly a day.
    pub digest_every_cycles: u32,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_minutes: 30,
            error_cooldown_minutes: 5,
            digest_every_cycles: 48,
        }
    }
}

impl ScheduleConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes * 60)
    }

    pub fn error_cooldown(&self) -> Duration {
        Duration::from_secs(self.error_cooldown_minutes * 60)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryKeywords {
    pub name: String,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    pub retention_days: i64,
    /// Listed in priority order.
    pub categories: Vec<CategoryKeywords>,
    pub target_models: Vec<String>,
    pub excluded_flairs: Vec<String>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn category(name: &str, keywords: &[&str]) -> CategoryKeywords {
    CategoryKeywords {
        name: name.to_string(),
        keywords: strings(keywords),
    }
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            retention_days: 30,
            categories: vec![
                category(
                    "GPU",
                    &[
                        "gpu", "4070", "4080", "7800", "7900", "9070", "5080", "5070", "3080",
                        "3090",
                    ],
                ),
                category(
                    "CPU",
                    &[
                        "cpu", "7800x3d", "7700x", "7950x3d", "7900x3d", "14700k", "14900K",
                        "14600K",
                    ],
                ),
                category(
                    "SSD",
                    &["ssd", "nvme", "sn850", "990", "980", "p5", "rocket 4"],
                ),
                category(
                    "Motherboard",
                    &[
                        "mobo",
                        "motherboard",
                        "mb",
                        "am5",
                        "x670",
                        "b650",
                        "b650e",
                        "z790",
                        "atx",
                        "tomahawk",
                    ],
                ),
                category("RAM", &["ram", "ddr5", "ddr4", "32gb", "64gb"]),
                category("Case Fan", &["case fan", "120mm", "140mm", "pwm"]),
                category(
                    "CPU Cooler",
                    &[
                        "cooler", "cpu fan", "noctua", "liquid", "aio", "air", "peerless",
                    ],
                ),
                category(
                    "HDD",
                    &[
                        "nas",
                        "hdd",
                        "ironwolf",
                        "hard drive",
                        "wd red",
                        "red plus",
                        "red pro",
                    ],
                ),
                category("Monitor", &["4k"]),
            ],
            target_models: strings(&[
                "7800x3d",
                "7900xt",
                "9070",
                "990 pro",
                "980 pro",
                "sn850x",
                "4080 super",
                "14600k",
                "peeless",
                "noctua",
                "tomahawk",
            ]),
            excluded_flairs: strings(&[
                "closed",
                "trading",
                "buying",
                "expired :table_flip:",
                "phone",
                "watch",
                "home",
            ]),
        }
    }
}

impl MatchingConfig {
    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::days(self.retention_days)
    }

    pub fn classifier(&self) -> Classifier {
        Classifier::new(
            PartKeywordTable::from_categories(&self.categories),
            TargetModelList::new(&self.target_models),
        )
    }

    pub fn post_filter(&self) -> PostFilter {
        PostFilter::new(
            self.retention(),
            ExcludedFlairSet::new(&self.excluded_flairs),
        )
    }

    pub fn category_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::with_capacity(self.categories.len());
        for category in &self.categories {
            if !names.contains(&category.name) {
                names.push(category.name.clone());
            }
        }
        names
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub seen_ids_path: PathBuf,
    pub ledger_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            seen_ids_path: PathBuf::from("seen_ids.txt"),
            ledger_path: PathBuf::from("deals.csv"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    pub desktop: bool,
    pub webhook_url: Option<String>,
    /// Mailbox that sends and receives alerts and the digest.
    pub email_address: Option<String>,
    #[serde(skip_serializing)]
    pub email_password: Option<String>,
    /// SMTPS relay, implicit TLS.
    pub smtp_host: String,
    pub smtp_port: u16,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            desktop: false,
            webhook_url: None,
            email_address: None,
            email_password: None,
            smtp_host: "smtp.gmail.com".to_string(),
            smtp_port: 465,
        }
    }
}

impl NotifyConfig {
    pub fn has_email(&self) -> bool {
        self.email_address.is_some() && self.email_password.is_some()
    }
}

impl AppConfig {
    /// Loads `path`, or the defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let raw = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
                path: path.display().to_string(),
            })?;
            info!("Loaded configuration from {}", path.display());
            Self::from_toml_str(&raw)?
        } else {
            info!(
                "No configuration file at {}, using built-in defaults",
                path.display()
            );
            Self::default()
        };

        config.apply_env(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// Overlays secrets and endpoints from environment variables.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(v) = non_empty("CLIENT_ID") {
            self.reddit.client_id = Some(v);
        }
        if let Some(v) = non_empty("CLIENT_SECRET") {
            self.reddit.client_secret = Some(v);
        }
        if let Some(v) = non_empty("USERNAME") {
            self.reddit.username = Some(v);
        }
        if let Some(v) = non_empty("PASSWORD") {
            self.reddit.password = Some(v);
        }
        if let Some(v) = non_empty("USER_AGENT") {
            self.reddit.user_agent = v;
        }
        if let Some(v) = non_empty("WEBHOOK_URL") {
            self.notify.webhook_url = Some(v);
        }
        if let Some(v) = non_empty("EMAIL_ADDRESS") {
            self.notify.email_address = Some(v);
        }
        if let Some(v) = non_empty("EMAIL_PASSWORD") {
            self.notify.email_password = Some(v);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sources.subreddits.is_empty() {
            return Err(ConfigError::MissingField {
                field: "sources.subreddits".to_string(),
            });
        }
        if self.sources.fetch_limit == 0 {
            return Err(invalid("sources.fetch_limit", self.sources.fetch_limit));
        }
        if self.schedule.interval_minutes == 0 {
            return Err(invalid(
                "schedule.interval_minutes",
                self.schedule.interval_minutes,
            ));
        }
        if self.schedule.error_cooldown_minutes == 0 {
            return Err(invalid(
                "schedule.error_cooldown_minutes",
                self.schedule.error_cooldown_minutes,
            ));
        }
        if self.schedule.error_cooldown_minutes >= self.schedule.interval_minutes {
            return Err(ConfigError::ValidationFailed {
                reason: "error cooldown must be shorter than the polling interval".to_string(),
            });
        }
        if self.schedule.digest_every_cycles == 0 {
            return Err(invalid(
                "schedule.digest_every_cycles",
                self.schedule.digest_every_cycles,
            ));
        }
        if !(1..=MAX_RETENTION_DAYS).contains(&self.matching.retention_days) {
            return Err(invalid(
                "matching.retention_days",
                self.matching.retention_days,
            ));
        }
        if self.matching.categories.is_empty() {
            return Err(ConfigError::MissingField {
                field: "matching.categories".to_string(),
            });
        }
        if let Some(empty) = self
            .matching
            .categories
            .iter()
            .find(|c| c.name.trim().is_empty() || c.keywords.is_empty())
        {
            return Err(ConfigError::ValidationFailed {
                reason: format!("category '{}' needs a name and keywords", empty.name),
            });
        }
        Ok(())
    }
}

fn invalid(field: &str, value: impl ToString) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
    }
}
