//! Process configuration, read from environment variables.
//!
//! Every key is the upper-case form of a `Settings` field
//! (`REQUEUE_DELAY_MINUTES` -> `requeue_delay_minutes`). Only
//! `TASK_API_ENDPOINT` is required.

use std::collections::HashMap;
use std::time::Duration;

use config::{Config, Environment};
use serde::Deserialize;

use crate::domain::HeraldError;

/// What the poll handler does when the oracle has no entry for a task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnknownTaskPolicy {
    /// Stop polling: no requeue, no notification.
    #[default]
    Abandon,
    /// Treat the task like a `running` one and poll again later.
    RetryOnUnknown,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueBackend {
    #[default]
    Memory,
    Redis,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// How the SMTP connection is secured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmtpTls {
    /// TLS from the first byte (port 465).
    #[default]
    Implicit,
    /// Plain connection upgraded with STARTTLS (port 587).
    Starttls,
    /// No encryption (port 25). Local relays and test servers only.
    Plain,
}

#[derive(Clone, PartialEq, Eq)]
pub struct SmtpCredentials {
    pub user: String,
    pub pass: String,
}

impl std::fmt::Debug for SmtpCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpCredentials")
            .field("user", &self.user)
            .field("pass", &"<redacted>")
            .finish()
    }
}

/// Resolved SMTP transport settings. `port` overrides the default of `tls`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpSettings {
    pub host: String,
    pub port: Option<u16>,
    pub tls: SmtpTls,
    pub credentials: Option<SmtpCredentials>,
}

fn default_status_path() -> String {
    "/api/label-excel-bg".to_string()
}

fn default_requeue_delay_minutes() -> f64 {
    5.0
}

fn default_grace_period_secs() -> u64 {
    5
}

fn default_workers() -> usize {
    1
}

fn default_queue_prefix() -> String {
    "herald".to_string()
}

fn default_lease_wait_ms() -> u64 {
    1000
}

fn default_store_poll_interval_ms() -> u64 {
    250
}

fn default_mail_from() -> String {
    "Social Listening Auto Labeling <no-reply>".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub task_api_endpoint: String,
    #[serde(default = "default_status_path")]
    pub oracle_status_path: String,
    #[serde(default)]
    pub oracle_timeout_secs: Option<u64>,
    #[serde(default = "default_requeue_delay_minutes")]
    pub requeue_delay_minutes: f64,
    #[serde(default = "default_grace_period_secs")]
    pub grace_period_secs: u64,
    #[serde(default)]
    pub unknown_task_policy: UnknownTaskPolicy,
    #[serde(default)]
    pub transient_retry_limit: u32,
    #[serde(default = "default_workers")]
    pub task_workers: usize,
    #[serde(default = "default_workers")]
    pub notification_workers: usize,
    #[serde(default)]
    pub queue_backend: QueueBackend,
    #[serde(default)]
    pub redis_url: Option<String>,
    #[serde(default = "default_queue_prefix")]
    pub queue_prefix: String,
    #[serde(default = "default_lease_wait_ms")]
    pub lease_wait_ms: u64,
    #[serde(default = "default_store_poll_interval_ms")]
    pub store_poll_interval_ms: u64,
    #[serde(default = "default_mail_from")]
    pub mail_from: String,
    #[serde(default)]
    pub smtp_host: Option<String>,
    #[serde(default)]
    pub smtp_port: Option<u16>,
    #[serde(default)]
    pub smtp_tls: SmtpTls,
    #[serde(default)]
    pub smtp_user: Option<String>,
    #[serde(default)]
    pub smtp_pass: Option<String>,
    #[serde(default)]
    pub log_format: LogFormat,
}

impl Settings {
    /// Load from the process environment. Call `dotenvy::dotenv()` first to
    /// honor a `.env` file.
    pub fn from_env() -> Result<Self, HeraldError> {
        Self::load(Environment::default().try_parsing(true))
    }

    /// Load from an explicit variable map instead of the process environment.
    pub fn from_map(vars: HashMap<String, String>) -> Result<Self, HeraldError> {
        Self::load(Environment::default().try_parsing(true).source(Some(vars)))
    }

    fn load(source: Environment) -> Result<Self, HeraldError> {
        let settings: Settings = Config::builder()
            .add_source(source)
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), HeraldError> {
        if self.task_api_endpoint.trim().is_empty() {
            return Err(HeraldError::InvalidConfig(
                "TASK_API_ENDPOINT must not be empty".into(),
            ));
        }
        if self.queue_backend == QueueBackend::Redis
            && self.redis_url.as_deref().is_none_or(|u| u.trim().is_empty())
        {
            return Err(HeraldError::InvalidConfig(
                "REDIS_URL is required when QUEUE_BACKEND=redis".into(),
            ));
        }
        if self.task_workers == 0 || self.notification_workers == 0 {
            return Err(HeraldError::InvalidConfig(
                "TASK_WORKERS and NOTIFICATION_WORKERS must be at least 1".into(),
            ));
        }
        self.requeue_delay()?;
        self.smtp()?;
        Ok(())
    }

    /// `REQUEUE_DELAY_MINUTES` as a duration. Fractional minutes are kept
    /// (`0.5` is 30 seconds).
    pub fn requeue_delay(&self) -> Result<Duration, HeraldError> {
        minutes_to_duration(self.requeue_delay_minutes)
    }

    /// SMTP transport settings, or `None` when `SMTP_HOST` is unset.
    pub fn smtp(&self) -> Result<Option<SmtpSettings>, HeraldError> {
        let non_empty = |value: &Option<String>| {
            value
                .as_deref()
                .filter(|s| !s.trim().is_empty())
                .map(str::to_string)
        };
        let host = non_empty(&self.smtp_host);
        let user = non_empty(&self.smtp_user);
        let pass = non_empty(&self.smtp_pass);

        let credentials = match (user, pass) {
            (Some(user), Some(pass)) => Some(SmtpCredentials { user, pass }),
            (None, None) => None,
            _ => {
                return Err(HeraldError::InvalidConfig(
                    "SMTP_USER and SMTP_PASS must be set together".into(),
                ));
            }
        };
        match host {
            Some(host) => Ok(Some(SmtpSettings {
                host: host.trim().to_string(),
                port: self.smtp_port,
                tls: self.smtp_tls,
                credentials,
            })),
            None if credentials.is_some() => Err(HeraldError::InvalidConfig(
                "SMTP_USER and SMTP_PASS are set but SMTP_HOST is not".into(),
            )),
            None => Ok(None),
        }
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period_secs)
    }

    pub fn oracle_timeout(&self) -> Option<Duration> {
        self.oracle_timeout_secs.map(Duration::from_secs)
    }

    pub fn lease_wait(&self) -> Duration {
        Duration::from_millis(self.lease_wait_ms)
    }

    pub fn store_poll_interval(&self) -> Duration {
        Duration::from_millis(self.store_poll_interval_ms)
    }

    pub fn poll_policy(&self) -> Result<PollPolicy, HeraldError> {
        Ok(PollPolicy {
            grace_period: self.grace_period(),
            requeue_delay: self.requeue_delay()?,
            unknown_task_policy: self.unknown_task_policy,
            transient_retry_limit: self.transient_retry_limit,
        })
    }
}

fn minutes_to_duration(minutes: f64) -> Result<Duration, HeraldError> {
    if !minutes.is_finite() || minutes < 0.0 {
        return Err(HeraldError::InvalidConfig(format!(
            "REQUEUE_DELAY_MINUTES must be a non-negative number, got {minutes}"
        )));
    }
    Duration::try_from_secs_f64(minutes * 60.0).map_err(|err| {
        HeraldError::InvalidConfig(format!("REQUEUE_DELAY_MINUTES={minutes}: {err}"))
    })
}

/// The knobs the poll handler runs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub grace_period: Duration,
    pub requeue_delay: Duration,
    pub unknown_task_policy: UnknownTaskPolicy,
    pub transient_retry_limit: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            grace_period: Duration::from_secs(default_grace_period_secs()),
            requeue_delay: Duration::from_secs(300),
            unknown_task_policy: UnknownTaskPolicy::Abandon,
            transient_retry_limit: 0,
        }
    }
}
