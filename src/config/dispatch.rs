//! Dispatch tuning parameters.
//!
//! The overload cap and score curve are business tuning knobs, so they live
//! here instead of in the aggregator. Load from JSON with
//! [`DispatchConfig::from_json_str`] or from the process environment (and a
//! `.env` file, if present) with [`DispatchConfig::from_env`].

use serde::{Deserialize, Serialize};

use crate::core::task::WorkerRole;

/// Largest UTC offset accepted for the workday window, in minutes.
const MAX_UTC_OFFSET_MINUTES: i32 = 14 * 60;

/// Largest in-memory movement log and inventory journal accepted.
pub const MAX_LOG_CAPACITY: usize = 1 << 20;

/// Workload, assignment and sink settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Workers with this many active tasks or more are not offered work.
    pub overload_cap: u32,
    /// Score of an idle worker.
    pub max_score: u32,
    /// Score lost per active task.
    pub score_decay: u32,
    /// Version-conflict retries before `ConcurrentModification`.
    pub max_commit_retries: u32,
    /// Offset of the site's local day from UTC, in minutes.
    pub utc_offset_minutes: i32,
    /// Role eligible for automatic assignment.
    pub worker_role: WorkerRole,
    /// Capacity of the in-memory movement log and inventory journal.
    pub movement_log_capacity: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            overload_cap: 8,
            max_score: 100,
            score_decay: 10,
            max_commit_retries: 5,
            utc_offset_minutes: 0,
            worker_role: WorkerRole::WarehouseWorker,
            movement_log_capacity: 1024,
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T, String>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| format!("{name}={raw:?} is not valid: {e}"))
}

fn parse_role(raw: &str) -> Result<WorkerRole, String> {
    serde_json::from_value(serde_json::Value::String(raw.trim().to_ascii_lowercase()))
        .map_err(|e| format!("DISPATCH_WORKER_ROLE={raw:?} is not valid: {e}"))
}

impl DispatchConfig {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.overload_cap == 0 {
            return Err("overload_cap must be greater than 0".into());
        }
        if self.max_score == 0 {
            return Err("max_score must be greater than 0".into());
        }
        if self.max_commit_retries == 0 {
            return Err("max_commit_retries must be greater than 0".into());
        }
        if self.utc_offset_minutes.abs() > MAX_UTC_OFFSET_MINUTES {
            return Err(format!(
                "utc_offset_minutes must be within ±{MAX_UTC_OFFSET_MINUTES}"
            ));
        }
        if self.movement_log_capacity > MAX_LOG_CAPACITY {
            return Err(format!(
                "movement_log_capacity must be at most {MAX_LOG_CAPACITY}"
            ));
        }
        Ok(())
    }

    /// Parse configuration from a JSON string and validate.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load overrides from the environment, reading `.env` first if present.
    ///
    /// Recognized variables: `DISPATCH_OVERLOAD_CAP`, `DISPATCH_MAX_SCORE`,
    /// `DISPATCH_SCORE_DECAY`, `DISPATCH_COMMIT_RETRIES`,
    /// `DISPATCH_UTC_OFFSET_MINUTES`, `DISPATCH_WORKER_ROLE`. Unset variables
    /// keep their defaults.
    pub fn from_env() -> Result<Self, String> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source and validate.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let mut cfg = Self::default();
        if let Some(raw) = lookup("DISPATCH_OVERLOAD_CAP") {
            cfg.overload_cap = parse_var("DISPATCH_OVERLOAD_CAP", &raw)?;
        }
        if let Some(raw) = lookup("DISPATCH_MAX_SCORE") {
            cfg.max_score = parse_var("DISPATCH_MAX_SCORE", &raw)?;
        }
        if let Some(raw) = lookup("DISPATCH_SCORE_DECAY") {
            cfg.score_decay = parse_var("DISPATCH_SCORE_DECAY", &raw)?;
        }
        if let Some(raw) = lookup("DISPATCH_COMMIT_RETRIES") {
            cfg.max_commit_retries = parse_var("DISPATCH_COMMIT_RETRIES", &raw)?;
        }
        if let Some(raw) = lookup("DISPATCH_UTC_OFFSET_MINUTES") {
            cfg.utc_offset_minutes = parse_var("DISPATCH_UTC_OFFSET_MINUTES", &raw)?;
        }
        if let Some(raw) = lookup("DISPATCH_WORKER_ROLE") {
            cfg.worker_role = parse_role(&raw)?;
        }
        cfg.validate()?;
        Ok(cfg)
    }

    /// Availability score for a worker carrying `total_tasks` active tasks.
    ///
    /// Linear decay from `max_score`, clamped at zero.
    pub fn availability_score(&self, total_tasks: u64) -> u32 {
        let penalty = total_tasks.saturating_mul(u64::from(self.score_decay));
        let score = u64::from(self.max_score).saturating_sub(penalty);
        u32::try_from(score).unwrap_or(self.max_score)
    }
}
