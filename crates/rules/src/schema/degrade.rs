//! Circuit-breaking (degrade) rule.

use serde::{Deserialize, Serialize};

use super::rule_set::{check_non_negative, check_range, default_limit_app};
use super::{RuleKind, RuleSchema, RuleSet};

/// Opens a circuit for `time_window` seconds once the breaker threshold trips.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DegradeRule {
    pub resource: String,
    #[serde(default = "default_limit_app")]
    pub limit_app: String,
    /// 0 = slow-request ratio, 1 = exception ratio, 2 = exception count.
    #[serde(default)]
    pub grade: i32,
    #[serde(default)]
    pub count: f64,
    /// Seconds the breaker stays open.
    #[serde(default)]
    pub time_window: i32,
    #[serde(default = "default_min_request_amount")]
    pub min_request_amount: i32,
    #[serde(default = "default_slow_ratio_threshold")]
    pub slow_ratio_threshold: f64,
    #[serde(default = "default_stat_interval_ms")]
    pub stat_interval_ms: i32,
}

fn default_min_request_amount() -> i32 {
    5
}

fn default_slow_ratio_threshold() -> f64 {
    1.0
}

fn default_stat_interval_ms() -> i32 {
    1000
}

impl DegradeRule {
    /// An exception-count breaker with every other field at its default.
    pub fn exception_count(resource: impl Into<String>, count: f64, time_window: i32) -> Self {
        Self {
            resource: resource.into(),
            limit_app: default_limit_app(),
            grade: 2,
            count,
            time_window,
            min_request_amount: default_min_request_amount(),
            slow_ratio_threshold: default_slow_ratio_threshold(),
            stat_interval_ms: default_stat_interval_ms(),
        }
    }
}

impl RuleSchema for DegradeRule {
    const KIND: RuleKind = RuleKind::Degrade;

    fn validate(&self) -> Result<(), String> {
        if self.resource.trim().is_empty() {
            return Err("resource must not be empty".to_string());
        }
        check_range("grade", self.grade, 0, 2)?;
        check_non_negative("count", self.count)?;
        if self.time_window <= 0 {
            return Err(format!("timeWindow must be positive, got {}", self.time_window));
        }
        if self.min_request_amount <= 0 || self.stat_interval_ms <= 0 {
            return Err("minRequestAmount and statIntervalMs must be positive".to_string());
        }
        match self.grade {
            0 => {
                check_non_negative("slowRatioThreshold", self.slow_ratio_threshold)?;
                if self.slow_ratio_threshold > 1.0 {
                    return Err("slowRatioThreshold must be within [0, 1]".to_string());
                }
            }
            1 if self.count > 1.0 => {
                return Err("exception ratio count must be within [0, 1]".to_string());
            }
            _ => {}
        }
        Ok(())
    }

    fn into_set(rules: Vec<Self>) -> RuleSet {
        RuleSet::Degrade(rules)
    }

    fn from_set(set: &RuleSet) -> Option<&[Self]> {
        set.as_degrade()
    }
}
