//! System-adaptive protection rule.

use serde::{Deserialize, Serialize};

use super::{RuleKind, RuleSchema, RuleSet};

/// Process-wide load shedding thresholds. A negative value means "not set".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemRule {
    #[serde(default = "unset_f64")]
    pub highest_system_load: f64,
    #[serde(default = "unset_f64")]
    pub highest_cpu_usage: f64,
    #[serde(default = "unset_f64")]
    pub qps: f64,
    #[serde(default = "unset_i64")]
    pub avg_rt: i64,
    #[serde(default = "unset_i64")]
    pub max_thread: i64,
}

fn unset_f64() -> f64 {
    -1.0
}

fn unset_i64() -> i64 {
    -1
}

impl Default for SystemRule {
    fn default() -> Self {
        Self {
            highest_system_load: unset_f64(),
            highest_cpu_usage: unset_f64(),
            qps: unset_f64(),
            avg_rt: unset_i64(),
            max_thread: unset_i64(),
        }
    }
}

impl RuleSchema for SystemRule {
    const KIND: RuleKind = RuleKind::System;

    fn validate(&self) -> Result<(), String> {
        for (name, value) in [
            ("highestSystemLoad", self.highest_system_load),
            ("highestCpuUsage", self.highest_cpu_usage),
            ("qps", self.qps),
        ] {
            if !value.is_finite() {
                return Err(format!("{} must be a finite number", name));
            }
        }
        if self.highest_cpu_usage > 1.0 {
            return Err(format!(
                "highestCpuUsage must be within [0, 1], got {}",
                self.highest_cpu_usage
            ));
        }
        Ok(())
    }

    fn into_set(rules: Vec<Self>) -> RuleSet {
        RuleSet::System(rules)
    }

    fn from_set(set: &RuleSet) -> Option<&[Self]> {
        set.as_system()
    }
}
