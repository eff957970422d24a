//! Flow-control (QPS / concurrency) rule.

use serde::{Deserialize, Serialize};

use super::rule_set::{check_non_negative, check_range, default_limit_app};
use super::{RuleKind, RuleSchema, RuleSet};

/// Limits traffic to a resource by QPS or by concurrent thread count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowRule {
    pub resource: String,
    #[serde(default = "default_limit_app")]
    pub limit_app: String,
    /// 0 = thread count, 1 = QPS.
    #[serde(default = "default_grade")]
    pub grade: i32,
    #[serde(default)]
    pub count: f64,
    /// 0 = direct, 1 = relate, 2 = chain.
    #[serde(default)]
    pub strategy: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ref_resource: Option<String>,
    /// 0 = reject, 1 = warm up, 2 = rate limiter, 3 = warm up + rate limiter.
    #[serde(default)]
    pub control_behavior: i32,
    #[serde(default = "default_warm_up_period_sec")]
    pub warm_up_period_sec: i32,
    #[serde(default = "default_max_queueing_time_ms")]
    pub max_queueing_time_ms: i32,
    #[serde(default)]
    pub cluster_mode: bool,
}

fn default_grade() -> i32 {
    1
}

fn default_warm_up_period_sec() -> i32 {
    10
}

fn default_max_queueing_time_ms() -> i32 {
    500
}

impl FlowRule {
    /// A QPS rule with every other field at its default.
    pub fn qps(resource: impl Into<String>, count: f64) -> Self {
        Self {
            resource: resource.into(),
            limit_app: default_limit_app(),
            grade: default_grade(),
            count,
            strategy: 0,
            ref_resource: None,
            control_behavior: 0,
            warm_up_period_sec: default_warm_up_period_sec(),
            max_queueing_time_ms: default_max_queueing_time_ms(),
            cluster_mode: false,
        }
    }
}

impl RuleSchema for FlowRule {
    const KIND: RuleKind = RuleKind::Flow;

    fn validate(&self) -> Result<(), String> {
        if self.resource.trim().is_empty() {
            return Err("resource must not be empty".to_string());
        }
        check_non_negative("count", self.count)?;
        check_range("grade", self.grade, 0, 1)?;
        check_range("strategy", self.strategy, 0, 2)?;
        check_range("controlBehavior", self.control_behavior, 0, 3)?;
        if self.strategy != 0 && self.ref_resource.as_deref().map_or(true, str::is_empty) {
            return Err("refResource is required for relate and chain strategies".to_string());
        }
        Ok(())
    }

    fn into_set(rules: Vec<Self>) -> RuleSet {
        RuleSet::Flow(rules)
    }

    fn from_set(set: &RuleSet) -> Option<&[Self]> {
        set.as_flow()
    }
}
