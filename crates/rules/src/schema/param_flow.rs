//! Hot-parameter flow rule.

use serde::{Deserialize, Serialize};

use super::rule_set::{check_non_negative, check_range, default_limit_app};
use super::{RuleKind, RuleSchema, RuleSet};

/// Per-argument-value limiting for the `param_idx`-th call argument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParamFlowRule {
    pub resource: String,
    #[serde(default = "default_limit_app")]
    pub limit_app: String,
    #[serde(default = "default_grade")]
    pub grade: i32,
    #[serde(default)]
    pub param_idx: Option<i32>,
    #[serde(default)]
    pub count: f64,
    #[serde(default)]
    pub control_behavior: i32,
    #[serde(default)]
    pub max_queueing_time_ms: i32,
    #[serde(default)]
    pub burst_count: i32,
    #[serde(default = "default_duration_in_sec")]
    pub duration_in_sec: i64,
    #[serde(default)]
    pub param_flow_item_list: Vec<ParamFlowItem>,
    #[serde(default)]
    pub cluster_mode: bool,
}

/// Threshold override for one specific argument value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParamFlowItem {
    pub object: String,
    #[serde(default)]
    pub class_type: String,
    #[serde(default)]
    pub count: i32,
}

fn default_grade() -> i32 {
    1
}

fn default_duration_in_sec() -> i64 {
    1
}

impl RuleSchema for ParamFlowRule {
    const KIND: RuleKind = RuleKind::ParamFlow;

    fn validate(&self) -> Result<(), String> {
        if self.resource.trim().is_empty() {
            return Err("resource must not be empty".to_string());
        }
        check_non_negative("count", self.count)?;
        check_range("grade", self.grade, 0, 1)?;
        check_range("controlBehavior", self.control_behavior, 0, 2)?;
        match self.param_idx {
            None => return Err("paramIdx is required".to_string()),
            Some(idx) if idx < 0 => return Err(format!("paramIdx must be >= 0, got {}", idx)),
            Some(_) => {}
        }
        if self.duration_in_sec <= 0 {
            return Err(format!("durationInSec must be positive, got {}", self.duration_in_sec));
        }
        if self.burst_count < 0 || self.max_queueing_time_ms < 0 {
            return Err("burstCount and maxQueueingTimeMs must be >= 0".to_string());
        }
        if let Some(item) = self.param_flow_item_list.iter().find(|i| i.count < 0) {
            return Err(format!("item '{}' has a negative count", item.object));
        }
        Ok(())
    }

    fn into_set(rules: Vec<Self>) -> RuleSet {
        RuleSet::ParamFlow(rules)
    }

    fn from_set(set: &RuleSet) -> Option<&[Self]> {
        set.as_param_flow()
    }
}
