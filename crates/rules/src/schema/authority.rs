//! Origin-based access control rule.

use serde::{Deserialize, Serialize};

use super::rule_set::check_range;
use super::{RuleKind, RuleSchema, RuleSet};

/// White or black list of caller origins for one resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorityRule {
    pub resource: String,
    /// Comma-separated origin names.
    #[serde(default)]
    pub limit_app: String,
    /// 0 = white list, 1 = black list.
    #[serde(default)]
    pub strategy: i32,
}

impl AuthorityRule {
    /// Origins named in `limit_app`, trimmed, empties dropped.
    pub fn origins(&self) -> impl Iterator<Item = &str> {
        self.limit_app.split(',').map(str::trim).filter(|s| !s.is_empty())
    }
}

impl RuleSchema for AuthorityRule {
    const KIND: RuleKind = RuleKind::Authority;

    fn validate(&self) -> Result<(), String> {
        if self.resource.trim().is_empty() {
            return Err("resource must not be empty".to_string());
        }
        if self.origins().next().is_none() {
            return Err("limitApp must name at least one origin".to_string());
        }
        check_range("strategy", self.strategy, 0, 1)
    }

    fn into_set(rules: Vec<Self>) -> RuleSet {
        RuleSet::Authority(rules)
    }

    fn from_set(set: &RuleSet) -> Option<&[Self]> {
        set.as_authority()
    }
}
