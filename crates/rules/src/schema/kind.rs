//! Rule kind enum: one tag per rule file.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The five categories of traffic-control policy kept in sync with disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuleKind {
    Flow,
    Degrade,
    System,
    Authority,
    ParamFlow,
}

impl RuleKind {
    /// Every kind, in file-creation order.
    pub const ALL: [RuleKind; 5] = [
        RuleKind::Flow,
        RuleKind::Degrade,
        RuleKind::System,
        RuleKind::Authority,
        RuleKind::ParamFlow,
    ];

    /// Fixed file name of this kind's rule file inside the rule root.
    pub fn file_name(self) -> &'static str {
        match self {
            RuleKind::Flow => "flow-rule.json",
            RuleKind::Degrade => "degrade-rule.json",
            RuleKind::System => "system-rule.json",
            RuleKind::Authority => "authority-rule.json",
            RuleKind::ParamFlow => "param-flow-rule.json",
        }
    }

    /// Position of this kind in [`RuleKind::ALL`].
    pub fn index(self) -> usize {
        match self {
            RuleKind::Flow => 0,
            RuleKind::Degrade => 1,
            RuleKind::System => 2,
            RuleKind::Authority => 3,
            RuleKind::ParamFlow => 4,
        }
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleKind::Flow => write!(f, "flow"),
            RuleKind::Degrade => write!(f, "degrade"),
            RuleKind::System => write!(f, "system"),
            RuleKind::Authority => write!(f, "authority"),
            RuleKind::ParamFlow => write!(f, "param-flow"),
        }
    }
}

impl FromStr for RuleKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "flow" => Ok(RuleKind::Flow),
            "degrade" => Ok(RuleKind::Degrade),
            "system" => Ok(RuleKind::System),
            "authority" => Ok(RuleKind::Authority),
            "param-flow" | "hot-param" => Ok(RuleKind::ParamFlow),
            other => Err(format!("unknown rule kind: '{}'", other)),
        }
    }
}
