//! Closed union of per-kind rule lists and the trait every rule schema implements.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{AuthorityRule, DegradeRule, FlowRule, ParamFlowRule, RuleKind, SystemRule};

/// A typed rule schema stored in one rule file.
pub trait RuleSchema:
    Serialize + DeserializeOwned + Clone + PartialEq + fmt::Debug + Send + Sync + 'static
{
    /// Kind (and therefore file) this schema belongs to.
    const KIND: RuleKind;

    /// Check a single rule. The message names the offending field.
    fn validate(&self) -> Result<(), String>;

    /// Wrap a typed list into its [`RuleSet`] variant.
    fn into_set(rules: Vec<Self>) -> RuleSet;

    /// Borrow the typed list if `set` is this schema's variant.
    fn from_set(set: &RuleSet) -> Option<&[Self]>;
}

/// The complete rule list for one kind. Always replaced whole, never merged.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleSet {
    Flow(Vec<FlowRule>),
    Degrade(Vec<DegradeRule>),
    System(Vec<SystemRule>),
    Authority(Vec<AuthorityRule>),
    ParamFlow(Vec<ParamFlowRule>),
}

impl RuleSet {
    /// The "no rules configured" value for a kind.
    pub fn empty(kind: RuleKind) -> Self {
        match kind {
            RuleKind::Flow => RuleSet::Flow(Vec::new()),
            RuleKind::Degrade => RuleSet::Degrade(Vec::new()),
            RuleKind::System => RuleSet::System(Vec::new()),
            RuleKind::Authority => RuleSet::Authority(Vec::new()),
            RuleKind::ParamFlow => RuleSet::ParamFlow(Vec::new()),
        }
    }

    pub fn kind(&self) -> RuleKind {
        match self {
            RuleSet::Flow(_) => RuleKind::Flow,
            RuleSet::Degrade(_) => RuleKind::Degrade,
            RuleSet::System(_) => RuleKind::System,
            RuleSet::Authority(_) => RuleKind::Authority,
            RuleSet::ParamFlow(_) => RuleKind::ParamFlow,
        }
    }

    /// Number of rules in the set.
    pub fn len(&self) -> usize {
        match self {
            RuleSet::Flow(rules) => rules.len(),
            RuleSet::Degrade(rules) => rules.len(),
            RuleSet::System(rules) => rules.len(),
            RuleSet::Authority(rules) => rules.len(),
            RuleSet::ParamFlow(rules) => rules.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Typed view for any schema; `None` if the kinds differ.
    pub fn rules<T: RuleSchema>(&self) -> Option<&[T]> {
        T::from_set(self)
    }

    pub fn as_flow(&self) -> Option<&[FlowRule]> {
        match self {
            RuleSet::Flow(rules) => Some(rules),
            _ => None,
        }
    }

    pub fn as_degrade(&self) -> Option<&[DegradeRule]> {
        match self {
            RuleSet::Degrade(rules) => Some(rules),
            _ => None,
        }
    }

    pub fn as_system(&self) -> Option<&[SystemRule]> {
        match self {
            RuleSet::System(rules) => Some(rules),
            _ => None,
        }
    }

    pub fn as_authority(&self) -> Option<&[AuthorityRule]> {
        match self {
            RuleSet::Authority(rules) => Some(rules),
            _ => None,
        }
    }

    pub fn as_param_flow(&self) -> Option<&[ParamFlowRule]> {
        match self {
            RuleSet::ParamFlow(rules) => Some(rules),
            _ => None,
        }
    }
}

impl<T: RuleSchema> From<Vec<T>> for RuleSet {
    fn from(rules: Vec<T>) -> Self {
        T::into_set(rules)
    }
}

pub(crate) fn default_limit_app() -> String {
    "default".to_string()
}

/// Thresholds must be representable in JSON and never negative.
pub(crate) fn check_non_negative(field: &str, value: f64) -> Result<(), String> {
    if !value.is_finite() {
        return Err(format!("{} must be a finite number", field));
    }
    if value < 0.0 {
        return Err(format!("{} must be >= 0, got {}", field, value));
    }
    Ok(())
}

pub(crate) fn check_range(field: &str, value: i32, min: i32, max: i32) -> Result<(), String> {
    if value < min || value > max {
        return Err(format!("{} must be within [{}, {}], got {}", field, min, max, value));
    }
    Ok(())
}
