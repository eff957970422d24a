//! Typed rule schemas for the five rule files.
//!
//! Each rule file holds a JSON array of one schema. The core treats a
//! [`RuleSet`] as an opaque, comparable value; the schemas exist so the
//! codecs can decode, validate and re-encode the arrays.

mod authority;
mod degrade;
mod flow;
mod kind;
mod param_flow;
mod rule_set;
mod system;

pub use authority::*;
pub use degrade::*;
pub use flow::*;
pub use kind::*;
pub use param_flow::*;
pub use rule_set::*;
pub use system::*;
