//! Property-based tests for the codecs.
//!
//! Every valid rule set of every kind must decode back to exactly the value
//! that was encoded, including arbitrary `f64` thresholds.

use proptest::prelude::*;
use proptest::test_runner::TestCaseError;

use crate::schema::{
    AuthorityRule, DegradeRule, FlowRule, ParamFlowItem, ParamFlowRule, RuleSet, SystemRule,
};

use super::codec::codec_for;

// ============================================================================
// Strategies
// ============================================================================

fn arb_name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_./-]{0,15}"
}

/// Finite, non-negative thresholds: plain decimals plus arbitrary bit patterns.
fn arb_threshold() -> impl Strategy<Value = f64> {
    prop_oneof![
        (0u64..1_000_000_000).prop_map(|n| n as f64 / 997.0),
        0.0..1e12f64,
        prop::num::f64::POSITIVE
            | prop::num::f64::NORMAL
            | prop::num::f64::SUBNORMAL
            | prop::num::f64::ZERO,
    ]
}

fn arb_ratio() -> impl Strategy<Value = f64> {
    0.0..=1.0f64
}

fn arb_flow_rule() -> impl Strategy<Value = FlowRule> {
    (
        arb_name(),
        arb_name(),
        0..=1i32,
        arb_threshold(),
        0..=2i32,
        arb_name(),
        0..=3i32,
        any::<i32>(),
        any::<i32>(),
        any::<bool>(),
    )
        .prop_map(
            |(
                resource,
                limit_app,
                grade,
                count,
                strategy,
                reference,
                control_behavior,
                warm_up_period_sec,
                max_queueing_time_ms,
                cluster_mode,
            )| FlowRule {
                resource,
                limit_app,
                grade,
                count,
                strategy,
                ref_resource: (strategy != 0).then_some(reference),
                control_behavior,
                warm_up_period_sec,
                max_queueing_time_ms,
                cluster_mode,
            },
        )
}

fn arb_degrade_rule() -> impl Strategy<Value = DegradeRule> {
    (
        arb_name(),
        arb_name(),
        0..=2i32,
        arb_threshold(),
        arb_ratio(),
        1..i32::MAX,
        1..i32::MAX,
        arb_ratio(),
        1..i32::MAX,
    )
        .prop_map(
            |(
                resource,
                limit_app,
                grade,
                threshold,
                ratio,
                time_window,
                min_request_amount,
                slow_ratio_threshold,
                stat_interval_ms,
            )| DegradeRule {
                resource,
                limit_app,
                grade,
                // Exception-ratio breakers take a ratio as their count.
                count: if grade == 1 { ratio } else { threshold },
                time_window,
                min_request_amount,
                slow_ratio_threshold,
                stat_interval_ms,
            },
        )
}

fn arb_system_rule() -> impl Strategy<Value = SystemRule> {
    (
        prop_oneof![Just(-1.0), arb_threshold()],
        prop_oneof![Just(-1.0), arb_ratio()],
        prop_oneof![Just(-1.0), arb_threshold()],
        any::<i64>(),
        any::<i64>(),
    )
        .prop_map(
            |(highest_system_load, highest_cpu_usage, qps, avg_rt, max_thread)| SystemRule {
                highest_system_load,
                highest_cpu_usage,
                qps,
                avg_rt,
                max_thread,
            },
        )
}

fn arb_authority_rule() -> impl Strategy<Value = AuthorityRule> {
    (arb_name(), "[a-z][a-z0-9-]{0,7}(,[a-z][a-z0-9-]{0,7}){0,3}", 0..=1i32).prop_map(
        |(resource, limit_app, strategy)| AuthorityRule {
            resource,
            limit_app,
            strategy,
        },
    )
}

fn arb_param_flow_item() -> impl Strategy<Value = ParamFlowItem> {
    (arb_name(), "(String|int|long)", 0..i32::MAX).prop_map(|(object, class_type, count)| {
        ParamFlowItem {
            object,
            class_type,
            count,
        }
    })
}

fn arb_param_flow_rule() -> impl Strategy<Value = ParamFlowRule> {
    (
        arb_name(),
        arb_name(),
        0..=1i32,
        0..16i32,
        arb_threshold(),
        0..=2i32,
        0..i32::MAX,
        0..i32::MAX,
        1..i64::MAX,
        prop::collection::vec(arb_param_flow_item(), 0..4),
        any::<bool>(),
    )
        .prop_map(
            |(
                resource,
                limit_app,
                grade,
                param_idx,
                count,
                control_behavior,
                max_queueing_time_ms,
                burst_count,
                duration_in_sec,
                param_flow_item_list,
                cluster_mode,
            )| ParamFlowRule {
                resource,
                limit_app,
                grade,
                param_idx: Some(param_idx),
                count,
                control_behavior,
                max_queueing_time_ms,
                burst_count,
                duration_in_sec,
                param_flow_item_list,
                cluster_mode,
            },
        )
}

fn check_roundtrip(set: RuleSet) -> Result<(), TestCaseError> {
    let codec = codec_for(set.kind());
    let bytes = codec
        .encode(&set)
        .map_err(|e| TestCaseError::fail(format!("encode failed: {e}")))?;
    let decoded = codec
        .decode(&bytes)
        .map_err(|e| TestCaseError::fail(format!("decode failed: {e}")))?;
    prop_assert_eq!(decoded, set);
    Ok(())
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn flow_rules_roundtrip(rules in prop::collection::vec(arb_flow_rule(), 0..6)) {
        check_roundtrip(RuleSet::Flow(rules))?;
    }

    #[test]
    fn degrade_rules_roundtrip(rules in prop::collection::vec(arb_degrade_rule(), 0..6)) {
        check_roundtrip(RuleSet::Degrade(rules))?;
    }

    #[test]
    fn system_rules_roundtrip(rules in prop::collection::vec(arb_system_rule(), 0..6)) {
        check_roundtrip(RuleSet::System(rules))?;
    }

    #[test]
    fn authority_rules_roundtrip(rules in prop::collection::vec(arb_authority_rule(), 0..6)) {
        check_roundtrip(RuleSet::Authority(rules))?;
    }

    #[test]
    fn param_flow_rules_roundtrip(rules in prop::collection::vec(arb_param_flow_rule(), 0..6)) {
        check_roundtrip(RuleSet::ParamFlow(rules))?;
    }

    #[test]
    fn decimal_qps_count_is_exact(n in 0u64..1_000_000_000) {
        let count = n as f64 / 997.0;
        check_roundtrip(RuleSet::Flow(vec![FlowRule::qps("r", count)]))?;
    }
}
