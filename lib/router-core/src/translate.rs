//! Translation of dark launch policies into route rules

use router_api::{DarkLaunchPolicy, PolicyRule, RouteRule, FULL_WEIGHT};

/// Translate a parsed policy into route rules, one per entry, in declared order
pub fn translate(policy: &DarkLaunchPolicy) -> Vec<RouteRule> {
    policy.rules.iter().map(translate_rule).collect()
}

fn translate_rule(rule: &PolicyRule) -> RouteRule {
    RouteRule {
        tag: rule.tag.clone(),
        weight: rule.weight.unwrap_or(FULL_WEIGHT),
        r#match: rule
            .condition
            .as_ref()
            .map(|condition| condition.to_match(rule.case_insensitive)),
    }
}
