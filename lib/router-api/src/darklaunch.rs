//! Dark launch policy documents pushed by the governance store

use crate::rule::{Condition, FULL_WEIGHT};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while reading a dark launch policy
#[derive(Error, Debug)]
pub enum PolicyError {
    #[error("Malformed policy JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid policy: {0}")]
    Invalid(String),
}

/// DarkLaunchPolicy is the governance representation of the routing for one key
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DarkLaunchPolicy {
    /// Policy kind; when omitted each entry decides for itself
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_type: Option<PolicyType>,

    /// Rule entries in evaluation order
    #[serde(default)]
    pub rules: Vec<PolicyRule>,
}

/// Kind of dark launch policy
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum PolicyType {
    /// Split traffic by percentage
    Rate,
    /// Route traffic by request condition
    Rule,
}

/// One entry of a dark launch policy
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PolicyRule {
    /// Destination tag or version
    pub tag: String,

    /// Percentage of traffic (0-100)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<u32>,

    /// Condition in `header<op>value` form
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,

    #[serde(default)]
    pub case_insensitive: bool,
}

impl DarkLaunchPolicy {
    /// Parse a policy as published in the governance store.
    ///
    /// A blank string is an unpublished policy and yields no rules.
    pub fn parse(raw: &str) -> Result<Self, PolicyError> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }

        let policy: DarkLaunchPolicy = serde_json::from_str(raw)?;
        policy.validate()?;
        Ok(policy)
    }

    /// Check the entries against the policy type
    pub fn validate(&self) -> Result<(), PolicyError> {
        for (index, rule) in self.rules.iter().enumerate() {
            if rule.tag.trim().is_empty() {
                return Err(PolicyError::Invalid(format!("rule {} has an empty tag", index)));
            }

            if let Some(weight) = rule.weight {
                if weight > FULL_WEIGHT {
                    return Err(PolicyError::Invalid(format!(
                        "rule {} weight {} exceeds {}",
                        index, weight, FULL_WEIGHT
                    )));
                }
            }

            match self.policy_type {
                Some(PolicyType::Rate) if rule.weight.is_none() => {
                    return Err(PolicyError::Invalid(format!(
                        "rule {} of a RATE policy has no weight",
                        index
                    )));
                }
                Some(PolicyType::Rule) if rule.condition.is_none() => {
                    return Err(PolicyError::Invalid(format!(
                        "rule {} of a RULE policy has no condition",
                        index
                    )));
                }
                _ => {}
            }
        }

        Ok(())
    }
}
