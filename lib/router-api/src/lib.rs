//! Route rule types shared by the rule sources and the downstream router
//!
//! This library defines:
//! - RouteRule: a destination tag with a weight or a match predicate
//! - DarkLaunchPolicy: the governance-pushed policy document for one key
//! - RouterConfig: the static router section of the local configuration

pub mod config;
pub mod darklaunch;
pub mod rule;

pub use config::{Destinations, RouterConfig};
pub use darklaunch::{DarkLaunchPolicy, PolicyError, PolicyRule, PolicyType};
pub use rule::{Condition, MatchOperator, RouteMatch, RouteRule, FULL_WEIGHT};

use schemars::schema::RootSchema;

/// JSON schema of the dark launch policy document
pub fn policy_schema() -> RootSchema {
    schemars::schema_for!(DarkLaunchPolicy)
}
