use crate::rule::RouteRule;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Routing rules keyed by destination service
pub type Destinations = BTreeMap<String, Vec<RouteRule>>;

/// RouterConfig is the static router section of the local configuration file
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RouterConfig {
    /// Rules per destination service
    #[serde(default, rename = "routeRule")]
    pub destinations: Destinations,
}
