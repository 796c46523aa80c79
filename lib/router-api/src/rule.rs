use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Weight given to a rule that does not declare one
pub const FULL_WEIGHT: u32 = 100;

/// RouteRule selects a destination tag and the share of traffic it receives
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RouteRule {
    /// Destination tag or version (e.g., "v2")
    pub tag: String,

    /// Weight for weighted traffic split (0-100)
    #[serde(default = "default_weight")]
    pub weight: u32,

    /// Optional match predicate; rules are evaluated first-match downstream
    #[serde(default, rename = "match", skip_serializing_if = "Option::is_none")]
    pub r#match: Option<RouteMatch>,
}

impl RouteRule {
    /// Create a rule sending `weight` percent of traffic to `tag`
    pub fn weighted(tag: impl Into<String>, weight: u32) -> Self {
        Self {
            tag: tag.into(),
            weight,
            r#match: None,
        }
    }

    /// Create a rule sending all matching traffic to `tag`
    pub fn matching(tag: impl Into<String>, r#match: RouteMatch) -> Self {
        Self {
            tag: tag.into(),
            weight: FULL_WEIGHT,
            r#match: Some(r#match),
        }
    }
}

/// Header predicate attached to a route rule
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RouteMatch {
    /// Header (or context attribute) to inspect
    pub header: String,

    /// Comparison operator
    pub operator: MatchOperator,

    /// Value compared against
    pub value: String,

    /// Compare without regard to ASCII case
    #[serde(default)]
    pub case_insensitive: bool,
}

/// Comparison operators understood by route matches
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum MatchOperator {
    Equal,
    NotEqual,
    Greater,
    GreaterOrEqual,
    Less,
    LessOrEqual,
    /// Glob-style match where `*` stands for any run of characters
    Wildcard,
}

impl MatchOperator {
    /// Operators ordered so that two-character symbols are tried first
    const SYMBOLS: [(&'static str, MatchOperator); 7] = [
        ("!=", MatchOperator::NotEqual),
        (">=", MatchOperator::GreaterOrEqual),
        ("<=", MatchOperator::LessOrEqual),
        ("=", MatchOperator::Equal),
        (">", MatchOperator::Greater),
        ("<", MatchOperator::Less),
        ("~", MatchOperator::Wildcard),
    ];

    /// Symbol used in condition strings
    pub fn symbol(&self) -> &'static str {
        match self {
            MatchOperator::Equal => "=",
            MatchOperator::NotEqual => "!=",
            MatchOperator::Greater => ">",
            MatchOperator::GreaterOrEqual => ">=",
            MatchOperator::Less => "<",
            MatchOperator::LessOrEqual => "<=",
            MatchOperator::Wildcard => "~",
        }
    }

    /// Find the leftmost operator in `expr`, preferring the longer symbol at a position
    fn split(expr: &str) -> Option<(&str, MatchOperator, &str)> {
        let (start, symbol, op) = Self::SYMBOLS
            .iter()
            .filter_map(|(symbol, op)| expr.find(symbol).map(|pos| (pos, *symbol, *op)))
            .min_by_key(|(pos, symbol, _)| (*pos, usize::MAX - symbol.len()))?;

        Some((&expr[..start], op, &expr[start + symbol.len()..]))
    }
}

impl fmt::Display for MatchOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// A `header<op>value` expression as written in dark launch policies
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Condition {
    pub header: String,
    pub operator: MatchOperator,
    pub value: String,
}

impl Condition {
    /// Turn the condition into a route match
    pub fn to_match(&self, case_insensitive: bool) -> RouteMatch {
        RouteMatch {
            header: self.header.clone(),
            operator: self.operator,
            value: self.value.clone(),
            case_insensitive,
        }
    }
}

impl FromStr for Condition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (header, operator, value) = MatchOperator::split(s)
            .ok_or_else(|| format!("condition {:?} has no operator", s))?;

        let header = header.trim();
        let value = value.trim();
        if header.is_empty() {
            return Err(format!("condition {:?} has an empty header", s));
        }
        if value.is_empty() {
            return Err(format!("condition {:?} has an empty value", s));
        }

        Ok(Self {
            header: header.to_string(),
            operator,
            value: value.to_string(),
        })
    }
}

impl TryFrom<String> for Condition {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Condition> for String {
    fn from(condition: Condition) -> Self {
        condition.to_string()
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.header, self.operator, self.value)
    }
}

impl JsonSchema for Condition {
    fn schema_name() -> String {
        "Condition".to_string()
    }

    fn json_schema(gen: &mut schemars::gen::SchemaGenerator) -> schemars::schema::Schema {
        String::json_schema(gen)
    }
}

fn default_weight() -> u32 {
    FULL_WEIGHT
}
