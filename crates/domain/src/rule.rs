//! Evaluation rules attached to legacy cases and to variants.
//!
//! A rule is a closed set of strategies keyed by the `type` field of the
//! suite document. Rules that name an unknown strategy, or whose parameters
//! do not parse, are kept as [`EvaluationRule::Unsupported`] and
//! [`EvaluationRule::Malformed`] so that a bad rule fails the evaluation it
//! belongs to instead of rejecting the whole suite.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// Normalization applied before keyword or similarity comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizeMode {
    /// Compatibility normalization, case folding and trimming.
    #[default]
    Basic,
    /// `Basic` followed by removal of whitespace and punctuation.
    Loose,
}

/// Regex flags accepted by `regex_fullmatch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RegexFlag {
    /// Case-insensitive matching.
    IgnoreCase,
    /// `^` and `$` match at line boundaries.
    Multiline,
    /// `.` also matches newlines.
    Dotall,
}

/// Parameters of `exact_match` and `normalized_contains`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MatchSpec {
    /// Primary expected answer.
    #[serde(default, deserialize_with = "lenient_string")]
    pub expected: String,
    /// Other accepted answers, in priority order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alternatives: Vec<String>,
}

impl MatchSpec {
    /// Candidate answers in match order.
    pub fn candidates(&self) -> Vec<&str> {
        candidates(&self.expected, &self.alternatives)
    }
}

/// Parameters of `fuzzy_match` and `semantic_match`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuzzySpec {
    /// Primary expected answer.
    #[serde(default, deserialize_with = "lenient_string")]
    pub expected: String,
    /// Other accepted answers, in priority order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alternatives: Vec<String>,
    /// Minimum similarity in `[0, 1]` for a pass.
    #[serde(default = "default_fuzzy_threshold")]
    pub threshold: f64,
    /// Normalization applied to both sides.
    #[serde(default)]
    pub normalize: NormalizeMode,
}

impl FuzzySpec {
    /// Candidate answers in match order.
    pub fn candidates(&self) -> Vec<&str> {
        candidates(&self.expected, &self.alternatives)
    }

    /// Same candidates and normalization, different threshold.
    pub fn with_threshold(&self, threshold: f64) -> Self {
        Self {
            threshold,
            ..self.clone()
        }
    }
}

fn default_fuzzy_threshold() -> f64 {
    0.8
}

/// Parameters of `contains_all` and `contains_any`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct KeywordSpec {
    /// Flat keyword list.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    /// AND-groups tried in order; only used by `contains_any`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keyword_sets: Vec<Vec<String>>,
    /// Normalization applied to response and keywords.
    #[serde(default)]
    pub normalize: NormalizeMode,
}

/// Parameters of `json_parse`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct JsonSpec {
    /// Keys the extracted object must carry.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub must_have_keys: Vec<String>,
}

/// Parameters of `numeric`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NumericSpec {
    /// Target value, compared with the tolerances below.
    #[serde(default, deserialize_with = "lenient_f64")]
    pub expected: Option<f64>,
    /// Absolute tolerance.
    #[serde(default)]
    pub tolerance: f64,
    /// Tolerance relative to `|expected|`.
    #[serde(default)]
    pub relative_tolerance: f64,
    /// Inclusive `[lo, hi]` range; takes precedence over `expected`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_range: Option<(f64, f64)>,
    /// Restricts extraction to the first match of this pattern.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extract_regex: Option<String>,
}

/// Parameters of `regex_match` and `regex_fullmatch`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PatternSpec {
    /// Primary pattern.
    #[serde(default)]
    pub pattern: String,
    /// Other patterns, in priority order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alternatives: Vec<String>,
    /// Flags for `regex_fullmatch`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flags: Vec<RegexFlag>,
}

impl PatternSpec {
    /// Patterns in match order.
    pub fn candidates(&self) -> Vec<&str> {
        candidates(&self.pattern, &self.alternatives)
    }
}

/// A rule judging one response.
#[derive(Debug, Clone, PartialEq)]
pub enum EvaluationRule {
    /// Trimmed response equals one candidate.
    ExactMatch(MatchSpec),
    /// A loosely normalized candidate is a substring of the response.
    NormalizedContains(MatchSpec),
    /// Edit-distance similarity against the best candidate.
    FuzzyMatch(FuzzySpec),
    /// Judge-model verdict, falling back to fuzzy matching.
    SemanticMatch(FuzzySpec),
    /// Every keyword is present.
    ContainsAll(KeywordSpec),
    /// Any keyword, or the first fully present keyword set.
    ContainsAny(KeywordSpec),
    /// First JSON value in the response, with required keys.
    JsonParse(JsonSpec),
    /// First number in the response within tolerance or range.
    Numeric(NumericSpec),
    /// Case-insensitive multiline regex search.
    RegexMatch(PatternSpec),
    /// Regex full match on the trimmed response.
    RegexFullmatch(PatternSpec),
    /// The `type` names no known strategy.
    Unsupported {
        /// Type name as written.
        type_name: String,
    },
    /// The `type` is known but the parameters do not parse.
    Malformed {
        /// Type name as written.
        type_name: String,
        /// Parse failure.
        message: String,
    },
}

impl Default for EvaluationRule {
    fn default() -> Self {
        Self::Malformed {
            type_name: String::new(),
            message: "no evaluation rule declared".to_string(),
        }
    }
}

impl EvaluationRule {
    /// Builds a rule from an untyped document, never failing.
    pub fn from_value(value: Value) -> Self {
        let type_name = match value.get("type") {
            Some(Value::String(name)) => name.clone(),
            Some(other) => other.to_string(),
            None => {
                return Self::Malformed {
                    type_name: String::new(),
                    message: "rule has no `type` field".to_string(),
                }
            }
        };

        match type_name.as_str() {
            "exact_match" => parse(value, &type_name, Self::ExactMatch),
            "normalized_contains" => parse(value, &type_name, Self::NormalizedContains),
            "fuzzy_match" => parse(value, &type_name, Self::FuzzyMatch),
            "semantic_match" => parse(value, &type_name, Self::SemanticMatch),
            "contains_all" => parse(value, &type_name, Self::ContainsAll),
            "contains_any" => parse(value, &type_name, Self::ContainsAny),
            "json_parse" => parse(value, &type_name, Self::JsonParse),
            "numeric" => parse(value, &type_name, Self::Numeric),
            "regex_match" => parse(value, &type_name, Self::RegexMatch),
            "regex_fullmatch" => parse(value, &type_name, Self::RegexFullmatch),
            _ => Self::Unsupported { type_name },
        }
    }

    /// The `type` key of this rule.
    pub fn eval_type(&self) -> &str {
        match self {
            Self::ExactMatch(_) => "exact_match",
            Self::NormalizedContains(_) => "normalized_contains",
            Self::FuzzyMatch(_) => "fuzzy_match",
            Self::SemanticMatch(_) => "semantic_match",
            Self::ContainsAll(_) => "contains_all",
            Self::ContainsAny(_) => "contains_any",
            Self::JsonParse(_) => "json_parse",
            Self::Numeric(_) => "numeric",
            Self::RegexMatch(_) => "regex_match",
            Self::RegexFullmatch(_) => "regex_fullmatch",
            Self::Unsupported { type_name } | Self::Malformed { type_name, .. } => type_name,
        }
    }

    /// The declared `expected` value, rendered as text.
    pub fn expected_text(&self) -> Option<String> {
        let text = match self {
            Self::ExactMatch(spec) | Self::NormalizedContains(spec) => spec.expected.clone(),
            Self::FuzzyMatch(spec) | Self::SemanticMatch(spec) => spec.expected.clone(),
            Self::Numeric(spec) => spec.expected.map(format_number)?,
            _ => return None,
        };
        (!text.is_empty()).then_some(text)
    }

    /// Human-readable expectation: expected value, then keywords, then pattern.
    pub fn describe_expectation(&self) -> Option<String> {
        if let Some(expected) = self.expected_text() {
            return Some(expected);
        }
        match self {
            Self::ContainsAll(spec) | Self::ContainsAny(spec) if !spec.keywords.is_empty() => {
                Some(format!("keywords: {}", spec.keywords.join(", ")))
            }
            Self::RegexMatch(spec) | Self::RegexFullmatch(spec) if !spec.pattern.is_empty() => {
                Some(format!("pattern: {}", spec.pattern))
            }
            _ => None,
        }
    }

    /// Untyped document form, `type` included.
    pub fn to_value(&self) -> Value {
        let body = match self {
            Self::ExactMatch(spec) | Self::NormalizedContains(spec) => serde_json::to_value(spec),
            Self::FuzzyMatch(spec) | Self::SemanticMatch(spec) => serde_json::to_value(spec),
            Self::ContainsAll(spec) | Self::ContainsAny(spec) => serde_json::to_value(spec),
            Self::JsonParse(spec) => serde_json::to_value(spec),
            Self::Numeric(spec) => serde_json::to_value(spec),
            Self::RegexMatch(spec) | Self::RegexFullmatch(spec) => serde_json::to_value(spec),
            Self::Unsupported { .. } | Self::Malformed { .. } => Ok(Value::Object(Map::new())),
        };
        let mut map = match body {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
        map.insert("type".to_string(), Value::String(self.eval_type().to_string()));
        Value::Object(map)
    }
}

impl<'de> Deserialize<'de> for EvaluationRule {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(Self::from_value(value))
    }
}

impl Serialize for EvaluationRule {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_value().serialize(serializer)
    }
}

fn parse<T, F>(value: Value, type_name: &str, wrap: F) -> EvaluationRule
where
    T: DeserializeOwned,
    F: FnOnce(T) -> EvaluationRule,
{
    match serde_json::from_value::<T>(value) {
        Ok(spec) => wrap(spec),
        Err(e) => EvaluationRule::Malformed {
            type_name: type_name.to_string(),
            message: e.to_string(),
        },
    }
}

/// `primary` first unless already listed, then `alternatives`.
pub fn candidates<'a>(primary: &'a str, alternatives: &'a [String]) -> Vec<&'a str> {
    let mut out: Vec<&str> = alternatives.iter().map(String::as_str).collect();
    if out.is_empty() {
        out.push(primary);
    } else if !primary.is_empty() && !out.contains(&primary) {
        out.insert(0, primary);
    }
    out
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    })
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::Number(n) => Ok(n.as_f64()),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("`{s}` is not a number"))),
        other => Err(serde::de::Error::custom(format!(
            "expected a number, found {other}"
        ))),
    }
}
