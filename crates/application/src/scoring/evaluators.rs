//! Deterministic evaluation strategies.
//!
//! Each strategy is a pure function of the response text and its rule
//! parameters. `semantic_match` is the only strategy that calls out, and it
//! lives in the judge module.

use super::extract::{extract_first_json, extract_first_number};
use super::normalize::{normalize, normalize_loose};
use chatbench_domain::{FuzzySpec, JsonSpec, KeywordSpec, MatchSpec, NumericSpec, PatternSpec, RegexFlag};
use regex::RegexBuilder;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// Outcome of evaluating one response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    /// Verdict.
    pub passed: bool,
    /// Strategy that produced the verdict.
    pub eval_type: String,
    /// Human-readable explanation.
    pub reason: String,
    /// What matched, on success.
    pub matched: Option<Value>,
    /// Rule type that fell back to `eval_type`, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_from: Option<String>,
}

impl Evaluation {
    /// Passing evaluation.
    pub fn pass(eval_type: &str, reason: impl Into<String>, matched: impl Into<Value>) -> Self {
        Self {
            passed: true,
            eval_type: eval_type.to_string(),
            reason: reason.into(),
            matched: Some(matched.into()),
            fallback_from: None,
        }
    }

    /// Failing evaluation.
    pub fn fail(eval_type: &str, reason: impl Into<String>) -> Self {
        Self {
            passed: false,
            eval_type: eval_type.to_string(),
            reason: reason.into(),
            matched: None,
            fallback_from: None,
        }
    }

    /// Marks this evaluation as a fallback from `rule_type`, prefixing `cause`.
    pub fn as_fallback(mut self, rule_type: &str, cause: &str) -> Self {
        self.reason = format!("{cause}; fell back to {}: {}", self.eval_type, self.reason);
        self.fallback_from = Some(rule_type.to_string());
        self
    }
}

/// Trimmed response equals a candidate.
pub fn exact_match(response: &str, spec: &MatchSpec) -> Evaluation {
    const TYPE: &str = "exact_match";
    let candidates = spec.candidates();
    let trimmed = response.trim();
    for candidate in &candidates {
        if trimmed == candidate.trim() {
            return Evaluation::pass(TYPE, format!("exact match: \"{candidate}\""), *candidate);
        }
    }
    Evaluation::fail(TYPE, format!("expected: \"{}\"", candidates.first().unwrap_or(&"")))
}

/// A loosely normalized candidate occurs in the loosely normalized response.
///
/// An empty candidate is a substring of anything and passes.
pub fn normalized_contains(response: &str, spec: &MatchSpec) -> Evaluation {
    const TYPE: &str = "normalized_contains";
    let candidates = spec.candidates();
    let haystack = normalize_loose(response);
    for candidate in &candidates {
        if haystack.contains(&normalize_loose(candidate)) {
            return Evaluation::pass(TYPE, format!("normalized match: \"{candidate}\""), *candidate);
        }
    }
    Evaluation::fail(
        TYPE,
        format!(
            "no match after normalization: expected \"{}\"",
            candidates.first().unwrap_or(&"")
        ),
    )
}

/// Edit distance between `a` and `b`, counted in characters.
pub fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(!chars_eq_ignore_case(*ca, *cb));
            current[j + 1] = (previous[j + 1] + 1)
                .min(current[j] + 1)
                .min(previous[j] + cost);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[b.len()]
}

fn chars_eq_ignore_case(a: char, b: char) -> bool {
    a == b || a.to_lowercase().eq(b.to_lowercase())
}

/// `1 - distance / max(len)`, 1.0 for two empty strings.
pub fn similarity(a: &str, b: &str) -> f64 {
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    1.0 - levenshtein_distance(a, b) as f64 / max_len as f64
}

/// Best candidate similarity meets the threshold.
pub fn fuzzy_match(response: &str, spec: &FuzzySpec) -> Evaluation {
    const TYPE: &str = "fuzzy_match";
    let response = normalize(response.trim(), spec.normalize);

    let mut best_ratio = 0.0_f64;
    let mut best_match: Option<&str> = None;
    for candidate in spec.candidates() {
        let ratio = similarity(&response, &normalize(candidate.trim(), spec.normalize));
        if best_match.is_none() || ratio > best_ratio {
            best_ratio = ratio;
            best_match = Some(candidate);
        }
    }

    debug!(similarity = best_ratio, threshold = spec.threshold, "Fuzzy match evaluation");

    match best_match {
        Some(candidate) if best_ratio >= spec.threshold => Evaluation::pass(
            TYPE,
            format!(
                "fuzzy match: {:.1}% (threshold {:.0}%)",
                best_ratio * 100.0,
                spec.threshold * 100.0
            ),
            candidate,
        ),
        _ => Evaluation::fail(
            TYPE,
            format!(
                "similarity too low: {:.1}% < {:.0}%",
                best_ratio * 100.0,
                spec.threshold * 100.0
            ),
        ),
    }
}

fn keyword_present(haystack: &str, keyword: &str, spec: &KeywordSpec) -> bool {
    haystack.contains(&normalize(keyword, spec.normalize))
}

fn keyword_haystack(response: &str, spec: &KeywordSpec) -> String {
    normalize(response, spec.normalize)
}

/// Every keyword occurs in the response.
pub fn contains_all(response: &str, spec: &KeywordSpec) -> Evaluation {
    const TYPE: &str = "contains_all";
    let haystack = keyword_haystack(response, spec);
    let missing: Vec<&String> = spec
        .keywords
        .iter()
        .filter(|k| !keyword_present(&haystack, k, spec))
        .collect();
    if missing.is_empty() {
        Evaluation::pass(
            TYPE,
            format!("all keywords found: {:?}", spec.keywords),
            spec.keywords.clone(),
        )
    } else {
        Evaluation::fail(TYPE, format!("missing keywords: {missing:?}"))
    }
}

/// The first fully present keyword set, or any flat keyword.
pub fn contains_any(response: &str, spec: &KeywordSpec) -> Evaluation {
    const TYPE: &str = "contains_any";
    let haystack = keyword_haystack(response, spec);

    if !spec.keyword_sets.is_empty() {
        for set in &spec.keyword_sets {
            if set.iter().all(|k| keyword_present(&haystack, k, spec)) {
                return Evaluation::pass(TYPE, format!("keyword set found: {set:?}"), set.clone());
            }
        }
        return Evaluation::fail(TYPE, "no keyword set fully found");
    }

    let found: Vec<String> = spec
        .keywords
        .iter()
        .filter(|k| keyword_present(&haystack, k, spec))
        .cloned()
        .collect();
    if found.is_empty() {
        Evaluation::fail(TYPE, format!("none of the keywords found: {:?}", spec.keywords))
    } else {
        Evaluation::pass(TYPE, format!("keywords found: {found:?}"), found)
    }
}

/// First JSON value parses and carries the required keys.
pub fn json_parse(response: &str, spec: &JsonSpec) -> Evaluation {
    const TYPE: &str = "json_parse";
    let value = match extract_first_json(response) {
        Ok(value) => value,
        Err(e) => return Evaluation::fail(TYPE, format!("JSON extraction failed: {e}")),
    };

    match value {
        Value::Array(items) => {
            if spec.must_have_keys.is_empty() {
                Evaluation::pass(TYPE, "parsed JSON array", format!("list(len={})", items.len()))
            } else {
                Evaluation::fail(
                    TYPE,
                    format!(
                        "JSON array cannot satisfy required keys: {:?}",
                        spec.must_have_keys
                    ),
                )
            }
        }
        Value::Object(map) => {
            let missing: Vec<&String> = spec
                .must_have_keys
                .iter()
                .filter(|k| !map.contains_key(k.as_str()))
                .collect();
            if missing.is_empty() {
                let keys: Vec<String> = map.keys().cloned().collect();
                Evaluation::pass(
                    TYPE,
                    format!("parsed JSON object, required keys: {:?}", spec.must_have_keys),
                    keys,
                )
            } else {
                Evaluation::fail(TYPE, format!("missing keys: {missing:?}"))
            }
        }
        other => Evaluation::fail(TYPE, format!("unexpected JSON value: {other}")),
    }
}

/// First number lies in range or within tolerance of `expected`.
pub fn numeric(response: &str, spec: &NumericSpec) -> Evaluation {
    const TYPE: &str = "numeric";
    let value = match extract_first_number(response, spec.extract_regex.as_deref()) {
        Ok(Some(value)) => value,
        Ok(None) => return Evaluation::fail(TYPE, "no number found"),
        Err(e) => return Evaluation::fail(TYPE, format!("invalid extract_regex: {e}")),
    };

    if let Some((lo, hi)) = spec.expected_range {
        return if lo <= value && value <= hi {
            Evaluation::pass(TYPE, format!("{value} within {lo}..{hi}"), value)
        } else {
            Evaluation::fail(TYPE, format!("{value} outside {lo}..{hi}"))
        };
    }

    let Some(expected) = spec.expected else {
        return Evaluation::fail(TYPE, "rule declares neither `expected` nor `expected_range`");
    };
    let allowed = spec.tolerance.max(expected.abs() * spec.relative_tolerance);
    if (value - expected).abs() <= allowed {
        Evaluation::pass(TYPE, format!("{value} matches {expected} ± {allowed}"), value)
    } else {
        Evaluation::fail(TYPE, format!("{value} != {expected} (± {allowed})"))
    }
}

/// Case-insensitive multiline search; first matching pattern wins.
pub fn regex_match(response: &str, spec: &PatternSpec) -> Evaluation {
    const TYPE: &str = "regex_match";
    let mut invalid = Vec::new();
    for pattern in spec.candidates() {
        let re = match RegexBuilder::new(pattern)
            .case_insensitive(true)
            .multi_line(true)
            .build()
        {
            Ok(re) => re,
            Err(e) => {
                invalid.push(format!("{pattern}: {e}"));
                continue;
            }
        };
        if let Some(m) = re.find(response) {
            return Evaluation::pass(TYPE, format!("pattern match: \"{}\"", m.as_str()), m.as_str());
        }
    }
    Evaluation::fail(TYPE, no_match_reason("pattern did not match", &invalid))
}

/// Full match of the trimmed response under the declared flags.
pub fn regex_fullmatch(response: &str, spec: &PatternSpec) -> Evaluation {
    const TYPE: &str = "regex_fullmatch";
    let trimmed = response.trim();
    let mut invalid = Vec::new();
    for pattern in spec.candidates() {
        let anchored = format!(r"\A(?:{pattern})\z");
        let re = match RegexBuilder::new(&anchored)
            .case_insensitive(spec.flags.contains(&RegexFlag::IgnoreCase))
            .multi_line(spec.flags.contains(&RegexFlag::Multiline))
            .dot_matches_new_line(spec.flags.contains(&RegexFlag::Dotall))
            .build()
        {
            Ok(re) => re,
            Err(e) => {
                invalid.push(format!("{pattern}: {e}"));
                continue;
            }
        };
        if let Some(m) = re.find(trimmed) {
            return Evaluation::pass(TYPE, "full regex match", m.as_str());
        }
    }
    Evaluation::fail(TYPE, no_match_reason("full regex match failed", &invalid))
}

fn no_match_reason(base: &str, invalid: &[String]) -> String {
    if invalid.is_empty() {
        base.to_string()
    } else {
        format!("{base}; invalid patterns: {}", invalid.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatbench_domain::NormalizeMode;
    use serde_json::json;

    fn match_spec(expected: &str, alternatives: &[&str]) -> MatchSpec {
        MatchSpec {
            expected: expected.to_string(),
            alternatives: alternatives.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn fuzzy_spec(expected: &str, threshold: f64, normalize: NormalizeMode) -> FuzzySpec {
        FuzzySpec {
            expected: expected.to_string(),
            alternatives: vec![],
            threshold,
            normalize,
        }
    }

    fn keywords(keywords: &[&str], sets: &[&[&str]]) -> KeywordSpec {
        KeywordSpec {
            keywords: keywords.iter().map(|s| s.to_string()).collect(),
            keyword_sets: sets
                .iter()
                .map(|set| set.iter().map(|s| s.to_string()).collect())
                .collect(),
            normalize: NormalizeMode::Basic,
        }
    }

    #[test]
    fn test_exact_match_trims_surface() {
        let result = exact_match("  Tokyo\n", &match_spec("Tokyo", &[]));
        assert!(result.passed);
        assert_eq!(result.matched, Some(json!("Tokyo")));
    }

    #[test]
    fn test_exact_match_alternative() {
        let result = exact_match("東京", &match_spec("Tokyo", &["東京"]));
        assert!(result.passed);
        assert_eq!(result.matched, Some(json!("東京")));
    }

    #[test]
    fn test_exact_match_is_case_sensitive() {
        let result = exact_match("tokyo", &match_spec("Tokyo", &[]));
        assert!(!result.passed);
        assert!(result.reason.contains("Tokyo"));
    }

    #[test]
    fn test_normalized_contains_full_width() {
        assert!(normalized_contains("Ｈｅｌｌｏ world", &match_spec("hello", &[])).passed);
    }

    #[test]
    fn test_normalized_contains_cjk_punctuation() {
        assert!(normalized_contains("答えは、東京 です。", &match_spec("東京です", &[])).passed);
    }

    #[test]
    fn test_normalized_contains_empty_expected_matches() {
        let result = normalized_contains("anything", &match_spec("", &[]));
        assert!(result.passed);
        assert_eq!(result.matched, Some(json!("")));
    }

    #[test]
    fn test_normalized_contains_folds_sharp_s() {
        // Arrange
        let spec = match_spec("straße", &[]);

        // Act
        let result = normalized_contains("Answer: STRASSE", &spec);

        // Assert
        assert!(result.passed, "{}", result.reason);
        assert_eq!(result.matched, Some(json!("straße")));
    }

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein_distance("kitten", "sitting"), 3);
        assert_eq!(levenshtein_distance("", "abc"), 3);
        assert_eq!(levenshtein_distance("東京", "東京都"), 1);
        assert_eq!(levenshtein_distance("ABC", "abc"), 0);
    }

    #[test]
    fn test_similarity_bounds() {
        assert_eq!(similarity("", ""), 1.0);
        assert_eq!(similarity("abc", "abc"), 1.0);
        assert_eq!(similarity("abc", "xyz"), 0.0);
    }

    #[test]
    fn test_fuzzy_loose_ignores_spaces() {
        let result = fuzzy_match("東京 都", &fuzzy_spec("東京都", 0.9, NormalizeMode::Loose));
        assert!(result.passed);
    }

    #[test]
    fn test_fuzzy_reports_best_ratio_on_failure() {
        let result = fuzzy_match("abcd", &fuzzy_spec("abxy", 0.8, NormalizeMode::Basic));
        assert!(!result.passed);
        assert!(result.reason.contains("50.0%"));
    }

    #[test]
    fn test_contains_all_reports_missing() {
        let result = contains_all("alpha beta", &keywords(&["alpha", "gamma"], &[]));
        assert!(!result.passed);
        assert!(result.reason.contains("gamma"));
    }

    #[test]
    fn test_contains_any_sets_first_satisfied() {
        let spec = keywords(&[], &[&["x", "y"], &["a", "b"], &["a"]]);
        let result = contains_any("a b c", &spec);
        assert!(result.passed);
        assert_eq!(result.matched, Some(json!(["a", "b"])));
    }

    #[test]
    fn test_contains_any_sets_none_satisfied() {
        let spec = keywords(&["a"], &[&["a", "z"]]);
        assert!(!contains_any("a b c", &spec).passed);
    }

    #[test]
    fn test_contains_any_flat() {
        let result = contains_any("I like CATS", &keywords(&["dog", "cat"], &[]));
        assert!(result.passed);
        assert_eq!(result.matched, Some(json!(["cat"])));
    }

    #[test]
    fn test_json_parse_object_keys() {
        let spec = JsonSpec {
            must_have_keys: vec!["name".to_string(), "age".to_string()],
        };
        assert!(json_parse(r#"{"name": "a", "age": 3}"#, &spec).passed);
        let result = json_parse(r#"{"name": "a"}"#, &spec);
        assert!(!result.passed);
        assert!(result.reason.contains("age"));
    }

    #[test]
    fn test_json_parse_array_with_keys_fails() {
        let spec = JsonSpec {
            must_have_keys: vec!["name".to_string()],
        };
        assert!(!json_parse("[1, 2]", &spec).passed);
        let result = json_parse("[1, 2]", &JsonSpec::default());
        assert!(result.passed);
        assert_eq!(result.matched, Some(json!("list(len=2)")));
    }

    #[test]
    fn test_numeric_relative_tolerance() {
        let spec = NumericSpec {
            expected: Some(1000.0),
            relative_tolerance: 0.002,
            ..Default::default()
        };
        let result = numeric("合計 1,001.0 円", &spec);
        assert!(result.passed);
        assert_eq!(result.matched, Some(json!(1001.0)));
    }

    #[test]
    fn test_numeric_range() {
        let spec = NumericSpec {
            expected_range: Some((0.3, 0.4)),
            ..Default::default()
        };
        assert!(numeric("about 0.33", &spec).passed);
        assert!(!numeric("about 0.5", &spec).passed);
    }

    #[test]
    fn test_numeric_extract_regex() {
        let spec = NumericSpec {
            expected: Some(123.0),
            extract_regex: Some(r"TTFT=\d+".to_string()),
            ..Default::default()
        };
        assert!(numeric("E2E=900 TTFT=123", &spec).passed);
    }

    #[test]
    fn test_numeric_no_number() {
        let spec = NumericSpec {
            expected: Some(1.0),
            ..Default::default()
        };
        assert_eq!(numeric("none", &spec).reason, "no number found");
    }

    #[test]
    fn test_regex_match_search_ignore_case() {
        let spec = PatternSpec {
            pattern: r"^answer:\s*\d+$".to_string(),
            ..Default::default()
        };
        assert!(regex_match("thinking...\nANSWER: 42\n", &spec).passed);
    }

    #[test]
    fn test_regex_fullmatch() {
        let spec = PatternSpec {
            pattern: r"[A-Z]{3}\d{2}".to_string(),
            ..Default::default()
        };
        assert!(regex_fullmatch(" ABC12 \n", &spec).passed);
        assert!(!regex_fullmatch("ABC123", &spec).passed);
        assert!(!regex_fullmatch("abc12", &spec).passed);

        let spec = PatternSpec {
            flags: vec![RegexFlag::IgnoreCase],
            ..spec
        };
        assert!(regex_fullmatch("abc12", &spec).passed);
    }

    #[test]
    fn test_invalid_pattern_tries_next_alternative() {
        let spec = PatternSpec {
            pattern: "(".to_string(),
            alternatives: vec!["(".to_string(), "ok".to_string()],
            flags: vec![],
        };
        assert!(regex_match("it is ok", &spec).passed);

        let spec = PatternSpec {
            pattern: "(".to_string(),
            ..Default::default()
        };
        let result = regex_match("it is ok", &spec);
        assert!(!result.passed);
        assert!(result.reason.contains("invalid patterns"));
    }
}
