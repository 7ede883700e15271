//! Benchmark suites, cases and variants.

use crate::capability::{CapabilityTag, CapabilitySet};
use crate::chat::SamplingParams;
use crate::errors::{DomainError, DomainResult};
use crate::rule::EvaluationRule;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;

/// Pass threshold applied to variant-based cases that declare none.
pub const DEFAULT_PASS_THRESHOLD: f64 = 0.8;

/// Weight reported for cases that declare none.
pub const DEFAULT_CASE_WEIGHT: u32 = 3;

/// A loaded, validated suite.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Suite {
    /// Default execution parameters.
    #[serde(default)]
    pub meta: SuiteMeta,
    /// Cases in execution order.
    #[serde(default)]
    pub cases: Vec<Case>,
    /// Categories merged in from included files.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<Category>,
}

/// Suite-level defaults. Unknown keys are kept for reporting.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SuiteMeta {
    /// Endpoint base URL, e.g. `http://localhost:1234/v1`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Timed runs per legacy case and per variant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runs: Option<u32>,
    /// Untimed priming calls per legacy case.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warmup: Option<u32>,
    /// Per-call timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_sec: Option<u64>,
    /// Sampling parameters for timed runs.
    #[serde(default)]
    pub default_params: SamplingParams,
    /// Any other keys.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Category metadata inherited by the cases of an included file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// Identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Free text.
    #[serde(default)]
    pub description: String,
    /// Include path the category came from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_file: Option<String>,
}

/// Category id reported for cases that carry none.
pub const UNCATEGORIZED_ID: &str = "unknown";

/// Cases of a suite grouped by category, for listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteOverview {
    /// Number of cases.
    pub total_tests: usize,
    /// Categories in first-seen order.
    pub categories: Vec<CategoryOverview>,
    /// Suite defaults.
    pub meta: SuiteMeta,
}

/// One category of a [`SuiteOverview`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryOverview {
    pub id: String,
    pub name: String,
    pub description: String,
    pub tests: Vec<CaseOverview>,
}

/// One case of a [`CategoryOverview`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseOverview {
    pub id: String,
    pub name: String,
    pub description: String,
    pub modality: Modality,
    pub weight: u32,
    pub variants: usize,
}

/// Declared input modality of a case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
    /// Text prompts only.
    #[default]
    Text,
    /// Prompts carry images.
    Vision,
}

/// One test case. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCase", into = "RawCase")]
pub struct Case {
    /// Unique within the suite.
    pub id: String,
    /// Display name.
    pub name: Option<String>,
    /// Free text.
    pub description: String,
    /// Category stamped on by the loader.
    pub category_id: String,
    /// Category display name stamped on by the loader.
    pub category_name: String,
    /// Declared modality.
    pub modality: Modality,
    /// Capabilities a model must have for the case to run.
    pub required_tags: BTreeSet<CapabilityTag>,
    /// Reporting weight.
    pub weight: u32,
    /// Legacy or variant-based body.
    pub kind: CaseKind,
}

/// The two shapes a case can take.
#[derive(Debug, Clone, PartialEq)]
pub enum CaseKind {
    /// One request template and one rule, run `runs` times.
    Legacy(LegacyCase),
    /// Several prompts aggregated into one verdict.
    Variants(VariantCase),
}

/// Body of a legacy case.
#[derive(Debug, Clone, PartialEq)]
pub struct LegacyCase {
    /// Messages to send.
    pub request: RequestTemplate,
    /// Rule applied to every run.
    pub eval: EvaluationRule,
    /// Explicit answer shown in reports.
    pub expected_answer: Option<String>,
}

/// Body of a variant-based case.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantCase {
    /// Prepended to every variant as a system message.
    pub system_prompt: Option<String>,
    /// Prompts in order.
    pub variants: Vec<Variant>,
    /// Minimum pass rate in `[0, 1]`.
    pub pass_threshold: f64,
}

/// One prompt of a variant-based case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variant {
    /// User prompt.
    #[serde(default)]
    pub prompt: String,
    /// Optional image sent with the prompt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_path: Option<PathBuf>,
    /// Rule for this variant.
    #[serde(default)]
    pub evaluation: EvaluationRule,
}

/// Messages of a legacy case before images are inlined.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RequestTemplate {
    /// Messages in order.
    #[serde(default)]
    pub messages: Vec<TemplateMessage>,
}

/// A template message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateMessage {
    /// Message role.
    #[serde(default = "default_role")]
    pub role: String,
    /// Text or parts.
    pub content: TemplateContent,
}

fn default_role() -> String {
    "user".to_string()
}

/// Template message content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TemplateContent {
    /// Plain text.
    Text(String),
    /// Text and image-file parts.
    Parts(Vec<TemplatePart>),
}

/// A template part. Images refer to files, not data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TemplatePart {
    /// Text part.
    Text {
        /// The text.
        #[serde(default)]
        text: String,
    },
    /// Image loaded from disk at run time.
    ImageUrl {
        /// Path, absolute after loading.
        image_path: PathBuf,
    },
}

impl Case {
    /// Name, or the id when none is declared.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    /// Results one model produces for this case.
    pub fn expected_result_count(&self, runs: u32) -> usize {
        match self.kind {
            CaseKind::Variants(_) => 1,
            CaseKind::Legacy(_) => runs as usize,
        }
    }

    /// Whether the case is gated on `tags`.
    pub fn is_runnable_with(&self, tags: &CapabilitySet) -> bool {
        tags.satisfies(&self.required_tags)
    }

    /// Whether the case involves images.
    pub fn needs_vision(&self) -> bool {
        self.modality == Modality::Vision || self.required_tags.contains(&CapabilityTag::Vision)
    }

    /// Whether this is a variant-based case.
    pub fn is_variant_based(&self) -> bool {
        matches!(self.kind, CaseKind::Variants(_))
    }
}

impl Suite {
    /// Rejects suites whose case ids collide.
    pub fn validate(&self) -> DomainResult<()> {
        let mut seen: HashMap<&str, usize> = HashMap::new();
        for case in &self.cases {
            *seen.entry(case.id.as_str()).or_default() += 1;
        }
        let mut duplicates: Vec<String> = seen
            .into_iter()
            .filter(|(id, count)| !id.is_empty() && *count > 1)
            .map(|(id, _)| id.to_string())
            .collect();
        if duplicates.is_empty() {
            return Ok(());
        }
        duplicates.sort();
        Err(DomainError::DuplicateCaseIds(duplicates))
    }

    /// Results a job over `models` models with `runs` runs will produce.
    pub fn expected_total_results(&self, models: usize, runs: u32) -> usize {
        let per_model: usize = self
            .cases
            .iter()
            .map(|case| case.expected_result_count(runs))
            .sum();
        models * per_model
    }

    /// Groups every case under its category.
    pub fn overview(&self) -> SuiteOverview {
        let mut categories: Vec<CategoryOverview> = Vec::new();
        for case in &self.cases {
            let id = if case.category_id.is_empty() {
                UNCATEGORIZED_ID
            } else {
                case.category_id.as_str()
            };
            let index = match categories.iter().position(|c| c.id == id) {
                Some(index) => index,
                None => {
                    let declared = self.categories.iter().find(|c| c.id == id);
                    let name = match (case.category_name.is_empty(), declared) {
                        (false, _) => case.category_name.clone(),
                        (true, Some(category)) => category.name.clone(),
                        (true, None) => "Unknown".to_string(),
                    };
                    categories.push(CategoryOverview {
                        id: id.to_string(),
                        name,
                        description: declared.map(|c| c.description.clone()).unwrap_or_default(),
                        tests: Vec::new(),
                    });
                    categories.len() - 1
                }
            };
            categories[index].tests.push(CaseOverview {
                id: case.id.clone(),
                name: case.display_name().to_string(),
                description: case.description.clone(),
                modality: case.modality,
                weight: case.weight,
                variants: match &case.kind {
                    CaseKind::Variants(v) => v.variants.len(),
                    CaseKind::Legacy(_) => 0,
                },
            });
        }

        SuiteOverview {
            total_tests: self.cases.len(),
            categories,
            meta: self.meta.clone(),
        }
    }

    /// Whether any case needs models probed for vision.
    pub fn needs_vision_probe(&self) -> bool {
        self.cases.iter().any(Case::needs_vision)
    }

    /// Visits every image path declared by any case.
    pub fn for_each_image_path_mut(&mut self, mut f: impl FnMut(&mut PathBuf)) {
        for case in &mut self.cases {
            match &mut case.kind {
                CaseKind::Legacy(legacy) => {
                    for message in &mut legacy.request.messages {
                        if let TemplateContent::Parts(parts) = &mut message.content {
                            for part in parts {
                                if let TemplatePart::ImageUrl { image_path } = part {
                                    f(image_path);
                                }
                            }
                        }
                    }
                }
                CaseKind::Variants(variants) => {
                    for variant in &mut variants.variants {
                        if let Some(path) = variant.image_path.as_mut() {
                            f(path);
                        }
                    }
                }
            }
        }
    }
}

/// On-disk shape of a case.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawCase {
    id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default)]
    description: String,
    #[serde(default)]
    category_id: String,
    #[serde(default)]
    category_name: String,
    #[serde(default)]
    modality: Modality,
    #[serde(default)]
    required_tags: BTreeSet<CapabilityTag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    weight: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    request: Option<RequestTemplate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    eval: Option<EvaluationRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expected_answer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    system_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    variants: Option<Vec<Variant>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pass_threshold: Option<f64>,
}

impl TryFrom<RawCase> for Case {
    type Error = DomainError;

    fn try_from(raw: RawCase) -> Result<Self, Self::Error> {
        let invalid = |message: &str| DomainError::InvalidCase {
            case_id: raw.id.clone(),
            message: message.to_string(),
        };

        let kind = match raw.variants.clone().filter(|v| !v.is_empty()) {
            Some(variants) => {
                let pass_threshold = raw.pass_threshold.unwrap_or(DEFAULT_PASS_THRESHOLD);
                if !(0.0..=1.0).contains(&pass_threshold) {
                    return Err(invalid("pass_threshold must be within [0, 1]"));
                }
                CaseKind::Variants(VariantCase {
                    system_prompt: raw.system_prompt.clone().filter(|s| !s.is_empty()),
                    variants,
                    pass_threshold,
                })
            }
            None => {
                let request = raw
                    .request
                    .clone()
                    .ok_or_else(|| invalid("case declares neither `variants` nor `request`"))?;
                CaseKind::Legacy(LegacyCase {
                    request,
                    eval: raw.eval.clone().unwrap_or_default(),
                    expected_answer: raw.expected_answer.clone().filter(|s| !s.is_empty()),
                })
            }
        };

        Ok(Case {
            id: raw.id,
            name: raw.name,
            description: raw.description,
            category_id: raw.category_id,
            category_name: raw.category_name,
            modality: raw.modality,
            required_tags: raw.required_tags,
            weight: raw.weight.unwrap_or(DEFAULT_CASE_WEIGHT),
            kind,
        })
    }
}

impl From<Case> for RawCase {
    fn from(case: Case) -> Self {
        let mut raw = RawCase {
            id: case.id,
            name: case.name,
            description: case.description,
            category_id: case.category_id,
            category_name: case.category_name,
            modality: case.modality,
            required_tags: case.required_tags,
            weight: Some(case.weight),
            request: None,
            eval: None,
            expected_answer: None,
            system_prompt: None,
            variants: None,
            pass_threshold: None,
        };
        match case.kind {
            CaseKind::Legacy(legacy) => {
                raw.request = Some(legacy.request);
                raw.eval = Some(legacy.eval);
                raw.expected_answer = legacy.expected_answer;
            }
            CaseKind::Variants(variants) => {
                raw.system_prompt = variants.system_prompt;
                raw.variants = Some(variants.variants);
                raw.pass_threshold = Some(variants.pass_threshold);
            }
        }
        raw
    }
}
