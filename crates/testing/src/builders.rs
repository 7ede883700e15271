//! Fluent builder pattern for constructing test suites.
//!
//! This module provides builder structs for creating cases and suites
//! with a fluent API for customization.

use chatbench_domain::{
    CapabilityTag, Case, CaseKind, Category, EvaluationRule, LegacyCase, Modality, RequestTemplate,
    SamplingParams, Suite, TemplateContent, TemplateMessage, TemplatePart, Variant, VariantCase,
    DEFAULT_CASE_WEIGHT, DEFAULT_PASS_THRESHOLD,
};
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Builder for creating Case test instances
#[derive(Clone)]
pub struct CaseBuilder {
    case: Case,
}

impl CaseBuilder {
    /// Legacy case asking "What is 2+2?" and expecting exactly `4`.
    pub fn legacy(id: impl Into<String>) -> Self {
        Self::with_kind(
            id,
            CaseKind::Legacy(LegacyCase {
                request: RequestTemplate {
                    messages: vec![TemplateMessage {
                        role: "user".to_string(),
                        content: TemplateContent::Text("What is 2+2?".to_string()),
                    }],
                },
                eval: EvaluationRule::from_value(json!({"type": "exact_match", "expected": "4"})),
                expected_answer: None,
            }),
        )
    }

    /// Variant case with no variants yet and the default threshold.
    pub fn variants(id: impl Into<String>) -> Self {
        Self::with_kind(
            id,
            CaseKind::Variants(VariantCase {
                system_prompt: None,
                variants: vec![],
                pass_threshold: DEFAULT_PASS_THRESHOLD,
            }),
        )
    }

    fn with_kind(id: impl Into<String>, kind: CaseKind) -> Self {
        Self {
            case: Case {
                id: id.into(),
                name: None,
                description: String::new(),
                category_id: String::new(),
                category_name: String::new(),
                modality: Modality::Text,
                required_tags: BTreeSet::new(),
                weight: DEFAULT_CASE_WEIGHT,
                kind,
            },
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.case.name = Some(name.into());
        self
    }

    pub fn with_category(mut self, id: impl Into<String>, name: impl Into<String>) -> Self {
        self.case.category_id = id.into();
        self.case.category_name = name.into();
        self
    }

    /// Replaces the legacy request with one user message.
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        if let CaseKind::Legacy(legacy) = &mut self.case.kind {
            legacy.request.messages = vec![TemplateMessage {
                role: "user".to_string(),
                content: TemplateContent::Text(prompt.into()),
            }];
        }
        self
    }

    /// Replaces the legacy request with a text and image message.
    pub fn with_image_prompt(mut self, prompt: impl Into<String>, image: impl Into<PathBuf>) -> Self {
        if let CaseKind::Legacy(legacy) = &mut self.case.kind {
            legacy.request.messages = vec![TemplateMessage {
                role: "user".to_string(),
                content: TemplateContent::Parts(vec![
                    TemplatePart::Text {
                        text: prompt.into(),
                    },
                    TemplatePart::ImageUrl {
                        image_path: image.into(),
                    },
                ]),
            }];
        }
        self
    }

    /// Sets the legacy rule from its document form.
    pub fn with_eval(mut self, rule: Value) -> Self {
        if let CaseKind::Legacy(legacy) = &mut self.case.kind {
            legacy.eval = EvaluationRule::from_value(rule);
        }
        self
    }

    pub fn with_expected_answer(mut self, answer: impl Into<String>) -> Self {
        if let CaseKind::Legacy(legacy) = &mut self.case.kind {
            legacy.expected_answer = Some(answer.into());
        }
        self
    }

    pub fn with_variant(self, prompt: impl Into<String>, rule: Value) -> Self {
        self.push_variant(Variant {
            prompt: prompt.into(),
            image_path: None,
            evaluation: EvaluationRule::from_value(rule),
        })
    }

    pub fn with_image_variant(
        self,
        prompt: impl Into<String>,
        image: impl Into<PathBuf>,
        rule: Value,
    ) -> Self {
        self.push_variant(Variant {
            prompt: prompt.into(),
            image_path: Some(image.into()),
            evaluation: EvaluationRule::from_value(rule),
        })
    }

    fn push_variant(mut self, variant: Variant) -> Self {
        if let CaseKind::Variants(spec) = &mut self.case.kind {
            spec.variants.push(variant);
        }
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        if let CaseKind::Variants(spec) = &mut self.case.kind {
            spec.system_prompt = Some(prompt.into());
        }
        self
    }

    pub fn with_pass_threshold(mut self, threshold: f64) -> Self {
        if let CaseKind::Variants(spec) = &mut self.case.kind {
            spec.pass_threshold = threshold;
        }
        self
    }

    pub fn requires(mut self, tag: CapabilityTag) -> Self {
        self.case.required_tags.insert(tag);
        self
    }

    /// Declares vision modality and requires the vision tag.
    pub fn vision(mut self) -> Self {
        self.case.modality = Modality::Vision;
        self.requires(CapabilityTag::Vision)
    }

    pub fn build(self) -> Case {
        self.case
    }
}

/// Builder for creating Suite test instances
#[derive(Clone, Default)]
pub struct SuiteBuilder {
    suite: Suite,
}

impl SuiteBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_case(mut self, case: Case) -> Self {
        self.suite.cases.push(case);
        self
    }

    pub fn with_category(mut self, id: impl Into<String>, name: impl Into<String>) -> Self {
        self.suite.categories.push(Category {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            source_file: None,
        });
        self
    }

    pub fn with_runs(mut self, runs: u32) -> Self {
        self.suite.meta.runs = Some(runs);
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.suite.meta.base_url = Some(base_url.into());
        self
    }

    pub fn with_params(mut self, params: SamplingParams) -> Self {
        self.suite.meta.default_params = params;
        self
    }

    pub fn build(self) -> Suite {
        self.suite
    }
}
