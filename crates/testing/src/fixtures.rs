//! Test fixtures: sample suites, image files and wire payloads.

use crate::builders::{CaseBuilder, SuiteBuilder};
use chatbench_domain::Suite;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};

/// A small suite document made of two category includes.
pub const SAMPLE_SUITE_YAML: &str = r#"
meta:
  base_url: http://localhost:1234/v1
  runs: 2
  warmup: 0
  timeout_sec: 30
  default_params:
    max_tokens: 128
    temperature: 0.0
includes:
  - categories/geography.yaml
  - categories/basics.yaml
"#;

/// First category file referenced by [`SAMPLE_SUITE_YAML`].
pub const SAMPLE_GEOGRAPHY_YAML: &str = r#"
category:
  id: geography
  name: Geography
  description: Capitals and places
cases:
  - id: capital
    name: Capital city
    request:
      messages:
        - role: user
          content: "What is the capital of Japan?"
    eval:
      type: normalized_contains
      expected: Tokyo
      alternatives: ["東京"]
"#;

/// Second category file referenced by [`SAMPLE_SUITE_YAML`].
pub const SAMPLE_CATEGORY_YAML: &str = r#"
category:
  id: basics
  name: Basics
  description: Arithmetic and formatting
cases:
  - id: add
    request:
      messages:
        - role: user
          content: "2+2?"
    eval:
      type: numeric
      expected: 4
  - id: json-variants
    system_prompt: Answer in JSON.
    pass_threshold: 0.5
    variants:
      - prompt: "Give a person with name and age."
        evaluation:
          type: json_parse
          must_have_keys: [name, age]
      - prompt: "Give a city with name."
        evaluation:
          type: json_parse
          must_have_keys: [name]
"#;

/// Bytes of a 1x1 PNG.
pub const PNG_1X1: &[u8] = &[
    0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x04, 0x00, 0x00, 0x00, 0xb5,
    0x1c, 0x0c, 0x02, 0x00, 0x00, 0x00, 0x0b, 0x49, 0x44, 0x41, 0x54, 0x78, 0xda, 0x63, 0x64,
    0x60, 0x00, 0x00, 0x00, 0x06, 0x00, 0x02, 0x30, 0x81, 0xd0, 0x2f, 0x00, 0x00, 0x00, 0x00,
    0x49, 0x45, 0x4e, 0x44, 0xae, 0x42, 0x60, 0x82,
];

/// Writes [`SAMPLE_SUITE_YAML`] and its includes under `dir`; returns the suite path.
pub fn write_sample_suite(dir: &Path) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(dir.join("categories"))?;
    std::fs::write(dir.join("categories/geography.yaml"), SAMPLE_GEOGRAPHY_YAML)?;
    std::fs::write(dir.join("categories/basics.yaml"), SAMPLE_CATEGORY_YAML)?;
    let path = dir.join("suite.yaml");
    std::fs::write(&path, SAMPLE_SUITE_YAML)?;
    Ok(path)
}

/// Writes a 1x1 PNG named `name` under `dir`.
pub fn write_png(dir: &Path, name: &str) -> std::io::Result<PathBuf> {
    let path = dir.join(name);
    std::fs::write(&path, PNG_1X1)?;
    Ok(path)
}

/// In-memory suite with one legacy and one variant case.
pub fn create_test_suite() -> Suite {
    SuiteBuilder::new()
        .with_runs(2)
        .with_case(
            CaseBuilder::legacy("add")
                .with_category("math", "Math")
                .build(),
        )
        .with_case(
            CaseBuilder::variants("colors")
                .with_category("lang", "Language")
                .with_variant("Name a primary color.", json!({"type": "contains_any", "keywords": ["red", "blue", "yellow"]}))
                .with_variant("Name the color of the sky.", json!({"type": "contains_any", "keywords": ["blue"]}))
                .build(),
        )
        .build()
}

/// One SSE `data:` event carrying a content delta.
pub fn sse_event(content: &str) -> String {
    let chunk = json!({
        "id": "chatcmpl-test",
        "object": "chat.completion.chunk",
        "choices": [{"index": 0, "delta": {"content": content}, "finish_reason": null}]
    });
    format!("data: {chunk}\n\n")
}

/// A full SSE body streaming `chunks` and terminated by `[DONE]`.
pub fn sse_body(chunks: &[&str]) -> String {
    let role = json!({
        "choices": [{"index": 0, "delta": {"role": "assistant"}, "finish_reason": null}]
    });
    let mut body = format!("data: {role}\n\n");
    for chunk in chunks {
        body.push_str(&sse_event(chunk));
    }
    body.push_str("data: [DONE]\n\n");
    body
}

/// Non-streaming completion response.
pub fn completion_response(content: &str) -> Value {
    json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }]
    })
}

/// `/v1/models` response listing `ids`.
pub fn models_response(ids: &[&str]) -> Value {
    json!({
        "object": "list",
        "data": ids.iter().map(|id| json!({"id": id, "object": "model"})).collect::<Vec<_>>()
    })
}
