//! Integration tests for suite loading
//!
//! Writes suite trees into temporary directories and checks include merging,
//! validation and image path resolution.

use chatbench_domain::{CaseKind, TemplateContent, TemplatePart};
use chatbench_infrastructure::{load_suite, SuiteLoadError};
use chatbench_testing::{write_png, write_sample_suite};
use std::fs;

#[test]
fn test_includes_are_merged_with_category() {
    // Arrange
    let dir = tempfile::tempdir().unwrap();
    let path = write_sample_suite(dir.path()).unwrap();

    // Act
    let suite = load_suite(&path).unwrap();

    // Assert
    let ids: Vec<&str> = suite.cases.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["capital", "add", "json-variants"]);
    assert_eq!(suite.cases[1].category_id, "basics");
    assert_eq!(suite.cases[0].category_id, "geography");
    assert_eq!(suite.cases[2].category_name, "Basics");
    assert_eq!(suite.categories.len(), 2);
    assert_eq!(
        suite.categories[1].source_file.as_deref(),
        Some("categories/basics.yaml")
    );
    assert_eq!(suite.meta.runs, Some(2));
    assert_eq!(suite.meta.default_params.max_tokens, 128);
    assert_eq!(suite.expected_total_results(1, 2), 5);
}

#[test]
fn test_missing_include_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("present.yaml"),
        "category: {id: present, name: Present}\ncases:\n  - id: only\n    request:\n      messages:\n        - role: user\n          content: hi\n",
    )
    .unwrap();
    let path = dir.path().join("suite.yaml");
    fs::write(&path, "includes: [missing.yaml, present.yaml]\n").unwrap();

    let suite = load_suite(&path).unwrap();

    assert_eq!(suite.cases.len(), 1);
    assert_eq!(suite.cases[0].category_id, "present");
    assert_eq!(suite.categories.len(), 1);
}

#[test]
fn test_inline_cases_are_replaced_by_includes() {
    // Arrange
    let dir = tempfile::tempdir().unwrap();
    let path = write_sample_suite(dir.path()).unwrap();
    let mut text = fs::read_to_string(&path).unwrap();
    text.push_str("cases:\n  - id: inline-only\n    request:\n      messages:\n        - {role: user, content: x}\n");
    fs::write(&path, text).unwrap();

    // Act
    let suite = load_suite(&path).unwrap();

    // Assert
    assert!(suite.cases.iter().all(|c| c.id != "inline-only"));
    assert_eq!(suite.cases.len(), 3);
}

#[test]
fn test_duplicate_ids_across_files_are_rejected() {
    // Arrange
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("extra.yaml"),
        "category: {id: extra, name: Extra}\ncases:\n  - id: dup\n    request:\n      messages:\n        - {role: user, content: a}\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("more.yaml"),
        "category: {id: more, name: More}\ncases:\n  - id: dup\n    request:\n      messages:\n        - {role: user, content: b}\n",
    )
    .unwrap();
    let path = dir.path().join("suite.yaml");
    fs::write(&path, "includes: [extra.yaml, more.yaml]\n").unwrap();

    // Act
    let result = load_suite(&path);

    // Assert
    match result {
        Err(SuiteLoadError::Invalid(e)) => assert!(e.to_string().contains("dup")),
        other => panic!("expected a validation error, got {other:?}"),
    }
}

#[test]
fn test_image_paths_are_resolved() {
    // Arrange
    let root = tempfile::tempdir().unwrap();
    let bench = root.path().join("bench");
    fs::create_dir_all(bench.join("images")).unwrap();
    fs::create_dir_all(root.path().join("shared")).unwrap();
    let variant_image = write_png(&bench.join("images"), "dot.png").unwrap();
    let legacy_image = write_png(&root.path().join("shared"), "chart.png").unwrap();
    let path = bench.join("suite.yaml");
    fs::write(
        &path,
        r#"
cases:
  - id: chart
    modality: vision
    request:
      messages:
        - role: user
          content:
            - {type: text, text: "What does the chart show?"}
            - {type: image_url, image_path: shared/chart.png}
    eval: {type: contains_any, keywords: [rising]}
  - id: dot
    modality: vision
    variants:
      - prompt: "What color is the dot?"
        image_path: images/dot.png
        evaluation: {type: contains_any, keywords: [red]}
"#,
    )
    .unwrap();

    // Act
    let suite = load_suite(&path).unwrap();

    // Assert
    let CaseKind::Legacy(legacy) = &suite.cases[0].kind else {
        panic!("expected a legacy case");
    };
    let TemplateContent::Parts(parts) = &legacy.request.messages[0].content else {
        panic!("expected content parts");
    };
    match &parts[1] {
        TemplatePart::ImageUrl { image_path } => {
            assert_eq!(
                fs::canonicalize(image_path).unwrap(),
                fs::canonicalize(legacy_image).unwrap()
            );
        }
        other => panic!("unexpected part {other:?}"),
    }

    let CaseKind::Variants(variants) = &suite.cases[1].kind else {
        panic!("expected a variant case");
    };
    let resolved = variants.variants[0].image_path.as_ref().unwrap();
    assert!(resolved.is_absolute());
    assert_eq!(
        fs::canonicalize(resolved).unwrap(),
        fs::canonicalize(variant_image).unwrap()
    );
}

#[test]
fn test_malformed_yaml_is_a_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("suite.yaml");
    fs::write(&path, "cases: [ {id: x, request: ").unwrap();

    assert!(matches!(load_suite(&path), Err(SuiteLoadError::Parse { .. })));
}

#[test]
fn test_missing_suite_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();

    let result = load_suite(&dir.path().join("nope.yaml"));

    assert!(matches!(result, Err(SuiteLoadError::Io { .. })));
}
