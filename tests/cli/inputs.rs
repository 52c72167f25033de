//! Template and target files

use std::io::Write;

use scanmatrix::app::inputs::{load_targets, load_templates, InputError};
use scanmatrix::scheduler::{CostClass, ProtocolType};
use tempfile::NamedTempFile;

fn file_with(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[tokio::test]
async fn test_load_templates_file() {
    let file = file_with(
        r#"
[[template]]
id = "tech-detect"
protocol = "http"

[[template]]
id = "login-screenshot"
protocol = "headless"
request-cost = 3

[[template]]
id = "blind-ssrf"
protocol = "http"
interactions = true
"#,
    );

    let templates = load_templates(file.path()).await.unwrap();
    assert_eq!(templates.len(), 3);
    assert_eq!(templates[0].request_cost, 1);
    assert_eq!(templates[1].protocol, ProtocolType::Headless);
    assert_eq!(templates[1].cost_class(), CostClass::Headless);
    assert_eq!(templates[1].request_cost, 3);
    assert!(templates[2].interactions);
}

#[tokio::test]
async fn test_unknown_template_field_rejected() {
    let file = file_with("[[template]]\nid = \"x\"\nprotocol = \"http\"\nseverity = \"high\"\n");
    let err = load_templates(file.path()).await.unwrap_err();
    assert!(matches!(err, InputError::Templates { .. }));
}

#[tokio::test]
async fn test_load_targets_file() {
    let file = file_with(
        "# production hosts\nhttps://a.example\n\nhttps://b.example  # staging\nhttps://a.example\n",
    );

    let targets = load_targets(file.path()).await.unwrap();
    let raw: Vec<&str> = targets.iter().map(|t| t.raw.as_str()).collect();
    assert_eq!(raw, vec!["https://a.example", "https://b.example"]);
    assert_eq!(targets[0].host_key, "a.example:443");
}

#[tokio::test]
async fn test_missing_input_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_targets(&dir.path().join("targets.txt")).await.unwrap_err();
    assert!(matches!(err, InputError::Read { .. }));
}
