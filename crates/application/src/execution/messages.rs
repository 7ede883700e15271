//! Turning suite templates into wire messages.
//!
//! Images are read from disk and inlined as base64 data URLs.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chatbench_domain::{
    ChatMessage, ContentPart, RequestTemplate, TemplateContent, TemplatePart, Variant,
};
use std::path::{Path, PathBuf};

/// An image that could not be inlined.
#[derive(Debug, thiserror::Error)]
#[error("failed to read image {}: {source}", .path.display())]
pub struct ImageLoadError {
    /// Path as resolved at load time.
    pub path: PathBuf,
    /// Read failure.
    #[source]
    pub source: std::io::Error,
}

fn mime_type(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "image/png",
    }
}

/// Reads `path` into a `data:` URL.
pub async fn load_image_data_url(path: &Path) -> Result<String, ImageLoadError> {
    let bytes = tokio::fs::read(path).await.map_err(|source| ImageLoadError {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(format!("data:{};base64,{}", mime_type(path), STANDARD.encode(bytes)))
}

/// A legacy template with its images inlined.
#[derive(Debug, Default)]
pub struct MaterializedRequest {
    /// Messages ready to send.
    pub messages: Vec<ChatMessage>,
    /// Image parts that were dropped because they could not be read.
    pub dropped: Vec<ImageLoadError>,
}

/// Inlines the images of `template`, dropping parts that cannot be read.
pub async fn materialize_template(template: &RequestTemplate) -> MaterializedRequest {
    let mut out = MaterializedRequest::default();
    for message in &template.messages {
        let materialized = match &message.content {
            TemplateContent::Text(text) => ChatMessage::text(&message.role, text),
            TemplateContent::Parts(parts) => {
                let mut content = Vec::with_capacity(parts.len());
                for part in parts {
                    match part {
                        TemplatePart::Text { text } => {
                            content.push(ContentPart::Text { text: text.clone() })
                        }
                        TemplatePart::ImageUrl { image_path } => {
                            match load_image_data_url(image_path).await {
                                Ok(url) => content.push(ContentPart::image_data_url(url)),
                                Err(e) => out.dropped.push(e),
                            }
                        }
                    }
                }
                ChatMessage::parts(&message.role, content)
            }
        };
        out.messages.push(materialized);
    }
    out
}

/// Messages of one variant, with the case system prompt first.
pub async fn variant_messages(
    system_prompt: Option<&str>,
    variant: &Variant,
) -> Result<Vec<ChatMessage>, ImageLoadError> {
    let mut messages = Vec::with_capacity(2);
    if let Some(system) = system_prompt.filter(|s| !s.is_empty()) {
        messages.push(ChatMessage::text("system", system));
    }
    let user = match &variant.image_path {
        Some(path) => {
            let url = load_image_data_url(path).await?;
            ChatMessage::parts(
                "user",
                vec![
                    ContentPart::Text {
                        text: variant.prompt.clone(),
                    },
                    ContentPart::image_data_url(url),
                ],
            )
        }
        None => ChatMessage::text("user", &variant.prompt),
    };
    messages.push(user);
    Ok(messages)
}

/// Prompt shown in reports: `[role]` blocks, images as `[image: path]`.
pub fn render_prompt(template: &RequestTemplate) -> String {
    let mut blocks = Vec::new();
    for message in &template.messages {
        match &message.content {
            TemplateContent::Text(text) => blocks.push(format!("[{}]\n{}", message.role, text)),
            TemplateContent::Parts(parts) => {
                for part in parts {
                    let body = match part {
                        TemplatePart::Text { text } => text.clone(),
                        TemplatePart::ImageUrl { image_path } => {
                            format!("[image: {}]", image_path.display())
                        }
                    };
                    blocks.push(format!("[{}]\n{}", message.role, body));
                }
            }
        }
    }
    blocks.join("\n\n").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatbench_domain::{MessageContent, TemplateMessage};
    use std::io::Write;

    fn template(parts: Vec<TemplatePart>) -> RequestTemplate {
        RequestTemplate {
            messages: vec![
                TemplateMessage {
                    role: "system".to_string(),
                    content: TemplateContent::Text("Be brief.".to_string()),
                },
                TemplateMessage {
                    role: "user".to_string(),
                    content: TemplateContent::Parts(parts),
                },
            ],
        }
    }

    #[test]
    fn test_mime_type_from_extension() {
        assert_eq!(mime_type(Path::new("a.JPG")), "image/jpeg");
        assert_eq!(mime_type(Path::new("a.webp")), "image/webp");
        assert_eq!(mime_type(Path::new("a")), "image/png");
    }

    #[test]
    fn test_render_prompt() {
        let t = template(vec![
            TemplatePart::Text {
                text: "What is this?".to_string(),
            },
            TemplatePart::ImageUrl {
                image_path: PathBuf::from("/tmp/cat.png"),
            },
        ]);
        assert_eq!(
            render_prompt(&t),
            "[system]\nBe brief.\n\n[user]\nWhat is this?\n\n[user]\n[image: /tmp/cat.png]"
        );
    }

    #[tokio::test]
    async fn test_missing_image_part_is_dropped() {
        let t = template(vec![
            TemplatePart::Text {
                text: "What is this?".to_string(),
            },
            TemplatePart::ImageUrl {
                image_path: PathBuf::from("/definitely/not/here.png"),
            },
        ]);
        let materialized = materialize_template(&t).await;
        assert_eq!(materialized.messages.len(), 2);
        assert_eq!(materialized.dropped.len(), 1);
        match &materialized.messages[1].content {
            MessageContent::Parts(parts) => assert_eq!(parts.len(), 1),
            other => panic!("unexpected content: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_variant_image_is_inlined() {
        let mut file = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
        file.write_all(&[1, 2, 3]).unwrap();

        let variant = Variant {
            prompt: "Describe".to_string(),
            image_path: Some(file.path().to_path_buf()),
            evaluation: Default::default(),
        };
        let messages = variant_messages(Some("sys"), &variant).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0], ChatMessage::text("system", "sys"));
        match &messages[1].content {
            MessageContent::Parts(parts) => {
                assert_eq!(parts[1], ContentPart::image_data_url("data:image/png;base64,AQID"));
            }
            other => panic!("unexpected content: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_variant_missing_image_fails() {
        let variant = Variant {
            prompt: "Describe".to_string(),
            image_path: Some(PathBuf::from("/definitely/not/here.png")),
            evaluation: Default::default(),
        };
        let err = variant_messages(None, &variant).await.unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.png"));
    }
}
