use std::path::Path;
use uuid::Uuid;
use std::fs;
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::message::{ContentType, TypedBatch};

/// Create a run directory and return it
pub fn create_run_dir(base: &Path) -> anyhow::Result<std::path::PathBuf> {
    let run_id = Uuid::new_v4().to_string();
    let dir = base.join("runs").join(run_id);
    fs::create_dir_all(&dir)?;
    Ok(dir)
}

pub fn write_artifact(dir: &Path, name: &str, content: &str) -> anyhow::Result<()> {
    let path = dir.join(name);
    fs::write(path, content)?;
    Ok(())
}

pub fn timestamp() -> String {
    // Format: YYYY-MM-DD_HH-MM-SS
    Utc::now().format("%Y-%m-%d_%H-%M-%S").to_string()
}

#[derive(Serialize)]
struct PayloadView<'a> {
    key: Option<&'a str>,
    size: usize,
}

#[derive(Serialize)]
struct MessageView<'a> {
    payloads: Vec<PayloadView<'a>>,
    value: &'a Map<String, Value>,
}

#[derive(Serialize)]
struct BatchView<'a> {
    content_type: &'a ContentType,
    messages: Vec<MessageView<'a>>,
}

/// JSON summary of a batch; payload bytes are reported by size only
pub fn batch_summary(batch: &TypedBatch) -> Value {
    let view = BatchView {
        content_type: &batch.content_type,
        messages: batch
            .messages
            .iter()
            .map(|m| MessageView {
                payloads: m
                    .payloads()
                    .iter()
                    .map(|p| PayloadView { key: p.key(), size: p.data().len() })
                    .collect(),
                value: m.value(),
            })
            .collect(),
    };
    json!(view)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Message, Payload};

    #[test]
    fn summary_reports_payload_sizes() {
        let batch = TypedBatch::new(
            ContentType::parse("video/x-raw").unwrap(),
            vec![Message::new(vec![Payload::keyed("image", vec![0u8; 12])], Map::new())],
        );
        let v = batch_summary(&batch);
        assert_eq!(v["content_type"], "video/x-raw");
        assert_eq!(v["messages"][0]["payloads"][0]["key"], "image");
        assert_eq!(v["messages"][0]["payloads"][0]["size"], 12);
        assert_eq!(v["messages"][0]["value"], json!({}));
    }

    #[test]
    fn run_dirs_are_unique() {
        let base = tempfile::tempdir().unwrap();
        let a = create_run_dir(base.path()).unwrap();
        let b = create_run_dir(base.path()).unwrap();
        assert_ne!(a, b);
        write_artifact(&a, "x.json", "{}").unwrap();
        assert_eq!(fs::read_to_string(a.join("x.json")).unwrap(), "{}");
    }
}
