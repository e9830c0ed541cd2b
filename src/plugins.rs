use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Context;
use serde_json::{Map, Value};

use crate::message::{Batch, ContentType, Message, Metadata};

/// Contract between the pipeline host and a plugin.
///
/// `metadata` must be pure and return the same declaration on every call.
/// `tick` is called once per cycle with messages already matching `sink`; it
/// may ignore its input and returns an empty batch when it has nothing to emit.
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;
    fn metadata(&self) -> Metadata;
    fn tick(&self, input: &[Message]) -> anyhow::Result<Batch>;
}

/// Emits a single `{"value": "hello world"}` message per tick, whatever it receives
pub struct HelloWorldPlugin;

impl HelloWorldPlugin {
    pub const SINK: &'static str = "video/x-raw";
    pub const SRC: &'static str = "application/json";
}

impl Plugin for HelloWorldPlugin {
    fn name(&self) -> &str { "hello" }

    fn metadata(&self) -> Metadata {
        Metadata::new(builtin_type(Self::SINK), builtin_type(Self::SRC))
    }

    fn tick(&self, _input: &[Message]) -> anyhow::Result<Batch> {
        let mut value = Map::new();
        value.insert("value".to_string(), Value::String("hello world".to_string()));
        Ok(vec![Message::from_value(value)])
    }
}

/// Forwards its input unchanged; sink and src share one content type
pub struct PassthroughPlugin {
    content_type: ContentType,
}

impl PassthroughPlugin {
    pub fn new(content_type: ContentType) -> Self {
        Self { content_type }
    }
}

impl Plugin for PassthroughPlugin {
    fn name(&self) -> &str { "passthrough" }

    fn metadata(&self) -> Metadata {
        Metadata::new(self.content_type.clone(), self.content_type.clone())
    }

    fn tick(&self, input: &[Message]) -> anyhow::Result<Batch> {
        Ok(input.to_vec())
    }
}

pub const BUILTIN_NAMES: [&str; 2] = ["hello", "passthrough"];

/// Options a built-in needs before it can report its ports
pub fn required_options(name: &str) -> &'static [&'static str] {
    match name {
        "passthrough" => &["content_type"],
        _ => &[],
    }
}

/// One line for `tickpipe plugins`; option-driven ports show as `<option>`
pub fn describe_builtin(name: &str) -> anyhow::Result<String> {
    let (sink, src) = match required_options(name) {
        [] => {
            let md = builtin(name, &BTreeMap::new())?.metadata();
            (md.sink.name.to_string(), md.src.name.to_string())
        }
        opts => {
            let placeholder = format!("<{}>", opts.join(","));
            (placeholder.clone(), placeholder)
        }
    };
    Ok(format!("{:<12} sink={:<20} src={}", name, sink, src))
}

/// Resolve a built-in plugin by name; `options` come from the pipeline file
pub fn builtin(name: &str, options: &BTreeMap<String, String>) -> anyhow::Result<Arc<dyn Plugin>> {
    match name {
        "hello" => Ok(Arc::new(HelloWorldPlugin)),
        "passthrough" => {
            let raw = options
                .get("content_type")
                .with_context(|| "plugin 'passthrough' requires option 'content_type'")?;
            let ct = ContentType::parse(raw)?;
            Ok(Arc::new(PassthroughPlugin::new(ct)))
        }
        other => Err(crate::host::HostError::UnknownPlugin(other.to_string()).into()),
    }
}

/// Content type of a built-in port, from a literal
fn builtin_type(s: &'static str) -> ContentType {
    ContentType::parse(s).unwrap_or_else(|e| panic!("{e}"))
}
