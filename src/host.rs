use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use crate::message::{ContentType, Metadata, TypedBatch};
use crate::plugins::Plugin;

#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("content type mismatch for '{plugin}': expected {expected}, found {found}")]
    ContentTypeMismatch {
        plugin: String,
        expected: ContentType,
        found: ContentType,
    },

    #[error("plugin '{plugin}' failed during tick")]
    PluginExecutionFailure {
        plugin: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("unknown plugin '{0}'")]
    UnknownPlugin(String),

    #[error("plugin '{0}' is already registered")]
    DuplicatePlugin(String),
}

struct Registered {
    plugin: Arc<dyn Plugin>,
    metadata: Metadata,
}

/// Keeps registered plugins with the metadata they declared at registration
#[derive(Default)]
pub struct PluginHost {
    plugins: HashMap<String, Registered>,
}

impl PluginHost {
    pub fn new() -> Self { Self::default() }

    pub fn register(&mut self, name: &str, plugin: Arc<dyn Plugin>) -> Result<&Metadata, HostError> {
        if self.plugins.contains_key(name) {
            return Err(HostError::DuplicatePlugin(name.to_string()));
        }
        let metadata = plugin.metadata();
        info!(
            "Registered '{}' ({}): sink={} src={}",
            name,
            plugin.name(),
            metadata.sink.name,
            metadata.src.name
        );
        let entry = self
            .plugins
            .entry(name.to_string())
            .or_insert(Registered { plugin, metadata });
        Ok(&entry.metadata)
    }

    pub fn metadata(&self, name: &str) -> Result<&Metadata, HostError> {
        self.get(name).map(|r| &r.metadata)
    }

    /// Check that `upstream` output can feed `downstream` input
    pub fn connect(&self, upstream: &str, downstream: &str) -> Result<(), HostError> {
        let src = &self.get(upstream)?.metadata.src.name;
        let sink = &self.get(downstream)?.metadata.sink.name;
        if src != sink {
            return Err(HostError::ContentTypeMismatch {
                plugin: downstream.to_string(),
                expected: sink.clone(),
                found: src.clone(),
            });
        }
        debug!("Connected '{}' -> '{}' ({})", upstream, downstream, src);
        Ok(())
    }

    /// Run one tick of `name`. Input not matching the declared sink is
    /// rejected before the plugin sees it; output is tagged with `src`.
    pub fn invoke(&self, name: &str, input: TypedBatch) -> Result<TypedBatch, HostError> {
        let entry = self.get(name)?;
        let sink = &entry.metadata.sink.name;
        if &input.content_type != sink {
            return Err(HostError::ContentTypeMismatch {
                plugin: name.to_string(),
                expected: sink.clone(),
                found: input.content_type,
            });
        }

        let output = entry
            .plugin
            .tick(&input.messages)
            .map_err(|source| HostError::PluginExecutionFailure {
                plugin: name.to_string(),
                source,
            })?;

        debug!("'{}' tick: {} in, {} out", name, input.messages.len(), output.len());
        Ok(TypedBatch::new(entry.metadata.src.name.clone(), output))
    }

    fn get(&self, name: &str) -> Result<&Registered, HostError> {
        self.plugins
            .get(name)
            .ok_or_else(|| HostError::UnknownPlugin(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Batch, Message, Payload};
    use crate::plugins::{HelloWorldPlugin, PassthroughPlugin};
    use serde_json::{json, Map};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn ct(s: &str) -> ContentType {
        ContentType::parse(s).unwrap()
    }

    /// Counts ticks and fails when asked to
    struct Recorder {
        calls: AtomicUsize,
        fail: bool,
    }

    impl Plugin for Recorder {
        fn name(&self) -> &str { "recorder" }
        fn metadata(&self) -> Metadata { Metadata::new(ct("text/plain"), ct("text/plain")) }
        fn tick(&self, input: &[Message]) -> anyhow::Result<Batch> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("recorder exploded");
            }
            Ok(input.to_vec())
        }
    }

    #[test]
    fn invoke_tags_output_with_src() {
        let mut host = PluginHost::new();
        host.register("greet", Arc::new(HelloWorldPlugin)).unwrap();

        let input = TypedBatch::new(
            ct("video/x-raw"),
            vec![Message::new(vec![Payload::new(b"frame".to_vec())], Map::new())],
        );
        let out = host.invoke("greet", input).unwrap();
        assert_eq!(out.content_type, ct("application/json"));
        assert_eq!(
            out.messages,
            vec![Message::from_value(json!({"value": "hello world"}).as_object().unwrap().clone())]
        );
    }

    #[test]
    fn mismatched_input_never_reaches_tick() {
        let recorder = Arc::new(Recorder { calls: AtomicUsize::new(0), fail: false });
        let mut host = PluginHost::new();
        host.register("p", recorder.clone()).unwrap();

        let err = host.invoke("p", TypedBatch::empty(ct("video/x-raw"))).unwrap_err();
        match err {
            HostError::ContentTypeMismatch { plugin, expected, found } => {
                assert_eq!(plugin, "p");
                assert_eq!(expected, ct("text/plain"));
                assert_eq!(found, ct("video/x-raw"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(recorder.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn tick_errors_become_execution_failures() {
        let mut host = PluginHost::new();
        host.register("p", Arc::new(Recorder { calls: AtomicUsize::new(0), fail: true })).unwrap();

        let err = host.invoke("p", TypedBatch::empty(ct("text/plain"))).unwrap_err();
        assert!(matches!(err, HostError::PluginExecutionFailure { ref plugin, .. } if plugin == "p"));
        let source = std::error::Error::source(&err).unwrap();
        assert_eq!(source.to_string(), "recorder exploded");
    }

    #[test]
    fn register_rejects_duplicates_and_caches_metadata() {
        let mut host = PluginHost::new();
        host.register("greet", Arc::new(HelloWorldPlugin)).unwrap();
        assert!(matches!(
            host.register("greet", Arc::new(HelloWorldPlugin)),
            Err(HostError::DuplicatePlugin(_))
        ));
        assert_eq!(host.metadata("greet").unwrap(), &HelloWorldPlugin.metadata());
        assert!(matches!(host.metadata("missing"), Err(HostError::UnknownPlugin(_))));
        assert!(matches!(
            host.invoke("missing", TypedBatch::empty(ct("text/plain"))),
            Err(HostError::UnknownPlugin(_))
        ));
    }

    #[test]
    fn connect_checks_src_against_sink() {
        let mut host = PluginHost::new();
        host.register("greet", Arc::new(HelloWorldPlugin)).unwrap();
        host.register("json", Arc::new(PassthroughPlugin::new(ct("application/json")))).unwrap();
        host.register("text", Arc::new(PassthroughPlugin::new(ct("text/plain")))).unwrap();

        assert!(host.connect("greet", "json").is_ok());
        assert!(matches!(
            host.connect("greet", "text"),
            Err(HostError::ContentTypeMismatch { .. })
        ));
        assert!(matches!(host.connect("json", "greet"), Err(HostError::ContentTypeMismatch { .. })));
    }
}
