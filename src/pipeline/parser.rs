use serde::{Deserialize, Serialize};
use std::path::Path;
use anyhow::Context;
use std::collections::{BTreeMap, HashSet};

use crate::host::PluginHost;
use crate::message::{ContentType, Message, Payload, TypedBatch};
use crate::plugins::builtin;

/// Pipeline and StageDef with Serialize + Deserialize so we can read & write YAML
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Pipeline {
    pub name: Option<String>,
    #[serde(default)]
    pub ticks: Option<u64>,
    #[serde(default)]
    pub interval_ms: Option<u64>,
    #[serde(default)]
    pub stop_on_fail: Option<bool>,
    #[serde(default)]
    pub input: Option<InputDef>,
    pub stages: Vec<StageDef>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StageDef {
    pub name: String,
    pub plugin: String,
    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

/// Batch fed to the first stage on every tick
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct InputDef {
    pub content_type: String,
    #[serde(default)]
    pub messages: Vec<MessageDef>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MessageDef {
    #[serde(default)]
    pub payloads: Vec<PayloadDef>,
    #[serde(default)]
    pub value: serde_json::Map<String, serde_json::Value>,
}

/// A payload is either a plain UTF-8 string or `{key, data}`
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(untagged)]
pub enum PayloadDef {
    Plain(String),
    Keyed { key: String, data: String },
}

impl PayloadDef {
    fn to_payload(&self) -> Payload {
        match self {
            PayloadDef::Plain(data) => Payload::new(data.as_bytes()),
            PayloadDef::Keyed { key, data } => Payload::keyed(key.as_str(), data.as_bytes()),
        }
    }
}

impl Pipeline {
    pub fn ticks(&self) -> u64 { self.ticks.unwrap_or(1) }
    pub fn stop_on_fail(&self) -> bool { self.stop_on_fail.unwrap_or(true) }
}

impl InputDef {
    pub fn to_batch(&self) -> anyhow::Result<TypedBatch> {
        let content_type = ContentType::parse(&self.content_type)?;
        let messages = self
            .messages
            .iter()
            .map(|m| {
                let payloads = m.payloads.iter().map(PayloadDef::to_payload).collect();
                Message::new(payloads, m.value.clone())
            })
            .collect();
        Ok(TypedBatch::new(content_type, messages))
    }
}

/// Load YAML file into Pipeline
pub fn load_pipeline(path: &Path) -> anyhow::Result<Pipeline> {
    let content = std::fs::read_to_string(path).with_context(|| format!("failed to read {:?}", path))?;
    let p: Pipeline = serde_yaml::from_str(&content).with_context(|| format!("failed to parse YAML {:?}", path))?;
    Ok(p)
}

/// Register every stage's plugin with a fresh host
pub fn build_host(p: &Pipeline) -> anyhow::Result<PluginHost> {
    let mut host = PluginHost::new();
    for s in &p.stages {
        let plugin = builtin(&s.plugin, &s.options).with_context(|| format!("stage '{}'", s.name))?;
        host.register(&s.name, plugin)?;
    }
    Ok(host)
}

/// The batch the first stage receives each tick
pub fn initial_batch(p: &Pipeline, host: &PluginHost) -> anyhow::Result<TypedBatch> {
    match &p.input {
        Some(input) => input.to_batch(),
        None => {
            let first = p.stages.first().context("pipeline has no stages")?;
            Ok(TypedBatch::empty(host.metadata(&first.name)?.sink.name.clone()))
        }
    }
}

/// Validate stages: unique names, known plugins, compatible content types
pub fn validate_pipeline(p: &Pipeline) -> anyhow::Result<()> {
    if p.stages.is_empty() {
        anyhow::bail!("pipeline has no stages");
    }
    if p.ticks() == 0 {
        anyhow::bail!("ticks must be greater than zero");
    }

    let mut names = HashSet::new();
    for s in &p.stages {
        if !names.insert(s.name.clone()) {
            anyhow::bail!("duplicate stage name '{}'", s.name);
        }
    }

    let host = build_host(p)?;

    let input = initial_batch(p, &host)?;
    let first = &p.stages[0].name;
    let sink = &host.metadata(first)?.sink.name;
    if &input.content_type != sink {
        anyhow::bail!("input content type {} does not match sink {} of stage '{}'", input.content_type, sink, first);
    }

    for pair in p.stages.windows(2) {
        host.connect(&pair[0].name, &pair[1].name)
            .with_context(|| format!("stage '{}' cannot feed '{}'", pair[0].name, pair[1].name))?;
    }

    Ok(())
}
