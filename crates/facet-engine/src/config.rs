//! Configuration value source.
//!
//! Parameter tags carry either a literal or a configuration key. Keys are
//! looked up through a [`ConfigProvider`] when a resolution starts, before
//! anything is constructed. A missing provider fails the resolution up front.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use facet_types::TyCon;
use rustc_hash::FxHashMap;
use serde::Deserialize;

use crate::error::ResolveError;
use crate::facet::{FacetTag, ParamSource, TagKind};
use crate::trace::Trace;

/// Source of configuration values.
pub trait ConfigProvider: Send + Sync {
    /// The value stored under `key`, `None` if there is none.
    fn get_value(&self, key: &str) -> Option<String>;
}

impl<F> ConfigProvider for F
where
    F: Fn(&str) -> Option<String> + Send + Sync,
{
    fn get_value(&self, key: &str) -> Option<String> {
        self(key)
    }
}

/// Reads process environment variables, optionally under a common prefix.
#[derive(Clone, Debug, Default)]
pub struct EnvConfigProvider {
    prefix: String,
}

impl EnvConfigProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up `{prefix}{key}` instead of `key`.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        EnvConfigProvider {
            prefix: prefix.into(),
        }
    }
}

impl ConfigProvider for EnvConfigProvider {
    fn get_value(&self, key: &str) -> Option<String> {
        std::env::var(format!("{}{}", self.prefix, key)).ok()
    }
}

/// An in-memory key/value provider.
#[derive(Clone, Debug, Default)]
pub struct MapConfigProvider {
    values: FxHashMap<String, String>,
}

impl MapConfigProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MapConfigProvider {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        MapConfigProvider {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl ConfigProvider for MapConfigProvider {
    fn get_value(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

/// Errors raised while loading a configuration file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigError {
    Io { path: String, message: String },
    Parse { format: &'static str, message: String },
    UnsupportedFormat { path: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, message } => {
                write!(f, "failed to read {}: {}", path, message)
            }
            ConfigError::Parse { format, message } => {
                write!(f, "failed to parse {} configuration: {}", format, message)
            }
            ConfigError::UnsupportedFormat { path } => {
                write!(f, "unsupported configuration file `{}`, expected .toml or .json", path)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// A configuration document as parsed from TOML or JSON.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ConfigNode {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Datetime(toml::value::Datetime),
    Array(Vec<ConfigNode>),
    Table(BTreeMap<String, ConfigNode>),
}

/// Key/value view over a TOML or JSON file.
///
/// Nested tables flatten to dotted keys (`storage.root`), array elements to
/// indexed keys (`hosts.0`). Scalars are stored as text; nulls are skipped.
#[derive(Clone, Debug, Default)]
pub struct FileConfigProvider {
    values: FxHashMap<String, String>,
}

impl FileConfigProvider {
    /// Load a `.toml` or `.json` file, chosen by extension.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let extension = path.extension().and_then(|e| e.to_str());
        let parse: fn(&str) -> Result<Self, ConfigError> = match extension {
            Some("toml") => Self::from_toml_str,
            Some("json") => Self::from_json_str,
            _ => {
                return Err(ConfigError::UnsupportedFormat {
                    path: path.display().to_string(),
                })
            }
        };
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let provider = parse(&content)?;
        tracing::debug!(path = %path.display(), keys = provider.len(), "loaded configuration file");
        Ok(provider)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let root: ConfigNode = toml::from_str(content).map_err(|e| ConfigError::Parse {
            format: "TOML",
            message: e.to_string(),
        })?;
        Ok(Self::from_node(root))
    }

    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        let root: ConfigNode = serde_json::from_str(content).map_err(|e| ConfigError::Parse {
            format: "JSON",
            message: e.to_string(),
        })?;
        Ok(Self::from_node(root))
    }

    fn from_node(root: ConfigNode) -> Self {
        let mut values = FxHashMap::default();
        flatten(String::new(), root, &mut values);
        FileConfigProvider { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl ConfigProvider for FileConfigProvider {
    fn get_value(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

fn join(key: &str, name: &str) -> String {
    if key.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", key, name)
    }
}

fn flatten(key: String, node: ConfigNode, out: &mut FxHashMap<String, String>) {
    match node {
        ConfigNode::Null => {}
        ConfigNode::Bool(b) => {
            out.insert(key, b.to_string());
        }
        ConfigNode::Int(i) => {
            out.insert(key, i.to_string());
        }
        ConfigNode::Float(x) => {
            out.insert(key, x.to_string());
        }
        ConfigNode::Text(s) => {
            out.insert(key, s);
        }
        ConfigNode::Datetime(d) => {
            out.insert(key, d.to_string());
        }
        ConfigNode::Array(items) => {
            for (i, item) in items.into_iter().enumerate() {
                flatten(join(&key, &i.to_string()), item, out);
            }
        }
        ConfigNode::Table(entries) => {
            for (name, item) in entries {
                flatten(join(&key, &name), item, out);
            }
        }
    }
}

// ── Tag evaluation ─────────────────────────────────────────────────────

/// A tag with its parameter value settled.
#[derive(Clone, Debug)]
pub(crate) struct Facet {
    pub label: String,
    pub target: TyCon,
    pub kind: FacetKind,
}

#[derive(Clone, Debug)]
pub(crate) enum FacetKind {
    Construct { implied: Vec<TyCon> },
    /// `value` is `None` when the provider had nothing for the key.
    Parameter { name: String, value: Option<String> },
    Uses { generic_params: Vec<String> },
}

/// Settle every parameter tag, reading each configuration key exactly once.
///
/// Fails before any lookup if a key is present and `provider` is `None`.
pub(crate) fn evaluate(
    tags: &[FacetTag],
    provider: Option<&dyn ConfigProvider>,
    trace: &mut Trace,
) -> Result<Vec<Facet>, ResolveError> {
    if provider.is_none() {
        for tag in tags {
            if let TagKind::Parameter {
                source: ParamSource::ConfigKey(key),
                ..
            } = &tag.kind
            {
                trace.note(format_args!(
                    "No configuration provider for key `{}` of {}",
                    key, tag
                ));
                return Err(ResolveError::Configuration {
                    key: key.clone(),
                    facet: tag.label.clone(),
                    trace: trace.clone(),
                });
            }
        }
    }

    let mut facets = Vec::with_capacity(tags.len());
    for tag in tags {
        let kind = match &tag.kind {
            TagKind::Construct { implied, .. } => FacetKind::Construct {
                implied: implied.clone(),
            },
            TagKind::Parameter {
                parameter, source, ..
            } => {
                let value = match (source, provider) {
                    (ParamSource::Literal(value), _) => Some(value.clone()),
                    (ParamSource::ConfigKey(key), Some(provider)) => {
                        let value = provider.get_value(key);
                        if value.is_none() {
                            trace.note(format_args!("Configuration key `{}` has no value", key));
                        } else {
                            trace.note(format_args!("Read configuration key `{}`", key));
                        }
                        value
                    }
                    (ParamSource::ConfigKey(_), None) => None,
                };
                FacetKind::Parameter {
                    name: parameter.clone(),
                    value,
                }
            }
            TagKind::Uses { generic_params, .. } => FacetKind::Uses {
                generic_params: generic_params.clone(),
            },
            TagKind::Source { .. } => {
                trace.note(format_args!("Ignoring unexpanded {}", tag));
                continue;
            }
        };
        let Some(target) = tag.target() else {
            continue;
        };
        facets.push(Facet {
            label: tag.label.clone(),
            target: target.clone(),
            kind,
        });
    }
    Ok(facets)
}
