//! The `brick.yaml` schema.

use indexmap::IndexMap;
use semver::Version;
use serde::{Deserialize, Serialize};

use crate::brick::validate_brick_name;
use crate::error::Result;

/// Declared type of a brick variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableType {
    #[default]
    String,
    Number,
    Boolean,
    Enum,
    Array,
}

/// A fully-specified variable declaration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct VariableDef {
    #[serde(rename = "type", default)]
    pub var_type: VariableType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    /// Allowed values for `enum` variables.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<serde_json::Value>,
}

impl VariableDef {
    /// String-shorthand form: `vars: { name: "What is your name?" }` declares
    /// a string variable whose prompt is the given text.
    fn from_prompt(prompt: String) -> Self {
        Self {
            var_type: VariableType::String,
            description: None,
            default: None,
            prompt: Some(prompt),
            values: Vec::new(),
        }
    }
}

/// Either shorthand or the full table form, as written in `brick.yaml`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum VariableSpec {
    Shorthand(String),
    Full(VariableDef),
}

fn deserialize_vars<'de, D>(
    deserializer: D,
) -> std::result::Result<IndexMap<String, VariableDef>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: IndexMap<String, VariableSpec> = IndexMap::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|(name, spec)| {
            let def = match spec {
                VariableSpec::Shorthand(prompt) => VariableDef::from_prompt(prompt),
                VariableSpec::Full(def) => def,
            };
            (name, def)
        })
        .collect())
}

fn default_version() -> Version {
    Version::new(0, 1, 0)
}

/// Parsed `brick.yaml`. Unrecognized keys are preserved but unused.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BrickYaml {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_version")]
    pub version: Version,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish_to: Option<String>,
    #[serde(default, deserialize_with = "deserialize_vars")]
    pub vars: IndexMap<String, VariableDef>,
    #[serde(flatten)]
    pub extra: IndexMap<String, serde_yaml::Value>,
}

impl BrickYaml {
    /// Parses and validates brick metadata from YAML text.
    pub fn from_yaml(path: &str, contents: &str) -> Result<Self> {
        let metadata: BrickYaml = serde_yaml::from_str(contents).map_err(|source| {
            crate::error::Error::BrickMalformedMetadata { path: path.to_string(), source }
        })?;
        validate_brick_name(&metadata.name)?;
        Ok(metadata)
    }
}
