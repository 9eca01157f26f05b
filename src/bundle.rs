//! Bundle encoding and decoding.
//!
//! A bundle is a single-file serialization of a brick. The universal form is
//! a Deflate-compressed JSON object; the source form embeds the same JSON as
//! a string constant inside a generated source file. Both share one
//! in-memory shape and round-trip losslessly up to map-key order.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use indexmap::IndexMap;
use semver::Version;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

use crate::brick::{Brick, BrickYaml, HookFile, Hooks, TemplateFile, VariableDef};
use crate::constants::{HOOK_MANIFESTS, POST_GEN_HOOK_STEM, PRE_GEN_HOOK_STEM};
use crate::error::{Error, Result};

const SOURCE_BUNDLE_BEGIN: &str = "// mason-bundle-begin";
const SOURCE_BUNDLE_END: &str = "// mason-bundle-end";

/// Whether a bundled file's payload decodes to UTF-8 source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum PayloadKind {
    Text,
    Binary,
}

#[derive(Debug, Serialize, Deserialize)]
struct BundleEntry {
    path: String,
    data: String,
    #[serde(rename = "type")]
    kind: PayloadKind,
}

/// The bundle's JSON shape. Unknown top-level keys are ignored on decode.
#[derive(Debug, Serialize, Deserialize)]
struct BundleJson {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default = "default_version")]
    version: Version,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    publish_to: Option<String>,
    #[serde(default)]
    vars: IndexMap<String, VariableDef>,
    #[serde(default)]
    files: Vec<BundleEntry>,
    #[serde(default)]
    hooks: Vec<BundleEntry>,
}

fn default_version() -> Version {
    Version::new(0, 1, 0)
}

fn encode_entry(path: &str, bytes: &[u8]) -> BundleEntry {
    let kind = if std::str::from_utf8(bytes).is_ok() {
        PayloadKind::Text
    } else {
        PayloadKind::Binary
    };
    BundleEntry { path: path.to_string(), data: BASE64.encode(bytes), kind }
}

fn decode_entry(entry: &BundleEntry) -> Result<Vec<u8>> {
    let bytes = BASE64.decode(&entry.data).map_err(|e| Error::BundleDecode {
        message: format!("invalid base64 payload for '{}': {e}", entry.path),
    })?;
    if entry.kind == PayloadKind::Text && std::str::from_utf8(&bytes).is_err() {
        return Err(Error::BundleDecode {
            message: format!("text payload for '{}' is not valid UTF-8", entry.path),
        });
    }
    Ok(bytes)
}

fn to_json(brick: &Brick) -> BundleJson {
    let mut files: Vec<BundleEntry> = brick
        .template_files
        .iter()
        .map(|f| encode_entry(&f.rel_path, &f.bytes))
        .collect();
    files.sort_by(|a, b| a.path.cmp(&b.path));

    let mut hooks: Vec<BundleEntry> = [&brick.hooks.pre_gen, &brick.hooks.post_gen, &brick.hooks.manifest]
        .into_iter()
        .flatten()
        .map(|h| encode_entry(&h.rel_path, &h.bytes))
        .collect();
    hooks.sort_by(|a, b| a.path.cmp(&b.path));

    BundleJson {
        name: brick.metadata.name.clone(),
        description: brick.metadata.description.clone(),
        version: brick.metadata.version.clone(),
        publish_to: brick.metadata.publish_to.clone(),
        vars: brick.metadata.vars.clone(),
        files,
        hooks,
    }
}

fn is_manifest(path: &str) -> bool {
    HOOK_MANIFESTS.iter().any(|(name, _)| *name == path)
}

fn hook_stem(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path).split('.').next().unwrap_or(path)
}

fn from_json(bundle: BundleJson) -> Result<Brick> {
    crate::brick::validate_brick_name(&bundle.name)?;

    let mut template_files = Vec::with_capacity(bundle.files.len());
    for entry in &bundle.files {
        template_files.push(TemplateFile {
            rel_path: entry.path.clone(),
            bytes: decode_entry(entry)?,
        });
    }
    template_files.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));

    let mut hooks = Hooks::default();
    for entry in &bundle.hooks {
        let file = HookFile { rel_path: entry.path.clone(), bytes: decode_entry(entry)? };
        if is_manifest(&entry.path) {
            hooks.manifest = Some(file);
        } else if hook_stem(&entry.path) == PRE_GEN_HOOK_STEM {
            hooks.pre_gen = Some(file);
        } else if hook_stem(&entry.path) == POST_GEN_HOOK_STEM {
            hooks.post_gen = Some(file);
        }
    }

    Ok(Brick {
        metadata: BrickYaml {
            name: bundle.name,
            description: bundle.description,
            version: bundle.version,
            publish_to: bundle.publish_to,
            vars: bundle.vars,
            extra: IndexMap::new(),
        },
        template_files,
        hooks,
    })
}

/// Serializes a brick to the universal (Deflate-of-JSON) format.
pub fn encode_universal(brick: &Brick) -> Result<Vec<u8>> {
    let json = serde_json::to_string(&to_json(brick))?;
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(json.as_bytes())?;
    Ok(encoder.finish()?)
}

/// Parses a brick from the universal format. Trailing whitespace in the
/// plaintext is tolerated; unknown top-level keys are ignored.
pub fn decode_universal(bytes: &[u8]) -> Result<Brick> {
    let mut decoder = DeflateDecoder::new(bytes);
    let mut json = String::new();
    decoder.read_to_string(&mut json).map_err(|e| Error::BundleDecode {
        message: format!("not a deflate stream: {e}"),
    })?;
    let bundle: BundleJson = serde_json::from_str(json.trim_end())
        .map_err(|e| Error::BundleDecode { message: format!("malformed bundle JSON: {e}") })?;
    from_json(bundle)
}

/// Serializes a brick to the source format: a generated source file that
/// embeds the bundle JSON as a string constant between stable markers.
pub fn encode_source(brick: &Brick) -> Result<String> {
    let json = serde_json::to_string(&to_json(brick))?;
    // String-encoding the compact JSON produces a literal that is valid in
    // both JSON and Rust (the inner encoding leaves no raw control bytes).
    let literal = serde_json::to_string(&json)?;
    Ok(format!(
        "// GENERATED CODE - DO NOT MODIFY BY HAND\n\
         {SOURCE_BUNDLE_BEGIN}\n\
         pub const BUNDLE: &str = {literal};\n\
         {SOURCE_BUNDLE_END}\n"
    ))
}

/// Parses a brick back out of a source bundle.
pub fn decode_source(text: &str) -> Result<Brick> {
    let begin = text.find(SOURCE_BUNDLE_BEGIN).ok_or_else(|| Error::BundleDecode {
        message: "missing bundle begin marker".to_string(),
    })?;
    let end = text.find(SOURCE_BUNDLE_END).ok_or_else(|| Error::BundleDecode {
        message: "missing bundle end marker".to_string(),
    })?;
    let body = &text[begin + SOURCE_BUNDLE_BEGIN.len()..end];

    let literal_start = body.find('"').ok_or_else(|| Error::BundleDecode {
        message: "no bundle literal between markers".to_string(),
    })?;
    let literal_end = body.rfind('"').filter(|e| *e > literal_start).ok_or_else(|| {
        Error::BundleDecode { message: "unterminated bundle literal".to_string() }
    })?;
    let literal = &body[literal_start..=literal_end];

    let json: String = serde_json::from_str(literal).map_err(|e| Error::BundleDecode {
        message: format!("malformed bundle literal: {e}"),
    })?;
    let bundle: BundleJson = serde_json::from_str(&json)
        .map_err(|e| Error::BundleDecode { message: format!("malformed bundle JSON: {e}") })?;
    from_json(bundle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brick::VariableType;
    use serde_json::json;

    fn sample_brick() -> Brick {
        let mut vars = IndexMap::new();
        vars.insert(
            "name".to_string(),
            VariableDef {
                var_type: VariableType::String,
                description: None,
                default: Some(json!("Dash")),
                prompt: Some("What is your name?".to_string()),
                values: Vec::new(),
            },
        );
        Brick {
            metadata: BrickYaml {
                name: "greeting".to_string(),
                description: "A brick that greets".to_string(),
                version: Version::new(0, 2, 1),
                publish_to: None,
                vars,
                extra: IndexMap::new(),
            },
            template_files: vec![
                TemplateFile {
                    rel_path: "GREETINGS.md".to_string(),
                    bytes: b"Hi {{name}}!".to_vec(),
                },
                TemplateFile {
                    rel_path: "assets/logo.bin".to_string(),
                    bytes: vec![0xde, 0xad, 0xbe, 0xef],
                },
            ],
            hooks: Hooks {
                pre_gen: Some(HookFile {
                    rel_path: "pre_gen.sh".to_string(),
                    bytes: b"run() { :; }\nrun \"$1\"\n".to_vec(),
                }),
                post_gen: None,
                manifest: Some(HookFile {
                    rel_path: "package.json".to_string(),
                    bytes: b"{}".to_vec(),
                }),
            },
        }
    }

    #[test]
    fn test_universal_round_trip() {
        let brick = sample_brick();
        let encoded = encode_universal(&brick).unwrap();
        let decoded = decode_universal(&encoded).unwrap();
        assert_eq!(decoded, brick);
    }

    #[test]
    fn test_source_round_trip() {
        let brick = sample_brick();
        let encoded = encode_source(&brick).unwrap();
        let decoded = decode_source(&encoded).unwrap();
        assert_eq!(decoded, brick);
    }

    #[test]
    fn test_binary_payloads_survive() {
        let brick = sample_brick();
        let decoded = decode_universal(&encode_universal(&brick).unwrap()).unwrap();
        let logo = decoded
            .template_files
            .iter()
            .find(|f| f.rel_path == "assets/logo.bin")
            .unwrap();
        assert_eq!(logo.bytes, vec![0xde, 0xad, 0xbe, 0xef]);
    }

    #[test]
    fn test_encode_sorts_files_by_path() {
        let mut brick = sample_brick();
        brick.template_files.reverse();
        let encoded = encode_universal(&brick).unwrap();

        let mut decoder = DeflateDecoder::new(encoded.as_slice());
        let mut json = String::new();
        decoder.read_to_string(&mut json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let paths: Vec<&str> = value["files"]
            .as_array()
            .unwrap()
            .iter()
            .map(|f| f["path"].as_str().unwrap())
            .collect();
        assert_eq!(paths, ["GREETINGS.md", "assets/logo.bin"]);
    }

    #[test]
    fn test_decode_ignores_unknown_top_level_keys() {
        let json = json!({
            "name": "widget",
            "files": [],
            "hooks": [],
            "something_new": {"nested": true},
        })
        .to_string();
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(json.as_bytes()).unwrap();
        let brick = decode_universal(&encoder.finish().unwrap()).unwrap();
        assert_eq!(brick.metadata.name, "widget");
    }

    #[test]
    fn test_decode_tolerates_trailing_whitespace() {
        let json = format!("{}\n\n  ", json!({"name": "widget"}));
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(json.as_bytes()).unwrap();
        let brick = decode_universal(&encoder.finish().unwrap()).unwrap();
        assert_eq!(brick.metadata.name, "widget");
    }

    #[test]
    fn test_decode_garbage_is_an_error() {
        let err = decode_universal(b"not deflate at all").unwrap_err();
        assert!(matches!(err, Error::BundleDecode { .. }));
    }

    #[test]
    fn test_decode_bad_base64_is_an_error() {
        let json = json!({
            "name": "widget",
            "files": [{"path": "a.txt", "data": "!!!not base64!!!", "type": "text"}],
        })
        .to_string();
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(json.as_bytes()).unwrap();
        let err = decode_universal(&encoder.finish().unwrap()).unwrap_err();
        assert!(format!("{err}").contains("a.txt"));
    }

    #[test]
    fn test_text_payload_must_be_utf8() {
        let json = json!({
            "name": "widget",
            "files": [{
                "path": "a.txt",
                "data": BASE64.encode([0xde, 0xad, 0xbe, 0xef]),
                "type": "text",
            }],
        })
        .to_string();
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(json.as_bytes()).unwrap();
        let err = decode_universal(&encoder.finish().unwrap()).unwrap_err();
        assert!(format!("{err}").contains("not valid UTF-8"));
    }

    #[test]
    fn test_hook_classification() {
        let brick = sample_brick();
        let decoded = decode_universal(&encode_universal(&brick).unwrap()).unwrap();
        assert!(decoded.hooks.pre_gen.is_some());
        assert!(decoded.hooks.post_gen.is_none());
        assert_eq!(decoded.hooks.manifest.unwrap().rel_path, "package.json");
    }
}
