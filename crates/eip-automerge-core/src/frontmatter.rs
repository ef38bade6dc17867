//! Front-matter parsing.
//!
//! An EIP starts with a YAML block fenced by `---` lines. The block must be
//! a mapping; values are flattened to strings (sequences are joined with
//! `", "`) and keys are kept exactly as written.

use std::collections::BTreeMap;

use serde_yaml::Value;

use crate::domain::{EipNumber, ParsedDocument};

/// Why a document's header block could not be read.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrontMatterError {
    #[error("document does not start with a front-matter block")]
    MissingOpeningDelimiter,

    #[error("front-matter block is not terminated")]
    Unterminated,

    #[error("invalid front-matter: {0}")]
    InvalidYaml(String),

    #[error("front-matter is not a key/value mapping")]
    NotAMapping,
}

/// Header block and body of a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontMatter {
    pub metadata: BTreeMap<String, String>,
    pub body: String,
}

fn is_fence(line: &str) -> bool {
    line.trim_end() == "---"
}

fn is_closing_fence(line: &str) -> bool {
    let line = line.trim_end();
    line == "---" || line == "..."
}

/// Split `text` into metadata and body.
pub fn split(text: &str) -> Result<FrontMatter, FrontMatterError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut lines = text.split_inclusive('\n');

    match lines.next() {
        Some(first) if is_fence(first) => {}
        _ => return Err(FrontMatterError::MissingOpeningDelimiter),
    }

    let mut yaml = String::new();
    let mut closed = false;
    for line in lines.by_ref() {
        if is_closing_fence(line) {
            closed = true;
            break;
        }
        yaml.push_str(line);
    }
    if !closed {
        return Err(FrontMatterError::Unterminated);
    }

    let body: String = lines.collect();
    let metadata = parse_metadata(&yaml)?;
    Ok(FrontMatter {
        metadata,
        body: body.trim_start_matches(['\r', '\n']).to_string(),
    })
}

fn parse_metadata(yaml: &str) -> Result<BTreeMap<String, String>, FrontMatterError> {
    if yaml.trim().is_empty() {
        return Ok(BTreeMap::new());
    }
    let value: Value =
        serde_yaml::from_str(yaml).map_err(|e| FrontMatterError::InvalidYaml(e.to_string()))?;
    let Value::Mapping(mapping) = value else {
        return Err(FrontMatterError::NotAMapping);
    };

    let mut metadata = BTreeMap::new();
    for (key, value) in mapping {
        let key = scalar_to_string(&key).ok_or(FrontMatterError::NotAMapping)?;
        metadata.insert(key, flatten(&value));
    }
    Ok(metadata)
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => Some(String::new()),
        _ => None,
    }
}

fn flatten(value: &Value) -> String {
    match value {
        Value::Sequence(items) => items
            .iter()
            .map(flatten)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", "),
        Value::Tagged(tagged) => flatten(&tagged.value),
        other => scalar_to_string(other).unwrap_or_default(),
    }
}

/// Parse a fetched EIP into a [`ParsedDocument`].
pub fn parse_document(
    path: &str,
    number: EipNumber,
    text: &str,
) -> Result<ParsedDocument, FrontMatterError> {
    let FrontMatter { metadata, body } = split(text)?;
    Ok(ParsedDocument {
        path: path.to_string(),
        number,
        metadata,
        body,
    })
}
