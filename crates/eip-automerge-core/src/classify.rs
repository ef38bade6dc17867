//! Changed-file classification.
//!
//! A path is an EIP document iff it matches `EIPS/eip-<number>.md`
//! exactly. Anything else is dropped before any content is fetched.

use std::sync::OnceLock;

use eip_forge::{ChangedFile, FileStatus};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::EipNumber;

fn file_re() -> &'static Regex {
    static FILE_RE: OnceLock<Regex> = OnceLock::new();
    FILE_RE.get_or_init(|| Regex::new(r"^EIPS/eip-(\d+)\.md$").expect("valid regex"))
}

/// Extract the EIP number from a document path.
pub fn eip_number(path: &str) -> Option<EipNumber> {
    let caps = file_re().captures(path)?;
    caps.get(1)?.as_str().parse().ok().map(EipNumber)
}

/// How a changed file takes part in the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FileClass {
    /// Not an EIP document; never merged automatically.
    NotDocument { path: String },
    /// A document that did not exist before the PR.
    NewDocument { number: EipNumber, path: String },
    /// A modification of a pre-existing document.
    ExistingDocument {
        number: EipNumber,
        path: String,
        /// Path to read the pre-change content from.
        base_path: String,
        /// Whether the document still exists at head.
        exists_at_head: bool,
    },
}

impl FileClass {
    pub fn is_document(&self) -> bool {
        !matches!(self, FileClass::NotDocument { .. })
    }
}

/// Classify one entry of a commit comparison.
pub fn classify(file: &ChangedFile) -> FileClass {
    let path = file.filename.clone();
    let Some(number) = eip_number(&path) else {
        return FileClass::NotDocument { path };
    };
    let base_path = file.base_path();

    match file.status {
        FileStatus::Added | FileStatus::Copied => FileClass::NewDocument { number, path },
        // A rename from outside `EIPS/` brings in a new document.
        FileStatus::Renamed
            if file.previous_filename.is_none() || eip_number(base_path).is_none() =>
        {
            FileClass::NewDocument { number, path }
        }
        status => FileClass::ExistingDocument {
            number,
            base_path: base_path.to_string(),
            path,
            exists_at_head: !matches!(status, FileStatus::Removed),
        },
    }
}
