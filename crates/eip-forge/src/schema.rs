//! Response and request shapes for the hosted version-control API.
//!
//! Every type here is deserialised at the client boundary. A payload that
//! lacks a required field is reported as
//! [`ForgeError::MalformedResponse`](crate::ForgeError::MalformedResponse)
//! instead of surfacing later as a missing value.

use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::error::ForgeError;

/// `owner/name` pair identifying a repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    /// Parse an `owner/name` string.
    pub fn parse(full_name: &str) -> Option<Self> {
        let (owner, name) = full_name.split_once('/')?;
        if owner.is_empty() || name.is_empty() || name.contains('/') {
            return None;
        }
        Some(Self::new(owner, name))
    }

    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

impl std::fmt::Display for RepoRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// A user or organisation account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub login: String,
}

impl Account {
    pub fn new(login: impl Into<String>) -> Self {
        Self {
            login: login.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub name: String,
    pub full_name: String,
    pub owner: Account,
}

/// One side (base or head) of a pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitRef {
    pub sha: String,
    #[serde(rename = "ref", default)]
    pub ref_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub merged: bool,
    /// `clean`, `dirty`, `blocked`, `unstable`, `unknown`, ...; absent while
    /// the host is still computing it.
    #[serde(default)]
    pub mergeable_state: Option<String>,
    pub user: Account,
    pub base: GitRef,
    pub head: GitRef,
}

impl PullRequest {
    /// Whether the host reports the PR as mergeable with passing checks.
    pub fn is_clean(&self) -> bool {
        self.mergeable_state.as_deref() == Some("clean")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    /// Absent for reviews by deleted accounts.
    #[serde(default)]
    pub user: Option<Account>,
    pub state: String,
}

impl Review {
    pub fn is_approval(&self) -> bool {
        self.state.eq_ignore_ascii_case("APPROVED")
    }
}

/// Per-file change kind reported by a commit comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Added,
    Modified,
    Removed,
    Renamed,
    Copied,
    Changed,
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangedFile {
    pub filename: String,
    pub status: FileStatus,
    #[serde(default)]
    pub previous_filename: Option<String>,
    #[serde(default)]
    pub contents_url: Option<String>,
}

impl ChangedFile {
    pub fn new(filename: impl Into<String>, status: FileStatus) -> Self {
        Self {
            filename: filename.into(),
            status,
            previous_filename: None,
            contents_url: None,
        }
    }

    /// Path of this file before the change.
    pub fn base_path(&self) -> &str {
        self.previous_filename.as_deref().unwrap_or(&self.filename)
    }
}

/// Result of comparing two commits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comparison {
    #[serde(default)]
    pub files: Vec<ChangedFile>,
}

/// Raw `contents` payload, base64 encoded.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawContent {
    pub path: String,
    pub name: String,
    pub content: String,
    #[serde(default)]
    pub encoding: Option<String>,
}

/// A decoded text file fetched at a specific git ref.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileContent {
    pub path: String,
    pub name: String,
    pub text: String,
}

impl FileContent {
    pub fn new(path: impl Into<String>, text: impl Into<String>) -> Self {
        let path = path.into();
        let name = path.rsplit('/').next().unwrap_or(&path).to_string();
        Self {
            path,
            name,
            text: text.into(),
        }
    }
}

impl TryFrom<RawContent> for FileContent {
    type Error = ForgeError;

    fn try_from(raw: RawContent) -> Result<Self, Self::Error> {
        if let Some(encoding) = raw.encoding.as_deref() {
            if encoding != "base64" {
                return Err(ForgeError::Decode {
                    path: raw.path,
                    reason: format!("unsupported encoding {encoding}"),
                });
            }
        }
        let text = decode_base64_text(&raw.content).map_err(|reason| ForgeError::Decode {
            path: raw.path.clone(),
            reason,
        })?;
        Ok(FileContent {
            path: raw.path,
            name: raw.name,
            text,
        })
    }
}

/// Decode a base64 body that may be wrapped across lines.
pub fn decode_base64_text(encoded: &str) -> Result<String, String> {
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(compact)
        .map_err(|e| e.to_string())?;
    String::from_utf8(bytes).map_err(|e| e.to_string())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueComment {
    pub id: u64,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub user: Option<Account>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeMethod {
    Merge,
    Squash,
    Rebase,
}

/// Body of a merge call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeRequest {
    pub commit_title: String,
    pub commit_message: String,
    /// Head SHA the merge is expected to apply to.
    pub sha: String,
    pub merge_method: MergeMethod,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeResult {
    #[serde(default)]
    pub sha: Option<String>,
    pub merged: bool,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub login: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct UserSearch {
    #[serde(default)]
    pub items: Vec<UserSummary>,
}
