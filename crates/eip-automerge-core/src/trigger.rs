//! CI trigger context.
//!
//! Reads which repository and pull request a run is about, either from the
//! GitHub Actions environment (`GITHUB_EVENT_NAME`, `GITHUB_EVENT_PATH`,
//! `GITHUB_REPOSITORY`) or, with `AUTOMERGE_ENV=development`, from plain
//! variables for local invocation:
//!
//! - BASE_SHA, HEAD_SHA (required)
//! - REPO_OWNER_NAME, REPO_NAME (required)
//! - PULL_NUMBER (optional, default: 1)

use std::path::Path;

use eip_forge::{Account, RepoRef};
use serde::{Deserialize, Serialize};

use crate::domain::TriggerError;

/// Events the bot reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerEvent {
    PullRequest,
    PullRequestReview,
    /// A generic CI build notification carrying `pull_request_number`.
    Build,
}

impl TriggerEvent {
    pub fn parse(name: &str) -> Result<Self, TriggerError> {
        match name {
            "pull_request" | "pull_request_target" => Ok(TriggerEvent::PullRequest),
            "pull_request_review" => Ok(TriggerEvent::PullRequestReview),
            "build" => Ok(TriggerEvent::Build),
            other => Err(TriggerError::UnsupportedEvent {
                event: other.to_string(),
            }),
        }
    }
}

/// Everything a run needs to know about what triggered it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerContext {
    pub event: TriggerEvent,
    pub repo: RepoRef,
    /// `None` for build events that are not about a pull request.
    pub pull_number: Option<u64>,
    pub base_sha: Option<String>,
    pub head_sha: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PayloadSha {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct PayloadPullRequest {
    number: u64,
    #[serde(default)]
    base: Option<PayloadSha>,
    #[serde(default)]
    head: Option<PayloadSha>,
}

#[derive(Debug, Default, Deserialize)]
struct PayloadRepository {
    #[serde(default)]
    full_name: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    owner: Option<Account>,
    #[serde(default)]
    owner_name: Option<String>,
}

impl PayloadRepository {
    fn repo_ref(&self) -> Option<RepoRef> {
        if let Some(full) = self.full_name.as_deref().and_then(RepoRef::parse) {
            return Some(full);
        }
        let name = self.name.as_deref()?;
        let owner = self
            .owner
            .as_ref()
            .map(|o| o.login.as_str())
            .or(self.owner_name.as_deref())?;
        Some(RepoRef::new(owner, name))
    }
}

#[derive(Debug, Deserialize)]
struct PullRequestPayload {
    #[serde(default)]
    pull_request: Option<PayloadPullRequest>,
    #[serde(default)]
    repository: Option<PayloadRepository>,
}

#[derive(Debug, Deserialize)]
struct BuildPayload {
    #[serde(default)]
    pull_request_number: Option<u64>,
    #[serde(default)]
    repository: Option<PayloadRepository>,
}

impl TriggerContext {
    /// Build a context from an event name and its JSON payload.
    ///
    /// `fallback_repo` is used when the payload does not name a repository.
    pub fn from_payload(
        event_name: &str,
        payload: &serde_json::Value,
        fallback_repo: Option<RepoRef>,
    ) -> Result<Self, TriggerError> {
        let event = TriggerEvent::parse(event_name)?;
        let invalid = |e: serde_json::Error| TriggerError::InvalidPayload(e.to_string());

        match event {
            TriggerEvent::PullRequest | TriggerEvent::PullRequestReview => {
                let payload: PullRequestPayload =
                    serde_json::from_value(payload.clone()).map_err(invalid)?;
                let pr = payload
                    .pull_request
                    .ok_or(TriggerError::MissingPullRequest)?;
                let repo = payload
                    .repository
                    .and_then(|r| r.repo_ref())
                    .or(fallback_repo)
                    .ok_or_else(|| {
                        TriggerError::InvalidRepository("payload names no repository".into())
                    })?;
                Ok(Self {
                    event,
                    repo,
                    pull_number: Some(pr.number),
                    base_sha: pr.base.map(|b| b.sha),
                    head_sha: pr.head.map(|h| h.sha),
                })
            }
            TriggerEvent::Build => {
                let payload: BuildPayload =
                    serde_json::from_value(payload.clone()).map_err(invalid)?;
                let repo = payload
                    .repository
                    .unwrap_or_default()
                    .repo_ref()
                    .or(fallback_repo)
                    .ok_or_else(|| {
                        TriggerError::InvalidRepository("payload names no repository".into())
                    })?;
                Ok(Self {
                    event,
                    repo,
                    pull_number: payload.pull_request_number,
                    base_sha: None,
                    head_sha: None,
                })
            }
        }
    }

    /// Read the GitHub Actions environment through `var`.
    pub fn from_actions_env_with<F>(var: F) -> Result<Self, TriggerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let require = |key: &str| var(key).ok_or_else(|| TriggerError::MissingEnv(key.into()));

        let event_name = require("GITHUB_EVENT_NAME")?;
        let event_path = require("GITHUB_EVENT_PATH")?;
        let fallback_repo = match var("GITHUB_REPOSITORY") {
            Some(full) => Some(
                RepoRef::parse(&full).ok_or(TriggerError::InvalidRepository(full))?,
            ),
            None => None,
        };

        let payload = read_payload(Path::new(&event_path))?;
        Self::from_payload(&event_name, &payload, fallback_repo)
    }

    /// Synthesise a `pull_request` context from development variables.
    pub fn from_development_env_with<F>(var: F) -> Result<Self, TriggerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let require = |key: &str| var(key).ok_or_else(|| TriggerError::MissingEnv(key.into()));

        let pull_number = match var("PULL_NUMBER") {
            Some(raw) => raw.parse().map_err(|_| {
                TriggerError::InvalidPayload(format!("PULL_NUMBER is not a number: {raw}"))
            })?,
            None => 1,
        };

        Ok(Self {
            event: TriggerEvent::PullRequest,
            repo: RepoRef::new(require("REPO_OWNER_NAME")?, require("REPO_NAME")?),
            pull_number: Some(pull_number),
            base_sha: Some(require("BASE_SHA")?),
            head_sha: Some(require("HEAD_SHA")?),
        })
    }

    /// Pick development or Actions mode based on `AUTOMERGE_ENV`.
    pub fn from_env_with<F>(var: F) -> Result<Self, TriggerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if var("AUTOMERGE_ENV").as_deref() == Some("development") {
            tracing::info!("establishing development context");
            Self::from_development_env_with(var)
        } else {
            Self::from_actions_env_with(var)
        }
    }

    /// Read the trigger from the process environment.
    pub fn from_env() -> Result<Self, TriggerError> {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    /// Direct invocation for a known PR, outside any CI event.
    pub fn for_pull_request(repo: RepoRef, number: u64) -> Self {
        Self {
            event: TriggerEvent::PullRequest,
            repo,
            pull_number: Some(number),
            base_sha: None,
            head_sha: None,
        }
    }
}

fn read_payload(path: &Path) -> Result<serde_json::Value, TriggerError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        TriggerError::InvalidPayload(format!("cannot read {}: {}", path.display(), e))
    })?;
    serde_json::from_str(&content).map_err(|e| TriggerError::InvalidPayload(e.to_string()))
}
