//! Automerge policy engine.
//!
//! Evaluates every EIP touched by a pull request against the merge rules
//! and produces a [`Decision`]: the eligible documents, the ordered list of
//! [`PolicyViolation`]s, and notes on files that rule out a merge. Violations never abort
//! evaluation; each document is checked independently.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::authors::AuthorResolver;
use crate::domain::{ApprovalSet, DocumentInfo, DocumentRevision, EipNumber};

/// Lifecycle statuses eligible for automatic merge, lower-cased.
pub const ALLOWED_STATUSES: [&str; 3] = ["draft", "review", "last call"];

/// Case-insensitive membership in [`ALLOWED_STATUSES`].
pub fn is_early_status(status: &str) -> bool {
    let status = status.trim().to_lowercase();
    ALLOWED_STATUSES.contains(&status.as_str())
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

/// The rule a violation was raised by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyRule {
    /// The document could be fetched and its header parsed.
    ReadableDocument,
    /// The pre-change document declares a status.
    HasStatus,
    /// The pre-change status is Draft, Review or Last Call.
    EarlyStatus,
    /// The `eip` header of the changed document matches its file name.
    HeaderMatchesFile,
    /// The PR does not change the document's status.
    StatusUnchanged,
    /// The document lists at least one identifiable author.
    HasAuthors,
    /// An author approved or submitted the PR.
    AuthorApproval,
}

/// Knobs for rules whose enforcement is a policy decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Require an author of every EIP to have approved or opened the PR.
    pub require_author_approval: bool,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            require_author_approval: true,
        }
    }
}

/// A single failed rule, rendered as one line of the bot's comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyViolation {
    pub rule: PolicyRule,
    pub eip: Option<EipNumber>,
    pub message: String,
}

impl PolicyViolation {
    fn new(rule: PolicyRule, eip: Option<EipNumber>, message: String) -> Self {
        Self { rule, eip, message }
    }

    /// A document that could not be fetched or parsed.
    pub fn unreadable(number: EipNumber, path: &str, reason: &str) -> Self {
        Self::new(
            PolicyRule::ReadableDocument,
            Some(number),
            format!("Error checking file {}: {}", path, reason),
        )
    }
}

impl fmt::Display for PolicyViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

// ---------------------------------------------------------------------------
// Per-document checks
// ---------------------------------------------------------------------------

/// The pre-change document must be in an early lifecycle stage.
pub fn check_lifecycle(revision: &DocumentRevision) -> Option<PolicyViolation> {
    let number = revision.number;
    match revision.base.status() {
        None => Some(PolicyViolation::new(
            PolicyRule::HasStatus,
            Some(number),
            format!("EIP {} has no status header", number),
        )),
        Some(status) if !is_early_status(status) => Some(PolicyViolation::new(
            PolicyRule::EarlyStatus,
            Some(number),
            format!("EIP {} is in state {}, not Draft or Last Call", number, status),
        )),
        Some(_) => None,
    }
}

/// The changed document must keep its number and status.
pub fn check_head(revision: &DocumentRevision) -> Vec<PolicyViolation> {
    let Some(head) = &revision.head else {
        return Vec::new();
    };
    let number = revision.number;
    let mut violations = Vec::new();

    if let Some(declared) = head.header("eip").map(str::trim) {
        if declared != number.to_string() {
            violations.push(PolicyViolation::new(
                PolicyRule::HeaderMatchesFile,
                Some(number),
                format!(
                    "EIP header in modified file {} does not match: {}",
                    head.path, declared
                ),
            ));
        }
    }

    let old = revision.base.status().unwrap_or_default();
    let new = head.status().unwrap_or_default();
    if !old.eq_ignore_ascii_case(new) {
        violations.push(PolicyViolation::new(
            PolicyRule::StatusUnchanged,
            Some(number),
            format!("Trying to change EIP {} state from {} to {}", number, old, new),
        ));
    }

    violations
}

/// Authors must be identifiable and, when required, one must have approved.
pub fn check_authors(
    info: &DocumentInfo,
    approvals: &ApprovalSet,
    config: &PolicyConfig,
) -> Option<PolicyViolation> {
    if info.authors.is_empty() {
        return Some(PolicyViolation::new(
            PolicyRule::HasAuthors,
            Some(info.number),
            format!(
                "EIP {} has no identifiable authors who can approve PRs",
                info.number
            ),
        ));
    }
    if config.require_author_approval && !approvals.approves_any(&info.authors) {
        let authors: Vec<&str> = info.authors.iter().map(String::as_str).collect();
        return Some(PolicyViolation::new(
            PolicyRule::AuthorApproval,
            Some(info.number),
            format!(
                "EIP {} requires approval from one of ({})",
                info.number,
                authors.join(", ")
            ),
        ));
    }
    None
}

// ---------------------------------------------------------------------------
// Decision
// ---------------------------------------------------------------------------

/// What loading one changed EIP produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentOutcome {
    /// A changed file outside `EIPS/eip-N.md`.
    NotDocument { path: String },
    /// A newly added EIP.
    New { number: EipNumber, path: String },
    /// A pre-existing EIP with its base (and head) content parsed.
    Loaded(DocumentRevision),
    /// Fetching or parsing failed.
    Failed {
        number: EipNumber,
        path: String,
        reason: String,
    },
}

/// The outcome of evaluating every touched EIP.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    /// Eligible (pre-existing, early-stage) documents with their authors.
    pub documents: Vec<DocumentInfo>,
    /// Violations in detection order.
    pub violations: Vec<PolicyViolation>,
    /// Files that rule out an automatic merge without being errors: new
    /// EIPs and anything that is not an EIP. Never posted as a comment.
    pub notes: Vec<String>,
}

impl Decision {
    /// Merge iff every touched file is an existing EIP that passed.
    pub fn is_mergeable(&self) -> bool {
        self.violations.is_empty() && self.notes.is_empty() && !self.documents.is_empty()
    }

    pub fn has_violations(&self) -> bool {
        !self.violations.is_empty()
    }

    pub fn error_messages(&self) -> Vec<String> {
        self.violations.iter().map(|v| v.message.clone()).collect()
    }

    /// Eligible EIP numbers, ascending and de-duplicated.
    pub fn eip_numbers(&self) -> Vec<EipNumber> {
        self.documents
            .iter()
            .map(|d| d.number)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Applies the rules to a PR's documents.
pub struct PolicyEvaluator<'a> {
    resolver: &'a AuthorResolver,
    config: PolicyConfig,
}

impl<'a> PolicyEvaluator<'a> {
    pub fn new(resolver: &'a AuthorResolver, config: PolicyConfig) -> Self {
        Self { resolver, config }
    }

    /// Evaluate all outcomes, in order, against `approvals`.
    pub async fn evaluate(&self, outcomes: &[DocumentOutcome], approvals: &ApprovalSet) -> Decision {
        let mut decision = Decision::default();

        for outcome in outcomes {
            match outcome {
                DocumentOutcome::NotDocument { path } => {
                    decision.notes.push(format!("File {} is not an EIP", path));
                }
                DocumentOutcome::New { path, .. } => {
                    decision.notes.push(format!("Contains new file {}", path));
                }
                DocumentOutcome::Failed {
                    number,
                    path,
                    reason,
                } => {
                    decision
                        .violations
                        .push(PolicyViolation::unreadable(*number, path, reason));
                }
                DocumentOutcome::Loaded(revision) => {
                    if let Some(violation) = check_lifecycle(revision) {
                        decision.violations.push(violation);
                        continue;
                    }
                    decision.violations.extend(check_head(revision));

                    let authors = self
                        .resolver
                        .resolve(revision.base.author().unwrap_or_default())
                        .await;
                    let info = DocumentInfo {
                        number: revision.number,
                        authors,
                    };
                    if let Some(violation) = check_authors(&info, approvals, &self.config) {
                        decision.violations.push(violation);
                    }
                    decision.documents.push(info);
                }
            }
        }

        decision
    }
}
