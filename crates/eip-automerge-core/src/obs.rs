//! Structured observability hooks for automerge runs.
//!
//! - `run_span`: span tagging everything inside a run with its id,
//!   repository and PR number
//! - `emit_*`: one `info!` line per lifecycle step, keyed by `event`

use tracing::{info, warn, Span};

use crate::domain::EipNumber;

/// Span tagging everything inside a run with its id, repository and PR.
///
/// Attach it to the run future with `tracing::Instrument`, so it is entered
/// only while the run is being polled.
pub fn run_span(run_id: &str, repo: &str, pr: u64) -> Span {
    tracing::info_span!("automerge.run", run_id = %run_id, repo = %repo, pr = pr)
}

pub fn emit_run_started(repo: &str, pr: u64) {
    info!(event = "run.started", repo = %repo, pr = pr);
}

pub fn emit_run_skipped(pr: u64, reason: &str) {
    info!(event = "run.skipped", pr = pr, reason = %reason);
}

/// Emit event: changed files sorted into documents.
pub fn emit_documents_classified(total_files: usize, documents: usize, new_documents: usize) {
    info!(
        event = "documents.classified",
        total_files = total_files,
        documents = documents,
        new_documents = new_documents,
    );
}

pub fn emit_policy_evaluated(eligible: usize, violations: usize, mergeable: bool) {
    info!(
        event = "policy.evaluated",
        eligible = eligible,
        violations = violations,
        mergeable = mergeable,
    );
}

pub fn emit_pr_merged(pr: u64, eips: &[EipNumber], sha: Option<&str>) {
    let eips: Vec<String> = eips.iter().map(|n| n.to_string()).collect();
    info!(
        event = "pr.merged",
        pr = pr,
        eips = %eips.join(","),
        sha = sha.unwrap_or(""),
    );
}

pub fn emit_comment_posted(pr: u64, comment_id: u64, updated: bool, errors: usize) {
    info!(
        event = "comment.posted",
        pr = pr,
        comment_id = comment_id,
        updated = updated,
        errors = errors,
    );
}

/// Emit event: run aborted by a fatal error (warning level).
pub fn emit_run_failed(error: &dyn std::fmt::Display) {
    warn!(event = "run.failed", error = %error);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_span_create() {
        let span = run_span("test-run", "ethereum/EIPs", 1);
        let _entered = span.enter();
        emit_run_started("ethereum/EIPs", 1);
    }
}
