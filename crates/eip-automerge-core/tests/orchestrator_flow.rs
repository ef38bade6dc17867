//! End-to-end runs of the orchestrator against the in-memory forge.

use std::sync::Arc;

use eip_automerge_core::{
    CommentAction, Orchestrator, PolicyConfig, RunOutcome, SkipReason, TriggerContext,
    TriggerEvent, COMMENT_PREAMBLE, MERGE_MESSAGE,
};
use eip_forge::fakes::{CommentWrite, MemoryForge};
use eip_forge::{Account, ChangedFile, FileStatus, GitRef, MergeMethod, PullRequest, RepoRef};

const BASE: &str = "base000";
const HEAD: &str = "head111";
const PR: u64 = 42;

fn repo() -> RepoRef {
    RepoRef::new("ethereum", "EIPs")
}

fn doc(number: u64, status: &str, author: &str) -> String {
    format!(
        "---\neip: {number}\ntitle: Example\nauthor: {author}\nstatus: {status}\ncategory: Core\n---\n\n## Abstract\n\nText.\n"
    )
}

fn pull_request(author: &str, mergeable_state: &str) -> PullRequest {
    PullRequest {
        number: PR,
        state: "open".to_string(),
        merged: false,
        mergeable_state: Some(mergeable_state.to_string()),
        user: Account::new(author),
        base: GitRef {
            sha: BASE.to_string(),
            ref_name: "master".to_string(),
        },
        head: GitRef {
            sha: HEAD.to_string(),
            ref_name: "patch-1".to_string(),
        },
    }
}

fn trigger() -> TriggerContext {
    TriggerContext {
        event: TriggerEvent::PullRequest,
        repo: repo(),
        pull_number: Some(PR),
        base_sha: Some(BASE.to_string()),
        head_sha: Some(HEAD.to_string()),
    }
}

/// A forge with the repository and a clean PR opened by `pr_author`.
fn seeded(pr_author: &str, files: Vec<ChangedFile>) -> Arc<MemoryForge> {
    let forge = Arc::new(MemoryForge::new());
    forge.add_repository(&repo());
    forge.add_pull_request(&repo(), pull_request(pr_author, "clean"));
    forge.set_comparison(&repo(), BASE, HEAD, files);
    forge
}

/// Same text on both sides of the PR.
fn add_unchanged_status(forge: &MemoryForge, path: &str, text: &str) {
    forge.add_file(&repo(), BASE, path, text);
    forge.add_file(&repo(), HEAD, path, text);
}

fn modified(path: &str) -> ChangedFile {
    ChangedFile::new(path, FileStatus::Modified)
}

#[tokio::test]
async fn draft_edit_by_email_author_is_merged() {
    let forge = seeded("alice", vec![modified("EIPS/eip-1234.md")]);
    add_unchanged_status(
        &forge,
        "EIPS/eip-1234.md",
        &doc(1234, "Draft", "Alice <alice@example.com>"),
    );
    forge.add_user_email("alice@example.com", "alice");

    let outcome = Orchestrator::new(forge.clone()).run(&trigger()).await.unwrap();

    match outcome {
        RunOutcome::Merged { title, .. } => {
            assert_eq!(
                title,
                "Automatically merged updates to draft EIP(s) 1234 (#42)"
            );
        }
        other => panic!("expected merge, got {:?}", other),
    }

    let merges = forge.merges();
    assert_eq!(merges.len(), 1);
    assert_eq!(merges[0].number, PR);
    assert_eq!(merges[0].request.sha, HEAD);
    assert_eq!(merges[0].request.merge_method, MergeMethod::Squash);
    assert_eq!(merges[0].request.commit_message, MERGE_MESSAGE);
    assert!(forge.comment_writes().is_empty());
}

#[tokio::test]
async fn merge_title_lists_every_eip_in_ascending_order() {
    let forge = seeded(
        "alice",
        vec![modified("EIPS/eip-55.md"), modified("EIPS/eip-1.md")],
    );
    add_unchanged_status(&forge, "EIPS/eip-55.md", &doc(55, "Review", "Alice (@alice)"));
    add_unchanged_status(&forge, "EIPS/eip-1.md", &doc(1, "Last Call", "Alice (@alice)"));

    let outcome = Orchestrator::new(forge.clone()).run(&trigger()).await.unwrap();

    assert!(matches!(
        outcome,
        RunOutcome::Merged { ref title, .. }
            if title == "Automatically merged updates to draft EIP(s) 1, 55 (#42)"
    ));
}

#[tokio::test]
async fn final_eip_gets_a_comment_and_no_merge() {
    let forge = seeded("alice", vec![modified("EIPS/eip-55.md")]);
    add_unchanged_status(&forge, "EIPS/eip-55.md", &doc(55, "Final", "Alice (@alice)"));

    let outcome = Orchestrator::new(forge.clone()).run(&trigger()).await.unwrap();

    let RunOutcome::Commented { errors, action, .. } = outcome else {
        panic!("expected comment, got {:?}", outcome);
    };
    assert_eq!(action, CommentAction::Created);
    assert_eq!(
        errors,
        vec!["EIP 55 is in state Final, not Draft or Last Call".to_string()]
    );

    let comments = forge.comments(&repo(), PR);
    assert_eq!(comments.len(), 1);
    assert_eq!(
        comments[0].body,
        format!(
            "{}\n\n - EIP 55 is in state Final, not Draft or Last Call\n",
            COMMENT_PREAMBLE
        )
    );
    assert!(forge.merges().is_empty());
}

#[tokio::test]
async fn new_eip_alone_is_neither_merged_nor_commented() {
    let forge = seeded(
        "alice",
        vec![ChangedFile::new("EIPS/eip-9999.md", FileStatus::Added)],
    );
    forge.add_file(&repo(), HEAD, "EIPS/eip-9999.md", &doc(9999, "Draft", "Alice (@alice)"));

    let outcome = Orchestrator::new(forge.clone()).run(&trigger()).await.unwrap();

    assert_eq!(
        outcome,
        RunOutcome::NothingToMerge {
            notes: vec!["Contains new file EIPS/eip-9999.md".to_string()]
        }
    );
    assert!(forge.merges().is_empty());
    assert!(forge.comment_writes().is_empty());
}

#[tokio::test]
async fn non_eip_files_are_noted_not_reported() {
    let forge = seeded(
        "alice",
        vec![modified("README.md"), modified("assets/eip-1234/diagram.png")],
    );

    let outcome = Orchestrator::new(forge.clone()).run(&trigger()).await.unwrap();

    assert_eq!(
        outcome,
        RunOutcome::NothingToMerge {
            notes: vec![
                "File README.md is not an EIP".to_string(),
                "File assets/eip-1234/diagram.png is not an EIP".to_string(),
            ]
        }
    );
    assert!(forge.merges().is_empty());
    assert!(forge.comment_writes().is_empty());
}

#[tokio::test]
async fn draft_edit_mixed_with_other_files_is_not_merged() {
    let forge = seeded(
        "alice",
        vec![
            modified("EIPS/eip-1.md"),
            modified(".github/workflows/ci.yml"),
            ChangedFile::new("EIPS/eip-9999.md", FileStatus::Added),
        ],
    );
    add_unchanged_status(&forge, "EIPS/eip-1.md", &doc(1, "Draft", "Alice (@alice)"));

    let outcome = Orchestrator::new(forge.clone()).run(&trigger()).await.unwrap();

    assert_eq!(
        outcome,
        RunOutcome::NothingToMerge {
            notes: vec![
                "File .github/workflows/ci.yml is not an EIP".to_string(),
                "Contains new file EIPS/eip-9999.md".to_string(),
            ]
        }
    );
    assert!(forge.merges().is_empty());
    assert!(forge.comment_writes().is_empty());
}

#[tokio::test]
async fn violations_are_commented_even_alongside_other_files() {
    let forge = seeded(
        "alice",
        vec![modified("EIPS/eip-55.md"), modified("README.md")],
    );
    add_unchanged_status(&forge, "EIPS/eip-55.md", &doc(55, "Final", "Alice (@alice)"));

    let outcome = Orchestrator::new(forge.clone()).run(&trigger()).await.unwrap();

    let RunOutcome::Commented { errors, .. } = outcome else {
        panic!("expected comment, got {:?}", outcome);
    };
    assert_eq!(
        errors,
        vec!["EIP 55 is in state Final, not Draft or Last Call".to_string()]
    );
    assert!(forge.merges().is_empty());
}

#[tokio::test]
async fn empty_author_header_is_reported() {
    let forge = seeded("alice", vec![modified("EIPS/eip-77.md")]);
    add_unchanged_status(&forge, "EIPS/eip-77.md", &doc(77, "Draft", "\"\""));

    let outcome = Orchestrator::new(forge.clone()).run(&trigger()).await.unwrap();

    let RunOutcome::Commented { errors, .. } = outcome else {
        panic!("expected comment, got {:?}", outcome);
    };
    assert_eq!(
        errors,
        vec!["EIP 77 has no identifiable authors who can approve PRs".to_string()]
    );
    assert!(forge.merges().is_empty());
}

#[tokio::test]
async fn unresolved_email_stays_as_the_identity() {
    let forge = seeded("alice", vec![modified("EIPS/eip-78.md")]);
    add_unchanged_status(
        &forge,
        "EIPS/eip-78.md",
        &doc(78, "Draft", "Nobody <Nobody@example.com>, Other <nobody@example.com>"),
    );

    let outcome = Orchestrator::new(forge.clone()).run(&trigger()).await.unwrap();

    let RunOutcome::Commented { errors, .. } = outcome else {
        panic!("expected comment, got {:?}", outcome);
    };
    assert_eq!(
        errors,
        vec!["EIP 78 requires approval from one of (nobody@example.com)".to_string()]
    );
    // Looked up once; the second mention is served from the cache.
    assert_eq!(forge.searches(), vec!["nobody@example.com".to_string()]);
}

#[tokio::test]
async fn approval_from_a_listed_author_is_required() {
    let forge = seeded("mallory", vec![modified("EIPS/eip-1234.md")]);
    add_unchanged_status(
        &forge,
        "EIPS/eip-1234.md",
        &doc(1234, "Draft", "Alice (@alice), Bob (@bob)"),
    );

    let outcome = Orchestrator::new(forge.clone()).run(&trigger()).await.unwrap();
    let RunOutcome::Commented { errors, .. } = outcome else {
        panic!("expected comment, got {:?}", outcome);
    };
    assert_eq!(
        errors,
        vec!["EIP 1234 requires approval from one of (@alice, @bob)".to_string()]
    );
    assert!(forge.merges().is_empty());

    forge.add_review(&repo(), PR, "Bob", "APPROVED");
    let outcome = Orchestrator::new(forge.clone()).run(&trigger()).await.unwrap();
    assert!(matches!(outcome, RunOutcome::Merged { .. }));
}

#[tokio::test]
async fn approval_check_can_be_disabled() {
    let forge = seeded("mallory", vec![modified("EIPS/eip-1234.md")]);
    add_unchanged_status(&forge, "EIPS/eip-1234.md", &doc(1234, "Draft", "Alice (@alice)"));

    let outcome = Orchestrator::new(forge.clone())
        .with_policy(PolicyConfig {
            require_author_approval: false,
        })
        .run(&trigger())
        .await
        .unwrap();

    assert!(matches!(outcome, RunOutcome::Merged { .. }));
}

#[tokio::test]
async fn already_merged_pr_has_no_side_effects() {
    let forge = seeded("alice", vec![modified("EIPS/eip-1234.md")]);
    let mut pr = pull_request("alice", "clean");
    pr.merged = true;
    forge.add_pull_request(&repo(), pr);

    let outcome = Orchestrator::new(forge.clone()).run(&trigger()).await.unwrap();

    assert_eq!(outcome, RunOutcome::Skipped(SkipReason::AlreadyMerged));
    assert!(forge.merges().is_empty());
    assert!(forge.comment_writes().is_empty());
}

#[tokio::test]
async fn unclean_pr_is_skipped() {
    let forge = seeded("alice", vec![modified("EIPS/eip-55.md")]);
    forge.add_pull_request(&repo(), pull_request("alice", "blocked"));
    add_unchanged_status(&forge, "EIPS/eip-55.md", &doc(55, "Final", "Alice (@alice)"));

    let outcome = Orchestrator::new(forge.clone()).run(&trigger()).await.unwrap();

    assert_eq!(
        outcome,
        RunOutcome::Skipped(SkipReason::NotMergeable {
            state: "blocked".to_string()
        })
    );
    assert!(forge.comment_writes().is_empty());
}

#[tokio::test]
async fn build_without_pull_request_is_skipped() {
    let forge = Arc::new(MemoryForge::new());
    let trigger = TriggerContext {
        event: TriggerEvent::Build,
        repo: repo(),
        pull_number: None,
        base_sha: None,
        head_sha: None,
    };

    let outcome = Orchestrator::new(forge.clone()).run(&trigger).await.unwrap();

    assert_eq!(outcome, RunOutcome::Skipped(SkipReason::NotPullRequestBuild));
}

#[tokio::test]
async fn existing_bot_comment_is_updated_not_duplicated() {
    let forge = seeded("alice", vec![modified("EIPS/eip-55.md")]);
    add_unchanged_status(&forge, "EIPS/eip-55.md", &doc(55, "Final", "Alice (@alice)"));
    forge.add_comment(&repo(), PR, "alice", "Looks good to me");
    let stale = forge.add_comment(
        &repo(),
        PR,
        "github-actions[bot]",
        &format!("{}\n\n - something old\n", COMMENT_PREAMBLE),
    );

    let outcome = Orchestrator::new(forge.clone()).run(&trigger()).await.unwrap();
    assert!(matches!(
        outcome,
        RunOutcome::Commented { comment_id, action: CommentAction::Updated, .. } if comment_id == stale
    ));

    // A second identical run leaves the comment alone.
    let outcome = Orchestrator::new(forge.clone()).run(&trigger()).await.unwrap();
    assert!(matches!(
        outcome,
        RunOutcome::Commented { action: CommentAction::Unchanged, .. }
    ));

    assert_eq!(forge.comment_writes(), vec![CommentWrite::Updated(stale)]);
    let comments = forge.comments(&repo(), PR);
    assert_eq!(comments.len(), 2);
    assert!(comments[1].body.contains("EIP 55 is in state Final"));
}

#[tokio::test]
async fn fetch_failure_is_reported_per_file() {
    let forge = seeded(
        "alice",
        vec![modified("EIPS/eip-1.md"), modified("EIPS/eip-2.md")],
    );
    forge.fail_file(&repo(), BASE, "EIPS/eip-1.md", "connection reset");
    add_unchanged_status(&forge, "EIPS/eip-2.md", &doc(2, "Draft", "Alice (@alice)"));

    let outcome = Orchestrator::new(forge.clone()).run(&trigger()).await.unwrap();

    let RunOutcome::Commented { errors, .. } = outcome else {
        panic!("expected comment, got {:?}", outcome);
    };
    assert_eq!(
        errors,
        vec!["Error checking file EIPS/eip-1.md: HTTP error: connection reset".to_string()]
    );
    assert!(forge.merges().is_empty());
}

#[tokio::test]
async fn status_change_in_head_is_reported() {
    let forge = seeded("alice", vec![modified("EIPS/eip-10.md")]);
    forge.add_file(&repo(), BASE, "EIPS/eip-10.md", &doc(10, "Draft", "Alice (@alice)"));
    forge.add_file(&repo(), HEAD, "EIPS/eip-10.md", &doc(10, "Final", "Alice (@alice)"));

    let outcome = Orchestrator::new(forge.clone()).run(&trigger()).await.unwrap();

    let RunOutcome::Commented { errors, .. } = outcome else {
        panic!("expected comment, got {:?}", outcome);
    };
    assert_eq!(
        errors,
        vec!["Trying to change EIP 10 state from Draft to Final".to_string()]
    );
}

#[tokio::test]
async fn removed_draft_is_checked_against_base_only() {
    let forge = seeded(
        "alice",
        vec![ChangedFile::new("EIPS/eip-11.md", FileStatus::Removed)],
    );
    forge.add_file(&repo(), BASE, "EIPS/eip-11.md", &doc(11, "Draft", "Alice (@alice)"));

    let outcome = Orchestrator::new(forge.clone()).run(&trigger()).await.unwrap();

    assert!(matches!(outcome, RunOutcome::Merged { ref eips, .. } if eips.len() == 1));
}

#[tokio::test]
async fn dry_run_reports_without_writing() {
    let forge = seeded("alice", vec![modified("EIPS/eip-55.md")]);
    add_unchanged_status(&forge, "EIPS/eip-55.md", &doc(55, "Final", "Alice (@alice)"));

    let outcome = Orchestrator::new(forge.clone())
        .dry_run(true)
        .run(&trigger())
        .await
        .unwrap();

    let RunOutcome::DryRun(decision) = outcome else {
        panic!("expected dry run, got {:?}", outcome);
    };
    assert!(decision.has_violations());
    assert!(forge.comment_writes().is_empty());
    assert!(forge.merges().is_empty());
}

#[tokio::test]
async fn shas_fall_back_to_the_pull_request() {
    let forge = seeded("alice", vec![modified("EIPS/eip-1234.md")]);
    add_unchanged_status(&forge, "EIPS/eip-1234.md", &doc(1234, "Draft", "Alice (@alice)"));

    let outcome = Orchestrator::new(forge.clone())
        .run(&TriggerContext::for_pull_request(repo(), PR))
        .await
        .unwrap();

    assert!(matches!(outcome, RunOutcome::Merged { .. }));
    assert_eq!(forge.merges()[0].request.sha, HEAD);
}

#[tokio::test]
async fn missing_repository_is_fatal() {
    let forge = Arc::new(MemoryForge::new());

    let err = Orchestrator::new(forge).run(&trigger()).await.unwrap_err();

    assert!(err.to_string().contains("not found"), "{}", err);
}
