//! One automerge run, end to end.
//!
//! Sequence: validate trigger → load repository and PR → precondition
//! checks → compare base/head → classify files → fetch and parse EIPs
//! concurrently → evaluate policy → merge or comment.
//!
//! Merge and comment are mutually exclusive: a run with violations only
//! comments, a run without violations that touches only existing EIPs
//! merges, and anything else (a new EIP, any other file) writes nothing.

use std::sync::Arc;

use eip_forge::{ForgeApi, MergeMethod, MergeRequest, RepoRef};
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tracing::{debug, info, warn, Instrument};
use uuid::Uuid;

use crate::authors::AuthorResolver;
use crate::classify::{classify, FileClass};
use crate::domain::{ApprovalSet, AutomergeError, DocumentRevision, EipNumber, Result};
use crate::frontmatter::parse_document;
use crate::obs;
use crate::policy::{Decision, DocumentOutcome, PolicyConfig, PolicyEvaluator};
use crate::render::{comment_body, commit_title, is_bot_comment, MERGE_MESSAGE};
use crate::trigger::TriggerContext;

/// Why a run ended without evaluating anything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// A build event that is not about a pull request.
    NotPullRequestBuild,
    AlreadyMerged,
    /// Conflicts, pending or failing checks; a later event re-evaluates.
    NotMergeable { state: String },
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::NotPullRequestBuild => write!(f, "not a PR build"),
            SkipReason::AlreadyMerged => write!(f, "already merged"),
            SkipReason::NotMergeable { state } => write!(f, "mergeable state is {}", state),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommentAction {
    Created,
    Updated,
    /// The existing comment already said the same thing.
    Unchanged,
}

/// What a run did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    Skipped(SkipReason),
    /// No violations, but the PR is not limited to existing EIPs (or
    /// touches none); the notes say why.
    NothingToMerge { notes: Vec<String> },
    Merged {
        title: String,
        sha: Option<String>,
        eips: Vec<EipNumber>,
    },
    Commented {
        comment_id: u64,
        action: CommentAction,
        errors: Vec<String>,
    },
    /// Evaluation only; nothing was written.
    DryRun(Decision),
}

/// Drives a run against a [`ForgeApi`].
pub struct Orchestrator {
    forge: Arc<dyn ForgeApi>,
    policy: PolicyConfig,
    dry_run: bool,
}

impl Orchestrator {
    pub fn new(forge: Arc<dyn ForgeApi>) -> Self {
        Self {
            forge,
            policy: PolicyConfig::default(),
            dry_run: false,
        }
    }

    pub fn with_policy(mut self, policy: PolicyConfig) -> Self {
        self.policy = policy;
        self
    }

    /// Evaluate without merging or commenting.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Execute one run for `trigger`.
    pub async fn run(&self, trigger: &TriggerContext) -> Result<RunOutcome> {
        let Some(number) = trigger.pull_number else {
            info!("build is not a PR build; quitting");
            obs::emit_run_skipped(0, &SkipReason::NotPullRequestBuild.to_string());
            return Ok(RunOutcome::Skipped(SkipReason::NotPullRequestBuild));
        };

        let run_id = Uuid::new_v4().to_string();
        let span = obs::run_span(&run_id, &trigger.repo.full_name(), number);
        let result = self.run_pull_request(trigger, number).instrument(span).await;
        if let Err(err) = &result {
            obs::emit_run_failed(err);
        }
        result
    }

    async fn run_pull_request(&self, trigger: &TriggerContext, number: u64) -> Result<RunOutcome> {
        obs::emit_run_started(&trigger.repo.full_name(), number);

        let repository = self.forge.get_repository(&trigger.repo).await?;
        let repo = RepoRef::new(repository.owner.login, repository.name);
        info!(repo = %repository.full_name, "checking PR {}", number);

        let pr = self.forge.get_pull_request(&repo, number).await?;
        if pr.merged {
            info!("PR {} is already merged; quitting", number);
            return Ok(self.skip(number, SkipReason::AlreadyMerged));
        }
        if !pr.is_clean() {
            let state = pr
                .mergeable_state
                .clone()
                .unwrap_or_else(|| "unknown".to_string());
            info!("PR {} mergeable state is {}; quitting", number, state);
            return Ok(self.skip(number, SkipReason::NotMergeable { state }));
        }

        let base = trigger.base_sha.clone().unwrap_or_else(|| pr.base.sha.clone());
        let head = trigger.head_sha.clone().unwrap_or_else(|| pr.head.sha.clone());

        let comparison = self.forge.compare_commits(&repo, &base, &head).await?;
        let classes: Vec<FileClass> = comparison.files.iter().map(classify).collect();
        let documents = classes.iter().filter(|c| c.is_document()).count();
        let new_documents = classes
            .iter()
            .filter(|c| matches!(c, FileClass::NewDocument { .. }))
            .count();
        obs::emit_documents_classified(classes.len(), documents, new_documents);

        let outcomes = self.load_documents(&repo, &base, &head, &classes).await?;

        let reviews = self.forge.list_reviews(&repo, number).await?;
        let approvals = ApprovalSet::from_pull_request(&pr, &reviews);
        debug!(
            count = approvals.len(),
            approvals = ?approvals,
            "found approvals for PR {}",
            number
        );

        let resolver = AuthorResolver::new(Arc::clone(&self.forge));
        let decision = PolicyEvaluator::new(&resolver, self.policy)
            .evaluate(&outcomes, &approvals)
            .await;
        obs::emit_policy_evaluated(
            decision.documents.len(),
            decision.violations.len(),
            decision.is_mergeable(),
        );

        if self.dry_run {
            return Ok(RunOutcome::DryRun(decision));
        }

        if decision.has_violations() {
            let errors = decision.error_messages();
            let (comment_id, action) = self
                .post_comment(&repo, number, &comment_body(&errors))
                .await?;
            obs::emit_comment_posted(
                number,
                comment_id,
                action != CommentAction::Created,
                errors.len(),
            );
            return Ok(RunOutcome::Commented {
                comment_id,
                action,
                errors,
            });
        }

        if !decision.is_mergeable() {
            info!(
                notes = decision.notes.len(),
                "PR {} is not limited to existing EIPs; nothing to merge", number
            );
            return Ok(RunOutcome::NothingToMerge {
                notes: decision.notes,
            });
        }

        let eips = decision.eip_numbers();
        let title = commit_title(&eips, number);
        info!("merging PR {}", number);
        let request = MergeRequest {
            commit_title: title.clone(),
            commit_message: MERGE_MESSAGE.to_string(),
            sha: head,
            merge_method: MergeMethod::Squash,
        };
        let result = self.forge.merge_pull_request(&repo, number, &request).await?;
        if !result.merged {
            return Err(AutomergeError::MergeRejected {
                number,
                message: result.message,
            });
        }
        obs::emit_pr_merged(number, &eips, result.sha.as_deref());
        Ok(RunOutcome::Merged {
            title,
            sha: result.sha,
            eips,
        })
    }

    fn skip(&self, number: u64, reason: SkipReason) -> RunOutcome {
        obs::emit_run_skipped(number, &reason.to_string());
        RunOutcome::Skipped(reason)
    }

    /// Fetch and parse every changed EIP concurrently; results keep input order.
    ///
    /// A failed fetch or parse becomes [`DocumentOutcome::Failed`]; only a
    /// panicked task aborts the run.
    async fn load_documents(
        &self,
        repo: &RepoRef,
        base: &str,
        head: &str,
        classes: &[FileClass],
    ) -> Result<Vec<DocumentOutcome>> {
        let mut join_set = JoinSet::new();
        for (idx, class) in classes.iter().cloned().enumerate() {
            let forge = Arc::clone(&self.forge);
            let repo = repo.clone();
            let base = base.to_string();
            let head = head.to_string();
            join_set.spawn(async move {
                let outcome = load_document(forge.as_ref(), &repo, &base, &head, class).await;
                (idx, outcome)
            });
        }

        let mut ordered: Vec<Option<DocumentOutcome>> = vec![None; classes.len()];
        while let Some(joined) = join_set.join_next().await {
            let (idx, outcome) = joined
                .map_err(|e| AutomergeError::Task(format!("document fetch task: {e}")))?;
            ordered[idx] = Some(outcome);
        }
        Ok(ordered.into_iter().flatten().collect())
    }

    /// Update the bot's newest comment in place, or create one.
    async fn post_comment(
        &self,
        repo: &RepoRef,
        number: u64,
        body: &str,
    ) -> Result<(u64, CommentAction)> {
        let comments = self.forge.list_issue_comments(repo, number).await?;
        match comments.iter().rev().find(|c| is_bot_comment(&c.body)) {
            Some(existing) if existing.body == body => {
                debug!(comment_id = existing.id, "comment already up to date");
                Ok((existing.id, CommentAction::Unchanged))
            }
            Some(existing) => {
                info!(comment_id = existing.id, "updating existing comment");
                let updated = self
                    .forge
                    .update_issue_comment(repo, existing.id, body)
                    .await?;
                Ok((updated.id, CommentAction::Updated))
            }
            None => {
                info!("posting comment");
                let created = self.forge.create_issue_comment(repo, number, body).await?;
                Ok((created.id, CommentAction::Created))
            }
        }
    }
}

async fn load_document(
    forge: &dyn ForgeApi,
    repo: &RepoRef,
    base: &str,
    head: &str,
    class: FileClass,
) -> DocumentOutcome {
    match class {
        FileClass::NotDocument { path } => DocumentOutcome::NotDocument { path },
        FileClass::NewDocument { number, path } => DocumentOutcome::New { number, path },
        FileClass::ExistingDocument {
            number,
            path,
            base_path,
            exists_at_head,
        } => {
            let head = exists_at_head.then_some(head);
            match fetch_revision(forge, repo, number, &path, &base_path, base, head).await {
                Ok(revision) => DocumentOutcome::Loaded(revision),
                Err(reason) => {
                    warn!(path = %path, reason = %reason, "exception checking file");
                    DocumentOutcome::Failed {
                        number,
                        path,
                        reason,
                    }
                }
            }
        }
    }
}

/// Read and parse `base_path` at the base ref, and `path` at `head` if given.
async fn fetch_revision(
    forge: &dyn ForgeApi,
    repo: &RepoRef,
    number: EipNumber,
    path: &str,
    base_path: &str,
    base: &str,
    head: Option<&str>,
) -> std::result::Result<DocumentRevision, String> {
    debug!("getting file {} from {}@{}", base_path, repo, base);
    let base_file = forge
        .get_file_contents(repo, base_path, base)
        .await
        .map_err(|e| e.to_string())?;
    let base_doc = parse_document(base_path, number, &base_file.text).map_err(|e| e.to_string())?;

    let head_doc = match head {
        Some(head) => {
            let head_file = forge
                .get_file_contents(repo, path, head)
                .await
                .map_err(|e| e.to_string())?;
            Some(parse_document(path, number, &head_file.text).map_err(|e| e.to_string())?)
        }
        None => None,
    };

    Ok(DocumentRevision {
        number,
        path: path.to_string(),
        base: base_doc,
        head: head_doc,
    })
}
