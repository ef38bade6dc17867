//! In-memory fake of the version-control API (testing only)
//!
//! `MemoryForge` is seeded with repositories, pull requests, reviews,
//! comparisons, file contents and users, and records every write (merges,
//! comment creation and edits) plus every user search so tests can assert
//! on side effects.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::api::{ForgeApi, ForgeResult};
use crate::error::ForgeError;
use crate::schema::*;

/// A recorded merge call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedMerge {
    pub repo: RepoRef,
    pub number: u64,
    pub request: MergeRequest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentWrite {
    Created(u64),
    Updated(u64),
}

#[derive(Debug, Default)]
struct ForgeState {
    repositories: HashMap<String, Repository>,
    pulls: HashMap<(String, u64), PullRequest>,
    reviews: HashMap<(String, u64), Vec<Review>>,
    comparisons: HashMap<(String, String, String), Comparison>,
    files: HashMap<(String, String, String), String>,
    failing_files: HashMap<(String, String, String), String>,
    users_by_email: HashMap<String, String>,
    comments: HashMap<(String, u64), Vec<IssueComment>>,
    next_comment_id: u64,
    merges: Vec<RecordedMerge>,
    comment_writes: Vec<CommentWrite>,
    searches: Vec<String>,
}

/// In-memory `ForgeApi` implementation.
#[derive(Debug, Default)]
pub struct MemoryForge {
    state: Mutex<ForgeState>,
}

impl MemoryForge {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, ForgeState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a repository owned by `repo.owner`.
    pub fn add_repository(&self, repo: &RepoRef) {
        let record = Repository {
            name: repo.name.clone(),
            full_name: repo.full_name(),
            owner: Account::new(&repo.owner),
        };
        self.state().repositories.insert(repo.full_name(), record);
    }

    pub fn add_pull_request(&self, repo: &RepoRef, pr: PullRequest) {
        self.state().pulls.insert((repo.full_name(), pr.number), pr);
    }

    pub fn add_review(&self, repo: &RepoRef, number: u64, login: &str, state: &str) {
        self.state()
            .reviews
            .entry((repo.full_name(), number))
            .or_default()
            .push(Review {
                user: Some(Account::new(login)),
                state: state.to_string(),
            });
    }

    pub fn set_comparison(&self, repo: &RepoRef, base: &str, head: &str, files: Vec<ChangedFile>) {
        self.state().comparisons.insert(
            (repo.full_name(), base.to_string(), head.to_string()),
            Comparison { files },
        );
    }

    /// Make `path` readable at `git_ref`.
    pub fn add_file(&self, repo: &RepoRef, git_ref: &str, path: &str, text: &str) {
        self.state().files.insert(
            (repo.full_name(), git_ref.to_string(), path.to_string()),
            text.to_string(),
        );
    }

    /// Make fetching `path` at `git_ref` fail with a transport error.
    pub fn fail_file(&self, repo: &RepoRef, git_ref: &str, path: &str, reason: &str) {
        self.state().failing_files.insert(
            (repo.full_name(), git_ref.to_string(), path.to_string()),
            reason.to_string(),
        );
    }

    pub fn add_user_email(&self, email: &str, login: &str) {
        self.state()
            .users_by_email
            .insert(email.to_lowercase(), login.to_string());
    }

    /// Seed an existing comment on a PR.
    pub fn add_comment(&self, repo: &RepoRef, number: u64, login: &str, body: &str) -> u64 {
        let mut state = self.state();
        state.next_comment_id += 1;
        let id = state.next_comment_id;
        state
            .comments
            .entry((repo.full_name(), number))
            .or_default()
            .push(IssueComment {
                id,
                body: body.to_string(),
                user: Some(Account::new(login)),
            });
        id
    }

    pub fn merges(&self) -> Vec<RecordedMerge> {
        self.state().merges.clone()
    }

    pub fn comments(&self, repo: &RepoRef, number: u64) -> Vec<IssueComment> {
        self.state()
            .comments
            .get(&(repo.full_name(), number))
            .cloned()
            .unwrap_or_default()
    }

    pub fn comment_writes(&self) -> Vec<CommentWrite> {
        self.state().comment_writes.clone()
    }

    /// Emails passed to `search_users_by_email`, in call order.
    pub fn searches(&self) -> Vec<String> {
        self.state().searches.clone()
    }
}

fn not_found(endpoint: String) -> ForgeError {
    ForgeError::NotFound { endpoint }
}

#[async_trait]
impl ForgeApi for MemoryForge {
    async fn get_repository(&self, repo: &RepoRef) -> ForgeResult<Repository> {
        self.state()
            .repositories
            .get(&repo.full_name())
            .cloned()
            .ok_or_else(|| not_found(format!("repository {}", repo)))
    }

    async fn get_pull_request(&self, repo: &RepoRef, number: u64) -> ForgeResult<PullRequest> {
        self.state()
            .pulls
            .get(&(repo.full_name(), number))
            .cloned()
            .ok_or_else(|| not_found(format!("pull request {}#{}", repo, number)))
    }

    async fn list_reviews(&self, repo: &RepoRef, number: u64) -> ForgeResult<Vec<Review>> {
        Ok(self
            .state()
            .reviews
            .get(&(repo.full_name(), number))
            .cloned()
            .unwrap_or_default())
    }

    async fn compare_commits(
        &self,
        repo: &RepoRef,
        base: &str,
        head: &str,
    ) -> ForgeResult<Comparison> {
        self.state()
            .comparisons
            .get(&(repo.full_name(), base.to_string(), head.to_string()))
            .cloned()
            .ok_or_else(|| not_found(format!("comparison {}...{}", base, head)))
    }

    async fn get_file_contents(
        &self,
        repo: &RepoRef,
        path: &str,
        git_ref: &str,
    ) -> ForgeResult<FileContent> {
        let key = (repo.full_name(), git_ref.to_string(), path.to_string());
        let state = self.state();
        if let Some(reason) = state.failing_files.get(&key) {
            return Err(ForgeError::Http(reason.clone()));
        }
        state
            .files
            .get(&key)
            .map(|text| FileContent::new(path, text.as_str()))
            .ok_or_else(|| not_found(format!("contents {}@{}", path, git_ref)))
    }

    async fn list_issue_comments(
        &self,
        repo: &RepoRef,
        number: u64,
    ) -> ForgeResult<Vec<IssueComment>> {
        Ok(self.comments(repo, number))
    }

    async fn create_issue_comment(
        &self,
        repo: &RepoRef,
        number: u64,
        body: &str,
    ) -> ForgeResult<IssueComment> {
        let mut state = self.state();
        state.next_comment_id += 1;
        let comment = IssueComment {
            id: state.next_comment_id,
            body: body.to_string(),
            user: Some(Account::new("github-actions[bot]")),
        };
        state
            .comments
            .entry((repo.full_name(), number))
            .or_default()
            .push(comment.clone());
        state.comment_writes.push(CommentWrite::Created(comment.id));
        Ok(comment)
    }

    async fn update_issue_comment(
        &self,
        repo: &RepoRef,
        comment_id: u64,
        body: &str,
    ) -> ForgeResult<IssueComment> {
        let mut state = self.state();
        let prefix = repo.full_name();
        let updated = state
            .comments
            .iter_mut()
            .filter(|((name, _), _)| *name == prefix)
            .flat_map(|(_, comments)| comments.iter_mut())
            .find(|c| c.id == comment_id)
            .map(|c| {
                c.body = body.to_string();
                c.clone()
            })
            .ok_or_else(|| not_found(format!("comment {}", comment_id)))?;
        state.comment_writes.push(CommentWrite::Updated(comment_id));
        Ok(updated)
    }

    async fn merge_pull_request(
        &self,
        repo: &RepoRef,
        number: u64,
        request: &MergeRequest,
    ) -> ForgeResult<MergeResult> {
        let mut state = self.state();
        let pr = state
            .pulls
            .get_mut(&(repo.full_name(), number))
            .ok_or_else(|| not_found(format!("pull request {}#{}", repo, number)))?;
        if pr.head.sha != request.sha {
            return Err(ForgeError::Status {
                endpoint: format!("merge {}#{}", repo, number),
                status: 409,
                body: "Head branch was modified".to_string(),
            });
        }
        pr.merged = true;
        state.merges.push(RecordedMerge {
            repo: repo.clone(),
            number,
            request: request.clone(),
        });
        Ok(MergeResult {
            sha: Some(format!("merged-{}", request.sha)),
            merged: true,
            message: "Pull Request successfully merged".to_string(),
        })
    }

    async fn search_users_by_email(&self, email: &str) -> ForgeResult<Vec<UserSummary>> {
        let mut state = self.state();
        state.searches.push(email.to_string());
        Ok(state
            .users_by_email
            .get(&email.to_lowercase())
            .map(|login| {
                vec![UserSummary {
                    login: login.clone(),
                }]
            })
            .unwrap_or_default())
    }
}
