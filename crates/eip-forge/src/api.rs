//! Version-control API trait.
//!
//! `ForgeApi` is the only way the automerge bot talks to the hosting
//! service. [`GitHubClient`](crate::GitHubClient) implements it over REST;
//! [`MemoryForge`](crate::fakes::MemoryForge) implements it in memory for
//! tests.

use async_trait::async_trait;

use crate::error::ForgeError;
use crate::schema::{
    Comparison, FileContent, IssueComment, MergeRequest, MergeResult, PullRequest, RepoRef,
    Repository, Review, UserSummary,
};

/// Result type for API operations
pub type ForgeResult<T> = std::result::Result<T, ForgeError>;

#[async_trait]
pub trait ForgeApi: Send + Sync {
    async fn get_repository(&self, repo: &RepoRef) -> ForgeResult<Repository>;

    async fn get_pull_request(&self, repo: &RepoRef, number: u64) -> ForgeResult<PullRequest>;

    async fn list_reviews(&self, repo: &RepoRef, number: u64) -> ForgeResult<Vec<Review>>;

    /// Compare `base...head` and list the changed files.
    async fn compare_commits(&self, repo: &RepoRef, base: &str, head: &str)
        -> ForgeResult<Comparison>;

    /// Fetch and decode a file at `git_ref`. Returns `ForgeError::NotFound`
    /// when the path does not exist at that ref.
    async fn get_file_contents(
        &self,
        repo: &RepoRef,
        path: &str,
        git_ref: &str,
    ) -> ForgeResult<FileContent>;

    async fn list_issue_comments(&self, repo: &RepoRef, number: u64)
        -> ForgeResult<Vec<IssueComment>>;

    async fn create_issue_comment(
        &self,
        repo: &RepoRef,
        number: u64,
        body: &str,
    ) -> ForgeResult<IssueComment>;

    async fn update_issue_comment(
        &self,
        repo: &RepoRef,
        comment_id: u64,
        body: &str,
    ) -> ForgeResult<IssueComment>;

    async fn merge_pull_request(
        &self,
        repo: &RepoRef,
        number: u64,
        request: &MergeRequest,
    ) -> ForgeResult<MergeResult>;

    /// Search accounts whose public email matches `email`.
    async fn search_users_by_email(&self, email: &str) -> ForgeResult<Vec<UserSummary>>;
}
