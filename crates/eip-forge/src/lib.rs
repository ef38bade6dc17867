//! EIP Forge: hosted version-control API boundary
//!
//! Everything the automerge bot needs from the hosting service sits behind
//! the [`ForgeApi`] trait:
//!
//! - `GitHubClient`: REST implementation backed by `reqwest`
//! - `MemoryForge`: in-memory implementation for tests (see [`fakes`])
//! - `schema`: response types, validated when decoded

mod api;
mod client;
mod error;
pub mod fakes;
pub mod schema;

pub use api::{ForgeApi, ForgeResult};
pub use client::{ForgeConfig, GitHubClient};
pub use error::ForgeError;
pub use schema::{
    Account, ChangedFile, Comparison, FileContent, FileStatus, GitRef, IssueComment, MergeMethod,
    MergeRequest, MergeResult, PullRequest, RepoRef, Repository, Review, UserSummary,
};
