//! EIP Automerge Core
//!
//! Decides whether a pull request that only touches early-stage EIPs can be
//! merged without an editor, and either merges it or explains why not.
//!
//! - `trigger`: CI event → [`TriggerContext`]
//! - `classify` / `frontmatter`: which files are EIPs, and their headers
//! - `authors`: author lists → `@handle` identities
//! - `policy`: rules and the [`Decision`] they produce
//! - `orchestrator`: one run, from trigger to merge or comment

pub mod authors;
pub mod classify;
pub mod domain;
pub mod frontmatter;
pub mod obs;
pub mod orchestrator;
pub mod policy;
pub mod render;
pub mod telemetry;
pub mod trigger;

pub use domain::{
    handle_identity, ApprovalSet, AutomergeError, DocumentInfo, DocumentRevision, EipNumber,
    ParsedDocument, Result, TriggerError,
};

pub use authors::{parse_author_list, AuthorRef, AuthorResolver};
pub use classify::{classify, eip_number, FileClass};
pub use frontmatter::{parse_document, FrontMatter, FrontMatterError};
pub use orchestrator::{CommentAction, Orchestrator, RunOutcome, SkipReason};
pub use policy::{
    Decision, DocumentOutcome, PolicyConfig, PolicyEvaluator, PolicyRule, PolicyViolation,
};
pub use render::{comment_body, commit_title, COMMENT_PREAMBLE, MERGE_MESSAGE};
pub use telemetry::init_tracing;
pub use trigger::{TriggerContext, TriggerEvent};
