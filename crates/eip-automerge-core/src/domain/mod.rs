//! Domain models for EIP automerge.
//!
//! - `ParsedDocument` / `DocumentRevision`: an EIP before and after the PR
//! - `DocumentInfo`: an eligible EIP with its resolved authors
//! - `ApprovalSet`: who approved the PR

pub mod document;
pub mod error;

pub use document::{
    handle_identity, ApprovalSet, DocumentInfo, DocumentRevision, EipNumber, ParsedDocument,
};
pub use error::{AutomergeError, Result, TriggerError};
