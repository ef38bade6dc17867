//! Per-run document and approval values.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use eip_forge::{PullRequest, Review};
use serde::{Deserialize, Serialize};

/// Numeric EIP identifier taken from the file path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EipNumber(pub u64);

impl fmt::Display for EipNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A document split into its front-matter headers and body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedDocument {
    pub path: String,
    pub number: EipNumber,
    /// Header values keyed case-sensitively.
    pub metadata: BTreeMap<String, String>,
    pub body: String,
}

impl ParsedDocument {
    pub fn header(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    pub fn status(&self) -> Option<&str> {
        self.header("status")
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn author(&self) -> Option<&str> {
        self.header("author")
    }
}

/// The pre-change document, plus the post-change one when it still exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRevision {
    pub number: EipNumber,
    pub path: String,
    pub base: ParsedDocument,
    pub head: Option<ParsedDocument>,
}

/// An eligible EIP with its resolved author identities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub number: EipNumber,
    pub authors: BTreeSet<String>,
}

/// Normalised identities allowed to approve on behalf of authors: the PR
/// submitter and every reviewer who approved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalSet(BTreeSet<String>);

impl ApprovalSet {
    pub fn from_pull_request(pr: &PullRequest, reviews: &[Review]) -> Self {
        let mut set = BTreeSet::new();
        set.insert(handle_identity(&pr.user.login));
        for review in reviews.iter().filter(|r| r.is_approval()) {
            if let Some(user) = &review.user {
                set.insert(handle_identity(&user.login));
            }
        }
        Self(set)
    }

    pub fn from_identities<I, S>(identities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(
            identities
                .into_iter()
                .map(|s| s.as_ref().to_lowercase())
                .collect(),
        )
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.0.contains(identity)
    }

    /// Whether any of `authors` is in this set.
    pub fn approves_any(&self, authors: &BTreeSet<String>) -> bool {
        authors.iter().any(|a| self.0.contains(a))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// `@login`, lower-cased.
pub fn handle_identity(login: &str) -> String {
    format!("@{}", login.trim_start_matches('@').to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use eip_forge::{Account, GitRef};

    fn pr(login: &str) -> PullRequest {
        PullRequest {
            number: 1,
            state: "open".into(),
            merged: false,
            mergeable_state: Some("clean".into()),
            user: Account::new(login),
            base: GitRef {
                sha: "b".into(),
                ref_name: String::new(),
            },
            head: GitRef {
                sha: "h".into(),
                ref_name: String::new(),
            },
        }
    }

    fn review(login: Option<&str>, state: &str) -> Review {
        Review {
            user: login.map(Account::new),
            state: state.into(),
        }
    }

    #[test]
    fn approval_set_includes_submitter_and_approvers_only() {
        let reviews = vec![
            review(Some("Bob"), "APPROVED"),
            review(Some("carol"), "CHANGES_REQUESTED"),
            review(Some("dave"), "COMMENTED"),
            review(None, "APPROVED"),
        ];
        let set = ApprovalSet::from_pull_request(&pr("Alice"), &reviews);
        assert!(set.contains("@alice"));
        assert!(set.contains("@bob"));
        assert!(!set.contains("@carol"));
        assert!(!set.contains("@dave"));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn approves_any_checks_intersection() {
        let set = ApprovalSet::from_identities(["@alice"]);
        let authors: BTreeSet<String> = ["@bob".to_string(), "@alice".to_string()].into();
        assert!(set.approves_any(&authors));
        let others: BTreeSet<String> = ["@bob".to_string()].into();
        assert!(!set.approves_any(&others));
    }

    #[test]
    fn status_ignores_blank_values() {
        let mut doc = ParsedDocument {
            path: "EIPS/eip-1.md".into(),
            number: EipNumber(1),
            metadata: BTreeMap::new(),
            body: String::new(),
        };
        assert_eq!(doc.status(), None);
        doc.metadata.insert("status".into(), "  ".into());
        assert_eq!(doc.status(), None);
        doc.metadata.insert("status".into(), "Last Call".into());
        assert_eq!(doc.status(), Some("Last Call"));
        assert_eq!(doc.header("Status"), None);
    }

    #[test]
    fn handle_identity_normalises() {
        assert_eq!(handle_identity("Alice"), "@alice");
        assert_eq!(handle_identity("@Bob"), "@bob");
    }
}
