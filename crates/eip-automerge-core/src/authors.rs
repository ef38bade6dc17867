//! Author list parsing and identity resolution.
//!
//! An EIP `author` header is a comma-separated list such as
//! `Alice <alice@example.com>, Bob (@bob), @carol`. Each entry yields at
//! most one identity: the token inside `<...>` or `(...)`, or a bare
//! `@handle`. Handles are compared as `@login`; email addresses are looked
//! up on the forge and replaced by the account's handle when one is found.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, OnceLock};

use eip_forge::ForgeApi;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::domain::handle_identity;

fn author_re() -> &'static Regex {
    static AUTHOR_RE: OnceLock<Regex> = OnceLock::new();
    AUTHOR_RE.get_or_init(|| Regex::new(r"[(<]([^>)]+)[>)]").expect("valid regex"))
}

/// One identity extracted from an author entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum AuthorRef {
    /// `@login`, lower-cased.
    Handle(String),
    /// Email address, lower-cased.
    Email(String),
}

/// Parse an `author` header into identities, in order of appearance.
///
/// Entries without a bracketed token or leading `@` are skipped.
pub fn parse_author_list(raw: &str) -> Vec<AuthorRef> {
    raw.split(',')
        .filter_map(|entry| {
            let entry = entry.trim();
            let token = match author_re().captures(entry) {
                Some(caps) => caps.get(1)?.as_str().trim(),
                None if entry.starts_with('@') => entry,
                None => return None,
            };
            classify_token(token)
        })
        .collect()
}

fn classify_token(token: &str) -> Option<AuthorRef> {
    if token.is_empty() {
        return None;
    }
    if let Some(handle) = token.strip_prefix('@') {
        if handle.is_empty() {
            return None;
        }
        return Some(AuthorRef::Handle(handle_identity(handle)));
    }
    if token.contains('@') {
        return Some(AuthorRef::Email(token.to_lowercase()));
    }
    Some(AuthorRef::Handle(handle_identity(token)))
}

/// Resolves author lists to identity sets, looking emails up on the forge.
///
/// Lookups are cached per email for the lifetime of the resolver, misses
/// included, so each address is searched at most once per run.
pub struct AuthorResolver {
    forge: Arc<dyn ForgeApi>,
    cache: Mutex<HashMap<String, Option<String>>>,
}

impl AuthorResolver {
    pub fn new(forge: Arc<dyn ForgeApi>) -> Self {
        Self {
            forge,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve a raw `author` header to a set of identities.
    pub async fn resolve(&self, raw: &str) -> BTreeSet<String> {
        let mut identities = BTreeSet::new();
        for author in parse_author_list(raw) {
            let identity = match author {
                AuthorRef::Handle(handle) => handle,
                AuthorRef::Email(email) => self
                    .handle_for_email(&email)
                    .await
                    .unwrap_or(email),
            };
            identities.insert(identity);
        }
        identities
    }

    /// Look up the `@handle` owning `email`, once per email.
    pub async fn handle_for_email(&self, email: &str) -> Option<String> {
        let mut cache = self.cache.lock().await;
        if let Some(cached) = cache.get(email) {
            debug!(email = %email, handle = ?cached, "email cache hit");
            return cached.clone();
        }

        let handle = match self.forge.search_users_by_email(email).await {
            Ok(users) => users.first().map(|u| handle_identity(&u.login)),
            Err(err) => {
                warn!(email = %email, error = %err, "user search failed");
                None
            }
        };
        match &handle {
            Some(h) => debug!(email = %email, handle = %h, "recorded email mapping"),
            None => debug!(email = %email, "no account found for email"),
        }
        cache.insert(email.to_string(), handle.clone());
        handle
    }
}
