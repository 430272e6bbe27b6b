//! Policy GUID → display name cache shared by all container tasks.
//!
//! Built once per collection run from a bulk query, then read concurrently.
//! Writes are insert-if-absent only: a value never changes once stored.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{LazyLock, RwLock};

use regex::Regex;
use tracing::{debug, info};

use crate::directory::{Directory, DirectoryError, QueryScope};

/// Policy containers that carry both a name and a SYSVOL path.
pub const GPO_FILTER: &str = "(&(objectCategory=groupPolicyContainer)(name=*)(gpcfilesyspath=*))";

/// Attributes requested for each policy container.
pub const GPO_ATTRIBUTES: [&str; 2] = ["displayname", "name"];

static GUID_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\{([^{}]+)\}").ok());

/// Concurrent policy name cache.
#[derive(Debug, Default)]
pub struct PolicyNameCache {
    names: RwLock<HashMap<String, String>>,
}

impl PolicyNameCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Populate the cache from every policy container in the domain.
    ///
    /// Returns the number of entries inserted by this call.
    ///
    /// # Errors
    ///
    /// Propagates the directory query failure; the cache is left with
    /// whatever was inserted before (nothing, since the query runs first).
    pub async fn build(
        &self,
        directory: &dyn Directory,
        domain: &str,
    ) -> Result<usize, DirectoryError> {
        let entries = directory
            .query(GPO_FILTER, &GPO_ATTRIBUTES, QueryScope::Subtree, None)
            .await?;

        let mut inserted = 0usize;
        for entry in &entries {
            let Some(name) = entry.get_property("name") else {
                continue;
            };
            let guid = strip_braces(&name.to_uppercase());
            let display_name = entry
                .get_property("displayname")
                .map(str::to_uppercase)
                .unwrap_or_else(|| guid.clone());
            if self.insert(guid, display_name) {
                inserted = inserted.saturating_add(1);
            }
        }

        info!(domain = %domain, policies = inserted, "policy name cache built");
        Ok(inserted)
    }

    /// Insert `display_name` for `guid` unless the guid is already cached.
    ///
    /// Returns `true` when this call stored the value.
    pub fn insert(&self, guid: String, display_name: String) -> bool {
        let mut names = self.names.write().unwrap_or_else(|p| p.into_inner());
        match names.entry(guid) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(display_name);
                true
            }
        }
    }

    /// Cached value for an exact key.
    pub fn get(&self, key: &str) -> Option<String> {
        let names = self.names.read().unwrap_or_else(|p| p.into_inner());
        names.get(key).cloned()
    }

    /// Resolve a policy reference (usually a DN such as
    /// `cn={GUID},cn=policies,cn=system,DC=corp`) to a display name.
    ///
    /// The first brace-delimited guid in the reference is looked up. On a
    /// miss the reference itself is stored under its upper-cased form and
    /// returned, so repeat lookups yield the same value.
    pub fn resolve(&self, reference: &str) -> String {
        if let Some(guid) = extract_guid(reference) {
            if let Some(name) = self.get(&guid) {
                return name;
            }
        }

        let key = reference.to_uppercase();
        if let Some(name) = self.get(&key) {
            return name;
        }

        debug!(reference = %reference, "policy not in cache, using reference as name");
        let mut names = self.names.write().unwrap_or_else(|p| p.into_inner());
        names
            .entry(key)
            .or_insert_with(|| reference.to_owned())
            .clone()
    }

    /// Number of cached entries, fallbacks included.
    pub fn len(&self) -> usize {
        self.names.read().unwrap_or_else(|p| p.into_inner()).len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Drop exactly one leading and one trailing character (the braces around a
/// policy container's `name`).
pub fn strip_braces(name: &str) -> String {
    let mut chars = name.chars();
    chars.next();
    chars.next_back();
    chars.as_str().to_owned()
}

/// Upper-cased guid from the first `{...}` group in `reference`.
pub fn extract_guid(reference: &str) -> Option<String> {
    GUID_PATTERN
        .as_ref()?
        .captures(reference)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_uppercase())
}
