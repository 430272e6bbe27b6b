//! Directory query capability consumed by the collection core.
//!
//! The core only needs one operation: run a filtered search at a given scope
//! and hand back owned entries. [`LdapDirectory`] implements it over `ldap3`;
//! tests substitute in-memory fakes.

use async_trait::async_trait;

pub mod entry;
pub mod identifiers;
pub mod ldap;

pub use entry::{DirectoryEntry, ObjectType};
pub use ldap::LdapDirectory;

/// Search breadth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryScope {
    /// The base object only.
    Base,
    /// Immediate children of the base.
    OneLevel,
    /// The base and its whole subtree.
    Subtree,
}

/// Errors produced by directory operations.
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    /// Could not reach the directory server.
    #[error("directory connection failed: {0}")]
    Connection(String),
    /// The bind was rejected.
    #[error("directory bind failed with code {code}: {message}")]
    Bind {
        /// LDAP result code.
        code: u32,
        /// Server diagnostic text.
        message: String,
    },
    /// A search failed at the protocol level.
    #[error("directory search failed: {message}")]
    Search {
        /// Failure details.
        message: String,
    },
    /// Connection settings are unusable.
    #[error("invalid directory configuration: {0}")]
    InvalidConfiguration(String),
}

/// Read-only directory search.
#[async_trait]
pub trait Directory: Send + Sync {
    /// Run `filter` at `scope` under `base_dn`, returning the requested
    /// `attributes` for every match.
    ///
    /// `base_dn = None` searches from the directory's default naming context.
    async fn query(
        &self,
        filter: &str,
        attributes: &[&str],
        scope: QueryScope,
        base_dn: Option<&str>,
    ) -> Result<Vec<DirectoryEntry>, DirectoryError>;
}
