//! Container objects (domain roots and OUs) and their resolution.

use std::collections::HashSet;

use serde::Serialize;

use crate::directory::{DirectoryEntry, ObjectType};
use crate::gpo::PolicyLink;

pub mod classify;
pub mod processor;

pub use classify::{blocks_inheritance, classify_children, classify_entries};
pub use processor::process_container;

/// Attributes a container entry must carry for processing.
pub const CONTAINER_ATTRIBUTES: [&str; 5] = [
    "distinguishedname",
    "gplink",
    "gpoptions",
    "objectclass",
    "objectguid",
];

/// A directory container that can carry policy links.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum Container {
    /// The domain naming context root.
    DomainRoot(DomainRoot),
    /// An organizational unit.
    OrganizationalUnit(OrganizationalUnit),
}

/// Domain root container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainRoot {
    /// Distinguished name of the domain object.
    pub distinguished_name: String,
    /// Owning domain (e.g. `CORP.LOCAL`).
    pub domain: String,
    /// Enabled policy links in attribute order.
    pub policy_links: Vec<PolicyLink>,
    /// Raw directory record the container was created from.
    #[serde(skip)]
    pub source: DirectoryEntry,
}

/// Organizational unit container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationalUnit {
    /// Distinguished name of the OU.
    pub distinguished_name: String,
    /// Owning domain.
    pub domain: String,
    /// OU's own objectGUID, when the entry carried one.
    pub object_guid: Option<String>,
    /// `gPOptions == 1`.
    pub blocks_inheritance: bool,
    /// Enabled policy links in attribute order.
    pub policy_links: Vec<PolicyLink>,
    /// Direct children, or why they could not be listed.
    pub children: ChildEnumeration,
    /// Raw directory record the container was created from.
    #[serde(skip)]
    pub source: DirectoryEntry,
}

/// Outcome of listing an OU's direct children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum ChildEnumeration {
    /// Not processed yet.
    Pending,
    /// Children listed successfully.
    Resolved(ChildObjects),
    /// The one-level query failed; links may still be present.
    Failed {
        /// Error text from the directory.
        reason: String,
    },
}

/// Identifiers of an OU's direct children, in query result order.
///
/// Each list ignores repeated identifiers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildObjects {
    /// objectGUIDs of child OUs.
    pub child_containers: Vec<String>,
    /// SIDs of user accounts.
    pub users: Vec<String>,
    /// SIDs of computer accounts.
    pub computers: Vec<String>,
    #[serde(skip)]
    seen: HashSet<String>,
}

impl ChildObjects {
    /// Record a child OU.
    pub fn add_container(&mut self, guid: String) {
        push_unique(&mut self.seen, &mut self.child_containers, guid);
    }

    /// Record a user.
    pub fn add_user(&mut self, sid: String) {
        push_unique(&mut self.seen, &mut self.users, sid);
    }

    /// Record a computer.
    pub fn add_computer(&mut self, sid: String) {
        push_unique(&mut self.seen, &mut self.computers, sid);
    }

    /// Total identifiers across all three lists.
    pub fn len(&self) -> usize {
        self.child_containers
            .len()
            .saturating_add(self.users.len())
            .saturating_add(self.computers.len())
    }

    /// Whether no children were found.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// GUIDs and SIDs never collide, so one set covers all three lists.
fn push_unique(seen: &mut HashSet<String>, list: &mut Vec<String>, id: String) {
    if seen.insert(id.clone()) {
        list.push(id);
    }
}

impl Container {
    /// Build an unprocessed container from a directory record.
    ///
    /// Returns `None` for entries that are neither a domain nor an OU.
    pub fn from_entry(entry: DirectoryEntry, domain: &str) -> Option<Self> {
        let distinguished_name = entry
            .get_property("distinguishedname")
            .map(str::to_owned)
            .unwrap_or_else(|| entry.dn.clone());
        let domain = domain.to_uppercase();

        match entry.object_type() {
            ObjectType::Domain => Some(Self::DomainRoot(DomainRoot {
                distinguished_name,
                domain,
                policy_links: Vec::new(),
                source: entry,
            })),
            ObjectType::Ou => Some(Self::OrganizationalUnit(OrganizationalUnit {
                distinguished_name,
                domain,
                object_guid: entry.object_guid(),
                blocks_inheritance: false,
                policy_links: Vec::new(),
                children: ChildEnumeration::Pending,
                source: entry,
            })),
            _ => None,
        }
    }

    /// Distinguished name of the container.
    pub fn distinguished_name(&self) -> &str {
        match self {
            Self::DomainRoot(d) => &d.distinguished_name,
            Self::OrganizationalUnit(ou) => &ou.distinguished_name,
        }
    }

    /// Owning domain.
    pub fn domain(&self) -> &str {
        match self {
            Self::DomainRoot(d) => &d.domain,
            Self::OrganizationalUnit(ou) => &ou.domain,
        }
    }

    /// Resolved policy links.
    pub fn policy_links(&self) -> &[PolicyLink] {
        match self {
            Self::DomainRoot(d) => &d.policy_links,
            Self::OrganizationalUnit(ou) => &ou.policy_links,
        }
    }

    /// Raw directory record.
    pub fn source(&self) -> &DirectoryEntry {
        match self {
            Self::DomainRoot(d) => &d.source,
            Self::OrganizationalUnit(ou) => &ou.source,
        }
    }
}
