//! Direct-child classification for organizational units.

use tracing::{debug, trace};

use super::ChildObjects;
use crate::directory::{Directory, DirectoryEntry, DirectoryError, ObjectType, QueryScope};

/// Users, computers and OUs directly below a container.
pub const CHILD_FILTER: &str =
    "(|(samAccountType=805306368)(samAccountType=805306369)(objectclass=organizationalUnit))";

/// Attributes needed to classify and identify a child.
pub const CHILD_ATTRIBUTES: [&str; 4] = ["objectguid", "objectclass", "objectsid", "samaccounttype"];

/// List and classify the direct children of `ou_dn`.
///
/// # Errors
///
/// Returns the directory error unchanged; nothing is retried.
pub async fn classify_children(
    directory: &dyn Directory,
    ou_dn: &str,
) -> Result<ChildObjects, DirectoryError> {
    let entries = directory
        .query(
            CHILD_FILTER,
            &CHILD_ATTRIBUTES,
            QueryScope::OneLevel,
            Some(ou_dn),
        )
        .await?;

    let children = classify_entries(&entries);
    debug!(
        ou = %ou_dn,
        users = children.users.len(),
        computers = children.computers.len(),
        child_ous = children.child_containers.len(),
        "classified OU children"
    );
    Ok(children)
}

/// Bucket entries into child OUs, users and computers.
///
/// Entries of any other type, and entries missing their identifier, are
/// left out.
pub fn classify_entries(entries: &[DirectoryEntry]) -> ChildObjects {
    let mut children = ChildObjects::default();

    for entry in entries {
        match entry.object_type() {
            ObjectType::Ou => match entry.object_guid() {
                Some(guid) => children.add_container(guid),
                None => trace!(dn = %entry.dn, "child OU without objectGUID"),
            },
            ObjectType::User => match entry.object_sid() {
                Some(sid) => children.add_user(sid),
                None => trace!(dn = %entry.dn, "user without objectSid"),
            },
            ObjectType::Computer => match entry.object_sid() {
                Some(sid) => children.add_computer(sid),
                None => trace!(dn = %entry.dn, "computer without objectSid"),
            },
            _ => {}
        }
    }

    children
}

/// `gPOptions` of `1` means the container blocks inherited policy.
pub fn blocks_inheritance(entry: &DirectoryEntry) -> bool {
    entry.get_property("gpoptions") == Some("1")
}
