//! Per-container resolution pass.

use tracing::{debug, error};

use super::{blocks_inheritance, classify_children, ChildEnumeration, Container};
use crate::directory::Directory;
use crate::gpo::{resolve_links, PolicyNameCache};

/// Resolve policy links and, for OUs, direct children.
///
/// Domain roots only get their links. OUs additionally get
/// `blocks_inheritance` and a one-level child query; if that query fails the
/// resolved links are kept and the children are marked
/// [`ChildEnumeration::Failed`].
pub async fn process_container(
    container: Container,
    cache: &PolicyNameCache,
    directory: &dyn Directory,
) -> Container {
    match container {
        Container::DomainRoot(mut domain) => {
            domain.policy_links = resolve_links(
                domain.source.get_property("gplink"),
                &domain.domain,
                cache,
            );
            debug!(
                dn = %domain.distinguished_name,
                links = domain.policy_links.len(),
                "processed domain root"
            );
            Container::DomainRoot(domain)
        }
        Container::OrganizationalUnit(mut ou) => {
            ou.blocks_inheritance = blocks_inheritance(&ou.source);
            ou.policy_links =
                resolve_links(ou.source.get_property("gplink"), &ou.domain, cache);

            ou.children = match classify_children(directory, &ou.distinguished_name).await {
                Ok(children) => ChildEnumeration::Resolved(children),
                Err(e) => {
                    error!(dn = %ou.distinguished_name, error = %e, "failed to list OU children");
                    ChildEnumeration::Failed {
                        reason: e.to_string(),
                    }
                }
            };

            debug!(
                dn = %ou.distinguished_name,
                links = ou.policy_links.len(),
                blocks_inheritance = ou.blocks_inheritance,
                "processed organizational unit"
            );
            Container::OrganizationalUnit(ou)
        }
    }
}
