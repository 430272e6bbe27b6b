//! Container processing: domain roots and organizational units.

use adtree::container::{process_container, ChildEnumeration, Container};
use adtree::directory::DirectoryEntry;
use adtree::gpo::{PolicyLink, PolicyNameCache};

use crate::common::{domain_root, ou, sid_bytes, user, FakeDirectory, DOMAIN_SUBAUTHORITIES};

const DOMAIN_DN: &str = "DC=corp,DC=local";
const STAFF: &str = "OU=Staff,DC=corp,DC=local";
const LINKS: &str = "[LDAP://cn={AAAA},cn=policies,cn=system,DC=corp,DC=local;0][LDAP://cn={BBBB},cn=policies,cn=system,DC=corp,DC=local;2][LDAP://cn={CCCC},cn=policies,cn=system,DC=corp,DC=local;1]";

fn cache() -> PolicyNameCache {
    let cache = PolicyNameCache::new();
    cache.insert("AAAA".to_owned(), "POL-A".to_owned());
    cache.insert("BBBB".to_owned(), "POL-B".to_owned());
    cache
}

fn expected_links() -> Vec<PolicyLink> {
    vec![
        PolicyLink {
            name: "POL-A@CORP.LOCAL".to_owned(),
            enforced: false,
        },
        PolicyLink {
            name: "POL-B@CORP.LOCAL".to_owned(),
            enforced: true,
        },
    ]
}

fn staff_ou() -> Container {
    let entry = ou(STAFF, Some([0x33; 16]))
        .with_attr("gPLink", [LINKS])
        .with_attr("gPOptions", ["1"]);
    Container::from_entry(entry, "corp.local").expect("OU entry should become a container")
}

#[test]
fn from_entry_accepts_only_domains_and_ous() {
    let domain = Container::from_entry(domain_root(DOMAIN_DN), "corp.local");
    assert!(matches!(domain, Some(Container::DomainRoot(_))));

    let unit = staff_ou();
    assert_eq!(unit.distinguished_name(), STAFF);
    assert_eq!(unit.domain(), "CORP.LOCAL");
    match &unit {
        Container::OrganizationalUnit(ou) => {
            assert_eq!(ou.children, ChildEnumeration::Pending);
            assert_eq!(
                ou.object_guid.as_deref(),
                Some("33333333-3333-3333-3333-333333333333")
            );
        }
        Container::DomainRoot(_) => panic!("expected an organizational unit"),
    }

    assert!(Container::from_entry(user("CN=alice,DC=corp", None), "corp").is_none());
}

#[tokio::test]
async fn domain_root_gets_links_and_no_child_query() {
    let entry = domain_root(DOMAIN_DN).with_attr("gPLink", [LINKS]);
    let container =
        Container::from_entry(entry, "corp.local").expect("domain entry should become a container");
    let directory = FakeDirectory::new();

    let processed = process_container(container, &cache(), &directory).await;

    assert_eq!(processed.policy_links(), expected_links().as_slice());
    assert!(directory.queries().is_empty());
    assert!(matches!(processed, Container::DomainRoot(_)));
}

#[tokio::test]
async fn organizational_unit_is_fully_resolved() {
    let directory = FakeDirectory::new().respond_at(
        "organizationalUnit",
        STAFF,
        vec![user(
            &format!("CN=alice,{STAFF}"),
            Some(sid_bytes(DOMAIN_SUBAUTHORITIES, 1001)),
        )],
    );

    let processed = process_container(staff_ou(), &cache(), &directory).await;

    let Container::OrganizationalUnit(ou) = processed else {
        panic!("expected an organizational unit");
    };
    assert!(ou.blocks_inheritance);
    assert_eq!(ou.policy_links, expected_links());
    match ou.children {
        ChildEnumeration::Resolved(children) => {
            assert_eq!(
                children.users,
                vec!["S-1-5-21-1004336348-1177238915-682003330-1001".to_owned()]
            );
            assert!(children.computers.is_empty());
            assert!(children.child_containers.is_empty());
        }
        other => panic!("expected resolved children, got {other:?}"),
    }
    assert_eq!(directory.queries().len(), 1);
}

#[tokio::test]
async fn failed_child_query_keeps_links_and_marks_failure() {
    let directory = FakeDirectory::new().fail_at("organizationalUnit", STAFF, "connection reset");

    let processed = process_container(staff_ou(), &cache(), &directory).await;

    let Container::OrganizationalUnit(ou) = processed else {
        panic!("expected an organizational unit");
    };
    assert_eq!(ou.policy_links, expected_links());
    match ou.children {
        ChildEnumeration::Failed { reason } => assert!(reason.contains("connection reset")),
        other => panic!("expected failure marker, got {other:?}"),
    }
}

#[tokio::test]
async fn missing_gpoptions_does_not_block_inheritance() {
    let entry = ou(STAFF, None);
    let container = Container::from_entry(entry, "corp").expect("OU container");

    let processed = process_container(container, &cache(), &FakeDirectory::new()).await;

    let Container::OrganizationalUnit(ou) = processed else {
        panic!("expected an organizational unit");
    };
    assert!(!ou.blocks_inheritance);
    assert!(ou.policy_links.is_empty());
    assert_eq!(ou.object_guid, None);
}

#[tokio::test]
async fn processed_container_serialises_for_downstream() {
    let directory = FakeDirectory::new();
    let processed = process_container(staff_ou(), &cache(), &directory).await;

    let value = serde_json::to_value(&processed).expect("serialise container");

    assert_eq!(value["type"], "OrganizationalUnit");
    assert_eq!(value["distinguishedName"], STAFF);
    assert_eq!(value["blocksInheritance"], true);
    assert_eq!(value["policyLinks"][1]["isEnforced"], true);
    assert_eq!(value["children"]["status"], "resolved");
    assert!(value["children"]["users"].as_array().is_some());
    assert!(value.get("source").is_none());
}

#[test]
fn source_entry_is_kept_on_the_container() {
    let container = staff_ou();
    let source: &DirectoryEntry = container.source();
    assert_eq!(source.get_property("gpoptions"), Some("1"));
}
