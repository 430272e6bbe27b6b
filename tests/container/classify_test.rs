//! Child classification for organizational units.

use adtree::container::classify::{CHILD_ATTRIBUTES, CHILD_FILTER};
use adtree::container::{blocks_inheritance, classify_children, classify_entries};
use adtree::directory::{DirectoryEntry, QueryScope};

use crate::common::{computer, ou, sid_bytes, user, FakeDirectory, DOMAIN_SUBAUTHORITIES};

const STAFF: &str = "OU=Staff,DC=corp,DC=local";
const SUB_OU_GUID: [u8; 16] = [
    0x78, 0x56, 0x34, 0x12, 0x34, 0x12, 0x34, 0x12, 0x12, 0x34, 0x56, 0x78, 0x9a, 0xbc, 0xde, 0xf0,
];

fn sid(rid: u32) -> String {
    format!("S-1-5-21-1004336348-1177238915-682003330-{rid}")
}

#[tokio::test]
async fn buckets_users_computers_and_child_ous() {
    let printer = DirectoryEntry::new(format!("CN=printer,{STAFF}"))
        .with_attr("objectClass", ["top", "printQueue"])
        .with_bin_attr("objectSid", sid_bytes(DOMAIN_SUBAUTHORITIES, 1003));
    let directory = FakeDirectory::new().respond_at(
        "organizationalUnit",
        STAFF,
        vec![
            user(&format!("CN=alice,{STAFF}"), Some(sid_bytes(DOMAIN_SUBAUTHORITIES, 1001))),
            computer(&format!("CN=WS01,{STAFF}"), Some(sid_bytes(DOMAIN_SUBAUTHORITIES, 1002))),
            ou(&format!("OU=Sub,{STAFF}"), Some(SUB_OU_GUID)),
            printer,
        ],
    );

    let children = classify_children(&directory, STAFF)
        .await
        .expect("classification should succeed");

    assert_eq!(children.users, vec![sid(1001)]);
    assert_eq!(children.computers, vec![sid(1002)]);
    assert_eq!(
        children.child_containers,
        vec!["12345678-1234-1234-1234-56789ABCDEF0".to_owned()]
    );
    assert_eq!(children.len(), 3);
}

#[tokio::test]
async fn issues_one_level_query_under_the_ou() {
    let directory = FakeDirectory::new();

    let children = classify_children(&directory, STAFF)
        .await
        .expect("empty result should succeed");

    assert!(children.is_empty());
    let queries = directory.queries();
    assert_eq!(queries.len(), 1);
    assert_eq!(queries[0].filter, CHILD_FILTER);
    assert_eq!(queries[0].scope, QueryScope::OneLevel);
    assert_eq!(queries[0].base_dn.as_deref(), Some(STAFF));
    for attr in CHILD_ATTRIBUTES {
        assert!(queries[0].attributes.contains(&attr.to_owned()));
    }
}

#[tokio::test]
async fn query_failure_is_returned() {
    let directory = FakeDirectory::new().fail_at("organizationalUnit", STAFF, "timeout");

    let result = classify_children(&directory, STAFF).await;

    let err = result.expect_err("query failure should propagate");
    assert!(err.to_string().contains("timeout"));
}

#[test]
fn entries_without_identifiers_are_dropped() {
    let entries = vec![
        user("CN=nosid", None),
        computer("CN=nosid$", None),
        ou("OU=noguid", None),
        user("CN=bob", Some(sid_bytes(DOMAIN_SUBAUTHORITIES, 1200))),
    ];

    let children = classify_entries(&entries);

    assert_eq!(children.users, vec![sid(1200)]);
    assert!(children.computers.is_empty());
    assert!(children.child_containers.is_empty());
    assert!(children.users.iter().all(|s| !s.is_empty()));
}

#[test]
fn repeated_entries_do_not_duplicate() {
    let alice = user("CN=alice", Some(sid_bytes(DOMAIN_SUBAUTHORITIES, 1001)));
    let entries = vec![alice.clone(), alice];

    let children = classify_entries(&entries);

    assert_eq!(children.users, vec![sid(1001)]);
}

#[test]
fn each_entry_lands_in_at_most_one_bucket() {
    let entries = vec![
        user("CN=a", Some(sid_bytes(DOMAIN_SUBAUTHORITIES, 1))),
        computer("CN=b", Some(sid_bytes(DOMAIN_SUBAUTHORITIES, 2))),
        ou("OU=c", Some([0x22; 16])),
    ];

    let children = classify_entries(&entries);

    let all: Vec<&String> = children
        .users
        .iter()
        .chain(&children.computers)
        .chain(&children.child_containers)
        .collect();
    assert_eq!(all.len(), entries.len());
    assert!(!children.users.contains(&sid(2)));
    assert!(!children.computers.contains(&sid(1)));
}

#[test]
fn result_order_follows_query_order() {
    let entries = vec![
        user("CN=c", Some(sid_bytes(DOMAIN_SUBAUTHORITIES, 3))),
        user("CN=a", Some(sid_bytes(DOMAIN_SUBAUTHORITIES, 1))),
        user("CN=b", Some(sid_bytes(DOMAIN_SUBAUTHORITIES, 2))),
    ];

    let children = classify_entries(&entries);

    assert_eq!(children.users, vec![sid(3), sid(1), sid(2)]);
}

#[test]
fn large_batch_dedups_in_query_order() {
    // Every fifth entry repeats the rid of the entry before it.
    let entries: Vec<DirectoryEntry> = (0u32..50_000)
        .map(|i| {
            let rid = if i % 5 == 4 { i - 1 } else { i };
            user(&format!("CN=u{i}"), Some(sid_bytes(DOMAIN_SUBAUTHORITIES, rid)))
        })
        .collect();

    let children = classify_entries(&entries);

    assert_eq!(children.users.len(), 40_000);
    assert_eq!(children.users[..4], [sid(0), sid(1), sid(2), sid(3)]);
    assert_eq!(children.users[4], sid(5));
    assert_eq!(children.users.last(), Some(&sid(49_998)));
}

#[test]
fn blocks_inheritance_only_for_gpoptions_one() {
    let base = DirectoryEntry::new(STAFF);
    assert!(!blocks_inheritance(&base));
    assert!(blocks_inheritance(&base.clone().with_attr("gPOptions", ["1"])));
    assert!(!blocks_inheritance(&base.clone().with_attr("gPOptions", ["0"])));
    assert!(!blocks_inheritance(&base.with_attr("gPOptions", ["01"])));
}
