//! Owned directory search results and object classification.

use std::collections::HashMap;

use super::identifiers::{guid_from_bytes, sid_from_bytes};

/// `samAccountType` values for security groups and aliases.
const SAM_GROUP_TYPES: [&str; 4] = ["268435456", "268435457", "536870912", "536870913"];
/// `samAccountType` for normal user accounts.
const SAM_USER_ACCOUNT: &str = "805306368";
/// `samAccountType` for machine accounts.
const SAM_MACHINE_ACCOUNT: &str = "805306369";
/// `samAccountType` for interdomain trust accounts (collected as users).
const SAM_TRUST_ACCOUNT: &str = "805306370";

/// Directory object kind derived from `samAccountType` and `objectClass`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectType {
    /// User or trust account.
    User,
    /// Computer account.
    Computer,
    /// Security group or alias.
    Group,
    /// Group Policy container.
    Gpo,
    /// Organizational unit.
    Ou,
    /// Domain naming context root.
    Domain,
    /// Generic `container` object.
    Container,
    /// Anything else.
    Unknown,
}

/// A single entry returned by a directory query.
///
/// Attribute names are stored lower-cased; lookups are case-insensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryEntry {
    /// Distinguished name of the entry.
    pub dn: String,
    attrs: HashMap<String, Vec<String>>,
    bin_attrs: HashMap<String, Vec<Vec<u8>>>,
}

impl DirectoryEntry {
    /// Create an empty entry for `dn`.
    pub fn new(dn: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            ..Self::default()
        }
    }

    /// Builder-style string attribute setter (replaces existing values).
    pub fn with_attr<I, S>(mut self, name: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set_attr(name, values.into_iter().map(Into::into).collect());
        self
    }

    /// Builder-style binary attribute setter (replaces existing values).
    pub fn with_bin_attr(mut self, name: &str, value: Vec<u8>) -> Self {
        self.set_bin_attr(name, vec![value]);
        self
    }

    /// Set all values of a string attribute.
    pub fn set_attr(&mut self, name: &str, values: Vec<String>) {
        self.attrs.insert(name.to_ascii_lowercase(), values);
    }

    /// Set all values of a binary attribute.
    pub fn set_bin_attr(&mut self, name: &str, values: Vec<Vec<u8>>) {
        self.bin_attrs.insert(name.to_ascii_lowercase(), values);
    }

    /// First string value of `name`, if present.
    pub fn get_property(&self, name: &str) -> Option<&str> {
        self.get_properties(name).first().map(String::as_str)
    }

    /// All string values of `name` (empty when absent).
    pub fn get_properties(&self, name: &str) -> &[String] {
        self.attrs
            .get(&name.to_ascii_lowercase())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// First binary value of `name`.
    ///
    /// Values that happen to be valid UTF-8 may arrive as text from the
    /// transport; their raw bytes are returned in that case.
    pub fn get_property_bytes(&self, name: &str) -> Option<&[u8]> {
        let key = name.to_ascii_lowercase();
        if let Some(value) = self.bin_attrs.get(&key).and_then(|v| v.first()) {
            return Some(value.as_slice());
        }
        self.attrs
            .get(&key)
            .and_then(|v| v.first())
            .map(String::as_bytes)
    }

    /// `objectGUID` in canonical upper-case form.
    pub fn object_guid(&self) -> Option<String> {
        self.get_property_bytes("objectguid")
            .and_then(guid_from_bytes)
    }

    /// `objectSid` in `S-1-...` form.
    pub fn object_sid(&self) -> Option<String> {
        self.get_property_bytes("objectsid").and_then(sid_from_bytes)
    }

    /// Classify the entry, preferring `samAccountType` over `objectClass`.
    pub fn object_type(&self) -> ObjectType {
        if let Some(sam_type) = self.get_property("samaccounttype") {
            match sam_type {
                SAM_USER_ACCOUNT | SAM_TRUST_ACCOUNT => return ObjectType::User,
                SAM_MACHINE_ACCOUNT => return ObjectType::Computer,
                t if SAM_GROUP_TYPES.contains(&t) => return ObjectType::Group,
                _ => {}
            }
        }

        let classes = self.get_properties("objectclass");
        let has_class = |wanted: &str| classes.iter().any(|c| c.eq_ignore_ascii_case(wanted));

        if has_class("groupPolicyContainer") {
            ObjectType::Gpo
        } else if has_class("organizationalUnit") {
            ObjectType::Ou
        } else if has_class("domain") || has_class("domainDNS") {
            ObjectType::Domain
        } else if has_class("container") {
            ObjectType::Container
        } else {
            ObjectType::Unknown
        }
    }
}
