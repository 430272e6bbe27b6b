//! `gPLink` attribute parsing.
//!
//! The attribute is a run of bracketed segments:
//!
//! ```text
//! [LDAP://cn={GUID},cn=policies,cn=system,DC=corp,DC=local;0][LDAP://...;2]
//! ```
//!
//! Parsing runs in three stages: [`segments`] splits on brackets and keeps
//! only `LDAP` segments, [`parse_segment`] splits a segment into reference and
//! status, and [`LinkStatus::from_code`] decodes the status. Malformed
//! segments are skipped with a warning; they never abort the remaining ones.

use serde::Serialize;
use tracing::warn;

use super::cache::PolicyNameCache;

const LDAP_PREFIX: &str = "LDAP://";

/// A resolved policy link on a container.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyLink {
    /// `DISPLAYNAME@DOMAIN`, upper-cased.
    pub name: String,
    /// Whether the link is enforced (status `2`).
    #[serde(rename = "isEnforced")]
    pub enforced: bool,
}

/// Link option flags encoded after the `;`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    /// `0`: enabled, not enforced.
    Enabled,
    /// `1`: disabled, not enforced.
    Disabled,
    /// `2`: enabled and enforced.
    Enforced,
    /// `3`: disabled and enforced.
    DisabledEnforced,
}

impl LinkStatus {
    /// Decode a status field. Only `0`..=`3` are valid.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "0" => Some(Self::Enabled),
            "1" => Some(Self::Disabled),
            "2" => Some(Self::Enforced),
            "3" => Some(Self::DisabledEnforced),
            _ => None,
        }
    }

    /// Disabled links are never emitted.
    pub fn is_disabled(self) -> bool {
        matches!(self, Self::Disabled | Self::DisabledEnforced)
    }

    /// Whether an enabled link is enforced.
    pub fn is_enforced(self) -> bool {
        matches!(self, Self::Enforced)
    }
}

/// One syntactically valid segment before name resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLink<'a> {
    /// Policy reference as written in the attribute, `LDAP://` included.
    pub reference: &'a str,
    /// Decoded status.
    pub status: LinkStatus,
}

/// Why a segment was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LinkParseError {
    /// No `;` separator.
    #[error("missing status separator")]
    MissingStatus,
    /// More than one `;`.
    #[error("unexpected extra field")]
    ExtraField,
    /// Nothing between `LDAP://` and `;`.
    #[error("empty policy reference")]
    EmptyReference,
    /// Status outside `0..=3`.
    #[error("unknown status code {0:?}")]
    UnknownStatus(String),
}

/// Split a raw attribute into its `LDAP`-prefixed segments, in order.
pub fn segments(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(['[', ']'])
        .filter(|s| !s.is_empty())
        .filter(|s| s.starts_with("LDAP"))
}

/// Parse one segment into a [`RawLink`].
///
/// # Errors
///
/// Returns a [`LinkParseError`] describing the first problem found.
pub fn parse_segment(segment: &str) -> Result<RawLink<'_>, LinkParseError> {
    let mut fields = segment.split(';');
    let target = fields.next().unwrap_or_default();
    let code = fields.next().ok_or(LinkParseError::MissingStatus)?;
    if fields.next().is_some() {
        return Err(LinkParseError::ExtraField);
    }

    if strip_ldap_prefix(target).is_empty() {
        return Err(LinkParseError::EmptyReference);
    }

    let status =
        LinkStatus::from_code(code).ok_or_else(|| LinkParseError::UnknownStatus(code.to_owned()))?;

    Ok(RawLink {
        reference: target,
        status,
    })
}

/// Parse a raw `gPLink` value without resolving names.
///
/// Disabled links are kept here; callers decide what to do with them.
pub fn parse_links(raw: &str) -> Vec<RawLink<'_>> {
    segments(raw)
        .filter_map(|segment| match parse_segment(segment) {
            Ok(link) => Some(link),
            Err(e) => {
                warn!(segment = %segment, error = %e, "skipping malformed gPLink segment");
                None
            }
        })
        .collect()
}

/// Resolve a raw `gPLink` value into the enabled links of a container,
/// preserving attribute order.
///
/// An absent attribute yields no links.
pub fn resolve_links(
    raw: Option<&str>,
    domain: &str,
    cache: &PolicyNameCache,
) -> Vec<PolicyLink> {
    let Some(raw) = raw else {
        return Vec::new();
    };

    parse_links(raw)
        .into_iter()
        .filter(|link| !link.status.is_disabled())
        .map(|link| {
            let display_name = cache.resolve(link.reference);
            PolicyLink {
                name: format!("{display_name}@{domain}").to_uppercase(),
                enforced: link.status.is_enforced(),
            }
        })
        .collect()
}

fn strip_ldap_prefix(target: &str) -> &str {
    match target.get(..LDAP_PREFIX.len()) {
        Some(prefix) if prefix.eq_ignore_ascii_case(LDAP_PREFIX) => &target[LDAP_PREFIX.len()..],
        _ => target,
    }
}
