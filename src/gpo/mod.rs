//! Group Policy link resolution.

pub mod cache;
pub mod link;

pub use cache::PolicyNameCache;
pub use link::{resolve_links, LinkStatus, PolicyLink};
