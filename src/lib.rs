//! adtree — Group Policy link and OU membership resolution for Active
//! Directory collection runs.
//!
//! For every domain root and organizational unit, resolves the `gPLink`
//! attribute into enforcement-annotated policy links and, for OUs, lists
//! the direct user, computer and child-OU identifiers.
//!
//! See `DESIGN.md` for the module map.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod logging;

pub mod directory;
pub mod gpo;

pub mod collector;
pub mod container;
