//! Typed CRUD over the identity graph.
//!
//! Every function is synchronous over a borrowed [`rusqlite::Connection`] and
//! is meant to run on the database thread, usually inside a transaction
//! (a `Transaction` derefs to `Connection`). Mutations of profiles, identities
//! and enrollments bump `last_modified` of the owning unique identity.

pub mod archive;
pub mod blacklist;
pub mod enrollments;
pub mod find;
pub mod identities;
pub mod nested;
pub mod organizations;
pub mod profiles;
pub mod uidentities;
