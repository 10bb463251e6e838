//! Clients for the external organization and user directories.
//!
//! Both speak JSON over HTTP with a bearer token and are read-only. Pages are
//! 1-based on our side and converted to the directories' 0-based offsets.

mod client;
mod error;
mod organizations;
mod users;

pub use client::DirectoryConfig;
pub use error::{Error, Result};
pub use organizations::OrganizationDirectoryClient;
pub use users::UserDirectoryClient;
