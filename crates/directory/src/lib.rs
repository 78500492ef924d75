//! `idforge-directory`: directory service boundary.
//!
//! - [`DirectoryClient`]: the capability interface the workflow consumes
//! - [`DirectoryError`]: failures tagged transient/permanent
//! - [`InMemoryDirectory`]: call-recording fake for tests and dry runs
//! - [`GraphDirectory`]: Microsoft Graph adapter

pub mod client;
pub mod error;
pub mod graph;
pub mod memory;

pub use client::{AccountAttributes, DirectoryClient, NewAccount};
pub use error::{DirectoryError, DirectoryResult, ErrorKind};
pub use graph::{CredentialsError, GraphCredentials, GraphDirectory};
pub use memory::{DirectoryCall, InMemoryDirectory, Operation, StoredAccount};
