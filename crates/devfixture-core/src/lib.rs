//! # devfixture core
//!
//! Snapshot and restore of a development environment: one Postgres database
//! plus a tree of uploaded media, packed together into a fixture archive
//! named after the source revision it was taken at.
//!
//! ## Laws (Compiler Enforced)
//!
//! - No `unwrap()` - returns `Result` instead
//! - No `expect()` - returns `Result` instead
//! - No `panic!()` - returns `Result` instead
//! - No `unsafe` - safe Rust only
//!
//! ## Error Handling
//!
//! All fallible operations return `Result<T, Error>`. Restore failures carry
//! their outcome in the error itself: [`Error::RolledBack`] when the safety
//! backup was put back, [`Error::RollbackFailure`] when live state is
//! indeterminate.
//!
//! ## Seams
//!
//! External effects sit behind traits so the lifecycle can run against fakes:
//! [`ProcessExecutor`] for every subprocess, [`ArchiveCodec`] for packing,
//! [`RevisionSource`] for version control and [`FixtureIndex`] for the
//! catalog.

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::panic))]
#![forbid(unsafe_code)]

pub mod archive;
pub mod catalog;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod naming;
pub mod process;
pub mod recovery;
pub mod revision;
pub mod staging;
pub mod tools;

pub use archive::{ArchiveBuilder, ArchiveCodec, ArchiveRestorer, ZipCodec};
pub use catalog::{select_fixture, DirectoryIndex, FixtureArchive, FixtureCatalog, FixtureIndex};
pub use config::{FixtureConfig, Settings};
pub use error::{Error, Result, Step};
pub use lifecycle::{
    CatalogListing, CreateReport, LifecycleState, Orchestrator, RestoreReport, StateMachine,
    StateTransition,
};
pub use naming::FixtureName;
pub use process::{CommandResult, Invocation, ProcessExecutor, SystemExecutor};
pub use revision::{GitRevisions, RevisionSource};
pub use staging::StagingArea;
