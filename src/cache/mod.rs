//! Cache consistency layer.
//!
//! The local chart directory is a cache over the S3 mirror whenever
//! mirroring is enabled.  The [`Resolver`] decides, per read, whether the
//! local copy can be served or must first be refreshed from S3, and
//! [`locks::NameLocks`] serialises operations touching the same chart name.

pub mod locks;
pub mod resolver;

pub use resolver::{Resolved, Resolver, Source};
