//! Artifact storage for published clips.
//!
//! This crate provides:
//! - The `ArtifactStore` contract (put object, build public URL)
//! - A Cloudflare R2 implementation over the S3 API
//! - A local filesystem implementation for development
//! - The clip object key convention

pub mod client;
pub mod error;
pub mod store;

pub use client::{R2Client, R2Config};
pub use error::{StorageError, StorageResult};
pub use store::{
    join_public_url, object_key, store_from_env, ArtifactStore, LocalStore, R2Store, StoredObject,
    DEFAULT_PREFIX,
};
