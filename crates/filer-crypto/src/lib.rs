//! Digest pipeline for filer.
//!
//! Folds an ordered sequence of byte chunks into a SHA-256 [`ContentDigest`]
//! without buffering the content. All hashing wraps the `sha2` crate.
//!
//! [`ContentDigest`]: filer_types::ContentDigest

pub mod hasher;

pub use hasher::{DigestError, DigestPipeline};
