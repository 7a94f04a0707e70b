// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Filesystem adapters for the MSC editor.
//!
//! [`FsConfigStore`] backs the `ConfigStore` port with one JSON file per key.
//! [`FsSequenceRepository`] backs the `SequenceRepository` port with one JSON
//! file per sequence.
#![forbid(unsafe_code)]

mod sequences;
mod store;

pub use sequences::{sanitize_file_name, FsSequenceRepository, INDEX_FILE};
pub use store::FsConfigStore;
