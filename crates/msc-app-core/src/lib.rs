// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Shared application services for the MSC editor (config, prefs, recent values).
//! Keeps the session layer and CLI thin and storage-agnostic.

#![forbid(unsafe_code)]

pub mod config;
pub mod prefs;
pub mod recent;
