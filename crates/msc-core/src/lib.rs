// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Message sequence documents for signalling procedures.
//!
//! A [`Sequence`] is an ordered log of protocol messages exchanged between
//! named actors. This crate owns three concerns:
//!
//! - **Editing**: [`SequenceEditor`] applies [`EditOp`]s to an immutable
//!   snapshot and records each op's inverse in a bounded [`CommandHistory`],
//!   so every edit can be undone and redone.
//! - **Tracking**: [`tracker`] normalizes declared configurations, attributes
//!   them to owning actors and resolves the value in force at a message index.
//! - **Replay**: [`compute_actor_states`] walks the message prefix up to an
//!   as-of index and reports what each actor believes about identifiers,
//!   configurations and protocol state.
//!
//! # Determinism
//!
//! Replay is a pure function of `(Sequence, as_of)`. It never fails: malformed
//! payloads only hide the affected value. Results may be memoized on the
//! editor's version counter through [`ActorStateCache`].
//!
//! # Modules
//!
//! - [`model`]: sequences, messages, tracked configurations
//! - [`actors`]: the actor registry
//! - [`history`]: invertible edit ops and the undo/redo stacks
//! - [`document`]: the sequence editor (document store)
//! - [`tracker`]: configuration attribution, value resolution, conflict detection
//! - [`reconstruct`]: per-actor state replay
//! - [`validate`] / [`rrc`]: sequence-level checks and the RRC state machine
//! - [`suggest`] / [`schema`]: offline field suggestions and identifier detection
//! - [`snapshot`]: JSON export/import
//! - [`repository`]: the persistence port and an in-memory adapter
#![forbid(unsafe_code)]

pub mod actors;
pub mod document;
pub mod error;
pub mod history;
pub mod ident;
pub mod model;
pub mod payload;
pub mod reconstruct;
pub mod repository;
pub mod rrc;
pub mod schema;
pub mod snapshot;
pub mod suggest;
pub mod tracker;
pub mod validate;

pub use actors::{ActorRegistry, ROLE_CORE, ROLE_GNB, ROLE_NETWORK, ROLE_UE};
pub use document::SequenceEditor;
pub use error::{NotFoundTarget, SequenceError};
pub use history::{CommandHistory, EditOp};
pub use ident::{ActorName, MessageId, SequenceId};
pub use model::{Configurations, Message, NewMessage, Sequence, TrackedConfiguration};
pub use reconstruct::{
    compute_actor_states, ActorConfiguration, ActorState, ActorStateCache, IdentifierEntry,
};
pub use repository::{
    sort_newest_first, ListFilter, MemorySequenceRepository, MessageUpdate, RepositoryError,
    SequenceDelta, SequenceRepository,
};
pub use rrc::{rrc_state_at, RrcState};
pub use schema::{TypeKind, TypeNode};
pub use snapshot::{export_sequence, parse_snapshot};
pub use suggest::{detect_identifiers, suggest, Suggestion};
pub use validate::{validate_sequence, Severity, Violation, ViolationCode};
