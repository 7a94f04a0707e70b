// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Async editor session for MSC documents.
//!
//! [`EditorSession`] wraps a `msc_core::SequenceEditor` together with the
//! collaborators an editor front end needs: a schema service, a suggestion
//! service, an identifier service and a persistence backend. The ports are
//! traits in [`ports`]; [`HttpServices`] implements them against the MSC
//! backend, [`RepositoryBackend`] adapts a local repository and [`Offline`]
//! refuses every remote call.
#![forbid(unsafe_code)]

mod cancel;
pub mod error;
mod http;
mod local;
pub mod ports;
mod session;

pub use cancel::Canceller;
pub use error::{ServiceError, SessionError};
pub use http::HttpServices;
pub use local::{Offline, RepositoryBackend};
pub use ports::{
    IdentifierService, PersistenceService, SchemaService, SuggestionQuery, SuggestionService,
};
pub use session::EditorSession;
