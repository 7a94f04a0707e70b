// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Local port implementations: a synchronous repository behind the async
//! persistence port, and an offline stand-in for remote collaborators.

use std::future::{self, Future};
use std::sync::{Arc, Mutex, PoisonError};

use msc_core::{
    ListFilter, Sequence, SequenceDelta, SequenceId, SequenceRepository, Suggestion, TypeNode,
};

use crate::error::ServiceError;
use crate::ports::{
    IdentifierService, PersistenceService, SchemaService, SuggestionQuery, SuggestionService,
};

/// Adapts a [`SequenceRepository`] to [`PersistenceService`].
///
/// Each call runs on the blocking pool so filesystem work never stalls the
/// runtime. Calls are serialized by a mutex.
#[derive(Debug)]
pub struct RepositoryBackend<R> {
    repo: Arc<Mutex<R>>,
}

impl<R> Clone for RepositoryBackend<R> {
    fn clone(&self) -> Self {
        Self {
            repo: Arc::clone(&self.repo),
        }
    }
}

impl<R> RepositoryBackend<R>
where
    R: SequenceRepository + Send + 'static,
{
    /// Wrap `repo`.
    pub fn new(repo: R) -> Self {
        Self {
            repo: Arc::new(Mutex::new(repo)),
        }
    }

    async fn run<T, F>(&self, f: F) -> Result<T, ServiceError>
    where
        T: Send + 'static,
        F: FnOnce(&mut R) -> Result<T, msc_core::RepositoryError> + Send + 'static,
    {
        let repo = Arc::clone(&self.repo);
        tokio::task::spawn_blocking(move || {
            // Poisoning only means an earlier call panicked.
            let mut guard = repo.lock().unwrap_or_else(PoisonError::into_inner);
            f(&mut guard)
        })
        .await?
        .map_err(ServiceError::from)
    }
}

impl<R> PersistenceService for RepositoryBackend<R>
where
    R: SequenceRepository + Send + 'static,
{
    async fn create(&self, sequence: &Sequence) -> Result<Sequence, ServiceError> {
        let sequence = sequence.clone();
        self.run(move |repo| repo.create(&sequence).map(|()| sequence))
            .await
    }

    async fn get(&self, id: &SequenceId) -> Result<Option<Sequence>, ServiceError> {
        let id = id.clone();
        self.run(move |repo| repo.get(&id)).await
    }

    async fn save(&self, sequence: &Sequence) -> Result<(), ServiceError> {
        let sequence = sequence.clone();
        self.run(move |repo| repo.save(&sequence)).await
    }

    async fn update(&self, id: &SequenceId, delta: &SequenceDelta) -> Result<Sequence, ServiceError> {
        let id = id.clone();
        let delta = delta.clone();
        self.run(move |repo| repo.update(&id, delta)).await
    }

    async fn delete(&self, id: &SequenceId) -> Result<bool, ServiceError> {
        let id = id.clone();
        self.run(move |repo| repo.delete(&id)).await
    }

    async fn list(&self, filter: &ListFilter) -> Result<Vec<Sequence>, ServiceError> {
        let filter = filter.clone();
        self.run(move |repo| repo.list(&filter)).await
    }
}

/// Remote collaborators that are not there. Every call fails with
/// [`ServiceError::Unavailable`], so the session uses its local fallbacks.
#[derive(Debug, Clone, Copy, Default)]
pub struct Offline;

fn offline<T>(what: &str) -> Result<T, ServiceError> {
    Err(ServiceError::Unavailable(format!("{what}: running offline")))
}

impl SchemaService for Offline {
    fn type_definition(
        &self,
        _protocol: &str,
        _type_name: &str,
    ) -> impl Future<Output = Result<TypeNode, ServiceError>> + Send {
        future::ready(offline("schema"))
    }
}

impl SuggestionService for Offline {
    fn suggestions(
        &self,
        _query: &SuggestionQuery,
    ) -> impl Future<Output = Result<Vec<Suggestion>, ServiceError>> + Send {
        future::ready(offline("suggestions"))
    }
}

impl IdentifierService for Offline {
    fn identifiers(
        &self,
        _protocol: &str,
        _type_name: &str,
    ) -> impl Future<Output = Result<Vec<String>, ServiceError>> + Send {
        future::ready(offline("identifiers"))
    }
}
