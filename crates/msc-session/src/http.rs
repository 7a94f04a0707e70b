// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! HTTP client for the MSC backend.
//!
//! Routes are relative to the configured base URL (e.g.
//! `http://127.0.0.1:8000/api/`):
//!
//! | Port | Route |
//! |---|---|
//! | schema | `GET asn/protocols/{protocol}/types/{type}` |
//! | identifiers | `GET msc/protocols/{protocol}/identifiers/{type}` |
//! | suggestions | `GET msc/sequences/{id}/suggestions?message_index&field_name&protocol&type_name` |
//! | persistence | `POST/GET/PUT/DELETE msc/sequences[/{id}]` |
//!
//! `save` has no route of its own; it is a `GET` followed by a `POST` when
//! the sequence is new and one `PUT` per delta.

use msc_core::{ListFilter, Sequence, SequenceDelta, SequenceId, Suggestion, TypeNode};
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::ServiceError;
use crate::ports::{
    IdentifierService, PersistenceService, SchemaService, SuggestionQuery, SuggestionService,
};

/// Remote collaborators behind one base URL.
#[derive(Debug, Clone)]
pub struct HttpServices {
    client: Client,
    base: Url,
}

/// Type definition response: either a bare tree or `{definition, tree}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum DefinitionBody {
    Wrapped { tree: TypeNode },
    Bare(TypeNode),
}

/// Identifier response: either a bare list or `{identifiers, ...}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum IdentifierBody {
    Wrapped { identifiers: Vec<String> },
    Bare(Vec<String>),
}

#[derive(Serialize)]
struct CreateRequest<'a> {
    name: &'a str,
    protocol: &'a str,
    session_id: Option<&'a str>,
}

impl HttpServices {
    /// Client for the backend at `base_url`. A missing trailing slash is added
    /// so relative routes nest under the base path.
    pub fn new(base_url: &str) -> Result<Self, ServiceError> {
        Self::with_client(Client::new(), base_url)
    }

    /// Like [`HttpServices::new`] with a caller-built client.
    pub fn with_client(client: Client, base_url: &str) -> Result<Self, ServiceError> {
        let normalized = if base_url.ends_with('/') {
            base_url.to_owned()
        } else {
            format!("{base_url}/")
        };
        let base = Url::parse(&normalized)
            .map_err(|err| ServiceError::Unavailable(format!("invalid base url {base_url}: {err}")))?;
        if base.cannot_be_a_base() {
            return Err(ServiceError::Unavailable(format!("invalid base url {base_url}")));
        }
        Ok(Self { client, base })
    }

    /// Base URL all routes are resolved against.
    pub fn base(&self) -> &Url {
        &self.base
    }

    /// `base` plus percent-encoded path `segments`.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ServiceError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| ServiceError::Unavailable(format!("invalid base url {}", self.base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

async fn fetch<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, ServiceError> {
    decode(request.send().await?).await
}

/// Like [`fetch`], with a 404 mapped to `Ok(None)`.
async fn fetch_optional<T: DeserializeOwned>(
    request: RequestBuilder,
) -> Result<Option<T>, ServiceError> {
    let response = request.send().await?;
    if response.status() == StatusCode::NOT_FOUND {
        return Ok(None);
    }
    decode(response).await.map(Some)
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ServiceError> {
    let status = response.status();
    if !status.is_success() {
        return Err(ServiceError::Status {
            url: response.url().to_string(),
            status: status.as_u16(),
        });
    }
    let bytes = response.bytes().await?;
    debug!(bytes = bytes.len(), "collaborator response");
    Ok(serde_json::from_slice(&bytes)?)
}

impl SchemaService for HttpServices {
    #[instrument(skip(self))]
    async fn type_definition(&self, protocol: &str, type_name: &str) -> Result<TypeNode, ServiceError> {
        let url = self.endpoint(&["asn", "protocols", protocol, "types", type_name])?;
        let body: DefinitionBody = fetch(self.client.get(url)).await?;
        Ok(match body {
            DefinitionBody::Wrapped { tree } | DefinitionBody::Bare(tree) => tree,
        })
    }
}

impl SuggestionService for HttpServices {
    #[instrument(skip(self), fields(seq = %query.sequence_id, field = %query.field_name))]
    async fn suggestions(&self, query: &SuggestionQuery) -> Result<Vec<Suggestion>, ServiceError> {
        let url = self.endpoint(&["msc", "sequences", query.sequence_id.as_str(), "suggestions"])?;
        let index = query.message_index.to_string();
        let request = self.client.get(url).query(&[
            ("message_index", index.as_str()),
            ("field_name", query.field_name.as_str()),
            ("protocol", query.protocol.as_str()),
            ("type_name", query.type_name.as_str()),
        ]);
        fetch(request).await
    }
}

impl IdentifierService for HttpServices {
    #[instrument(skip(self))]
    async fn identifiers(&self, protocol: &str, type_name: &str) -> Result<Vec<String>, ServiceError> {
        let url = self.endpoint(&["msc", "protocols", protocol, "identifiers", type_name])?;
        let body: IdentifierBody = fetch(self.client.get(url)).await?;
        Ok(match body {
            IdentifierBody::Wrapped { identifiers } | IdentifierBody::Bare(identifiers) => identifiers,
        })
    }
}

impl PersistenceService for HttpServices {
    #[instrument(skip(self, sequence), fields(name = %sequence.name))]
    async fn create(&self, sequence: &Sequence) -> Result<Sequence, ServiceError> {
        let url = self.endpoint(&["msc", "sequences"])?;
        let body = CreateRequest {
            name: &sequence.name,
            protocol: &sequence.protocol,
            session_id: sequence.session_id.as_deref(),
        };
        fetch(self.client.post(url).json(&body)).await
    }

    #[instrument(skip(self))]
    async fn get(&self, id: &SequenceId) -> Result<Option<Sequence>, ServiceError> {
        let url = self.endpoint(&["msc", "sequences", id.as_str()])?;
        fetch_optional(self.client.get(url)).await
    }

    /// Whole-sequence save built from the partial routes: fetch the stored
    /// copy (creating one when the backend has none) and send the deltas
    /// between it and `sequence`.
    ///
    /// A sequence the backend has never seen is stored under the id the
    /// backend assigns. Message order and configurations are not synced.
    #[instrument(skip(self, sequence), fields(id = %sequence.id))]
    async fn save(&self, sequence: &Sequence) -> Result<(), ServiceError> {
        let stored = match self.get(&sequence.id).await? {
            Some(stored) => stored,
            None => {
                let created = self.create(sequence).await?;
                debug!(assigned = %created.id, "created on backend");
                created
            }
        };
        let deltas = SequenceDelta::between(&stored, sequence);
        debug!(deltas = deltas.len(), "syncing");
        for delta in &deltas {
            self.update(&stored.id, delta).await?;
        }
        Ok(())
    }

    #[instrument(skip(self, delta))]
    async fn update(&self, id: &SequenceId, delta: &SequenceDelta) -> Result<Sequence, ServiceError> {
        let url = self.endpoint(&["msc", "sequences", id.as_str()])?;
        fetch(self.client.put(url).json(delta)).await
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: &SequenceId) -> Result<bool, ServiceError> {
        let url = self.endpoint(&["msc", "sequences", id.as_str()])?;
        let found: Option<serde_json::Value> = fetch_optional(self.client.delete(url)).await?;
        Ok(found.is_some())
    }

    #[instrument(skip(self))]
    async fn list(&self, filter: &ListFilter) -> Result<Vec<Sequence>, ServiceError> {
        let url = self.endpoint(&["msc", "sequences"])?;
        let mut query: Vec<(&str, &str)> = Vec::new();
        if let Some(protocol) = &filter.protocol {
            query.push(("protocol", protocol.as_str()));
        }
        if let Some(session) = &filter.session_id {
            query.push(("session_id", session.as_str()));
        }
        fetch(self.client.get(url).query(&query)).await
    }
}
