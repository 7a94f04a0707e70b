// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![allow(clippy::unwrap_used, missing_docs)]
//! `HttpServices` against an in-process stand-in for the MSC backend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use msc_core::{ListFilter, Sequence, SequenceDelta, SequenceId};
use msc_session::{
    HttpServices, IdentifierService, PersistenceService, SchemaService, ServiceError,
    SuggestionQuery, SuggestionService,
};
use serde_json::{json, Value};

// =============================================================================
// STAND-IN BACKEND
// =============================================================================

fn stored_sequence(id: &str) -> Value {
    json!({
        "id": id,
        "name": "attach",
        "protocol": "rrc_demo",
        "messages": [{
            "id": "m1",
            "typeName": "RRCSetupRequest",
            "data": {"ue-Identity": {"randomValue": ["0xAB", 39]}},
            "sourceActor": "UE",
            "targetActor": "gNB",
            "timestamp": 0.0,
            "validationErrors": []
        }],
        "subSequences": [],
        "configurations": {},
        "validationResults": [],
        "createdAt": "2024-03-01T10:00:00",
        "updatedAt": "2024-03-01T10:05:00"
    })
}

async fn sequence(Path(id): Path<String>) -> Result<Json<Value>, StatusCode> {
    if id == "missing" {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(Json(stored_sequence(&id)))
}

async fn remove(Path(id): Path<String>) -> Result<Json<Value>, StatusCode> {
    if id == "missing" {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(Json(json!({"status": "success", "deleted": id})))
}

/// Every `PUT` body the stand-in received, with its sequence id.
type PutLog = Arc<Mutex<Vec<(String, Value)>>>;

async fn update(
    State(log): State<PutLog>,
    Path(id): Path<String>,
    Json(delta): Json<Value>,
) -> Json<Value> {
    log.lock().unwrap().push((id.clone(), delta.clone()));
    let mut body = stored_sequence(&id);
    if let Some(name) = delta.get("name") {
        body["name"] = name.clone();
    }
    Json(body)
}

async fn create(Json(request): Json<Value>) -> Json<Value> {
    let mut body = stored_sequence("created-1");
    body["name"] = request["name"].clone();
    body["sessionId"] = request["session_id"].clone();
    Json(body)
}

async fn suggestions(
    Path(id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    Json(json!([{
        "value": format!("{id}:{}", params["field_name"]),
        "sourceMessageIndex": params["message_index"].parse::<usize>().unwrap() - 1,
        "confidence": 0.9,
        "identifier": params["field_name"],
    }]))
}

async fn identifiers(Path((protocol, type_name)): Path<(String, String)>) -> Json<Value> {
    Json(json!({
        "identifiers": ["ue-Identity", "establishmentCause"],
        "protocol": protocol,
        "typeName": type_name,
        "count": 2,
        "detectedAt": "2024-03-01T10:00:00"
    }))
}

async fn definition(Path((_, type_name)): Path<(String, String)>) -> Json<Value> {
    Json(json!({
        "definition": "RRCSetupRequest ::= SEQUENCE { ... }",
        "tree": {
            "name": type_name,
            "kind": "Sequence",
            "children": [{"name": "ue-Identity", "kind": "Choice"}]
        }
    }))
}

async fn broken_list() -> StatusCode {
    StatusCode::INTERNAL_SERVER_ERROR
}

async fn serve() -> HttpServices {
    serve_logged().await.0
}

async fn serve_logged() -> (HttpServices, PutLog) {
    let log = PutLog::default();
    let app = Router::new()
        .route("/api/asn/protocols/{protocol}/types/{type_name}", get(definition))
        .route(
            "/api/msc/protocols/{protocol}/identifiers/{type_name}",
            get(identifiers),
        )
        .route("/api/msc/sequences", get(broken_list).post(create))
        .route(
            "/api/msc/sequences/{id}",
            get(sequence).put(update).delete(remove),
        )
        .route("/api/msc/sequences/{id}/suggestions", get(suggestions))
        .with_state(log.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (HttpServices::new(&format!("http://{addr}/api")).unwrap(), log)
}

// =============================================================================
// TESTS
// =============================================================================

#[tokio::test]
async fn reads_wrapped_schema_and_identifier_bodies() {
    let services = serve().await;
    let tree = services
        .type_definition("rrc_demo", "RRCSetupRequest")
        .await
        .unwrap();
    assert_eq!(tree.name.as_deref(), Some("RRCSetupRequest"));
    assert_eq!(tree.children.len(), 1);

    let names = services.identifiers("rrc_demo", "RRCSetupRequest").await.unwrap();
    assert_eq!(names, ["ue-Identity", "establishmentCause"]);
}

#[tokio::test]
async fn suggestion_query_travels_in_path_and_query_string() {
    let services = serve().await;
    let query = SuggestionQuery {
        sequence_id: SequenceId::new("seq-9"),
        message_index: 3,
        field_name: "ue-Identity".into(),
        protocol: "rrc_demo".into(),
        type_name: "RRCSetupRequest".into(),
    };
    let out = services.suggestions(&query).await.unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].value, json!("seq-9:ue-Identity"));
    assert_eq!(out[0].source_message_index, 2);
}

#[tokio::test]
async fn sequences_round_trip_backend_shape() {
    let services = serve().await;
    let found = services.get(&SequenceId::new("abc")).await.unwrap().unwrap();
    assert_eq!(found.id.as_str(), "abc");
    assert_eq!(found.len(), 1);
    assert_eq!(found.messages[0].type_name, "RRCSetupRequest");

    assert!(services.get(&SequenceId::new("missing")).await.unwrap().is_none());
    assert!(services.delete(&SequenceId::new("abc")).await.unwrap());
    assert!(!services.delete(&SequenceId::new("missing")).await.unwrap());

    let delta = SequenceDelta {
        name: Some("renamed".into()),
        ..SequenceDelta::default()
    };
    let updated = services.update(&SequenceId::new("abc"), &delta).await.unwrap();
    assert_eq!(updated.name, "renamed");

    let draft = msc_core::Sequence::new("fresh", "rrc_demo", Some("s1".into()));
    let created = services.create(&draft).await.unwrap();
    assert_eq!(created.id.as_str(), "created-1");
    assert_eq!(created.name, "fresh");
    assert_eq!(created.session_id.as_deref(), Some("s1"));
}

#[tokio::test]
async fn server_errors_are_reported() {
    let services = serve().await;
    let err = services.list(&ListFilter::default()).await.unwrap_err();
    assert!(matches!(err, ServiceError::Status { status: 500, .. }));
}

#[tokio::test]
async fn save_sends_deltas_against_the_stored_copy() {
    let (services, log) = serve_logged().await;
    let mut body = stored_sequence("abc");
    body["name"] = json!("renamed");
    body["messages"][0]["id"] = json!("m2");
    let wanted: Sequence = serde_json::from_value(body).unwrap();
    services.save(&wanted).await.unwrap();

    let puts = log.lock().unwrap().clone();
    assert!(puts.iter().all(|(id, _)| id == "abc"));
    let parts: Vec<Value> = puts.into_iter().map(|(_, delta)| delta).collect();
    assert_eq!(parts.len(), 3);
    assert_eq!(parts[0], json!({"name": "renamed"}));
    assert_eq!(parts[1], json!({"remove_message": "m1"}));
    assert_eq!(parts[2]["add_message"]["id"], "m2");
}

#[tokio::test]
async fn save_creates_unknown_sequences_first() {
    let (services, log) = serve_logged().await;
    let mut draft = Sequence::new("fresh", "rrc_demo", Some("s1".into()));
    draft.id = SequenceId::new("missing");
    services.save(&draft).await.unwrap();

    let puts = log.lock().unwrap().clone();
    assert!(!puts.is_empty());
    assert!(puts.iter().all(|(id, _)| id == "created-1"));
    assert!(puts.iter().any(|(_, delta)| delta.get("remove_message") == Some(&json!("m1"))));
}
