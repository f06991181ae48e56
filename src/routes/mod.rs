pub mod api;
pub mod auth_middleware;

pub use api::create_api_routes;

use axum::{http::HeaderValue, routing::get, Router};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::warn;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    docs::ApiDoc,
    handlers::{health_check, ready_check},
    state::AppState,
    websocket::websocket_handler,
};

/// Build the full application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.cors_origin_list());

    Router::new()
        .route("/ws", get(websocket_handler))
        .route("/health", get(health_check))
        .route("/ready", get(ready_check))
        .with_state(state.clone())
        // Mount API routes
        .nest("/api", create_api_routes(state))
        // Mount Swagger UI
        .merge(SwaggerUi::new("/swagger").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(v) => Some(v),
            Err(_) => {
                warn!("Ignoring invalid CORS origin '{}'", o);
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ParticipantsResponse, RoomListingResponse, RoomResponse};
    use crate::services::auth_service::test_tokens::token_for;
    use crate::state::test_state;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request, StatusCode};
    use serde::de::DeserializeOwned;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn call(
        app: &Router,
        method: Method,
        uri: &str,
        user: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Vec<u8>) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token_for(user)));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, bytes.to_vec())
    }

    fn parse<T: DeserializeOwned>(bytes: &[u8]) -> T {
        serde_json::from_slice(bytes).unwrap()
    }

    async fn create(app: &Router, owner: &str) -> RoomResponse {
        let (status, body) = call(
            app,
            Method::POST,
            "/api/v1/rooms",
            Some(owner),
            Some(json!({ "name": "Algebra", "description": "chapter 3" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        parse(&body)
    }

    #[tokio::test]
    async fn test_health_is_public() {
        let app = create_router(test_state());
        let (status, body) = call(&app, Method::GET, "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(parse::<Value>(&body)["status"], "ok");
        let (status, _) = call(&app, Method::GET, "/ready", None, None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_api_requires_token() {
        let app = create_router(test_state());
        let (status, _) = call(&app, Method::GET, "/api/v1/rooms", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let request = Request::builder()
            .uri("/api/v1/rooms")
            .header(header::AUTHORIZATION, "Bearer not-a-jwt")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_room_lifecycle_over_rest() {
        let state = test_state();
        let app = create_router(state.clone());
        let room = create(&app, "alice").await;
        assert!(room.is_active);
        assert_eq!(room.participants.len(), 1);
        assert!(room.participants[0].is_owner);

        let join = format!("/api/v1/rooms/{}/join", room.id);
        let (status, _) = call(&app, Method::POST, &join, Some("bob"), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, body) = call(&app, Method::POST, &join, Some("bob"), None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(parse::<Value>(&body)["code"], 409);

        let (_bob_conn, mut bob_rx) = state.registry.open("bob");
        let end = format!("/api/v1/rooms/{}/end", room.id);
        let (status, _) = call(&app, Method::POST, &end, Some("bob"), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, body) = call(&app, Method::POST, &end, Some("alice"), None).await;
        assert_eq!(status, StatusCode::OK);
        let ended: RoomResponse = parse(&body);
        assert!(!ended.is_active);
        assert!(ended.ended_at.is_some());
        assert!(ended.participants.iter().all(|p| !p.is_active));

        let notice: Value = serde_json::from_str(&bob_rx.try_recv().unwrap()).unwrap();
        assert_eq!(notice["type"], "room_end");
        assert_eq!(notice["data"]["room_id"], room.id.to_string());

        let (status, _) = call(&app, Method::POST, &join, Some("carol"), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_bad_ids_and_unknown_rooms() {
        let app = create_router(test_state());
        let (status, _) = call(&app, Method::GET, "/api/v1/rooms/nope", Some("alice"), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let uri = format!("/api/v1/rooms/{}/join", uuid::Uuid::new_v4());
        let (status, _) = call(&app, Method::POST, &uri, Some("alice"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = call(
            &app,
            Method::POST,
            "/api/v1/rooms",
            Some("alice"),
            Some(json!({ "name": "   " })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_members_permissions_and_document() {
        let state = test_state();
        let app = create_router(state.clone());
        let room = create(&app, "alice").await;
        let base = format!("/api/v1/rooms/{}", room.id);
        call(&app, Method::POST, &format!("{}/join", base), Some("bob"), None).await;

        // Viewers cannot write
        let doc = format!("{}/document", base);
        let (status, _) = call(&app, Method::PUT, &doc, Some("bob"), Some(json!({ "content": "x" }))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (_bob_conn, mut bob_rx) = state.registry.open("bob");
        let perm = format!("{}/participants/bob/permission", base);
        let (status, _) = call(&app, Method::PUT, &perm, Some("alice"), Some(json!({ "permission": "can_edit" }))).await;
        assert_eq!(status, StatusCode::OK);
        let notice: Value = serde_json::from_str(&bob_rx.try_recv().unwrap()).unwrap();
        assert_eq!(notice["type"], "permission_changed");
        assert_eq!(notice["data"]["permission"], "can_edit");

        let (status, _) = call(&app, Method::PUT, &perm, Some("alice"), Some(json!({ "permission": "admin" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_alice_conn, mut alice_rx) = state.registry.open("alice");
        let (status, body) = call(&app, Method::PUT, &doc, Some("bob"), Some(json!({ "content": "x^2" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(parse::<RoomResponse>(&body).content, "x^2");
        let update: Value = serde_json::from_str(&alice_rx.try_recv().unwrap()).unwrap();
        assert_eq!(update["type"], "document_update");
        assert_eq!(update["data"]["editor_id"], "bob");
        assert!(bob_rx.try_recv().is_err());

        let remove = format!("{}/participants/bob", base);
        let (status, _) = call(&app, Method::DELETE, &remove, Some("alice"), None).await;
        assert_eq!(status, StatusCode::OK);
        let removed: Value = serde_json::from_str(&bob_rx.try_recv().unwrap()).unwrap();
        assert_eq!(removed["type"], "participant_removed");

        let (status, body) = call(&app, Method::GET, &format!("{}/participants", base), Some("alice"), None).await;
        assert_eq!(status, StatusCode::OK);
        let participants: ParticipantsResponse = parse(&body);
        assert_eq!(participants.active_participants.len(), 1);
        assert_eq!(participants.former_participants[0].user_id, "bob");

        // Former participants keep read access and show up in listings
        let (status, _) = call(&app, Method::GET, &base, Some("bob"), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, body) = call(&app, Method::GET, "/api/v1/rooms?owned=false", Some("bob"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(parse::<Vec<RoomListingResponse>>(&body).len(), 1);
        let (_, body) = call(&app, Method::GET, "/api/v1/rooms", Some("bob"), None).await;
        assert!(parse::<Vec<RoomListingResponse>>(&body).is_empty());
    }

    #[tokio::test]
    async fn test_transfer_and_owner_leave() {
        let state = test_state();
        let app = create_router(state.clone());
        let room = create(&app, "alice").await;
        let base = format!("/api/v1/rooms/{}", room.id);
        call(&app, Method::POST, &format!("{}/join", base), Some("bob"), None).await;

        let (status, _) = call(&app, Method::PATCH, &base, Some("bob"), Some(json!({ "name": "Mine" }))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (_alice_conn, mut alice_rx) = state.registry.open("alice");
        let (status, body) = call(&app, Method::POST, &format!("{}/owner/bob", base), Some("alice"), None).await;
        assert_eq!(status, StatusCode::OK);
        let transferred: RoomResponse = parse(&body);
        let owners: Vec<_> = transferred.participants.iter().filter(|p| p.is_owner).collect();
        assert_eq!(owners.len(), 1);
        assert_eq!(owners[0].user_id, "bob");
        let notice: Value = serde_json::from_str(&alice_rx.try_recv().unwrap()).unwrap();
        assert_eq!(notice["type"], "owner_changed");
        assert_eq!(notice["data"]["owner_id"], "bob");

        let (status, body) = call(&app, Method::PATCH, &base, Some("bob"), Some(json!({ "name": "Mine" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(parse::<RoomResponse>(&body).name, "Mine");

        // The new owner leaving ends the room for everyone
        let (status, body) = call(&app, Method::POST, &format!("{}/leave", base), Some("bob"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(!parse::<RoomResponse>(&body).is_active);
        let notice: Value = serde_json::from_str(&alice_rx.try_recv().unwrap()).unwrap();
        assert_eq!(notice["type"], "room_end");
    }

    #[tokio::test]
    async fn test_diagnostics_reports_connections() {
        let state = test_state();
        let app = create_router(state.clone());
        let (_conn, _rx) = state.registry.open("alice");
        let (status, body) = call(&app, Method::GET, "/api/v1/diagnostics", Some("alice"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(parse::<Value>(&body)["n_conn"], 1);
    }
}
