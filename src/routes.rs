//! HTTP 라우터 및 액션 엔드포인트

use crate::error::VotingError;
use crate::handlers::{self, RoomEventStream, RoomStream};
use crate::identity::Identity;
use crate::protocol::{RoomUrlName, VoteChoice, VoteId};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::{HeaderValue, StatusCode},
    response::{sse::Sse, IntoResponse, Json, Redirect, Response},
    routing::{get, post},
    Form, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// 라우터 구성
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/create-room", post(create_room_handler))
        .route("/open-room", post(open_room_handler))
        .route("/request-vote", post(request_vote_handler))
        .route("/end-vote", post(end_vote_handler))
        .route("/room/:url_name", get(room_handler).post(cast_vote_handler))
        .route("/api/room/:url_name/events", get(events_handler))
        .layer(cors_layer(&state.config.cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() || origins.iter().any(|origin| origin == "*") {
        return layer.allow_origin(Any);
    }
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}

/// 거부 사유를 `?error=` 리다이렉트로 변환
fn rejection(room: Option<&RoomUrlName>, error: VotingError) -> Redirect {
    tracing::warn!(room = ?room.map(RoomUrlName::as_str), code = error.code(), "{}", error);
    let base = room.map(RoomUrlName::path).unwrap_or_else(|| "/".to_string());
    Redirect::to(&format!("{}?error={}", base, error.code()))
}

fn required<'a>(value: &'a Option<String>, field: &'static str) -> Result<&'a str, VotingError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or(VotingError::MissingField(field))
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "server": env!("CARGO_PKG_NAME"),
        "timestamp": std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or_default()
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateRoomForm {
    room_name: Option<String>,
}

async fn create_room_handler(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Form(form): Form<CreateRoomForm>,
) -> Response {
    let result = required(&form.room_name, "roomName")
        .and_then(|name| handlers::create_room(&state, &identity, name));
    let redirect = match result {
        Ok(room) => Redirect::to(&room.path()),
        Err(err) => rejection(None, err),
    };
    (identity.set_cookie(), redirect).into_response()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OpenRoomForm {
    room_url_name: Option<String>,
}

async fn open_room_handler(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Form(form): Form<OpenRoomForm>,
) -> Response {
    let redirect = match required(&form.room_url_name, "roomUrlName").map(RoomUrlName::new) {
        Ok(room) => match handlers::open_room(&state, &room, &identity) {
            Ok(()) => Redirect::to(&room.path()),
            Err(err) => rejection(Some(&room), err),
        },
        Err(err) => rejection(None, err),
    };
    (identity.set_cookie(), redirect).into_response()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RequestVoteForm {
    room_url_name: Option<String>,
    vote_title: Option<String>,
}

async fn request_vote_handler(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Form(form): Form<RequestVoteForm>,
) -> Response {
    let redirect = match required(&form.room_url_name, "roomUrlName").map(RoomUrlName::new) {
        Ok(room) => match required(&form.vote_title, "voteTitle")
            .and_then(|question| handlers::request_vote(&state, &room, &identity, question))
        {
            Ok(_) => Redirect::to(&room.path()),
            Err(err) => rejection(Some(&room), err),
        },
        Err(err) => rejection(None, err),
    };
    (identity.set_cookie(), redirect).into_response()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EndVoteForm {
    room_url_name: Option<String>,
    vote_id: Option<String>,
}

async fn end_vote_handler(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Form(form): Form<EndVoteForm>,
) -> Response {
    let redirect = match required(&form.room_url_name, "roomUrlName").map(RoomUrlName::new) {
        Ok(room) => {
            // 형식이 틀린 ID는 활성 투표와 일치할 수 없다
            let result = required(&form.vote_id, "voteId").and_then(|raw| {
                let vote_id = VoteId::parse(raw).ok_or(VotingError::VoteIdMismatch)?;
                handlers::end_vote(&state, &room, &identity, vote_id)
            });
            match result {
                Ok(_) => Redirect::to(&room.path()),
                Err(err) => rejection(Some(&room), err),
            }
        }
        Err(err) => rejection(None, err),
    };
    (identity.set_cookie(), redirect).into_response()
}

async fn room_handler(
    State(state): State<Arc<AppState>>,
    Path(url_name): Path<String>,
    identity: Identity,
) -> Response {
    let room = RoomUrlName::new(url_name);
    match handlers::room_snapshot(&state, &room, &identity) {
        Ok(snapshot) => (identity.set_cookie(), Json(snapshot)).into_response(),
        Err(err) => (identity.set_cookie(), rejection(None, err)).into_response(),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CastVoteForm {
    room_url_name: Option<String>,
    vote: Option<String>,
}

async fn cast_vote_handler(
    State(state): State<Arc<AppState>>,
    Path(url_name): Path<String>,
    identity: Identity,
    Form(form): Form<CastVoteForm>,
) -> Response {
    let room = RoomUrlName::new(url_name);
    let result = required(&form.vote, "vote")
        .and_then(|raw| raw.parse::<VoteChoice>().map_err(|_| VotingError::InvalidChoice))
        .and_then(|choice| {
            let form_room = required(&form.room_url_name, "roomUrlName")?;
            if form_room != room.as_str() {
                return Err(VotingError::RoomMismatch);
            }
            handlers::cast_vote(&state, &room, identity.voter_id, choice)
        });
    let redirect = match result {
        Ok(()) => Redirect::to(&room.path()),
        Err(err) => rejection(Some(&room), err),
    };
    (identity.set_cookie(), redirect).into_response()
}

async fn events_handler(
    State(state): State<Arc<AppState>>,
    Path(url_name): Path<String>,
    identity: Identity,
) -> Response {
    let room = RoomUrlName::new(url_name);
    match RoomStream::open(state, room.clone(), &identity) {
        Ok((session, events)) => {
            tracing::debug!(room = %session.room(), owner = session.is_owner(), "Streaming room events");
            let body = Sse::new(RoomEventStream::new(session, events));
            (identity.set_cookie(), body).into_response()
        }
        Err(err) => {
            tracing::warn!(room = %room, code = err.code(), "Rejected event stream");
            (StatusCode::NOT_FOUND, err.to_string()).into_response()
        }
    }
}
