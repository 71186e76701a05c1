use crate::config::StudyRoomConfig;
use crate::push::PushHub;
use crate::registry::{RegistryError, RoomRegistry};
use shared::models::{
    AckResponse, CreateRoomRequest, MembershipRequest, RoomAction, RoomActionResponse,
    RoomCommandRequest, RoomListResponse, RoomOutcome, RoomSnapshot, SetTimerRequest,
    StudyRoomClientConfigDto,
};

use axum::extract::ws::{Message, WebSocket};
use axum::{
    extract::{Path, State, WebSocketUpgrade},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument};

#[derive(Debug, Serialize)]
struct ErrorResponse {
    message: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

#[derive(Clone)]
pub struct AppState {
    registry: Arc<RoomRegistry>,
    config: Arc<StudyRoomConfig>,
    push: PushHub,
}

impl AppState {
    /// Shares the registry's hub, so rooms it prunes reach the same subscribers.
    pub fn new(registry: Arc<RoomRegistry>, config: StudyRoomConfig) -> Self {
        let push = registry.push().clone();
        Self {
            registry,
            config: Arc::new(config),
            push,
        }
    }
}

pub async fn run_server(config: StudyRoomConfig) -> anyhow::Result<()> {
    let registry = Arc::new(RoomRegistry::new(config.registry_options()));
    if !config.sweep_interval.is_zero() {
        spawn_sweeper(Arc::clone(&registry), config.sweep_interval);
    }
    let state = AppState::new(registry, config);
    let router = build_router(state.clone());

    let listen_addr = state.config.listen_addr;
    let listener = TcpListener::bind(listen_addr).await?;
    info!(address = %listen_addr, "Starting study room server");
    axum::serve(listener, router.into_make_service()).await?;
    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(healthcheck))
        .route("/rooms", get(list_rooms).post(create_room))
        .route("/rooms/:id", get(get_room))
        .route("/rooms/:id/start", post(start_room))
        .route("/rooms/:id/stop", post(stop_room))
        .route("/rooms/:id/timer", post(set_timer))
        .route("/rooms/:id/reset", post(reset_room))
        .route("/rooms/:id/join", post(join_room))
        .route("/rooms/:id/leave", post(leave_room))
        .route("/rooms/:id/close", post(close_room))
        .route("/rooms/:id/actions", post(room_action))
        // websocket push of room changes
        .route("/ws/rooms/:id", get(ws_upgrade))
        .with_state(state)
}

/// Periodically applies the same expiry/pruning a read would.
pub fn spawn_sweeper(registry: Arc<RoomRegistry>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            registry.sweep().await;
        }
    })
}

async fn healthcheck(State(state): State<AppState>) -> impl IntoResponse {
    let body: StudyRoomClientConfigDto = state.config.client_config();
    (StatusCode::OK, Json(body))
}

#[instrument(skip(state, payload))]
async fn create_room(
    State(state): State<AppState>,
    Json(payload): Json<CreateRoomRequest>,
) -> Result<(StatusCode, Json<RoomSnapshot>), ApiError> {
    state
        .registry
        .create(&payload.host, payload.duration_seconds, payload.title)
        .await
        .map(|room| (StatusCode::OK, Json(room)))
        .map_err(registry_err)
}

#[instrument(skip(state))]
async fn list_rooms(State(state): State<AppState>) -> impl IntoResponse {
    let rooms = state.registry.list().await;
    (StatusCode::OK, Json(RoomListResponse { rooms }))
}

#[instrument(skip(state))]
async fn get_room(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<(StatusCode, Json<RoomSnapshot>), ApiError> {
    state
        .registry
        .get(&room_id)
        .await
        .map(|room| (StatusCode::OK, Json(room)))
        .map_err(registry_err)
}

#[instrument(skip(state, payload))]
async fn start_room(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Json(payload): Json<RoomCommandRequest>,
) -> Result<(StatusCode, Json<RoomActionResponse>), ApiError> {
    let action = RoomAction::Start { requested_by: payload.requested_by };
    respond(apply_action(&state, &room_id, action).await)
}

#[instrument(skip(state, payload))]
async fn stop_room(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Json(payload): Json<RoomCommandRequest>,
) -> Result<(StatusCode, Json<RoomActionResponse>), ApiError> {
    let action = RoomAction::Stop { requested_by: payload.requested_by };
    respond(apply_action(&state, &room_id, action).await)
}

#[instrument(skip(state, payload))]
async fn set_timer(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Json(payload): Json<SetTimerRequest>,
) -> Result<(StatusCode, Json<RoomActionResponse>), ApiError> {
    let action = RoomAction::SetTimer {
        requested_by: payload.requested_by,
        duration_seconds: payload.duration_seconds,
    };
    respond(apply_action(&state, &room_id, action).await)
}

#[instrument(skip(state, payload))]
async fn reset_room(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Json(payload): Json<RoomCommandRequest>,
) -> Result<(StatusCode, Json<RoomActionResponse>), ApiError> {
    let action = RoomAction::Reset { requested_by: payload.requested_by };
    respond(apply_action(&state, &room_id, action).await)
}

#[instrument(skip(state, payload))]
async fn join_room(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Json(payload): Json<MembershipRequest>,
) -> Result<(StatusCode, Json<RoomActionResponse>), ApiError> {
    let action = RoomAction::Join { participant: payload.participant };
    respond(apply_action(&state, &room_id, action).await)
}

#[instrument(skip(state, payload))]
async fn leave_room(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Json(payload): Json<MembershipRequest>,
) -> Result<(StatusCode, Json<RoomActionResponse>), ApiError> {
    let action = RoomAction::Leave { participant: payload.participant };
    respond(apply_action(&state, &room_id, action).await)
}

#[instrument(skip(state, payload))]
async fn close_room(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Json(payload): Json<RoomCommandRequest>,
) -> Result<(StatusCode, Json<RoomActionResponse>), ApiError> {
    let action = RoomAction::Close { requested_by: payload.requested_by };
    respond(apply_action(&state, &room_id, action).await)
}

#[instrument(skip(state, payload))]
async fn room_action(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Json(payload): Json<RoomAction>,
) -> Result<(StatusCode, Json<RoomActionResponse>), ApiError> {
    respond(apply_action(&state, &room_id, payload).await)
}

/// Runs one mutation and publishes its result to room subscribers.
async fn apply_action(
    state: &AppState,
    room_id: &str,
    action: RoomAction,
) -> Result<RoomActionResponse, RegistryError> {
    let registry = &state.registry;
    let outcome = match action {
        RoomAction::Start { requested_by } => {
            RoomOutcome::Room(registry.start(room_id, &requested_by).await?)
        }
        RoomAction::Stop { requested_by } => {
            RoomOutcome::Room(registry.stop(room_id, &requested_by).await?)
        }
        RoomAction::SetTimer { requested_by, duration_seconds } => RoomOutcome::Room(
            registry.set_timer(room_id, &requested_by, duration_seconds).await?,
        ),
        RoomAction::Reset { requested_by } => {
            RoomOutcome::Room(registry.reset(room_id, &requested_by).await?)
        }
        RoomAction::Join { participant } => {
            RoomOutcome::Room(registry.add_member(room_id, &participant).await?)
        }
        RoomAction::Leave { participant } => registry.remove_member(room_id, &participant).await?,
        RoomAction::Close { requested_by } => {
            registry.close(room_id, &requested_by).await?;
            state.push.notify(room_id, &RoomOutcome::deleted()).await;
            return Ok(RoomActionResponse::Ack(AckResponse { ok: true }));
        }
    };
    state.push.notify(room_id, &outcome).await;
    Ok(outcome.into())
}

fn respond(
    result: Result<RoomActionResponse, RegistryError>,
) -> Result<(StatusCode, Json<RoomActionResponse>), ApiError> {
    result
        .map(|resp| (StatusCode::OK, Json(resp)))
        .map_err(registry_err)
}

fn registry_err(err: RegistryError) -> ApiError {
    let status = match err {
        RegistryError::NotFound => StatusCode::NOT_FOUND,
        RegistryError::DuplicateName => StatusCode::CONFLICT,
        RegistryError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
        RegistryError::Forbidden => StatusCode::FORBIDDEN,
        RegistryError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorResponse {
            message: err.to_string(),
        }),
    )
}

// Root handler for "/"
async fn root() -> impl IntoResponse {
    (StatusCode::OK, "Server OK!")
}

// WebSocket endpoint: subscribe to changes of one room
async fn ws_upgrade(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    if state.registry.get(&room_id).await.is_err() {
        return StatusCode::NOT_FOUND.into_response();
    }

    ws.on_upgrade(move |socket| handle_ws(socket, state, room_id))
}

/// Subscribes to `room_id` and pairs the receiver with the current state,
/// so subscribers need no separate fetch. A room that is already gone
/// yields the deletion message and no receiver.
async fn open_subscription(
    state: &AppState,
    room_id: &str,
) -> (RoomOutcome, Option<broadcast::Receiver<String>>) {
    let rx = state.push.subscribe(room_id).await;
    match state.registry.get(room_id).await {
        Ok(room) => (RoomOutcome::Room(room), Some(rx)),
        Err(_) => {
            // closed after the upgrade check; drop the channel just created
            drop(rx);
            let deleted = RoomOutcome::deleted();
            state.push.notify(room_id, &deleted).await;
            (deleted, None)
        }
    }
}

async fn handle_ws(mut socket: WebSocket, state: AppState, room_id: String) {
    let (initial, rx) = open_subscription(&state, &room_id).await;
    if let Ok(text) = serde_json::to_string(&initial) {
        if socket.send(Message::Text(text)).await.is_err() {
            return;
        }
    }
    let Some(mut rx) = rx else {
        return;
    };

    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Ok(msg) => {
                    if socket.send(Message::Text(msg)).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    debug!(room_id = %room_id, skipped, "websocket subscriber lagged");
                }
                Err(RecvError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }
    debug!(room_id = %room_id, "websocket subscriber disconnected");
}
