//! HTTP route definitions

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::error;

use crate::app::AppState;
use crate::game::{
    GameError, Player, PlayerId, PlayerStatus, PlayerSummary, Position, RegistrationError, Role,
    VisibleCell,
};
use crate::http::middleware::throttle;
use crate::util::time::{secs_f64_millis, uptime_secs};

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    // CORS configuration - "*" or comma-separated origins in CLIENT_ORIGIN
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);
    let cors = if state.config.client_origin.trim() == "*" {
        cors.allow_origin(Any)
    } else {
        let allowed_origins: Vec<HeaderValue> = state
            .config
            .client_origin
            .split(',')
            .filter_map(|s| s.trim().parse::<HeaderValue>().ok())
            .collect();
        cors.allow_origin(allowed_origins)
    };

    // Public routes
    let public_routes = Router::new()
        .route("/", get(home_handler))
        .route("/health", get(health_handler));

    // Game API, throttled
    let game_routes = Router::new()
        .route("/api/v1/inscription", post(register_handler))
        .route("/api/v1/deplacement/:player_id", post(move_handler))
        .route("/api/v1/vision/:player_id", get(vision_handler))
        .route("/api/v1/joueurs/:player_id", get(player_handler))
        .route("/api/v1/elimination/:player_id", post(eliminate_handler))
        .route("/api/v1/tour", get(turn_handler))
        .layer(middleware::from_fn_with_state(state.clone(), throttle));

    Router::new()
        .merge(public_routes)
        .merge(game_routes)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn home_handler() -> &'static str {
    "Bienvenue sur le serveur Loup Garou!"
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    current_turn: u64,
    players: usize,
    alive: usize,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let stats = state.game.stats();

    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        current_turn: stats.current_turn,
        players: stats.players,
        alive: stats.alive,
    })
}

// ============================================================================
// Registration
// ============================================================================

#[derive(Deserialize)]
struct RegisterRequest {
    login: Option<String>,
    role: Option<String>,
}

#[derive(Serialize)]
struct RegisterResponse {
    player_id: PlayerId,
    login: String,
    role: Role,
    x: i32,
    y: i32,
}

async fn register_handler(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Json<RegisterResponse>, AppError> {
    let Json(req) = payload?;
    // Null and missing fields fail the same checks as empty ones
    let player = state.game.register(
        req.login.as_deref().unwrap_or_default(),
        req.role.as_deref().unwrap_or_default(),
    )?;

    Ok(Json(RegisterResponse {
        player_id: player.id,
        login: player.login,
        role: player.role,
        x: player.position.x,
        y: player.position.y,
    }))
}

// ============================================================================
// Movement
// ============================================================================

#[derive(Deserialize)]
struct MoveRequest {
    x: Option<i32>,
    y: Option<i32>,
    /// Turn the move was planned for; the current turn when absent
    turn: Option<u64>,
}

#[derive(Serialize)]
struct MoveResponse {
    success: bool,
    x: i32,
    y: i32,
    position: Position,
}

async fn move_handler(
    State(state): State<AppState>,
    Path(player_id): Path<String>,
    payload: Result<Json<MoveRequest>, JsonRejection>,
) -> Result<Json<MoveResponse>, AppError> {
    let id = parse_player_id(&player_id)?;
    let Json(req) = payload?;
    let (Some(x), Some(y)) = (req.x, req.y) else {
        return Err(AppError::BadRequest {
            code: "MissingCoordinates",
            message: "Both x and y are required".to_string(),
        });
    };

    let position = state.game.move_player(id, Position::new(x, y), req.turn)?;

    Ok(Json(MoveResponse {
        success: true,
        x: position.x,
        y: position.y,
        position,
    }))
}

// ============================================================================
// Vision
// ============================================================================

/// The requester's own record; the only place a role is disclosed
#[derive(Serialize)]
struct OwnPlayerView {
    player_id: PlayerId,
    login: String,
    role: Role,
    x: i32,
    y: i32,
    status: PlayerStatus,
    registered_at: DateTime<Utc>,
}

impl From<Player> for OwnPlayerView {
    fn from(player: Player) -> Self {
        Self {
            player_id: player.id,
            login: player.login,
            role: player.role,
            x: player.position.x,
            y: player.position.y,
            status: player.status,
            registered_at: player.registered_at,
        }
    }
}

#[derive(Serialize)]
struct MapView {
    width: i32,
    height: i32,
    sight_radius: f64,
    cells: Vec<VisibleCell>,
}

#[derive(Serialize)]
struct VisionResponse {
    player: OwnPlayerView,
    map: MapView,
    nearby_players: Vec<PlayerSummary>,
    eliminated: bool,
    current_turn: u64,
    time_remaining: f64,
}

async fn vision_handler(
    State(state): State<AppState>,
    Path(player_id): Path<String>,
) -> Result<Json<VisionResponse>, AppError> {
    let id = parse_player_id(&player_id)?;
    let vision = state.game.vision(id)?;
    let eliminated = vision.eliminated();
    let viewer = vision.viewer;

    Ok(Json(VisionResponse {
        player: viewer.into(),
        map: MapView {
            width: vision.map_width,
            height: vision.map_height,
            sight_radius: vision.report.radius,
            cells: vision.report.cells,
        },
        nearby_players: vision.report.players,
        eliminated,
        current_turn: vision.current_turn,
        time_remaining: secs_f64_millis(vision.time_remaining),
    }))
}

// ============================================================================
// Player record, elimination, turn clock
// ============================================================================

async fn player_handler(
    State(state): State<AppState>,
    Path(player_id): Path<String>,
) -> Result<Json<OwnPlayerView>, AppError> {
    let player = state.game.player(parse_player_id(&player_id)?)?;

    Ok(Json(player.into()))
}

async fn eliminate_handler(
    State(state): State<AppState>,
    Path(player_id): Path<String>,
) -> Result<Json<PlayerSummary>, AppError> {
    let summary = state.game.mark_dead(parse_player_id(&player_id)?)?;
    Ok(Json(summary))
}

#[derive(Serialize)]
struct TurnResponse {
    current_turn: u64,
    turn_started_at: DateTime<Utc>,
    time_remaining: f64,
    turn_duration: f64,
}

async fn turn_handler(State(state): State<AppState>) -> Json<TurnResponse> {
    let clock = state.game.clock_status();

    Json(TurnResponse {
        current_turn: clock.current_turn,
        turn_started_at: clock.turn_started_at,
        time_remaining: secs_f64_millis(clock.time_remaining),
        turn_duration: secs_f64_millis(clock.turn_duration),
    })
}

/// Unparseable ids cannot name a player
fn parse_player_id(raw: &str) -> Result<PlayerId, AppError> {
    raw.parse().map_err(|_| AppError::NotFound)
}

// ============================================================================
// Error handling
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{message}")]
    BadRequest {
        code: &'static str,
        message: String,
    },

    #[error("Player not found")]
    NotFound,

    #[error("{message}")]
    Conflict {
        code: &'static str,
        message: String,
    },

    #[error("Too many requests")]
    TooManyRequests,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<GameError> for AppError {
    fn from(err: GameError) -> Self {
        let message = err.to_string();
        match err {
            GameError::Registration(RegistrationError::InvalidLogin) => AppError::BadRequest {
                code: "InvalidLogin",
                message,
            },
            GameError::Registration(RegistrationError::InvalidRole(_)) => AppError::BadRequest {
                code: "InvalidRole",
                message,
            },
            GameError::Registration(RegistrationError::DuplicateLogin(_)) => AppError::Conflict {
                code: "DuplicateLogin",
                message,
            },
            GameError::Registration(RegistrationError::NoSpawnCell) => AppError::Internal(message),
            GameError::NotFound => AppError::NotFound,
            GameError::Rejected(rejection) => AppError::BadRequest {
                code: rejection.code(),
                message,
            },
            GameError::Internal(msg) => AppError::Internal(msg),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest {
            code: "InvalidBody",
            message: rejection.body_text(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, code) = match &self {
            AppError::BadRequest { code, .. } => (StatusCode::BAD_REQUEST, *code),
            AppError::NotFound => (StatusCode::NOT_FOUND, "NotFound"),
            AppError::Conflict { code, .. } => (StatusCode::CONFLICT, *code),
            AppError::TooManyRequests => (StatusCode::TOO_MANY_REQUESTS, "TooManyRequests"),
            AppError::Internal(msg) => {
                error!(error = %msg, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal")
            }
        };

        let body = serde_json::json!({
            "error": code,
            "message": self.to_string(),
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::config::Config;
    use crate::game::{GameMap, GameState, World};

    fn app_with(vars: &[(&str, &str)], map: &str) -> (Router, AppState) {
        let vars: Vec<(String, String)> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let config = Config::from_lookup(|name| {
            vars.iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.clone())
        })
        .unwrap();
        let world = World::new(GameMap::parse(map).unwrap(), config.rules.clone()).unwrap();
        let state = AppState::new(config, GameState::new(world));
        (build_router(state.clone()), state)
    }

    fn app() -> (Router, AppState) {
        app_with(&[], &"..........\n".repeat(10))
    }

    async fn call(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(match body {
                Some(json) => Body::from(json.to_string()),
                None => Body::empty(),
            })
            .unwrap();
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    async fn register(router: &Router, login: &str, role: &str) -> String {
        let (status, body) = call(
            router,
            "POST",
            "/api/v1/inscription",
            Some(json!({ "login": login, "role": role })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["player_id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn register_move_and_stale_turn() {
        let (router, state) = app();

        let (status, body) = call(
            &router,
            "POST",
            "/api/v1/inscription",
            Some(json!({ "login": "A42", "role": "loup" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["role"], "loup");
        assert_eq!((body["x"].as_i64(), body["y"].as_i64()), (Some(0), Some(0)));
        let id = body["player_id"].as_str().unwrap().to_string();

        let uri = format!("/api/v1/deplacement/{id}");
        let (status, body) = call(&router, "POST", &uri, Some(json!({ "x": 2, "y": 0, "turn": 0 }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["position"], json!({ "x": 2, "y": 0 }));

        let (status, body) = call(&router, "POST", &uri, Some(json!({ "x": 9, "y": 9, "turn": 0 }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "TooFar");

        state.game.advance_turn();
        let (status, body) = call(&router, "POST", &uri, Some(json!({ "x": 3, "y": 0, "turn": 0 }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "StaleTurn");
    }

    #[tokio::test]
    async fn registration_errors() {
        let (router, _) = app();
        register(&router, "alice", "villageois").await;

        for (body, status, code) in [
            (json!({ "login": "al", "role": "loup" }), StatusCode::BAD_REQUEST, "InvalidLogin"),
            (json!({ "role": "loup" }), StatusCode::BAD_REQUEST, "InvalidLogin"),
            (json!({ "login": null, "role": "loup" }), StatusCode::BAD_REQUEST, "InvalidLogin"),
            (json!({ "login": "bob" }), StatusCode::BAD_REQUEST, "InvalidRole"),
            (json!({ "login": "bob", "role": null }), StatusCode::BAD_REQUEST, "InvalidRole"),
            (json!({ "login": "bob", "role": 7 }), StatusCode::BAD_REQUEST, "InvalidBody"),
            (json!({ "login": "bob", "role": "maire" }), StatusCode::BAD_REQUEST, "InvalidRole"),
            (json!({ "login": "alice", "role": "loup" }), StatusCode::CONFLICT, "DuplicateLogin"),
        ] {
            let (got, json) = call(&router, "POST", "/api/v1/inscription", Some(body)).await;
            assert_eq!(got, status);
            assert_eq!(json["error"], code);
        }
    }

    #[tokio::test]
    async fn move_errors() {
        let (router, _) = app_with(&[], "..#\n...\n");
        let id = register(&router, "alice", "villageois").await;
        let uri = format!("/api/v1/deplacement/{id}");

        let (status, body) = call(&router, "POST", &uri, Some(json!({ "x": 1 }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "MissingCoordinates");

        let (_, body) = call(&router, "POST", &uri, Some(json!({ "x": 2, "y": 0 }))).await;
        assert_eq!(body["error"], "Blocked");

        let (_, body) = call(&router, "POST", &uri, Some(json!({ "x": 0, "y": 5 }))).await;
        assert_eq!(body["error"], "OutOfBounds");

        let (status, body) = call(&router, "POST", "/api/v1/deplacement/nobody", Some(json!({ "x": 0, "y": 0 }))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "NotFound");

        let (status, _) = call(&router, "POST", &format!("/api/v1/elimination/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        let (_, body) = call(&router, "POST", &uri, Some(json!({ "x": 1, "y": 0 }))).await;
        assert_eq!(body["error"], "DeadPlayer");
    }

    #[tokio::test]
    async fn malformed_bodies_get_json_errors() {
        let (router, _) = app();
        let id = register(&router, "alice", "villageois").await;
        let uri = format!("/api/v1/deplacement/{id}");

        for body in [json!({ "x": 1.5, "y": 0 }), json!({ "x": "1", "y": 0 }), json!("north")] {
            let (status, json) = call(&router, "POST", &uri, Some(body)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(json["error"], "InvalidBody");
            assert!(json["message"].is_string());
        }

        // Empty body and missing content type
        let (status, json) = call(&router, "POST", &uri, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "InvalidBody");

        for uri in [uri.as_str(), "/api/v1/inscription"] {
            let request = Request::builder()
                .method("POST")
                .uri(uri)
                .body(Body::from("{}"))
                .unwrap();
            let response = router.clone().oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            let json: Value = serde_json::from_slice(&bytes).unwrap();
            assert_eq!(json["error"], "InvalidBody");
        }

        let (_, body) = call(&router, "GET", &format!("/api/v1/joueurs/{id}"), None).await;
        assert_eq!(body["x"], 0);
        assert_eq!(body["y"], 0);
    }

    #[tokio::test]
    async fn vision_reports_neighbours_without_roles() {
        let (router, _) = app();
        let wolf = register(&router, "wolf", "loup").await;
        let villager = register(&router, "villager", "villageois").await;

        let (status, body) = call(&router, "GET", &format!("/api/v1/vision/{wolf}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["player"]["role"], "loup");
        assert_eq!(body["eliminated"], false);
        assert_eq!(body["current_turn"], 0);
        assert!(body["time_remaining"].as_f64().unwrap() <= 30.0);
        assert!(!body["map"]["cells"].as_array().unwrap().is_empty());

        let nearby = body["nearby_players"].as_array().unwrap();
        assert_eq!(nearby.len(), 1);
        assert_eq!(nearby[0]["id"], villager.as_str());
        assert!(nearby[0].get("role").is_none());

        call(&router, "POST", &format!("/api/v1/elimination/{wolf}"), None).await;
        let (_, body) = call(&router, "GET", &format!("/api/v1/vision/{wolf}"), None).await;
        assert_eq!(body["eliminated"], true);

        let (status, _) = call(&router, "GET", "/api/v1/vision/00000000-0000-0000-0000-000000000000", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn player_record_turn_and_health() {
        let (router, state) = app();
        let id = register(&router, "alice", "villageois").await;

        let (status, body) = call(&router, "GET", &format!("/api/v1/joueurs/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["role"], "villageois");
        assert_eq!(body["status"], "vivant");
        assert!(body["registered_at"].is_string());

        state.game.advance_turn();
        let (_, body) = call(&router, "GET", "/api/v1/tour", None).await;
        assert_eq!(body["current_turn"], 1);
        assert_eq!(body["turn_duration"], 30.0);

        let (status, body) = call(&router, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["players"], 1);
        assert_eq!(body["alive"], 1);
    }

    #[tokio::test]
    async fn api_is_throttled() {
        let (router, _) = app_with(&[("REQUESTS_PER_SECOND", "1")], "...\n");
        let (first, _) = call(&router, "GET", "/api/v1/tour", None).await;
        let (second, body) = call(&router, "GET", "/api/v1/tour", None).await;
        assert_eq!(first, StatusCode::OK);
        assert_eq!(second, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["error"], "TooManyRequests");

        // Health is outside the game API
        let (status, _) = call(&router, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
    }
}
