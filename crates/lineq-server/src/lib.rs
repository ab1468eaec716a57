pub mod config;

use std::collections::{BTreeMap, HashMap};
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use http::{Method, StatusCode};
use lineq_core::{
    GraphSample, LineEquation, Point, ProbeReading, SamplePoint, intersect, probe, sample,
};
use lineq_parse::parse_equation;
use lineq_tutor::learning::catalog;
use lineq_tutor::{
    Answer, ChallengeDifficulty, ChallengeKind, CollaboratorError, Collaborators, Difficulty,
    FallbackProvider, FinishedLoad, GameRound, GeminiClient, GraphView, InvestigationRoom,
    LearningExample, LoadState, MathProblem, PendingLoad, QuizQuestion, QuizResult, RoomConfig,
    RoundStatus, ScanReading, Stage, SubmitOutcome, Submission, Transcript, TutorContext,
    ask_or_apologize,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::config::LineqConfig;

const WS_DEBOUNCE_WINDOW: Duration = Duration::from_millis(50);
/// Largest `|focus.x|` the graph endpoints will sample; the window grows with it.
const MAX_FOCUS_X: f64 = 1000.0;
/// Used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "lineq=info";

/// Collaborators used by the binaries: Gemini when configured, static content otherwise.
pub type LiveCollaborators = FallbackProvider<GeminiClient>;

/// Installs the global `tracing` subscriber. Later calls are no-ops.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

pub fn collaborators(config: &LineqConfig) -> Result<LiveCollaborators, CollaboratorError> {
    match config.gemini_config() {
        Some(gemini) => {
            info!(model = %gemini.model, "using Gemini for generated content");
            Ok(FallbackProvider::new(GeminiClient::new(gemini)?))
        }
        None => {
            info!("no Gemini API key configured, serving static content");
            Ok(FallbackProvider::offline())
        }
    }
}

/// Serves the app until the listener fails.
pub async fn serve<C: Collaborators>(
    listener: TcpListener,
    state: AppState<C>,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "lineq server listening");
    }
    axum::serve(listener, app(state)).await
}

/// Shared handler state: the collaborators, every open investigation room and
/// every running game round.
pub struct AppState<C> {
    collaborators: Arc<C>,
    rooms: Arc<Mutex<HashMap<u64, InvestigationRoom<C>>>>,
    next_id: Arc<AtomicU64>,
    game_rounds: Arc<Mutex<HashMap<u64, GameRound>>>,
    next_round_id: Arc<AtomicU64>,
    room_config: RoomConfig,
}

impl<C> Clone for AppState<C> {
    fn clone(&self) -> Self {
        Self {
            collaborators: Arc::clone(&self.collaborators),
            rooms: Arc::clone(&self.rooms),
            next_id: Arc::clone(&self.next_id),
            game_rounds: Arc::clone(&self.game_rounds),
            next_round_id: Arc::clone(&self.next_round_id),
            room_config: self.room_config,
        }
    }
}

impl<C: Collaborators> AppState<C> {
    pub fn new(collaborators: C, room_config: RoomConfig) -> Self {
        Self {
            collaborators: Arc::new(collaborators),
            rooms: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(1)),
            game_rounds: Arc::new(Mutex::new(HashMap::new())),
            next_round_id: Arc::new(AtomicU64::new(1)),
            room_config,
        }
    }

    // Neither guard may be held across an await.
    fn rooms(&self) -> Result<MutexGuard<'_, HashMap<u64, InvestigationRoom<C>>>, ApiError> {
        self.rooms
            .lock()
            .map_err(|_| ApiError::internal("investigation registry is unavailable"))
    }

    fn game_rounds(&self) -> Result<MutexGuard<'_, HashMap<u64, GameRound>>, ApiError> {
        self.game_rounds
            .lock()
            .map_err(|_| ApiError::internal("game registry is unavailable"))
    }

    /// Waits for a load on its own task, so the room still becomes ready or
    /// failed when the client that started it hangs up.
    async fn finish_load(
        &self,
        id: u64,
        pending: PendingLoad,
    ) -> Result<InvestigationView, ApiError> {
        let state = self.clone();
        let completion = tokio::spawn(async move {
            let finished = pending.finish().await;
            state.complete_load(id, finished)
        });
        completion
            .await
            .map_err(|err| ApiError::internal(format!("load task failed: {err}")))?
    }

    fn complete_load(
        &self,
        id: u64,
        finished: FinishedLoad,
    ) -> Result<InvestigationView, ApiError> {
        let mut rooms = self.rooms()?;
        let room = rooms
            .get_mut(&id)
            .ok_or_else(|| ApiError::unknown_investigation(id))?;
        if !room.complete_load(finished) {
            debug!(id, "load superseded before it finished");
        }
        Ok(InvestigationView::of(id, room))
    }
}

pub fn app<C: Collaborators>(state: AppState<C>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/equations/parse", post(parse))
        .route("/graph/sample", post(graph_sample))
        .route("/graph/probe", post(graph_probe))
        .route("/investigations", post(create_investigation::<C>))
        .route(
            "/investigations/{id}",
            get(get_investigation::<C>).delete(close_investigation::<C>),
        )
        .route("/investigations/{id}/submit", post(submit::<C>))
        .route("/investigations/{id}/restart", post(restart::<C>))
        .route("/tutor/ask", post(ask_tutor::<C>))
        .route("/learning/examples", get(learning_examples))
        .route("/learning/examples/{id}", get(learning_example))
        .route("/learning/examples/{id}/scan", post(scan_learning_example))
        .route("/problems", post(generate_problem::<C>))
        .route("/game/rounds", post(start_round::<C>))
        .route(
            "/game/rounds/{id}",
            get(get_round::<C>).delete(close_round::<C>),
        )
        .route("/game/rounds/{id}/answer", post(answer_round::<C>))
        .route("/quiz", get(quiz::<C>))
        .route("/quiz/evaluate", post(evaluate_quiz::<C>))
        .route("/ws", get(websocket))
        .layer(cors_layer())
        .with_state(state)
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any)
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct LineSpec {
    slope: f64,
    intercept: f64,
}

fn line_pair(line1: LineSpec, line2: LineSpec) -> (LineEquation, LineEquation) {
    (
        LineEquation::primary(line1.slope, line1.intercept),
        LineEquation::secondary(line2.slope, line2.intercept),
    )
}

/// The crossing point when there is one, else the origin.
fn default_focus(a: &LineEquation, b: &LineEquation) -> Point {
    intersect(a, b).unwrap_or(Point::new(0.0, 0.0))
}

fn plottable(focus: Point) -> Result<Point, String> {
    if focus.x.abs() > MAX_FOCUS_X {
        return Err(format!("focus x = {} lies outside ±{MAX_FOCUS_X}", focus.x));
    }
    Ok(focus)
}

#[derive(Debug, Deserialize)]
struct ParseRequest {
    text: String,
}

#[derive(Debug, Deserialize)]
struct SampleRequest {
    line1: LineSpec,
    line2: LineSpec,
    focus: Option<Point>,
}

#[derive(Debug, Deserialize)]
struct ProbeRequest {
    line1: LineSpec,
    line2: LineSpec,
    x: f64,
}

/// At most one of `session_id`, `problem` and `example_id` names what the
/// student is looking at; with none the tutor answers in general terms.
#[derive(Debug, Deserialize)]
struct AskRequest {
    session_id: Option<u64>,
    problem: Option<MathProblem>,
    example_id: Option<u32>,
    #[serde(default)]
    history: Transcript,
    text: String,
}

#[derive(Debug, Default, Deserialize)]
struct ProblemRequest {
    difficulty: Option<Difficulty>,
}

#[derive(Debug, Deserialize)]
struct ScanRequest {
    x: f64,
}

#[derive(Debug, Deserialize)]
struct RoundAnswerRequest {
    answer: Answer,
}

#[derive(Debug, Deserialize)]
struct EvaluateQuizRequest {
    questions: Vec<QuizQuestion>,
    answers: BTreeMap<u32, String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WsClientMessage {
    SetLines { line1: LineSpec, line2: LineSpec },
    Probe { x: f64 },
}

#[derive(Debug, Serialize, Deserialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Debug, Serialize, Deserialize)]
struct ParseResponse {
    slope: f64,
    intercept: f64,
    canonical: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct SampleResponse {
    points: Vec<SamplePoint>,
    half_width: f64,
    y_range: [f64; 2],
}

impl From<GraphSample> for SampleResponse {
    fn from(graph: GraphSample) -> Self {
        Self {
            half_width: graph.half_width(),
            y_range: graph.y_range(),
            points: graph.points().to_vec(),
        }
    }
}

#[derive(Debug, Serialize)]
struct AskResponse {
    reply: String,
}

#[derive(Debug, Serialize)]
struct LearningView {
    #[serde(flatten)]
    example: LearningExample,
    intersection: Point,
    scan_range: [f64; 2],
    equation: String,
}

impl From<LearningExample> for LearningView {
    fn from(example: LearningExample) -> Self {
        Self {
            intersection: example.intersection(),
            scan_range: example.scan_range(),
            equation: example.equated_sides(),
            example,
        }
    }
}

/// A challenge as shown while it can still be answered.
#[derive(Debug, Serialize)]
struct ChallengeView {
    kind: ChallengeKind,
    question: String,
    line1: Option<LineEquation>,
    line2: Option<LineEquation>,
    options: Option<Vec<String>>,
    difficulty: ChallengeDifficulty,
}

#[derive(Debug, Serialize)]
struct RoundResult {
    correct_answer: Answer,
    explanation: String,
}

#[derive(Debug, Serialize)]
struct RoundView {
    id: u64,
    status: RoundStatus,
    remaining_secs: u64,
    challenge: ChallengeView,
    /// The answer and explanation, once the round is over.
    result: Option<RoundResult>,
}

impl RoundView {
    fn of(id: u64, round: &GameRound) -> Self {
        let challenge = round.challenge();
        let over = round.status() != RoundStatus::Playing;
        Self {
            id,
            status: round.status(),
            remaining_secs: round.remaining_secs(),
            challenge: ChallengeView {
                kind: challenge.kind,
                question: challenge.question.clone(),
                line1: challenge.line1.clone(),
                line2: challenge.line2.clone(),
                options: challenge.options.clone(),
                difficulty: challenge.difficulty,
            },
            result: over.then(|| RoundResult {
                correct_answer: challenge.correct_answer.clone(),
                explanation: challenge.explanation.clone(),
            }),
        }
    }
}

/// What a client may see of a problem. Equations stay hidden until the
/// student has written the first one, and the crossing point until found.
#[derive(Debug, Serialize)]
struct ProblemView {
    prompt: Option<String>,
    points_line1: [Point; 2],
    line1_display: Option<String>,
    line2_display: Option<String>,
    intersection: Option<Point>,
}

#[derive(Debug, Serialize)]
struct InvestigationView {
    id: u64,
    load: LoadState,
    stage: Option<Stage>,
    message: String,
    complete: bool,
    problem: Option<ProblemView>,
    /// Sent from the first step on: the slope is read off the plotted lines,
    /// so only the equation text and the crossing marker are withheld.
    graph: Option<GraphView>,
}

impl InvestigationView {
    fn of<C: Collaborators>(id: u64, room: &InvestigationRoom<C>) -> Self {
        let Some(workflow) = room.workflow() else {
            return Self {
                id,
                load: room.state().clone(),
                stage: None,
                message: String::new(),
                complete: false,
                problem: None,
                graph: None,
            };
        };

        let problem = workflow.problem();
        let stage = workflow.current_stage();
        let graph = workflow.graph_view();
        let prompt = match stage {
            Stage::Active(step) => Some(problem.questions.prompt(step).to_string()),
            Stage::Complete => None,
        };
        let revealed = graph.equations_revealed;

        Self {
            id,
            load: room.state().clone(),
            stage: Some(stage),
            message: workflow.status_message().to_string(),
            complete: workflow.is_complete(),
            problem: Some(ProblemView {
                prompt,
                points_line1: problem.points_line1,
                line1_display: revealed.then(|| problem.line1_display.clone()),
                line2_display: revealed.then(|| problem.line2_display.clone()),
                intersection: graph.show_intersection.then_some(problem.intersection),
            }),
            graph: Some(graph),
        }
    }
}

#[derive(Debug, Serialize)]
struct SubmitResponse {
    outcome: SubmitOutcome,
    session: InvestigationView,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WsServerMessage {
    Graph {
        points: Vec<SamplePoint>,
        half_width: f64,
        y_range: [f64; 2],
        intersection: Option<Point>,
    },
    Probe(ProbeReading),
    Error {
        message: String,
    },
}

#[derive(Debug)]
struct WsSessionState {
    line1: LineEquation,
    line2: LineEquation,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn conflict(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::CONFLICT,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }

    fn unknown_investigation(id: u64) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: format!("investigation {id} not found"),
        }
    }

    fn unknown_example(id: u32) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: format!("learning example {id} not found"),
        }
    }

    fn unknown_round(id: u64) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: format!("game round {id} not found"),
        }
    }
}

impl From<CollaboratorError> for ApiError {
    fn from(err: CollaboratorError) -> Self {
        Self {
            status: StatusCode::BAD_GATEWAY,
            message: format!("content service failed: {err}"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

async fn parse(body: Bytes) -> Result<Json<ParseResponse>, ApiError> {
    let request: ParseRequest = parse_json(&body)?;
    let form =
        parse_equation(&request.text).map_err(|err| ApiError::bad_request(err.to_string()))?;
    Ok(Json(ParseResponse {
        slope: form.slope,
        intercept: form.intercept,
        canonical: form.to_string(),
    }))
}

async fn graph_sample(body: Bytes) -> Result<Json<SampleResponse>, ApiError> {
    let request: SampleRequest = parse_json(&body)?;
    let (a, b) = line_pair(request.line1, request.line2);
    let focus = request.focus.unwrap_or_else(|| default_focus(&a, &b));
    let focus = plottable(focus).map_err(ApiError::bad_request)?;
    Ok(Json(sample(&a, &b, focus).into()))
}

async fn graph_probe(body: Bytes) -> Result<Json<ProbeReading>, ApiError> {
    let request: ProbeRequest = parse_json(&body)?;
    let (a, b) = line_pair(request.line1, request.line2);
    Ok(Json(probe(&a, &b, request.x)))
}

async fn create_investigation<C: Collaborators>(
    State(state): State<AppState<C>>,
) -> Result<(StatusCode, Json<InvestigationView>), ApiError> {
    let id = state.next_id.fetch_add(1, Ordering::Relaxed);
    let pending = {
        let mut rooms = state.rooms()?;
        let room = rooms.entry(id).or_insert_with(|| {
            InvestigationRoom::new(Arc::clone(&state.collaborators), state.room_config)
        });
        room.begin_load()
    };
    info!(id, "investigation opened");

    let view = state.finish_load(id, pending).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

async fn get_investigation<C: Collaborators>(
    State(state): State<AppState<C>>,
    Path(id): Path<u64>,
) -> Result<Json<InvestigationView>, ApiError> {
    let rooms = state.rooms()?;
    let room = rooms
        .get(&id)
        .ok_or_else(|| ApiError::unknown_investigation(id))?;
    Ok(Json(InvestigationView::of(id, room)))
}

async fn close_investigation<C: Collaborators>(
    State(state): State<AppState<C>>,
    Path(id): Path<u64>,
) -> Result<StatusCode, ApiError> {
    let removed = state.rooms()?.remove(&id);
    match removed {
        Some(_) => {
            info!(id, "investigation closed");
            Ok(StatusCode::NO_CONTENT)
        }
        None => Err(ApiError::unknown_investigation(id)),
    }
}

async fn submit<C: Collaborators>(
    State(state): State<AppState<C>>,
    Path(id): Path<u64>,
    body: Bytes,
) -> Result<Json<SubmitResponse>, ApiError> {
    let submission: Submission = parse_json(&body)?;
    let mut rooms = state.rooms()?;
    let room = rooms
        .get_mut(&id)
        .ok_or_else(|| ApiError::unknown_investigation(id))?;
    let outcome = room
        .submit(submission)
        .ok_or_else(|| ApiError::conflict("investigation is not loaded"))?;
    Ok(Json(SubmitResponse {
        outcome,
        session: InvestigationView::of(id, room),
    }))
}

async fn restart<C: Collaborators>(
    State(state): State<AppState<C>>,
    Path(id): Path<u64>,
) -> Result<Json<InvestigationView>, ApiError> {
    let pending = {
        let mut rooms = state.rooms()?;
        let room = rooms
            .get_mut(&id)
            .ok_or_else(|| ApiError::unknown_investigation(id))?;
        room.begin_load()
    };
    debug!(id, "investigation restarted");

    Ok(Json(state.finish_load(id, pending).await?))
}

async fn ask_tutor<C: Collaborators>(
    State(state): State<AppState<C>>,
    body: Bytes,
) -> Result<Json<AskResponse>, ApiError> {
    let request: AskRequest = parse_json(&body)?;
    if request.text.trim().is_empty() {
        return Err(ApiError::bad_request("text is required"));
    }

    let context = match (request.session_id, request.problem, request.example_id) {
        (Some(id), None, None) => {
            let rooms = state.rooms()?;
            rooms
                .get(&id)
                .map(|room| room.tutor_context())
                .ok_or_else(|| ApiError::unknown_investigation(id))?
        }
        (None, Some(problem), None) => TutorContext::Practice(problem),
        (None, None, Some(id)) => {
            let example = LearningExample::find(id).ok_or_else(|| ApiError::unknown_example(id))?;
            TutorContext::Learning(example)
        }
        (None, None, None) => TutorContext::General,
        _ => {
            return Err(ApiError::bad_request(
                "at most one of session_id, problem and example_id may be set",
            ));
        }
    };

    let reply = ask_or_apologize(
        state.collaborators.as_ref(),
        request.history,
        context,
        request.text,
    )
    .await;
    Ok(Json(AskResponse { reply }))
}

async fn generate_problem<C: Collaborators>(
    State(state): State<AppState<C>>,
    body: Bytes,
) -> Result<Json<MathProblem>, ApiError> {
    let request: ProblemRequest = if body.is_empty() {
        ProblemRequest::default()
    } else {
        parse_json(&body)?
    };
    let difficulty = request.difficulty.unwrap_or(Difficulty::Medium);
    Ok(Json(state.collaborators.generate_problem(difficulty).await?))
}

async fn learning_examples() -> Json<Vec<LearningView>> {
    Json(catalog().into_iter().map(LearningView::from).collect())
}

async fn learning_example(Path(id): Path<u32>) -> Result<Json<LearningView>, ApiError> {
    let example = LearningExample::find(id).ok_or_else(|| ApiError::unknown_example(id))?;
    Ok(Json(example.into()))
}

async fn scan_learning_example(
    Path(id): Path<u32>,
    body: Bytes,
) -> Result<Json<ScanReading>, ApiError> {
    let request: ScanRequest = parse_json(&body)?;
    let example = LearningExample::find(id).ok_or_else(|| ApiError::unknown_example(id))?;
    Ok(Json(example.scan(request.x)))
}

async fn start_round<C: Collaborators>(
    State(state): State<AppState<C>>,
) -> Result<(StatusCode, Json<RoundView>), ApiError> {
    let challenge = state.collaborators.generate_game_challenge().await?;
    let id = state.next_round_id.fetch_add(1, Ordering::Relaxed);
    let round = GameRound::start(challenge);
    let view = RoundView::of(id, &round);
    state.game_rounds()?.insert(id, round);
    info!(id, "game round started");
    Ok((StatusCode::CREATED, Json(view)))
}

async fn get_round<C: Collaborators>(
    State(state): State<AppState<C>>,
    Path(id): Path<u64>,
) -> Result<Json<RoundView>, ApiError> {
    let mut rounds = state.game_rounds()?;
    let round = rounds.get_mut(&id).ok_or_else(|| ApiError::unknown_round(id))?;
    round.catch_up();
    Ok(Json(RoundView::of(id, round)))
}

async fn answer_round<C: Collaborators>(
    State(state): State<AppState<C>>,
    Path(id): Path<u64>,
    body: Bytes,
) -> Result<Json<RoundView>, ApiError> {
    let request: RoundAnswerRequest = parse_json(&body)?;
    let mut rounds = state.game_rounds()?;
    let round = rounds.get_mut(&id).ok_or_else(|| ApiError::unknown_round(id))?;
    match round.catch_up() {
        RoundStatus::Playing => {}
        RoundStatus::TimedOut => return Err(ApiError::conflict("round timed out")),
        RoundStatus::Correct | RoundStatus::Wrong => {
            return Err(ApiError::conflict("round already answered"));
        }
    }
    let status = round.answer(&request.answer);
    debug!(id, ?status, "game round answered");
    Ok(Json(RoundView::of(id, round)))
}

/// Dropping the round stops its clock.
async fn close_round<C: Collaborators>(
    State(state): State<AppState<C>>,
    Path(id): Path<u64>,
) -> Result<StatusCode, ApiError> {
    let removed = state.game_rounds()?.remove(&id);
    match removed {
        Some(_) => {
            debug!(id, "game round closed");
            Ok(StatusCode::NO_CONTENT)
        }
        None => Err(ApiError::unknown_round(id)),
    }
}

async fn quiz<C: Collaborators>(
    State(state): State<AppState<C>>,
) -> Result<Json<Vec<QuizQuestion>>, ApiError> {
    Ok(Json(state.collaborators.generate_quiz().await?))
}

async fn evaluate_quiz<C: Collaborators>(
    State(state): State<AppState<C>>,
    body: Bytes,
) -> Result<Json<QuizResult>, ApiError> {
    let request: EvaluateQuizRequest = parse_json(&body)?;
    let result = state
        .collaborators
        .evaluate_quiz(request.questions, request.answers)
        .await?;
    Ok(Json(result))
}

async fn websocket(ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(handle_websocket)
}

async fn handle_websocket(mut socket: WebSocket) {
    let mut state: Option<WsSessionState> = None;
    let mut pending_x: Option<f64> = None;
    let mut debounce_timer: Option<Pin<Box<tokio::time::Sleep>>> = None;

    loop {
        tokio::select! {
            _ = debounce_elapsed(&mut debounce_timer), if debounce_timer.is_some() => {
                if flush_probe(&mut socket, &state, &mut pending_x).await.is_err() {
                    break;
                }
                debounce_timer = None;
            }
            message = socket.recv() => {
                let Some(message) = message else {
                    break;
                };

                match message {
                    Ok(Message::Text(text)) => {
                        if handle_ws_text_message(
                            &mut socket,
                            text.as_str(),
                            &mut state,
                            &mut pending_x,
                            &mut debounce_timer,
                        )
                        .await
                        .is_err()
                        {
                            break;
                        }
                    }
                    Ok(Message::Binary(_)) => {
                        if send_ws_error(&mut socket, "binary messages are not supported")
                            .await
                            .is_err()
                        {
                            break;
                        }
                    }
                    Ok(Message::Ping(payload)) => {
                        if socket.send(Message::Pong(payload)).await.is_err() {
                            break;
                        }
                    }
                    Ok(Message::Pong(_)) => {}
                    Ok(Message::Close(_)) => break,
                    Err(_) => break,
                }
            }
        }
    }
}

async fn debounce_elapsed(timer: &mut Option<Pin<Box<tokio::time::Sleep>>>) {
    if let Some(timer) = timer.as_mut() {
        timer.await;
    }
}

async fn handle_ws_text_message(
    socket: &mut WebSocket,
    raw_message: &str,
    state: &mut Option<WsSessionState>,
    pending_x: &mut Option<f64>,
    debounce_timer: &mut Option<Pin<Box<tokio::time::Sleep>>>,
) -> Result<(), ()> {
    let message: WsClientMessage = match serde_json::from_str(raw_message) {
        Ok(message) => message,
        Err(err) => {
            send_ws_error(socket, format!("invalid message: {err}")).await?;
            return Ok(());
        }
    };

    match message {
        WsClientMessage::SetLines { line1, line2 } => {
            *pending_x = None;
            *debounce_timer = None;
            let (line1, line2) = line_pair(line1, line2);
            let intersection = intersect(&line1, &line2).ok();
            let focus = match plottable(intersection.unwrap_or(Point::new(0.0, 0.0))) {
                Ok(focus) => focus,
                Err(message) => return send_ws_error(socket, message).await,
            };
            let graph = sample(&line1, &line2, focus);
            *state = Some(WsSessionState { line1, line2 });
            send_ws_message(
                socket,
                WsServerMessage::Graph {
                    half_width: graph.half_width(),
                    y_range: graph.y_range(),
                    points: graph.points().to_vec(),
                    intersection,
                },
            )
            .await
        }
        WsClientMessage::Probe { x } => {
            // Only the latest position inside the window is answered.
            *pending_x = Some(x);
            *debounce_timer = Some(Box::pin(tokio::time::sleep(WS_DEBOUNCE_WINDOW)));
            Ok(())
        }
    }
}

async fn flush_probe(
    socket: &mut WebSocket,
    state: &Option<WsSessionState>,
    pending_x: &mut Option<f64>,
) -> Result<(), ()> {
    let Some(x) = pending_x.take() else {
        return Ok(());
    };

    let Some(state) = state.as_ref() else {
        return send_ws_error(socket, "set_lines must be called before probe").await;
    };

    send_ws_message(
        socket,
        WsServerMessage::Probe(probe(&state.line1, &state.line2, x)),
    )
    .await
}

async fn send_ws_error(socket: &mut WebSocket, message: impl Into<String>) -> Result<(), ()> {
    send_ws_message(
        socket,
        WsServerMessage::Error {
            message: message.into(),
        },
    )
    .await
}

async fn send_ws_message(socket: &mut WebSocket, message: WsServerMessage) -> Result<(), ()> {
    let payload = serde_json::to_string(&message).map_err(|_| ())?;
    socket
        .send(Message::Text(payload.into()))
        .await
        .map_err(|_| ())
}

fn parse_json<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    if body.is_empty() {
        return Err(ApiError::bad_request("request body is required"));
    }

    serde_json::from_slice(body)
        .map_err(|err| ApiError::bad_request(format!("invalid JSON body: {err}")))
}
