use crate::error::{ApiError, ApiResult};
use crate::validate;
use crate::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use claw_office_engine::now_ms;
use claw_office_protocol::api::{
    BindRequest, BindResponse, Empty, GotoRequest, GotoResponse, ListResponse, LocationsResponse,
    MoveRequest, MoveResponse, RealtimeTokenResponse, SayRequest, SayResponse, StateRequest,
    StateResponse, Success, TaskStatusRequest, TaskStatusResponse, UnbindRequest,
};
use claw_office_protocol::{BotView, MapInfo, Tile};
use std::sync::Arc;
use tracing::info;

type AppRef = State<Arc<AppState>>;

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload.map(|Json(v)| v).map_err(ApiError::from)
}

fn ok<T>(body: T) -> ApiResult<Success<T>> {
    Ok(Json(Success::new(body)))
}

pub async fn list_bots(State(state): AppRef) -> ApiResult<Success<ListResponse>> {
    ok(ListResponse {
        bots: state.registry.list(),
    })
}

pub async fn get_bot(State(state): AppRef, Path(id): Path<String>) -> ApiResult<Success<BotView>> {
    let id = validate::bot_id(&id)?;
    ok(state.registry.get(id)?)
}

pub async fn get_task_status(
    State(state): AppRef,
    Path(id): Path<String>,
) -> ApiResult<Success<TaskStatusResponse>> {
    let id = validate::bot_id(&id)?;
    ok(TaskStatusResponse {
        task_status: state.registry.task_status(id)?,
    })
}

pub async fn bind(
    State(state): AppRef,
    payload: Result<Json<BindRequest>, JsonRejection>,
) -> ApiResult<Success<BindResponse>> {
    let req = body(payload)?;
    let id = validate::bot_id(&req.id)?;
    let controller = validate::controller(req.controller.as_deref(), id)?;
    let name = validate::name(req.name.as_deref())?;

    let outcome = state.registry.bind(id, name, controller)?;
    info!(bot_id = %id, controller, change = ?outcome.change, "bind");
    ok(BindResponse {
        bot: (&outcome.bot).into(),
    })
}

pub async fn unbind(
    State(state): AppRef,
    payload: Result<Json<UnbindRequest>, JsonRejection>,
) -> ApiResult<Success<Empty>> {
    let req = body(payload)?;
    let id = validate::bot_id(&req.id)?;
    state.registry.unbind(id)?;
    ok(Empty {})
}

pub async fn move_bot(
    State(state): AppRef,
    payload: Result<Json<MoveRequest>, JsonRejection>,
) -> ApiResult<Success<MoveResponse>> {
    let req = body(payload)?;
    let id = validate::bot_id(&req.id)?;
    let direction = validate::direction(&req.direction)?;
    state.registry.apply_move(id, direction)?;
    ok(MoveResponse { direction })
}

pub async fn goto(
    State(state): AppRef,
    payload: Result<Json<GotoRequest>, JsonRejection>,
) -> ApiResult<Success<GotoResponse>> {
    let req = body(payload)?;
    let id = validate::bot_id(&req.id)?;
    let destination = validate::destination(&req)?;
    let plan = state.registry.apply_goto(id, &destination)?;
    ok(GotoResponse {
        path: plan.path,
        target: plan.target,
    })
}

pub async fn set_state(
    State(state): AppRef,
    payload: Result<Json<StateRequest>, JsonRejection>,
) -> ApiResult<Success<StateResponse>> {
    let req = body(payload)?;
    let id = validate::bot_id(&req.id)?;
    let visual = validate::visual_state(&req.state)?;
    state.registry.set_visual_state(id, visual)?;
    ok(StateResponse { state: visual })
}

pub async fn say(
    State(state): AppRef,
    payload: Result<Json<SayRequest>, JsonRejection>,
) -> ApiResult<Success<SayResponse>> {
    let req = body(payload)?;
    let id = validate::bot_id(&req.id)?;
    let (message, duration_ms) = validate::say(&req)?;
    state.registry.set_speech(id, message, duration_ms)?;
    ok(SayResponse {
        message: message.to_string(),
    })
}

pub async fn set_task_status(
    State(state): AppRef,
    payload: Result<Json<TaskStatusRequest>, JsonRejection>,
) -> ApiResult<Success<TaskStatusResponse>> {
    let req = body(payload)?;
    let id = validate::bot_id(&req.id)?;
    let status = validate::task_status(&req.status)?;
    let description = validate::description(req.description.as_deref())?;
    let task_status = state.registry.set_task_status(id, status, description)?;
    ok(TaskStatusResponse { task_status })
}

pub async fn map_info(State(state): AppRef) -> ApiResult<Success<MapInfo>> {
    let info = state
        .registry
        .map()
        .info()
        .ok_or(claw_office_engine::RegistryError::MapUnavailable)?;
    ok(info)
}

pub async fn map_locations(State(state): AppRef) -> ApiResult<Success<LocationsResponse>> {
    ok(LocationsResponse {
        locations: state.registry.map().locations().entries().clone(),
    })
}

pub async fn random_point(State(state): AppRef) -> ApiResult<Success<Tile>> {
    ok(state.registry.random_point()?)
}

pub async fn realtime_token(State(state): AppRef) -> ApiResult<Success<RealtimeTokenResponse>> {
    let (token, expires_at) = state.tokens.issue(now_ms());
    ok(RealtimeTokenResponse { token, expires_at })
}
