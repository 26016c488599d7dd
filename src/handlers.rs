use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::middleware;
use axum::routing::{get, post};
use axum::{Json, Router};
use log::{error, info, warn};
use serde::de::DeserializeOwned;
use serde_json::value::RawValue;
use tower_http::cors::CorsLayer;

use crate::attachments;
use crate::config::Config;
use crate::error::AppError;
use crate::middleware::{log_request, require_api_key};
use crate::signal_cli::SignalCli;
use crate::types::{AboutResponse, RegisterRequest, SendRequest, SendRequestV2};

/// Poll timeout passed to `receive -t`, in seconds.
const RECEIVE_TIMEOUT_SECS: &str = "1";

pub struct AppState {
    pub cli: SignalCli,
    pub attachment_tmp_dir: PathBuf,
    pub api_key: Option<String>,
}

impl AppState {
    pub fn from_config(config: &Config) -> Self {
        Self {
            cli: SignalCli::new(&config.signal_cli_bin, &config.signal_cli_config),
            attachment_tmp_dir: config.attachment_tmp_dir.clone(),
            api_key: config.api_key.clone(),
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/about", get(about))
        .route("/v1/health", get(health))
        .route("/v1/register/", post(missing_number))
        .route("/v1/register/:number", post(register))
        .route("/v1/register/:number/verify/", post(missing_token))
        .route("/v1/register/:number/verify/:token", post(verify))
        .route("/v1/send", post(send_v1))
        .route("/v2/send", post(send_v2))
        .route("/v1/receive/", get(missing_number))
        .route("/v1/receive/:number", get(receive))
        .layer(middleware::from_fn_with_state(state.clone(), require_api_key))
        .layer(middleware::from_fn(log_request))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn require_number(number: &str) -> Result<(), AppError> {
    if number.trim().is_empty() {
        return Err(AppError::bad_request("Please provide a number"));
    }
    Ok(())
}

fn parse_body<T: DeserializeOwned>(body: &Bytes, message: &str) -> Result<T, AppError> {
    serde_json::from_slice(body).map_err(|err| {
        error!("Invalid request body: {}", err);
        AppError::bad_request(message)
    })
}

pub async fn about() -> Json<AboutResponse> {
    Json(AboutResponse {
        versions: vec!["v1".to_string(), "v2".to_string()],
    })
}

pub async fn health() -> StatusCode {
    StatusCode::NO_CONTENT
}

pub async fn missing_number() -> AppError {
    AppError::bad_request("Please provide a number")
}

pub async fn missing_token() -> AppError {
    AppError::bad_request("Please provide a verification code")
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    Path(number): Path<String>,
    body: Bytes,
) -> Result<StatusCode, AppError> {
    // No body, or `null`, means an SMS registration.
    let req: RegisterRequest = if body.iter().all(u8::is_ascii_whitespace) {
        RegisterRequest::default()
    } else {
        parse_body::<Option<RegisterRequest>>(&body, "Couldn't process request - invalid request.")?
            .unwrap_or_default()
    };
    require_number(&number)?;

    let mut args = vec!["register".to_string()];
    if req.use_voice {
        args.push("--voice".to_string());
    }

    state.cli.invoke(&number, &args).await?;
    info!("Registration requested for {}", number);
    Ok(StatusCode::CREATED)
}

pub async fn verify(
    State(state): State<Arc<AppState>>,
    Path((number, token)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    require_number(&number)?;
    if token.trim().is_empty() {
        return Err(AppError::bad_request("Please provide a verification code"));
    }

    state
        .cli
        .invoke(&number, &["verify".to_string(), token])
        .await?;
    info!("Verified {}", number);
    Ok(StatusCode::CREATED)
}

pub async fn send_v1(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<StatusCode, AppError> {
    let req: SendRequest = parse_body(&body, "Couldn't process request - invalid request")?;

    let attachments: Vec<String> = req
        .base64_attachment
        .filter(|a| !a.is_empty())
        .into_iter()
        .collect();

    send(&state, &req.number, req.message, req.recipients, &attachments).await
}

pub async fn send_v2(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<StatusCode, AppError> {
    let req: SendRequestV2 = parse_body(&body, "Couldn't process request - invalid request")?;

    send(
        &state,
        &req.number,
        req.message,
        req.recipients,
        &req.base64_attachments,
    )
    .await
}

async fn send(
    state: &AppState,
    number: &str,
    message: String,
    recipients: Vec<String>,
    base64_attachments: &[String],
) -> Result<StatusCode, AppError> {
    require_number(number)?;

    let staged = attachments::stage(&state.attachment_tmp_dir, base64_attachments).await?;

    let mut args = vec!["send".to_string(), "-m".to_string(), message];
    args.extend(recipients);
    if !staged.is_empty() {
        args.push("-a".to_string());
        args.extend(
            staged
                .paths()
                .iter()
                .map(|p| p.to_string_lossy().into_owned()),
        );
    }

    let result = state.cli.invoke(number, &args).await;
    // Staged files only have to outlive the call.
    drop(staged);
    result?;

    Ok(StatusCode::CREATED)
}

pub async fn receive(
    State(state): State<Arc<AppState>>,
    Path(number): Path<String>,
) -> Result<Json<Vec<Box<RawValue>>>, AppError> {
    require_number(&number)?;

    let args: Vec<String> = ["receive", "-t", RECEIVE_TIMEOUT_SECS, "--json"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let out = state.cli.invoke(&number, &args).await?;

    Ok(Json(parse_messages(&out)?))
}

/// One JSON document per non-blank line, kept byte for byte.
fn parse_messages(out: &str) -> Result<Vec<Box<RawValue>>, AppError> {
    out.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            RawValue::from_string(line.to_string()).map_err(|err| {
                warn!("signal-cli printed a non-JSON line: {}", err);
                AppError::bad_request("invalid JSON in signal-cli output")
            })
        })
        .collect()
}
