use axum::{
	Json, Router,
	extract::State,
	http::StatusCode,
	response::{IntoResponse, Response},
	routing::{get, post},
};
use serde::Deserialize;

use glance_pipeline::{AnswerRequest, ErrorKind, OutcomeStatus, PipelineOutcome};

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/v1/ask", post(ask))
		.with_state(state)
}

async fn health() -> StatusCode {
	StatusCode::OK
}

#[derive(Debug, Deserialize)]
pub struct AskRequest {
	pub query: String,
	#[serde(default)]
	pub ocr_text: Option<String>,
	#[serde(default)]
	pub format: Option<String>,
}

async fn ask(State(state): State<AppState>, Json(payload): Json<AskRequest>) -> Response {
	let outcome = state
		.pipeline
		.answer(AnswerRequest {
			query: payload.query,
			ocr_text: payload.ocr_text,
			image: None,
			format: payload.format,
		})
		.await;

	(outcome_status_code(&outcome), Json(outcome)).into_response()
}

/// Failed outcomes map onto transport status codes by error kind so callers
/// can tell client errors from upstream trouble without parsing diagnostics.
fn outcome_status_code(outcome: &PipelineOutcome) -> StatusCode {
	if outcome.status != OutcomeStatus::Failed {
		return StatusCode::OK;
	}

	match outcome.error.as_ref().map(|error| error.kind) {
		Some(ErrorKind::InvalidQuery | ErrorKind::InvalidFormatTarget) => StatusCode::BAD_REQUEST,
		Some(ErrorKind::DeadlineExceeded) => StatusCode::GATEWAY_TIMEOUT,
		Some(
			ErrorKind::GenerationUnavailable
			| ErrorKind::GenerationFormat
			| ErrorKind::RetrieverUnavailable,
		) => StatusCode::BAD_GATEWAY,
		None => StatusCode::INTERNAL_SERVER_ERROR,
	}
}
