use crate::format::FormattedAnswer;

/// Pipeline states. `Aborted` is reachable from every other state on fatal
/// error or deadline expiry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
	Normalizing,
	Retrieving,
	Fusing,
	AssemblingContext,
	Generating,
	Formatting,
	Done,
	Aborted,
}

impl Stage {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Normalizing => "normalizing",
			Self::Retrieving => "retrieving",
			Self::Fusing => "fusing",
			Self::AssemblingContext => "assembling_context",
			Self::Generating => "generating",
			Self::Formatting => "formatting",
			Self::Done => "done",
			Self::Aborted => "aborted",
		}
	}
}

impl std::fmt::Display for Stage {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
	Ok,
	Degraded,
	Skipped,
	Failed,
}

/// One per-stage status record. An aborted request carries enough of these
/// to tell "no relevant content" apart from "system malfunction".
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct StageDiagnostic {
	pub stage: Stage,
	pub status: StageStatus,
	pub elapsed_ms: u64,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
	Succeeded,
	Partial,
	Failed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
	InvalidQuery,
	RetrieverUnavailable,
	GenerationUnavailable,
	GenerationFormat,
	DeadlineExceeded,
	InvalidFormatTarget,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct OutcomeError {
	pub stage: Stage,
	pub kind: ErrorKind,
	pub message: String,
}

/// The validated answer produced by the generation driver. Citation ids are
/// a subset of the context bundle's passage ids, in order of first mention.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct GenerationResult {
	pub answer_text: String,
	pub cited_passage_ids: Vec<String>,
	pub generation_latency_ms: u64,
	pub truncated: bool,
}

/// What the caller gets back, whatever happened. A failed generation is
/// reported as such; the pipeline never substitutes a placeholder answer.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct PipelineOutcome {
	pub request_id: uuid::Uuid,
	pub status: OutcomeStatus,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub result: Option<GenerationResult>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub answer: Option<FormattedAnswer>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<OutcomeError>,
	pub diagnostics: Vec<StageDiagnostic>,
	#[serde(with = "crate::time_serde")]
	pub created_at: time::OffsetDateTime,
}
