use crate::outcome::{ErrorKind, Stage};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid query: {message}")]
	InvalidQuery { message: String },
	#[error("Retriever {lane} is unavailable: {message}")]
	RetrieverUnavailable { lane: RetrieverLane, message: String },
	#[error("Generation failed after {attempts} attempts: {message}")]
	GenerationUnavailable { attempts: u32, message: String },
	#[error("Generation response is malformed: {message}")]
	GenerationFormat { message: String },
	#[error("Deadline exceeded during {stage} after {elapsed_ms} ms.")]
	DeadlineExceeded { stage: Stage, elapsed_ms: u64 },
	#[error("Unknown format target: {value}")]
	InvalidFormatTarget { value: String },
}

impl Error {
	pub fn kind(&self) -> ErrorKind {
		match self {
			Self::InvalidQuery { .. } => ErrorKind::InvalidQuery,
			Self::RetrieverUnavailable { .. } => ErrorKind::RetrieverUnavailable,
			Self::GenerationUnavailable { .. } => ErrorKind::GenerationUnavailable,
			Self::GenerationFormat { .. } => ErrorKind::GenerationFormat,
			Self::DeadlineExceeded { .. } => ErrorKind::DeadlineExceeded,
			Self::InvalidFormatTarget { .. } => ErrorKind::InvalidFormatTarget,
		}
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetrieverLane {
	Dense,
	Sparse,
}

impl RetrieverLane {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Dense => "dense",
			Self::Sparse => "sparse",
		}
	}
}

impl std::fmt::Display for RetrieverLane {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}
