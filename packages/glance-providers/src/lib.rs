pub mod embedding;
pub mod generation;
pub mod ocr;

pub use generation::Completion;
pub use ocr::{OcrExtraction, OcrWord};

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName};
use serde_json::{Map, Value};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Provider request timed out.")]
	Timeout,
	#[error("Provider returned status {status}.")]
	Status { status: u16 },
	#[error("Provider transport error: {message}")]
	Transport { message: String },
	#[error("Provider response is malformed: {message}")]
	Payload { message: String },
	#[error("Invalid provider header: {message}")]
	Header { message: String },
}

impl Error {
	/// Whether a retry could plausibly succeed. Malformed payloads and bad
	/// header configuration are permanent; everything transport-shaped is not.
	pub fn is_transient(&self) -> bool {
		match self {
			Self::Timeout | Self::Transport { .. } => true,
			Self::Status { status } => *status == 408 || *status == 429 || *status >= 500,
			Self::Payload { .. } | Self::Header { .. } => false,
		}
	}

	pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
		if err.is_timeout() {
			return Self::Timeout;
		}
		if let Some(status) = err.status() {
			return Self::Status { status: status.as_u16() };
		}

		Self::Transport { message: err.to_string() }
	}
}

pub fn auth_headers(
	api_key: Option<&str>,
	default_headers: &Map<String, Value>,
) -> Result<HeaderMap> {
	let mut headers = HeaderMap::new();

	if let Some(api_key) = api_key {
		headers.insert(
			AUTHORIZATION,
			format!("Bearer {api_key}")
				.parse()
				.map_err(|_| Error::Header { message: "API key is not header-safe.".to_string() })?,
		);
	}
	for (key, value) in default_headers {
		let Some(raw) = value.as_str() else {
			return Err(Error::Header {
				message: format!("Default header {key} must be a string."),
			});
		};
		let name = HeaderName::from_bytes(key.as_bytes())
			.map_err(|err| Error::Header { message: err.to_string() })?;

		headers.insert(
			name,
			raw.parse().map_err(|_| Error::Header {
				message: format!("Default header {key} has a non-ASCII value."),
			})?,
		);
	}

	Ok(headers)
}

pub(crate) fn check_status(res: reqwest::Response) -> Result<reqwest::Response> {
	let status = res.status();

	if status.is_success() { Ok(res) } else { Err(Error::Status { status: status.as_u16() }) }
}
