pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Index error: {message}")]
	Index { message: String },
	#[error("Index payload error: {message}")]
	Payload { message: String },
}
