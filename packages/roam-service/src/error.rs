pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Not found: {message}")]
	NotFound { message: String },
	#[error("Provider error: {message}")]
	Provider { message: String },
	#[error("Storage error: {message}")]
	Storage { message: String },
}
impl From<roam_storage::Error> for Error {
	fn from(err: roam_storage::Error) -> Self {
		match err {
			roam_storage::Error::InvalidArgument(message) => Self::InvalidRequest { message },
			roam_storage::Error::NotFound(message) => Self::NotFound { message },
			other => Self::Storage { message: other.to_string() },
		}
	}
}

impl From<roam_providers::Error> for Error {
	fn from(err: roam_providers::Error) -> Self {
		Self::Provider { message: err.to_string() }
	}
}
