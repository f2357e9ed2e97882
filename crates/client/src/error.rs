use dms_navigator::FetchError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid client configuration: {0}")]
    InvalidConfig(String),
}

impl From<ClientError> for FetchError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Http(err) => match err.status() {
                Some(status) => FetchError::Status {
                    status: status.as_u16(),
                    message: err.to_string(),
                },
                None if err.is_decode() => FetchError::Decode(err.to_string()),
                None => FetchError::Transport(err.to_string()),
            },
            ClientError::Json(err) => FetchError::Decode(err.to_string()),
            ClientError::InvalidConfig(msg) => FetchError::Transport(msg),
        }
    }
}
