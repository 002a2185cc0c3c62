use thiserror::Error;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Usage: booth-harvest <stateCd>")]
    Usage,
    #[error("Invalid state code: {0:?}")]
    InvalidStateCode(String),
    #[error("State code {0} not found among active states")]
    StateNotFound(String),

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("HTTP status {status} from {url}")]
    HttpStatus { status: u16, url: String },
    #[error("Couldn't decode {context}: {source}")]
    Decode {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Config error: {0}")]
    Config(String),
    #[error("Invalid header {name}: {reason}")]
    InvalidHeader { name: String, reason: String },

    #[error("Io Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Couldn't serialize records: {0}")]
    Serialize(#[source] serde_json::Error),
}

impl Error {
    pub(crate) fn decode(context: impl Into<String>, source: serde_json::Error) -> Self {
        Error::Decode {
            context: context.into(),
            source,
        }
    }
}
