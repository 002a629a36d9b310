use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("failed to parse upstream response: {0}")]
    Parse(String),

    #[error("API health check failed")]
    HealthCheckFailed,

    #[error("poller already started")]
    AlreadyStarted,

    #[error("cycle failed: {0}")]
    Cycle(#[source] Box<Error>),
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        // A body that reqwest could not decode is a shape problem, not a transport one.
        if err.is_decode() {
            Error::Parse(err.to_string())
        } else {
            Error::Upstream(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
