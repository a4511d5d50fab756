use reqwest::Client;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Terminal outcome taxonomy for one request attempt.
///
/// Cancellation is its own variant rather than a sentinel failure message so
/// callers can tell an abandoned operation from a genuine failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Network unreachable, DNS failure, connection reset, and the like.
    #[error("{0}")]
    Transport(String),
    /// Non-2xx response with a known status.
    #[error("{status_text}")]
    Http { status: u16, status_text: String },
    /// Response body did not parse as the expected shape.
    #[error("invalid response body: {0}")]
    Decode(String),
    /// The operation's cancellation token fired before it settled.
    #[error("request cancelled")]
    Cancelled,
}

impl FetchError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, FetchError::Cancelled)
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type FetchResult<T> = Result<T, FetchError>;

/// Thin wrapper over `reqwest::Client` that never panics and never leaks a
/// raw transport error: every outcome is a [`FetchResult`].
#[derive(Debug, Clone, Default)]
pub struct TypedClient {
    http: Client,
}

impl TypedClient {
    pub fn new() -> Self {
        Self {
            http: Client::new(),
        }
    }

    pub fn with_client(http: Client) -> Self {
        Self { http }
    }

    /// GET `url` and parse the body as `T`.
    ///
    /// Observes `cancel` cooperatively: an already-cancelled token
    /// short-circuits before any request is issued, and both the send and
    /// the body read race against the token.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> FetchResult<T> {
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(FetchError::Cancelled),
            sent = self.http.get(url).send() => sent.map_err(transport_error)?,
        };

        let status = response.status();
        if !status.is_success() {
            debug!(%url, status = status.as_u16(), "fetch failed with http status");
            return Err(FetchError::Http {
                status: status.as_u16(),
                status_text: status
                    .canonical_reason()
                    .unwrap_or("HTTP error")
                    .to_string(),
            });
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(FetchError::Cancelled),
            body = response.json::<T>() => body.map_err(|err| {
                if err.is_decode() {
                    FetchError::Decode(err.to_string())
                } else {
                    transport_error(err)
                }
            }),
        }
    }
}

fn transport_error(err: reqwest::Error) -> FetchError {
    FetchError::Transport(err.to_string())
}
