#[derive(thiserror::Error, Debug)]
pub enum IngestError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected status {status} from {url}")]
    Protocol {
        status: http::StatusCode,
        url: String,
    },
    #[error("invalid repository reference: {0:?}")]
    InvalidRepoRef(String),
    #[error(transparent)]
    Http(#[from] shared::http::HttpError),
}
