use crate::models::WindowKind;
use crate::source::FetchError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(String),

    #[error("{window} refresh failed: {source}")]
    Refresh {
        window: WindowKind,
        #[source]
        source: FetchError,
    },

    #[error("refresh incomplete, failed windows: {0:?}")]
    Incomplete(Vec<WindowKind>),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Prometheus(#[from] prometheus::Error),

    #[error(transparent)]
    TomlDe(#[from] toml::de::Error),
}
