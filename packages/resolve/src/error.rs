use pyhost_vfs::PathError;

/// Errors raised while resolving a source path.
#[derive(thiserror::Error, Debug)]
pub enum ResolveError {
    #[error("invalid module path: {0}")]
    Path(#[from] PathError),

    /// A local directory walk did not find a directory segment or the leaf.
    #[error("not found: {path} (no entry named '{segment}')")]
    NotFound { path: String, segment: String },

    #[error("not a directory: {path}")]
    NotADirectory { path: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("cache error: {message}")]
    Cache { message: String },

    /// The response body was already taken by an earlier failed read.
    #[error("response body for {url} was already consumed")]
    BodyConsumed { url: String },

    /// The directory prompt ended without the user choosing a directory.
    #[error("directory prompt closed before a directory was chosen")]
    PromptClosed,
}

impl ResolveError {
    /// True for a resolution miss, local or remote.
    pub fn is_not_found(&self) -> bool {
        match self {
            ResolveError::NotFound { .. } => true,
            ResolveError::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

/// Result type alias for resolution operations.
pub type Result<T> = std::result::Result<T, ResolveError>;
