//! Error kinds shared by the Document Store Client, Binary Cache and
//! Filesystem Driver, collapsed to a POSIX errno at the `fuser` boundary.
//!
//! Kernel callbacks don't have a rich error channel (spec.md §7), so every
//! `fs/*.rs` handler ends by converting `Result<_, FsError>` into the reply
//! object via [`FsError::errno`] instead of hand-rolling `reply.error(...)`.

#[derive(Debug, thiserror::Error)]
pub enum FsError {
    #[error("not found")]
    NotFound,
    #[error("already exists")]
    AlreadyExists,
    #[error("invalid argument: {0}")]
    Invalid(String),
    #[error("revision conflict")]
    Conflict,
    #[error("io error: {0}")]
    Io(String),
    #[error("remote store unavailable: {0}")]
    RemoteUnavailable(String),
}

impl FsError {
    /// Negative POSIX error number to hand back to `fuser`'s `reply.error`.
    ///
    /// All kinds besides `NotFound`/`AlreadyExists`/`Invalid` collapse to
    /// `ENOENT`, per spec.md §7 ("all other unexpected errors ... surfaced
    /// as NotFound from the VFS boundary").
    pub fn errno(&self) -> libc::c_int {
        match self {
            FsError::NotFound => libc::ENOENT,
            FsError::AlreadyExists => libc::EEXIST,
            FsError::Invalid(_) => libc::EINVAL,
            FsError::Conflict | FsError::Io(_) | FsError::RemoteUnavailable(_) => libc::ENOENT,
        }
    }
}

impl From<reqwest::Error> for FsError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            FsError::RemoteUnavailable(err.to_string())
        } else if err.status() == Some(reqwest::StatusCode::CONFLICT) {
            FsError::Conflict
        } else if err.status() == Some(reqwest::StatusCode::NOT_FOUND) {
            FsError::NotFound
        } else {
            FsError::Io(err.to_string())
        }
    }
}

impl From<std::io::Error> for FsError {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            FsError::NotFound
        } else {
            FsError::Io(err.to_string())
        }
    }
}

impl From<serde_json::Error> for FsError {
    fn from(err: serde_json::Error) -> Self {
        FsError::Io(err.to_string())
    }
}

/// Logs then converts any error into the errno `fuser` replies want.
///
/// Every `fs/*.rs` callback routes its failure path through this so the
/// "logged and surfaced as NotFound" rule in spec.md §7 is enforced in one
/// place rather than at each call site.
pub fn reply_errno(context: &str, err: &FsError) -> libc::c_int {
    tracing::error!(%context, error = %err, "{context} failed");
    err.errno()
}

pub type FsResult<T> = Result<T, FsError>;
