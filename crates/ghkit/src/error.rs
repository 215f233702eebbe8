//! Error types for gh and git operations.
//!
//! Failures of the external tools are categorized from their stderr so
//! callers can tell a missing repository from an auth problem or a flaky
//! network.

use std::path::PathBuf;
use thiserror::Error;

/// Categories of command failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Repository or ref does not exist
    NotFound,
    /// Not logged in or not allowed
    Auth,
    /// Connectivity problem or server-side hiccup (transient)
    Network,
    /// Target already exists
    Conflict,
    /// Anything else
    Other,
}

impl ErrorCategory {
    /// Whether another attempt could succeed. Unknown failures are
    /// retried; a missing repository, a permission problem or a name clash
    /// will not go away on its own.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network | Self::Other)
    }

    /// Actionable advice for the category.
    pub fn advice(&self) -> &'static str {
        match self {
            Self::NotFound => "Check the repository name and that it still exists",
            Self::Auth => "Run `gh auth login` and make sure the token has the delete_repo scope",
            Self::Network => "Check your internet connection and try again",
            Self::Conflict => "Pick a different target name",
            Self::Other => "Check the error details for more information",
        }
    }

    /// Classify gh/git stderr.
    pub fn from_stderr(stderr: &str) -> Self {
        let s = stderr.to_lowercase();

        if s.contains("could not resolve host")
            || s.contains("connection refused")
            || s.contains("connection reset")
            || s.contains("timed out")
            || s.contains("timeout")
            || s.contains("network is unreachable")
            || s.contains("tls handshake")
            || s.contains("http 502")
            || s.contains("http 503")
            || s.contains("http 504")
        {
            return Self::Network;
        }

        if s.contains("not found")
            || s.contains("could not resolve to a repository")
            || s.contains("http 404")
        {
            return Self::NotFound;
        }

        if s.contains("http 401")
            || s.contains("http 403")
            || s.contains("gh auth login")
            || s.contains("authentication")
            || s.contains("permission denied")
            || s.contains("must have admin rights")
        {
            return Self::Auth;
        }

        if s.contains("already exists") {
            return Self::Conflict;
        }

        Self::Other
    }
}

/// Errors from the gh/git adapters.
#[derive(Debug, Error)]
pub enum Error {
    /// The program could not be started at all
    #[error("failed to execute {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The program ran and exited non-zero
    #[error("{command} failed: {stderr}")]
    CommandFailed {
        command: String,
        stderr: String,
        category: ErrorCategory,
    },

    /// Restore target is already taken
    #[error("target repository already exists: {target} (try {suggested})")]
    TargetExists { target: String, suggested: String },

    /// Request rejected before any command ran
    #[error("{0}")]
    InvalidRequest(String),

    /// IO error with the path involved
    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Unexpected JSON from gh
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Manifest could not be read while indexing an archive root
    #[error(transparent)]
    Manifest(#[from] manifest::Error),
}

impl Error {
    /// Build a command failure from captured stderr.
    pub fn from_command_output(command: impl Into<String>, stderr: &str) -> Self {
        Self::CommandFailed {
            command: command.into(),
            stderr: stderr.trim().to_string(),
            category: ErrorCategory::from_stderr(stderr),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Get the error category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::CommandFailed { category, .. } => *category,
            Self::TargetExists { .. } => ErrorCategory::Conflict,
            _ => ErrorCategory::Other,
        }
    }

    /// Whether the failed command is worth running again.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::CommandFailed { category, .. } => category.is_retryable(),
            _ => false,
        }
    }

    /// Suggested alternative name for [`Error::TargetExists`].
    pub fn suggested_name(&self) -> Option<&str> {
        match self {
            Self::TargetExists { suggested, .. } => Some(suggested),
            _ => None,
        }
    }
}

/// Result type for gh/git operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories_from_stderr() {
        let cases = [
            ("GraphQL: Could not resolve to a Repository with the name 'a/b'.", ErrorCategory::NotFound),
            ("HTTP 404: Not Found (https://api.github.com/repos/a/b)", ErrorCategory::NotFound),
            ("ssh: Could not resolve hostname github.com", ErrorCategory::Other),
            ("fatal: unable to access: Could not resolve host: github.com", ErrorCategory::Network),
            ("HTTP 502: Bad Gateway", ErrorCategory::Network),
            ("HTTP 403: Must have admin rights to Repository.", ErrorCategory::Auth),
            ("To get started with GitHub CLI, please run:  gh auth login", ErrorCategory::Auth),
            ("GraphQL: Name already exists on this account", ErrorCategory::Conflict),
            ("something odd", ErrorCategory::Other),
        ];
        for (stderr, expected) in cases {
            assert_eq!(ErrorCategory::from_stderr(stderr), expected, "{stderr}");
        }
    }

    #[test]
    fn test_retryable_failures() {
        assert!(Error::from_command_output("gh", "HTTP 503").is_retryable());
        assert!(Error::from_command_output("gh", "something odd").is_retryable());
        assert!(!Error::from_command_output("gh", "HTTP 404").is_retryable());
        assert!(!Error::from_command_output("gh", "HTTP 403: Forbidden").is_retryable());
        assert!(!Error::InvalidRequest("x".into()).is_retryable());
        let spawn = Error::Spawn {
            command: "gh".into(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert!(!spawn.is_retryable());
    }

    #[test]
    fn test_target_exists_suggestion() {
        let err = Error::TargetExists {
            target: "alice/r1".into(),
            suggested: "r1-ghm".into(),
        };
        assert_eq!(err.suggested_name(), Some("r1-ghm"));
        assert_eq!(err.category(), ErrorCategory::Conflict);
        assert!(err.to_string().contains("alice/r1"));
    }

    #[test]
    fn test_command_failed_display_trims() {
        let err = Error::from_command_output("gh repo delete a/b", "  boom \n");
        assert_eq!(err.to_string(), "gh repo delete a/b failed: boom");
    }
}
