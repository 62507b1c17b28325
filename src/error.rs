//! Error types for forum-kanban
//!
//! Exit codes:
//! - 0: Success
//! - 2: User error (bad args, wrong channel, unknown project, uninitialized task)
//! - 3: Blocked by policy (caller lacks the role, transition not allowed from this state)
//! - 4: Operation failed (platform call, disk, parse)
//!
//! Every error also renders as the single short reply a caller sees in chat,
//! see [`Error::reply`].

use std::path::PathBuf;
use thiserror::Error;

/// Exit codes for the forum-kanban CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const USER_ERROR: i32 = 2;
    pub const POLICY_BLOCKED: i32 = 3;
    pub const OPERATION_FAILED: i32 = 4;
}

/// Main error type for forum-kanban operations
#[derive(Error, Debug)]
pub enum Error {
    // User errors (exit code 2)
    #[error("guild required")]
    GuildRequired,

    #[error("this command must be used inside a forum post thread ({0})")]
    NotAThread(String),

    #[error("thread {0} has no parent forum")]
    ThreadHasNoForumParent(String),

    #[error("thread is not under any known project forum ({0}); create one with `forum create`")]
    NotAProjectForum(String),

    #[error("multiple projects match forum {forum} (data conflict): {}", .slugs.join(", "))]
    DataConflict { forum: String, slugs: Vec<String> },

    #[error("task not initialized in thread {0}; run task-init in this thread")]
    NotInitialized(String),

    #[error("{0} is required")]
    MissingArgument(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("project not found: {0}")]
    NotFound(String),

    // Policy blocks (exit code 3)
    #[error("task status is {status}, {command} needs {expected}")]
    BadState {
        command: String,
        status: String,
        expected: String,
    },

    #[error("{0}")]
    NotAllowed(String),

    // Operation failures (exit code 4)
    #[error("forum {0} has no tags configured")]
    NoTagsConfigured(String),

    #[error("forum {forum} is missing status tags: {}", .missing.join(", "))]
    MissingStatusTags { forum: String, missing: Vec<String> },

    #[error("failed to apply tag: {0}")]
    TagApplyFailed(String),

    #[error("failed to update status panel: {0}")]
    PanelWriteFailed(String),

    #[error("platform updated, but failed to save project: {0}")]
    StoreWriteFailed(String),

    #[error("failed to load projects: {0}")]
    ReadError(String),

    #[error("too many projects with slug base: {0}")]
    SlugExhausted(String),

    #[error("slug {0} was taken by another project while provisioning; retry")]
    SlugTaken(String),

    #[error("platform error{}: {message}", .status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
    Platform {
        status: Option<u16>,
        message: String,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Lock acquisition failed: {0}")]
    LockFailed(PathBuf),
}

impl Error {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            // User errors
            Error::GuildRequired
            | Error::NotAThread(_)
            | Error::ThreadHasNoForumParent(_)
            | Error::NotAProjectForum(_)
            | Error::DataConflict { .. }
            | Error::NotInitialized(_)
            | Error::MissingArgument(_)
            | Error::InvalidConfig(_)
            | Error::InvalidArgument(_)
            | Error::NotFound(_) => exit_codes::USER_ERROR,

            // Policy blocks
            Error::BadState { .. } | Error::NotAllowed(_) => exit_codes::POLICY_BLOCKED,

            // Operation failures
            Error::NoTagsConfigured(_)
            | Error::MissingStatusTags { .. }
            | Error::TagApplyFailed(_)
            | Error::PanelWriteFailed(_)
            | Error::StoreWriteFailed(_)
            | Error::ReadError(_)
            | Error::SlugExhausted(_)
            | Error::SlugTaken(_)
            | Error::Platform { .. }
            | Error::Http(_)
            | Error::Io(_)
            | Error::Json(_)
            | Error::TomlParse(_)
            | Error::LockFailed(_) => exit_codes::OPERATION_FAILED,
        }
    }

    /// True when the caller was refused rather than something breaking.
    pub fn is_refusal(&self) -> bool {
        self.exit_code() == exit_codes::POLICY_BLOCKED
    }

    /// The single ephemeral reply shown to the caller.
    pub fn reply(&self) -> String {
        if self.is_refusal() {
            format!("not allowed: {self}")
        } else {
            format!("error: {self}")
        }
    }

    /// Short machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::GuildRequired => "guild_required",
            Error::NotAThread(_) => "not_a_thread",
            Error::ThreadHasNoForumParent(_) => "thread_has_no_forum_parent",
            Error::NotAProjectForum(_) => "not_a_project_forum",
            Error::DataConflict { .. } => "data_conflict",
            Error::NotInitialized(_) => "not_initialized",
            Error::MissingArgument(_) => "missing_argument",
            Error::InvalidConfig(_) => "invalid_config",
            Error::InvalidArgument(_) => "invalid_argument",
            Error::NotFound(_) => "not_found",
            Error::BadState { .. } => "bad_state",
            Error::NotAllowed(_) => "not_allowed",
            Error::NoTagsConfigured(_) => "no_tags_configured",
            Error::MissingStatusTags { .. } => "missing_status_tags",
            Error::TagApplyFailed(_) => "tag_apply_failed",
            Error::PanelWriteFailed(_) => "panel_write_failed",
            Error::StoreWriteFailed(_) => "store_write_failed",
            Error::ReadError(_) => "read_error",
            Error::SlugExhausted(_) => "slug_exhausted",
            Error::SlugTaken(_) => "slug_taken",
            Error::Platform { .. } | Error::Http(_) => "platform",
            Error::Io(_) => "io",
            Error::Json(_) => "json",
            Error::TomlParse(_) => "toml",
            Error::LockFailed(_) => "lock_failed",
        }
    }

    /// Structured details for JSON error output, when the variant carries any.
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Error::DataConflict { forum, slugs } => Some(serde_json::json!({
                "forum": forum,
                "slugs": slugs,
            })),
            Error::BadState {
                command,
                status,
                expected,
            } => Some(serde_json::json!({
                "command": command,
                "status": status,
                "expected": expected,
            })),
            Error::MissingStatusTags { forum, missing } => Some(serde_json::json!({
                "forum": forum,
                "missing": missing,
            })),
            Error::Platform {
                status: Some(status),
                ..
            } => Some(serde_json::json!({ "http_status": status })),
            _ => None,
        }
    }
}

/// Result type alias for forum-kanban operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_by_category() {
        assert_eq!(Error::GuildRequired.exit_code(), exit_codes::USER_ERROR);
        assert_eq!(
            Error::NotInitialized("T".into()).exit_code(),
            exit_codes::USER_ERROR
        );
        assert_eq!(
            Error::NotAllowed("no".into()).exit_code(),
            exit_codes::POLICY_BLOCKED
        );
        assert_eq!(
            Error::StoreWriteFailed("disk".into()).exit_code(),
            exit_codes::OPERATION_FAILED
        );
        assert_ne!(exit_codes::SUCCESS, exit_codes::USER_ERROR);
    }

    #[test]
    fn replies_distinguish_refusals() {
        let refused = Error::BadState {
            command: "task-take".into(),
            status: "InProgress".into(),
            expected: "ToDo".into(),
        };
        assert!(refused.is_refusal());
        assert_eq!(
            refused.reply(),
            "not allowed: task status is InProgress, task-take needs ToDo"
        );

        let failed = Error::TagApplyFailed("HTTP 403".into());
        assert!(!failed.is_refusal());
        assert_eq!(failed.reply(), "error: failed to apply tag: HTTP 403");
    }

    #[test]
    fn details_for_structured_variants() {
        let err = Error::DataConflict {
            forum: "F".into(),
            slugs: vec!["a".into(), "b".into()],
        };
        assert_eq!(err.to_string(), "multiple projects match forum F (data conflict): a, b");
        assert_eq!(err.kind(), "data_conflict");
        assert_eq!(err.details().unwrap()["slugs"][1], "b");

        let err = Error::Platform {
            status: Some(404),
            message: "Unknown Channel".into(),
        };
        assert_eq!(err.to_string(), "platform error (HTTP 404): Unknown Channel");
        assert_eq!(err.details().unwrap()["http_status"], 404);
        assert!(Error::GuildRequired.details().is_none());
    }
}
