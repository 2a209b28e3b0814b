use pakstore_core::PakStoreError;
use serde::Serialize;
use serde_json::{json, Value};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum CommandStatus {
    Ok,
    UserError,
    Failure,
    Cancelled,
}

impl CommandStatus {
    pub fn exit_code(self) -> i32 {
        match self {
            CommandStatus::Ok => 0,
            CommandStatus::UserError => 1,
            CommandStatus::Failure => 2,
            CommandStatus::Cancelled => 3,
        }
    }
}

/// One line of human output, styled when printed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    Heading(String),
    Item(String),
    Note(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecutionOutcome {
    pub status: CommandStatus,
    pub message: String,
    pub details: Value,
    /// Human-readable body printed under the status line.
    #[serde(skip)]
    pub lines: Vec<Line>,
}

impl ExecutionOutcome {
    pub fn success(message: impl Into<String>, details: Value) -> Self {
        Self::new(CommandStatus::Ok, message, details)
    }

    pub fn failure(message: impl Into<String>, details: Value) -> Self {
        Self::new(CommandStatus::Failure, message, details)
    }

    pub fn user_error(message: impl Into<String>, details: Value) -> Self {
        Self::new(CommandStatus::UserError, message, details)
    }

    pub fn cancelled(message: impl Into<String>, details: Value) -> Self {
        Self::new(CommandStatus::Cancelled, message, details)
    }

    fn new(status: CommandStatus, message: impl Into<String>, details: Value) -> Self {
        Self {
            status,
            message: message.into(),
            details,
            lines: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_lines(mut self, lines: Vec<Line>) -> Self {
        self.lines = lines;
        self
    }
}

impl From<PakStoreError> for ExecutionOutcome {
    fn from(err: PakStoreError) -> Self {
        let details = json!({ "error": error_kind(&err) });
        if err.is_user_error() {
            ExecutionOutcome::user_error(err.to_string(), details)
        } else {
            ExecutionOutcome::failure(err.to_string(), details)
        }
    }
}

pub fn error_kind(err: &PakStoreError) -> &'static str {
    match err {
        PakStoreError::Network { .. } => "network",
        PakStoreError::Parse { .. } => "parse",
        PakStoreError::Store { .. } => "store",
        PakStoreError::Extraction { .. } | PakStoreError::PathTraversal { .. } => "extraction",
        PakStoreError::Config { .. } => "config",
        PakStoreError::Io { .. } => "io",
        PakStoreError::NotFound(_) => "not_found",
        PakStoreError::NotUninstallable(_) => "not_uninstallable",
    }
}
