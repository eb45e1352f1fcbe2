//! Error types for the bridge deployment.
//!
//! Every error is `Clone`: a failed task is stored once in the resolution
//! cache and handed to each task that resolves it afterwards.

use thiserror::Error;

pub type Result<T, E = DeployError> = std::result::Result<T, E>;

#[derive(Debug, Clone, Error)]
pub enum DeployError {
    #[error("identity source supplied {available} accounts, at least {required} are needed")]
    InsufficientAccounts { required: usize, available: usize },

    #[error("account {address} is assigned to more than one role")]
    DuplicateAccount { address: String },

    #[error("invalid secret key at position {index}: {message}")]
    InvalidKey { index: usize, message: String },

    #[error("task {task} failed")]
    TaskResolutionFailure {
        task: String,
        #[source]
        source: Box<DeployError>,
    },

    #[error("cyclic dependency: {}", path.join(" -> "))]
    CyclicDependency { path: Vec<String> },

    #[error("no task registered for {task}")]
    UnknownTask { task: String },

    #[error("task {task} is already registered")]
    AlreadyRegistered { task: String },

    #[error("task {task} produced {found}, expected {expected}")]
    UnexpectedOutput {
        task: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("task runtime: {0}")]
    Runtime(String),

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl DeployError {
    /// The innermost error behind a chain of task failures.
    pub fn root_cause(&self) -> &DeployError {
        match self {
            DeployError::TaskResolutionFailure { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Task names from the outermost failed task down to the one that failed first.
    pub fn failed_tasks(&self) -> Vec<&str> {
        let mut tasks = Vec::new();
        let mut current = self;
        while let DeployError::TaskResolutionFailure { task, source } = current {
            tasks.push(task.as_str());
            current = source;
        }
        tasks
    }
}

/// Failures reported by a [`crate::chain::ChainClient`].
#[derive(Debug, Clone, Error)]
pub enum ChainError {
    #[error("failed to load artifact {path}: {message}")]
    Artifact { path: String, message: String },

    #[error("transaction rejected: {0}")]
    Rejected(String),

    #[error("call to {method} reverted: {message}")]
    Reverted { method: String, message: String },

    #[error("contract {0} does not exist")]
    UnknownContract(String),

    #[error("provider error: {0}")]
    Provider(String),
}

#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("missing env var {0}")]
    Missing(&'static str),

    #[error("failed to load .env: {0}")]
    EnvFile(String),

    #[error("invalid value for {var}: {message}")]
    Invalid { var: &'static str, message: String },
}
