#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecutionError {
    #[error("Codegen error: {0}")]
    Codegen(String),
    #[error("Config error: {0}")]
    Config(String),
    #[error("{function}: {message}")]
    Body { function: String, message: String },
    #[error("Execution cancelled")]
    Cancelled,
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl ExecutionError {
    pub fn body(function: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Body {
            function: function.into(),
            message: message.into(),
        }
    }
}
