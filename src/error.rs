use thiserror::Error;

/// Errors raised while building the type model. All of them describe invalid
/// schema input and abort the compilation run.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("configuration error in `{subject}`: {message}")]
    Configuration { subject: String, message: String },

    #[error("unknown {kind} `{id}`")]
    UnknownNode { kind: &'static str, id: String },

    #[error("invalid input at {path}: {message}")]
    Input { path: String, message: String },
}

impl ModelError {
    pub fn configuration(subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration { subject: subject.into(), message: message.into() }
    }

    pub fn unknown(kind: &'static str, id: impl Into<String>) -> Self {
        Self::UnknownNode { kind, id: id.into() }
    }
}
