use crate::ir::TargetId;

pub type AnimateResult<T> = Result<T, AnimateError>;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum RenderError {
    #[error("no diagram content in input")]
    Empty,

    #[error("parse error at line {line}: {message}")]
    Parse { line: usize, message: String },
}

impl RenderError {
    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            line,
            message: message.into(),
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum StageError {
    #[error("target `{0}` is not mounted")]
    Unmounted(TargetId),

    #[error("stage error: {0}")]
    Surface(String),
}

#[derive(thiserror::Error, Debug)]
pub enum AnimateError {
    #[error("render error: {0}")]
    Render(#[from] RenderError),

    #[error("primitive `{primitive}` is not part of the visual tree of `{target}`")]
    UnknownPrimitive { target: TargetId, primitive: String },

    #[error("unknown target `{0}`")]
    UnknownTarget(TargetId),

    #[error("no program attached to `{0}`")]
    NoProgram(TargetId),

    #[error("invalid config: {0}")]
    Config(String),

    #[error("stage error: {0}")]
    Stage(#[from] StageError),
}

impl AnimateError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn unknown_primitive(target: &TargetId, primitive: impl ToString) -> Self {
        Self::UnknownPrimitive {
            target: target.clone(),
            primitive: primitive.to_string(),
        }
    }
}
