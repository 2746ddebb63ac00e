/// Reasons a weight file is rejected. Every variant is terminal for the load.
#[derive(thiserror::Error, Debug)]
pub enum ParseError {
    #[error("unsupported model version {version}, supported: {supported:?}")]
    UnsupportedVersion { version: i32, supported: Vec<i32> },

    #[error("expected '{expected}' at byte {offset}, found '{found}'")]
    UnexpectedToken {
        expected: &'static str,
        found: String,
        offset: usize,
    },

    #[error("unknown trunk block kind '{token}' at byte {offset}")]
    UnknownBlockKind { token: String, offset: usize },

    #[error("unknown activation '{token}' at byte {offset}")]
    UnknownActivation { token: String, offset: usize },

    #[error("unexpected end of model data at byte {offset} while reading {context}")]
    Truncated { offset: usize, context: &'static str },

    #[error("expected @BIN@ marker at byte {offset}")]
    MissingBinaryMarker { offset: usize },

    #[error("invalid number '{token}' at byte {offset}")]
    InvalidNumber { token: String, offset: usize },

    #[error("non-UTF-8 token at byte {offset}")]
    InvalidToken { offset: usize },

    #[error("layer '{layer}' has invalid shape: {reason}")]
    InvalidShape { layer: String, reason: String },

    #[error("layer '{layer}' expects {expected} channels, found {found}")]
    ShapeMismatch {
        layer: String,
        expected: usize,
        found: usize,
    },

    #[error("failed to decompress model: {0}")]
    Decompress(#[from] std::io::Error),
}

pub type ParseResult<T> = Result<T, ParseError>;
