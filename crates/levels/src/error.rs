//! Level-layer error types

#[derive(thiserror::Error, Debug)]
pub enum LevelError {
    #[error("invalid level format: {0}")]
    InvalidFormat(String),

    #[error("unsupported level version: {0}")]
    UnsupportedVersion(String),

    #[error("parse error on line {line}: {message}")]
    ParseError { line: usize, message: String },

    #[error("board data is {0} bytes, expected 8192")]
    BoardSize(usize),

    #[error("board patch out of bounds: x={x} y={y} w={w} h={h}")]
    PatchBounds { x: u8, y: u8, w: u8, h: u8 },

    #[error("not a gmap segment name: {0}")]
    NotASegment(String),

    #[error("invalid gmap file: {0}")]
    InvalidGmap(String),
}

pub type Result<T> = std::result::Result<T, LevelError>;

impl From<LevelError> for reborn_core::RebornError {
    fn from(err: LevelError) -> Self {
        reborn_core::RebornError::WorldInvariant(err.to_string())
    }
}
