use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImplantError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Missing input: no {0} passed to Implant")]
    MissingInput(&'static str),

    #[error("Cell index out of bounds: index={index}, cells={cells}")]
    CellOutOfBounds { index: usize, cells: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type ImplantResult<T> = Result<T, ImplantError>;
