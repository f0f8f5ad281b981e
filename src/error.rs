use thiserror::Error;

pub type Result<T, E = CoreError> = core::result::Result<T, E>;

/// Upload/format errors. Reported once; the operation is aborted.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Tệp trống hoặc không có dữ liệu hợp lệ")]
    Empty,
    #[error("Không đọc được tệp CSV/TSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON không hợp lệ: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Không ghi được tệp: {0}")]
    Write(String),
}

/// Failures of the remote completion call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AiError {
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },
    #[error("network: {0}")]
    Transport(String),
    #[error("invalid AI response: {0}")]
    InvalidResponse(String),
    #[error("ai config: {0}")]
    Config(String),
}

/// An AI JSON answer that does not have the expected shape.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Phản hồi AI không chứa JSON")]
    NoJson,
    #[error("JSON không hợp lệ: {0}")]
    Malformed(String),
    #[error("Thiếu trường `{0}`")]
    MissingField(String),
    #[error("Trường `{field}` không hợp lệ: {reason}")]
    InvalidField { field: String, reason: String },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("serde: {0}")]
    Serde(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Ai(#[from] AiError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("{0}")]
    Invalid(String),
}

impl CoreError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::Invalid(msg.into())
    }
}
