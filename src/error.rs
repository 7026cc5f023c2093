use thiserror::Error;
use wasm_bindgen::JsValue;

/// Everything that can go wrong while reading, normalizing or writing GPX.
#[derive(Debug, Error)]
pub enum GpxError {
    #[error("XML parse error: {0}")]
    Parse(#[from] quick_xml::Error),

    #[error("malformed GPX: {0}")]
    Malformed(String),

    #[error("missing data: {0}")]
    MissingData(&'static str),

    /// A numeric field that could not be reformatted. Callers recover from
    /// this by keeping the original text.
    #[error("invalid {field} value '{value}'")]
    Format { field: &'static str, value: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, GpxError>;

impl From<GpxError> for JsValue {
    fn from(e: GpxError) -> Self {
        JsValue::from_str(&e.to_string())
    }
}
