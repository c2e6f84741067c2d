use std::path::PathBuf;
use thiserror::Error;

pub type ExtractResult<T> = Result<T, ExtractError>;

/// Exit status for missing or invalid command-line arguments.
pub const EXIT_USAGE: i32 = 1;
/// Exit status for extraction and write failures.
pub const EXIT_FAILURE: i32 = 2;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Failed to open workbook {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: calamine::Error,
    },

    #[error("Failed to read sheet '{sheet}': {source}")]
    Sheet {
        sheet: String,
        #[source]
        source: calamine::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("XML parsing error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Layout error: {0}")]
    Layout(String),
}

impl ExtractError {
    /// Process exit status reported by the `extract` binary.
    pub fn exit_code(&self) -> i32 {
        EXIT_FAILURE
    }
}
