use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParserError {
    #[error("{parser} CSV error: {source}")]
    Csv {
        parser: &'static str,
        #[source]
        source: csv::Error,
    },

    #[error("{parser} file missing required column '{column}'")]
    MissingColumn {
        parser: &'static str,
        column: &'static str,
    },

    #[error("{parser} file missing header row")]
    MissingHeader { parser: &'static str },
}

/// A data row that was dropped during parsing, surfaced so the caller can log
/// it instead of failing the whole file.
#[derive(Debug, Clone)]
pub struct RowSkip {
    pub line_index: usize,
    pub message: String,
}

impl RowSkip {
    pub fn new(line_index: usize, message: impl Into<String>) -> Self {
        Self {
            line_index,
            message: message.into(),
        }
    }
}
