use thiserror::Error;

/// Errors surfaced by the grid picker library.
#[derive(Error, Debug)]
pub enum Error {
    #[error("failed to read grid dataset {path}: {source}")]
    DatasetIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to fetch grid dataset: {0}")]
    DatasetFetch(String),

    #[error("failed to parse grid dataset: {0}")]
    DatasetParse(#[from] serde_json::Error),

    #[error("nothing is selected")]
    EmptySelection,

    #[error("export failed: {0}")]
    Export(String),
}

pub type Result<T> = std::result::Result<T, Error>;
