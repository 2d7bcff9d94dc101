use core::fmt;

/// Result alias for `icwcluster`.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by the matrix, clustering, and tree primitives.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Input was empty where at least one item was required.
    EmptyInput,

    /// Invalid configuration or parameter value.
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// Error message.
        message: &'static str,
    },

    /// A node handle does not refer to a live node of the forest.
    UnknownNode(usize),

    /// `parent` does not have `child` as one of its two children.
    NotAChild {
        /// Parent node handle.
        parent: usize,
        /// Expected child node handle.
        child: usize,
    },

    /// A match index is outside the dense index range.
    IndexOutOfRange {
        /// Offending index.
        index: usize,
        /// Number of indexed matches.
        len: usize,
    },

    /// Generic error with message.
    Other(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::EmptyInput => write!(f, "empty input provided"),
            Error::InvalidParameter { name, message } => {
                write!(f, "invalid parameter '{name}': {message}")
            }
            Error::UnknownNode(id) => write!(f, "node {id} is not part of the forest"),
            Error::NotAChild { parent, child } => {
                write!(f, "node {child} is not a child of node {parent}")
            }
            Error::IndexOutOfRange { index, len } => {
                write!(f, "match index {index} out of range for {len} matches")
            }
            Error::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for Error {}
