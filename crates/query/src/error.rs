use thiserror::Error;

use crate::types::RetrievalMethod;

/// Caller-facing retrieval errors.
///
/// Both `NoMethodAvailable` and `NoResults` mean zero methods contributed;
/// they differ only in whether anything ran.
#[derive(Debug, Error, PartialEq)]
pub enum RetrievalError {
    #[error("query must not be empty")]
    EmptyQuery,

    #[error("no retrieval method could run (abstained: {abstained:?})")]
    NoMethodAvailable { abstained: Vec<RetrievalMethod> },

    #[error("no results: {ran:?} ran empty, {abstained:?} abstained")]
    NoResults {
        ran: Vec<RetrievalMethod>,
        abstained: Vec<RetrievalMethod>,
    },

    #[error("unknown retrieval method: {0}")]
    UnknownMethod(String),
}
