use std::sync::Arc;

use crate::bson::document::Document;
use crate::core::error::Error;

/// Outcome of one engine operation.
///
/// `matched` and `modified` alias snapshot state and must be treated as
/// immutable; `errors` only accumulates for unordered inserts, every other
/// failure aborts the operation instead.
#[derive(Debug, Default)]
pub struct OpResult {
    pub matched: Vec<Arc<Document>>,
    pub modified: Vec<Arc<Document>>,
    pub upserted: Option<Arc<Document>>,
    pub errors: Vec<Error>,
}

impl OpResult {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_matched(matched: Vec<Arc<Document>>) -> Self {
        OpResult { matched, ..Self::default() }
    }
}
