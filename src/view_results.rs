//! The row container produced by executing a view.

use log::warn;
use serde_json::Value;

use crate::document::Document;
use crate::view::View;

/// The result of one view execution: the raw response document plus the
/// view that produced it. Immutable once constructed.
///
/// Rows carry only what the view emitted (`id`, `key`, `value`, and the
/// full document under `doc` when `include_docs` was set), so documents
/// materialized from them start out partial.
#[derive(Debug, Clone)]
pub struct ViewResults {
    view: View,
    document: Document,
}

impl ViewResults {
    pub(crate) fn new(view: View, document: Document) -> Self {
        ViewResults { view, document }
    }

    /// The view that was executed.
    pub fn view(&self) -> &View {
        &self.view
    }

    /// The raw response body as a document (`total_rows`, `offset`, `rows`).
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Total number of rows in the view, as reported by the server.
    pub fn total_rows(&self) -> Option<u64> {
        self.document.get("total_rows").and_then(Value::as_u64)
    }

    /// Offset of the first returned row within the view.
    pub fn offset(&self) -> Option<u64> {
        self.document.get("offset").and_then(Value::as_u64)
    }

    /// One partial document per row, attributed to the database the view
    /// ran against. Null rows are skipped.
    pub fn rows(&self) -> Vec<Document> {
        let rows = match self.document.get("rows").and_then(Value::as_array) {
            Some(rows) => rows,
            None => {
                warn!("view response carries no 'rows' array");
                return Vec::new();
            }
        };
        let mut documents = Vec::with_capacity(rows.len());
        for row in rows {
            match row {
                Value::Object(fields) => documents.push(Document::from_row(
                    fields.clone(),
                    self.document.database().cloned(),
                )),
                Value::Null => {}
                other => warn!("skipping malformed view row: {}", other),
            }
        }
        documents
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::LoadState;
    use serde_json::json;

    fn results(body: Value) -> ViewResults {
        let document = Document::from_json(body).unwrap();
        ViewResults::new(View::new("_all_docs"), document)
    }

    #[test]
    fn test_rows_become_partial_documents() {
        let results = results(json!({
            "total_rows": 2,
            "offset": 0,
            "rows": [
                {"id": "a", "key": "a", "value": {"rev": "1-a"}},
                {"id": "b", "key": "b", "value": {"rev": "1-b"}}
            ]
        }));
        let rows = results.rows();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id(), Some("a"));
        assert_eq!(rows[0].state(), LoadState::Partial);
        assert_eq!(results.total_rows(), Some(2));
        assert_eq!(results.offset(), Some(0));
    }

    #[test]
    fn test_null_rows_are_skipped() {
        let results = results(json!({
            "total_rows": 3,
            "rows": [{"id": "a"}, null, {"id": "c"}]
        }));
        let rows = results.rows();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].id(), Some("c"));
    }

    #[test]
    fn test_missing_rows_array_yields_no_documents() {
        let results = results(json!({"total_rows": 0}));
        assert!(results.rows().is_empty());
    }
}
