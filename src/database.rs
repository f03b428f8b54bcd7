//! Per-database operations: document CRUD, views, bulk writes, update
//! handlers, and attachments.
//!
//! A [`Database`] is obtained from a [`Session`](crate::session::Session)
//! and is cheap to clone; clones share the session's HTTP client. The
//! document count and update sequence are a snapshot from the moment the
//! database was fetched; reload the database for fresh numbers.
//!
//! Routine protocol failures (a missing document, an update conflict) are
//! reported as an absent result plus a warning, never as an `Err`; the full
//! failed exchange stays available via the session's last response. `Err` is
//! reserved for misuse caught before the request goes out and for success
//! responses whose body does not have the documented shape.

use anyhow::{bail, Result};
use log::warn;
use serde_json::{json, Map, Value};

use crate::document::Document;
use crate::response::CouchResponse;
use crate::session::{Payload, Session};
use crate::update::Update;
use crate::view::View;
use crate::view_results::ViewResults;

/// A single database on the server.
#[derive(Debug, Clone)]
pub struct Database {
    name: String,
    doc_count: u64,
    update_seq: u64,
    session: Session,
}

impl Database {
    /// Build a database handle from the server's info body (`db_name`,
    /// `doc_count`, `update_seq`).
    pub(crate) fn from_info(info: &Map<String, Value>, session: Session) -> Result<Self> {
        let name = info
            .get("db_name")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow::anyhow!("database info carries no 'db_name'"))?
            .to_string();
        // Newer servers report the update sequence as an opaque string;
        // both counters degrade to zero rather than failing the load.
        let doc_count = info.get("doc_count").and_then(Value::as_u64).unwrap_or(0);
        let update_seq = info.get("update_seq").and_then(Value::as_u64).unwrap_or(0);
        Ok(Database {
            name,
            doc_count,
            update_seq,
            session,
        })
    }

    /// The database name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of documents at the time this handle was fetched.
    pub fn doc_count(&self) -> u64 {
        self.doc_count
    }

    /// Update sequence at the time this handle was fetched.
    pub fn update_seq(&self) -> u64 {
        self.update_seq
    }

    /// The session this database talks through.
    pub fn session(&self) -> &Session {
        &self.session
    }

    // ============ Views ============

    /// Run the built-in `_all_docs` view.
    pub fn all_documents(&self) -> Result<Option<ViewResults>> {
        self.view(&View::new("_all_docs"))
    }

    /// Run `_all_docs`, returning at most `limit` rows.
    pub fn all_documents_with_limit(&self, limit: u64) -> Result<Option<ViewResults>> {
        let mut view = View::new("_all_docs");
        view.set_limit(limit);
        self.view(&view)
    }

    /// List documents changed at or after the given update sequence.
    pub fn all_documents_since(&self, seq: u64) -> Result<Option<ViewResults>> {
        let mut view = View::new("_all_docs_by_seq");
        view.set_start_key(seq.to_string());
        self.view(&view)
    }

    /// List every design document, with bodies included.
    pub fn all_design_documents(&self) -> Result<Option<ViewResults>> {
        let mut view = View::new("_all_docs");
        view.set_start_key("%22_design%2F%22");
        view.set_end_key("%22_design0%22");
        view.set_include_docs(true);
        self.view(&view)
    }

    /// Execute a view. Ad-hoc views are routed through `_temp_view`,
    /// everything else through a GET on the view's path.
    ///
    /// Returns `None` (with a warning) when the server rejects the view.
    pub fn view(&self, view: &View) -> Result<Option<ViewResults>> {
        if view.is_adhoc() {
            return self.adhoc_view(view);
        }
        let path = format!("{}/{}", self.name, view.full_path());
        let resp = self
            .session
            .request("GET", &path, view.query_string().as_deref(), Payload::Empty);
        self.materialize_view(view, resp)
    }

    /// Execute a view by full name (`design-doc/view-name` or a built-in).
    pub fn view_by_name(&self, full_name: &str) -> Result<Option<ViewResults>> {
        self.view(&View::new(full_name))
    }

    /// Run a one-off map function against the database.
    pub fn adhoc(&self, function: &str) -> Result<Option<ViewResults>> {
        self.adhoc_view(&View::adhoc(function))
    }

    /// Run an ad-hoc view, honoring any filtering parameters set on it.
    pub fn adhoc_view(&self, view: &View) -> Result<Option<ViewResults>> {
        let function = match view.function() {
            Some(function) => function,
            None => bail!("ad-hoc view carries no map function"),
        };
        let path = format!("{}/_temp_view", self.name);
        let body = json!({ "map": function });
        let resp = self.session.request(
            "POST",
            &path,
            view.query_string().as_deref(),
            Payload::Json(body),
        );
        self.materialize_view(view, resp)
    }

    fn materialize_view(&self, view: &View, resp: CouchResponse) -> Result<Option<ViewResults>> {
        if !resp.is_ok() {
            warn!(
                "error executing view '{}': {}",
                view.full_path(),
                resp.error_summary()
            );
            return Ok(None);
        }
        let body = resp.json_object().ok_or_else(|| {
            anyhow::anyhow!("view response for '{}' is not a JSON object", view.full_path())
        })?;
        let document = Document::from_full(body, self.clone());
        Ok(Some(ViewResults::new(view.clone(), document)))
    }

    // ============ Document CRUD ============

    /// Save a document under its current id, or POST it for a fresh
    /// server-assigned id when it has none.
    ///
    /// On success the document's id (when newly assigned) and revision are
    /// updated in place and the document is attributed to this database.
    /// Returns false (with a warning) when the server rejects the write.
    pub fn save_document(&self, doc: &mut Document) -> Result<bool> {
        let doc_id = doc.id().map(str::to_string);
        self.save_internal(doc, doc_id.as_deref())
    }

    /// Save a document under an explicit id, regardless of the id it
    /// carries locally.
    pub fn save_document_as(&self, doc: &mut Document, doc_id: &str) -> Result<bool> {
        self.save_internal(doc, Some(doc_id))
    }

    fn save_internal(&self, doc: &mut Document, doc_id: Option<&str>) -> Result<bool> {
        let body = Value::Object(doc.as_map().clone());
        let resp = match doc_id.filter(|id| !id.trim().is_empty()) {
            Some(id) => self.session.request(
                "PUT",
                &format!("{}/{}", self.name, id),
                None,
                Payload::Json(body),
            ),
            None => self
                .session
                .request("POST", &self.name, None, Payload::Json(body)),
        };
        if !resp.is_ok() {
            warn!("error saving document: {}", resp.error_summary());
            return Ok(false);
        }

        let body = resp
            .json_object()
            .ok_or_else(|| anyhow::anyhow!("save response is not a JSON object"))?;
        if doc.id().is_none() {
            match body.get("id").and_then(Value::as_str) {
                Some(id) => doc.set_id(id),
                None => bail!("save response carries no 'id'"),
            }
        }
        match body.get("rev").and_then(Value::as_str) {
            Some(rev) => doc.set_rev(rev),
            None => bail!("save response carries no 'rev'"),
        }
        doc.set_database(self.clone());
        doc.mark_full();
        Ok(true)
    }

    /// Save several documents in one round trip via `_bulk_docs`.
    ///
    /// The response array is reconciled positionally: a document that had no
    /// id gets the returned id and revision; a document whose id matches the
    /// returned one gets the revision only; on a mismatch the document is
    /// left untouched and a warning is logged. Every document is attributed
    /// to this database. A response of the wrong length is an error.
    pub fn bulk_save(&self, docs: &mut [Document]) -> Result<bool> {
        let body = json!({
            "docs": docs
                .iter()
                .map(|doc| Value::Object(doc.as_map().clone()))
                .collect::<Vec<_>>(),
        });
        let path = format!("{}/_bulk_docs", self.name);
        let resp = self.session.request("POST", &path, None, Payload::Json(body));
        if !resp.is_ok() {
            warn!("error bulk saving documents: {}", resp.error_summary());
            return Ok(false);
        }

        let entries = resp
            .json_array()
            .ok_or_else(|| anyhow::anyhow!("bulk save response is not a JSON array"))?;
        if entries.len() != docs.len() {
            bail!(
                "bulk save returned {} entries for {} documents",
                entries.len(),
                docs.len()
            );
        }

        for (doc, entry) in docs.iter_mut().zip(&entries) {
            let returned_id = entry.get("id").and_then(Value::as_str);
            let returned_rev = entry.get("rev").and_then(Value::as_str);
            match (doc.id().map(str::to_string), returned_id) {
                (None, Some(id)) => {
                    doc.set_id(id);
                    match returned_rev {
                        Some(rev) => doc.set_rev(rev),
                        None => warn!("bulk save entry for '{}' carries no rev", id),
                    }
                }
                (Some(local), Some(id)) if local == id => match returned_rev {
                    Some(rev) => doc.set_rev(rev),
                    None => warn!("bulk save entry for '{}' carries no rev", id),
                },
                _ => warn!(
                    "bulk save response order does not match the request; \
                     document revs were not updated"
                ),
            }
            doc.set_database(self.clone());
        }
        Ok(true)
    }

    /// Fetch a document by id. `None` (with a warning) when it is missing.
    pub fn get_document(&self, id: &str) -> Result<Option<Document>> {
        self.fetch_document(id, None)
    }

    /// Fetch a specific revision of a document.
    pub fn get_document_rev(&self, id: &str, rev: &str) -> Result<Option<Document>> {
        self.fetch_document(id, Some(format!("rev={}", rev)))
    }

    /// Fetch a document along with its revision history
    /// (see [`Document::revisions`]).
    pub fn get_document_with_revisions(&self, id: &str) -> Result<Option<Document>> {
        self.fetch_document(id, Some("revs=true".to_string()))
    }

    /// Fetch a specific revision along with the revision history.
    pub fn get_document_rev_with_revisions(&self, id: &str, rev: &str) -> Result<Option<Document>> {
        self.fetch_document(id, Some(format!("rev={}&full=true", rev)))
    }

    fn fetch_document(&self, id: &str, query: Option<String>) -> Result<Option<Document>> {
        let path = format!("{}/{}", self.name, id);
        let resp = self
            .session
            .request("GET", &path, query.as_deref(), Payload::Empty);
        if !resp.is_ok() {
            warn!("error getting document '{}': {}", id, resp.error_summary());
            return Ok(None);
        }
        let body = resp
            .json_object()
            .ok_or_else(|| anyhow::anyhow!("document response for '{}' is not a JSON object", id))?;
        Ok(Some(Document::from_full(body, self.clone())))
    }

    /// Delete a document at its current revision.
    ///
    /// A document without an id is rejected before any request is sent.
    /// Returns false (with a warning) when the server refuses the delete.
    pub fn delete_document(&self, doc: &Document) -> Result<bool> {
        let id = match doc.id() {
            Some(id) => id.to_string(),
            None => bail!("cannot delete a document that has no id"),
        };
        let query = doc.rev().map(|rev| format!("rev={}", rev));
        let resp = self.session.request(
            "DELETE",
            &format!("{}/{}", self.name, id),
            query.as_deref(),
            Payload::Empty,
        );
        if resp.is_ok() {
            Ok(true)
        } else {
            warn!("error deleting document '{}': {}", id, resp.error_summary());
            Ok(false)
        }
    }

    // ============ Update handlers ============

    /// Invoke a document update handler, reporting only success or failure.
    ///
    /// An invocation without a document id is rejected before any request
    /// is sent.
    pub fn update_document(&self, update: &Update) -> Result<bool> {
        let resp = self.invoke_update(update)?;
        if !resp.is_ok() {
            warn!(
                "error invoking update handler '{}': {}",
                update.name(),
                resp.error_summary()
            );
        }
        Ok(resp.is_ok())
    }

    /// Invoke a document update handler and hand back whatever body the
    /// handler produced, successful or not.
    pub fn update_document_with_response(&self, update: &Update) -> Result<Option<String>> {
        let resp = self.invoke_update(update)?;
        if !resp.is_ok() {
            warn!(
                "error invoking update handler '{}': {}",
                update.name(),
                resp.error_summary()
            );
        }
        Ok(resp.body().map(str::to_string))
    }

    fn invoke_update(&self, update: &Update) -> Result<CouchResponse> {
        let doc_id = match update.doc_id().filter(|id| !id.trim().is_empty()) {
            Some(id) => id,
            None => bail!("update handler invocation requires a document id"),
        };
        let path = format!("{}/{}/{}", self.name, update.handler_path(), doc_id);
        let resp = if update.uses_post() {
            self.session.request(
                "POST",
                &path,
                None,
                Payload::Form(update.form_params().to_vec()),
            )
        } else {
            self.session
                .request("PUT", &path, update.query_string().as_deref(), Payload::Empty)
        };
        Ok(resp)
    }

    // ============ Attachments ============

    /// Fetch an attachment's body as a string.
    pub fn get_attachment(&self, id: &str, name: &str) -> Result<Option<String>> {
        let path = format!("{}/{}/{}", self.name, id, name);
        let resp = self.session.request("GET", &path, None, Payload::Empty);
        if !resp.is_ok() {
            warn!(
                "error getting attachment '{}/{}': {}",
                id,
                name,
                resp.error_summary()
            );
        }
        Ok(resp.body().map(str::to_string))
    }

    /// Store an attachment on a document, returning the server's raw
    /// response body.
    pub fn put_attachment(
        &self,
        id: &str,
        name: &str,
        content_type: &str,
        data: &str,
    ) -> Result<Option<String>> {
        let path = format!("{}/{}/{}", self.name, id, name);
        let resp = self.session.request(
            "PUT",
            &path,
            None,
            Payload::Raw {
                content_type: content_type.to_string(),
                data: data.to_string(),
            },
        );
        if !resp.is_ok() {
            warn!(
                "error putting attachment '{}/{}': {}",
                id,
                name,
                resp.error_summary()
            );
        }
        Ok(resp.body().map(str::to_string))
    }

    // ============ Maintenance ============

    /// Ask the server to compact this database, returning the raw response
    /// body. Old servers answer 202 here, which the verb/status table treats
    /// as a failure, so the body is handed back for the caller to inspect.
    pub fn compact(&self) -> Result<Option<String>> {
        let path = format!("{}/_compact", self.name);
        let resp = self
            .session
            .request("POST", &path, None, Payload::Json(json!({})));
        Ok(resp.body().map(str::to_string))
    }
}
