//! Documents: ordered JSON field maps with identity, revision history, and
//! a record of how much of the server-side state is known locally.
//!
//! A [`Document`] behaves like a map of field names to JSON values. Two keys,
//! `_id` and `_rev`, are special, and two more are recognized as fallbacks
//! for documents materialized from view rows (`id`, `rev`), where the server
//! reports identity without the underscore prefix.
//!
//! Documents remember the [`Database`] that produced them, which lets a
//! partially materialized document complete itself on demand: [`Document::refresh`]
//! and [`Document::revisions`] both go back to the server and fill in only
//! the fields that are not already present locally, so unsaved local edits
//! are never overwritten.

use std::fmt;

use anyhow::{bail, Result};
use log::warn;
use serde_json::{Map, Value};

use crate::database::Database;
use crate::view::View;

/// How much of a document's server-side state is known locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    /// Created locally, never exchanged with the server.
    New,
    /// Materialized from a view row or another partial shape; some fields
    /// may be missing.
    Partial,
    /// Fetched or saved in full.
    Full,
}

/// A single document: an ordered mapping of field names to JSON values.
#[derive(Debug, Clone)]
pub struct Document {
    fields: Map<String, Value>,
    state: LoadState,
    database: Option<Database>,
}

impl Document {
    /// An empty document, not yet known to any server.
    pub fn new() -> Self {
        Document {
            fields: Map::new(),
            state: LoadState::New,
            database: None,
        }
    }

    /// A document seeded from a JSON value, which must be an object.
    pub fn from_json(value: Value) -> Result<Self> {
        match value {
            Value::Object(fields) => Ok(Document {
                fields,
                state: LoadState::New,
                database: None,
            }),
            other => bail!("a document must be a JSON object, got {}", other),
        }
    }

    /// A fully fetched document attributed to `database`.
    pub(crate) fn from_full(fields: Map<String, Value>, database: Database) -> Self {
        Document {
            fields,
            state: LoadState::Full,
            database: Some(database),
        }
    }

    /// A partially materialized document (view row).
    pub(crate) fn from_row(fields: Map<String, Value>, database: Option<Database>) -> Self {
        Document {
            fields,
            state: LoadState::Partial,
            database,
        }
    }

    fn non_blank(&self, key: &str) -> Option<&str> {
        self.fields
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
    }

    /// The document id: `_id` when present and non-blank, otherwise the
    /// `id` a view row carries.
    pub fn id(&self) -> Option<&str> {
        self.non_blank("_id").or_else(|| self.non_blank("id"))
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.fields.insert("_id".to_string(), Value::String(id.into()));
    }

    /// The current revision: `_rev` when present and non-blank, otherwise
    /// the `rev` a view row carries.
    pub fn rev(&self) -> Option<&str> {
        self.non_blank("_rev").or_else(|| self.non_blank("rev"))
    }

    pub fn set_rev(&mut self, rev: impl Into<String>) {
        self.fields.insert("_rev".to_string(), Value::String(rev.into()));
    }

    /// The id with any design-document prefix stripped: everything after
    /// the last `/`.
    pub fn view_document_id(&self) -> Option<&str> {
        let id = self.id()?;
        Some(match id.rsplit_once('/') {
            Some((_, tail)) => tail,
            None => id,
        })
    }

    pub fn state(&self) -> LoadState {
        self.state
    }

    /// The database this document is attributed to, if any.
    pub fn database(&self) -> Option<&Database> {
        self.database.as_ref()
    }

    pub(crate) fn set_database(&mut self, database: Database) {
        self.database = Some(database);
    }

    pub(crate) fn mark_full(&mut self) {
        self.state = LoadState::Full;
    }

    /// Fill-only merge: insert every incoming field whose key is not
    /// already present, then consider the document fully loaded. Local
    /// edits always win over the incoming copy.
    pub(crate) fn merge_missing(&mut self, incoming: Map<String, Value>) {
        for (key, value) in incoming {
            self.fields.entry(key).or_insert(value);
        }
        self.state = LoadState::Full;
    }

    /// Read-only access to the backing field map.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub(crate) fn into_map(self) -> Map<String, Value> {
        self.fields
    }

    /// A field as raw JSON.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// A string field.
    pub fn get_str(&self, key: &str) -> Result<&str> {
        self.fields
            .get(key)
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow::anyhow!("field '{}' is missing or not a string", key))
    }

    /// An integer field.
    pub fn get_i64(&self, key: &str) -> Result<i64> {
        self.fields
            .get(key)
            .and_then(Value::as_i64)
            .ok_or_else(|| anyhow::anyhow!("field '{}' is missing or not an integer", key))
    }

    /// A floating-point field.
    pub fn get_f64(&self, key: &str) -> Result<f64> {
        self.fields
            .get(key)
            .and_then(Value::as_f64)
            .ok_or_else(|| anyhow::anyhow!("field '{}' is missing or not a number", key))
    }

    /// A boolean field.
    pub fn get_bool(&self, key: &str) -> Result<bool> {
        self.fields
            .get(key)
            .and_then(Value::as_bool)
            .ok_or_else(|| anyhow::anyhow!("field '{}' is missing or not a boolean", key))
    }

    /// An array field.
    pub fn get_array(&self, key: &str) -> Result<&Vec<Value>> {
        self.fields
            .get(key)
            .and_then(Value::as_array)
            .ok_or_else(|| anyhow::anyhow!("field '{}' is missing or not an array", key))
    }

    /// A nested object field.
    pub fn get_object(&self, key: &str) -> Result<&Map<String, Value>> {
        self.fields
            .get(key)
            .and_then(Value::as_object)
            .ok_or_else(|| anyhow::anyhow!("field '{}' is missing or not an object", key))
    }

    /// Set a field, returning the previous value if there was one.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(key.into(), value.into())
    }

    /// Remove a field.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.fields.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.fields.keys()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// The revision ids of this document, most recent first (server order).
    ///
    /// When the revision history is not yet present locally, the document is
    /// re-fetched with its history through the attributed database. Returns
    /// an empty list when the document is detached, unsaved, or gone from
    /// the server.
    pub fn revisions(&mut self) -> Result<Vec<String>> {
        if !self.fields.contains_key("_revisions") && !self.populate_revisions()? {
            return Ok(Vec::new());
        }
        let history = self.get_object("_revisions")?;
        let ids = history
            .get("ids")
            .and_then(Value::as_array)
            .ok_or_else(|| anyhow::anyhow!("revision history carries no 'ids' array"))?;
        Ok(ids
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect())
    }

    fn populate_revisions(&mut self) -> Result<bool> {
        let (database, id) = match (&self.database, self.id()) {
            (Some(database), Some(id)) => (database.clone(), id.to_string()),
            _ => {
                warn!("cannot fetch revision history for a detached or unsaved document");
                return Ok(false);
            }
        };
        match database.get_document_with_revisions(&id)? {
            Some(full) => {
                self.merge_missing(full.into_map());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Re-fetch this document and fill in any locally missing fields.
    ///
    /// Returns false (with a warning) when the document is detached,
    /// unsaved, or no longer present on the server.
    pub fn refresh(&mut self) -> Result<bool> {
        let (database, id) = match (&self.database, self.id()) {
            (Some(database), Some(id)) => (database.clone(), id.to_string()),
            _ => {
                warn!("cannot refresh a detached or unsaved document");
                return Ok(false);
            }
        };
        match database.get_document(&id)? {
            Some(full) => {
                self.merge_missing(full.into_map());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Install a map function under `views.<view_name>` and turn this
    /// document into the design document `_design/<design_doc>`.
    ///
    /// Nothing is persisted until the document is saved.
    pub fn add_view(&mut self, design_doc: &str, view_name: &str, function: &str) -> View {
        self.set_id(format!("_design/{}", design_doc));
        self.fields
            .insert("language".to_string(), Value::String("javascript".to_string()));

        let views = self
            .fields
            .entry("views".to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !views.is_object() {
            *views = Value::Object(Map::new());
        }
        if let Some(map) = views.as_object_mut() {
            map.insert(
                view_name.to_string(),
                serde_json::json!({ "map": function }),
            );
        }
        View::named(design_doc, view_name)
    }

    /// A handle on a view stored in this design document, if it exists.
    pub fn get_view(&self, name: &str) -> Option<View> {
        let views = self.fields.get("views")?.as_object()?;
        if !views.contains_key(name) {
            return None;
        }
        let design_doc = self.view_document_id()?.to_string();
        Some(View::named(&design_doc, name))
    }

    /// Remove a view definition. Returns whether one was present.
    ///
    /// Nothing is persisted until the document is saved.
    pub fn delete_view(&mut self, name: &str) -> bool {
        match self.fields.get_mut("views").and_then(Value::as_object_mut) {
            Some(views) => views.remove(name).is_some(),
            None => false,
        }
    }

    /// Install an update handler under `updates.<name>`. With a design
    /// document given, the document id is set to `_design/<design_doc>`;
    /// otherwise the id is left alone.
    ///
    /// Nothing is persisted until the document is saved.
    pub fn add_update_handler(&mut self, design_doc: Option<&str>, name: &str, function: &str) {
        if let Some(design_doc) = design_doc {
            self.set_id(format!("_design/{}", design_doc));
        }
        let updates = self
            .fields
            .entry("updates".to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !updates.is_object() {
            *updates = Value::Object(Map::new());
        }
        if let Some(map) = updates.as_object_mut() {
            map.insert(name.to_string(), Value::String(function.to_string()));
        }
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(&self.fields) {
            Ok(json) => f.write_str(&json),
            Err(_) => Err(fmt::Error),
        }
    }
}
