//! View descriptors: named design-document views, built-in views, and
//! ad-hoc map functions, plus the query string that narrows them.

/// A view to execute against a database.
///
/// Covers three shapes:
/// - built-in views addressed by a bare name (`"_all_docs"`),
/// - design-document views addressed as `design-doc/view-name`,
/// - ad-hoc views carrying a map function, executed via `_temp_view`.
///
/// Filtering parameters are appended to the request verbatim, so key values
/// must arrive already JSON-quoted and URL-encoded by the caller.
#[derive(Debug, Clone)]
pub struct View {
    design_doc: Option<String>,
    name: String,
    function: Option<String>,
    key: Option<String>,
    start_key: Option<String>,
    end_key: Option<String>,
    skip: Option<u64>,
    limit: Option<u64>,
    update: bool,
    include_docs: bool,
    descending: bool,
    group: bool,
}

impl View {
    /// Build a view from a full name such as `"accounts/by-owner"`.
    ///
    /// A name without a slash addresses a built-in view (`"_all_docs"`).
    pub fn new(full_name: &str) -> Self {
        match full_name.split_once('/') {
            Some((design_doc, name)) => Self::named(design_doc, name),
            None => Self::bare(full_name),
        }
    }

    /// A view stored under `_design/<design_doc>`.
    pub fn named(design_doc: &str, name: &str) -> Self {
        let mut view = Self::bare(name);
        view.design_doc = Some(design_doc.to_string());
        view
    }

    /// An ad-hoc view running the given map function server-side.
    pub fn adhoc(function: &str) -> Self {
        let mut view = Self::bare("_temp_view");
        view.function = Some(function.to_string());
        view
    }

    fn bare(name: &str) -> Self {
        View {
            design_doc: None,
            name: name.to_string(),
            function: None,
            key: None,
            start_key: None,
            end_key: None,
            skip: None,
            limit: None,
            update: false,
            include_docs: false,
            descending: false,
            group: false,
        }
    }

    /// The view name, without its design document.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The design document holding this view, if it has one.
    pub fn design_doc(&self) -> Option<&str> {
        self.design_doc.as_deref()
    }

    /// The map function of an ad-hoc view.
    pub fn function(&self) -> Option<&str> {
        self.function.as_deref()
    }

    /// True for views that carry their own map function.
    pub fn is_adhoc(&self) -> bool {
        self.function.is_some()
    }

    /// The request path for this view, relative to its database:
    /// `_design/<doc>/_view/<name>` for stored views, the bare name otherwise.
    pub fn full_path(&self) -> String {
        match &self.design_doc {
            Some(design_doc) => format!("_design/{}/_view/{}", design_doc, self.name),
            None => self.name.clone(),
        }
    }

    /// Only emit rows matching this key (pre-encoded).
    pub fn set_key(&mut self, key: impl Into<String>) {
        self.key = Some(key.into());
    }

    /// Start listing at this key (pre-encoded).
    pub fn set_start_key(&mut self, key: impl Into<String>) {
        self.start_key = Some(key.into());
    }

    /// Stop listing at this key (pre-encoded).
    pub fn set_end_key(&mut self, key: impl Into<String>) {
        self.end_key = Some(key.into());
    }

    /// Skip this many rows before emitting any.
    pub fn set_skip(&mut self, skip: u64) {
        self.skip = Some(skip);
    }

    /// Emit at most this many rows.
    pub fn set_limit(&mut self, limit: u64) {
        self.limit = Some(limit);
    }

    pub fn set_update(&mut self, update: bool) {
        self.update = update;
    }

    /// Ask the server to embed each row's full document.
    pub fn set_include_docs(&mut self, include_docs: bool) {
        self.include_docs = include_docs;
    }

    /// Reverse the listing order.
    pub fn set_descending(&mut self, descending: bool) {
        self.descending = descending;
    }

    pub fn set_group(&mut self, group: bool) {
        self.group = group;
    }

    /// The query string for the configured parameters, `None` when nothing
    /// is set. Parameters appear in a fixed order; unset values and false
    /// flags are omitted; values pass through verbatim.
    pub fn query_string(&self) -> Option<String> {
        let mut params = Vec::new();
        if let Some(key) = &self.key {
            params.push(format!("key={}", key));
        }
        if let Some(start_key) = &self.start_key {
            params.push(format!("startkey={}", start_key));
        }
        if let Some(end_key) = &self.end_key {
            params.push(format!("endkey={}", end_key));
        }
        if let Some(skip) = self.skip {
            params.push(format!("skip={}", skip));
        }
        if let Some(limit) = self.limit {
            params.push(format!("limit={}", limit));
        }
        if self.update {
            params.push("update=true".to_string());
        }
        if self.include_docs {
            params.push("include_docs=true".to_string());
        }
        if self.descending {
            params.push("descending=true".to_string());
        }
        if self.group {
            params.push("group=true".to_string());
        }
        if params.is_empty() {
            None
        } else {
            Some(params.join("&"))
        }
    }
}
