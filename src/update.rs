//! Invocation descriptors for server-side document update handlers.

/// A document update handler invocation.
///
/// The handler is addressed as `design-doc/handler-name` (stored under
/// `updates.<handler-name>` in the design document). By default the handler
/// runs via PUT with its parameters joined into a raw query string; switch
/// to POST to pass them form-encoded in the body instead, for handlers that
/// read `req.form` rather than `req.query`.
#[derive(Debug, Clone)]
pub struct Update {
    name: String,
    doc_id: Option<String>,
    use_post: bool,
    params: Vec<(String, String)>,
}

impl Update {
    /// A handler invocation with the target document still unset.
    pub fn new(name: &str) -> Self {
        Update {
            name: name.to_string(),
            doc_id: None,
            use_post: false,
            params: Vec::new(),
        }
    }

    /// A handler invocation against the given document.
    pub fn with_doc_id(name: &str, doc_id: &str) -> Self {
        let mut update = Self::new(name);
        update.doc_id = Some(doc_id.to_string());
        update
    }

    /// The `design-doc/handler-name` pair this invocation addresses.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The document the handler will run against. Required for invocation.
    pub fn doc_id(&self) -> Option<&str> {
        self.doc_id.as_deref()
    }

    pub fn set_doc_id(&mut self, doc_id: impl Into<String>) {
        self.doc_id = Some(doc_id.into());
    }

    /// Whether the handler is invoked via POST (form body) instead of PUT
    /// (query string).
    pub fn uses_post(&self) -> bool {
        self.use_post
    }

    pub fn set_method_post(&mut self, use_post: bool) {
        self.use_post = use_post;
    }

    /// Add a parameter for the handler. An existing parameter with the same
    /// key is replaced; empty keys are ignored.
    pub fn add_parameter(&mut self, key: &str, value: &str) {
        if key.is_empty() {
            return;
        }
        self.remove_parameter(key);
        self.params.push((key.to_string(), value.to_string()));
    }

    /// Drop every parameter with the given key.
    pub fn remove_parameter(&mut self, key: &str) {
        self.params.retain(|(name, _)| name != key);
    }

    /// The parameters joined into a raw query string (`a=1&b=2`), exactly
    /// as given, nothing encoded. `None` when no parameters are set.
    pub fn query_string(&self) -> Option<String> {
        if self.params.is_empty() {
            return None;
        }
        Some(
            self.params
                .iter()
                .map(|(key, value)| format!("{}={}", key, value))
                .collect::<Vec<_>>()
                .join("&"),
        )
    }

    pub(crate) fn form_params(&self) -> &[(String, String)] {
        &self.params
    }

    /// The handler's request path relative to its database:
    /// `_design/<doc>/_update/<handler>`, or the name itself when it has
    /// no slash.
    pub(crate) fn handler_path(&self) -> String {
        match self.name.split_once('/') {
            Some((design_doc, handler)) => format!("_design/{}/_update/{}", design_doc, handler),
            None => self.name.clone(),
        }
    }
}
