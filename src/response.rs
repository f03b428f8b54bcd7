//! Classification of raw HTTP exchanges into success or failure outcomes.
//!
//! Every request sent through a [`Session`](crate::session::Session) produces
//! a [`CouchResponse`], whether the server answered or the transport failed
//! first. Success is decided from the request verb and the status code alone;
//! the response body is only consulted for the bulk endpoint and for error
//! details. Callers never see a transport error directly; it is folded into
//! a failed response carrying the error id `exception`.
//!
//! # Classification rules
//!
//! | Verb + status | Outcome |
//! |---------------|---------|
//! | GET 404, PUT 409, POST 404, DELETE 404 | failure; `error`/`reason` read from the body |
//! | PUT 201, POST 201, DELETE 200, DELETE 202 | success (see below for `_bulk_docs`) |
//! | GET 200, POST 200 | success |
//! | anything else | failure, no details |
//!
//! A write to `.../_bulk_docs` is only a success when the body is a
//! non-empty JSON array: the server answers 201 even when it saved nothing.

use std::fmt;

use log::{debug, error};
use serde_json::{Map, Value};

/// The classified result of a single HTTP exchange with the server.
///
/// Constructed by the session for every request it sends. The original verb
/// and path are retained so a failed exchange can be reported long after the
/// call that produced it.
#[derive(Debug, Clone)]
pub struct CouchResponse {
    method: String,
    path: String,
    status: Option<u16>,
    body: Option<String>,
    ok: bool,
    error_id: Option<String>,
    error_reason: Option<String>,
}

impl CouchResponse {
    /// Classify a completed HTTP exchange.
    ///
    /// `path` may carry the query string; it is ignored for route checks.
    pub(crate) fn classify(method: &str, path: &str, status: u16, body: String) -> Self {
        let route = path.split('?').next().unwrap_or(path);

        let mut ok = false;
        let mut error_id = None;
        let mut error_reason = None;

        match (method, status) {
            ("GET", 404) | ("PUT", 409) | ("POST", 404) | ("DELETE", 404) => {
                if let Ok(Value::Object(details)) = serde_json::from_str::<Value>(&body) {
                    error_id = details
                        .get("error")
                        .and_then(Value::as_str)
                        .map(str::to_string);
                    error_reason = details
                        .get("reason")
                        .and_then(Value::as_str)
                        .map(str::to_string);
                }
            }
            ("PUT", 201) | ("POST", 201) | ("DELETE", 200) | ("DELETE", 202) => {
                if route == "_bulk_docs" || route.ends_with("/_bulk_docs") {
                    ok = matches!(
                        serde_json::from_str::<Value>(&body),
                        Ok(Value::Array(rows)) if !rows.is_empty()
                    );
                } else {
                    ok = true;
                }
            }
            ("GET", 200) | ("POST", 200) => ok = true,
            _ => {}
        }

        let resp = CouchResponse {
            method: method.to_string(),
            path: path.to_string(),
            status: Some(status),
            body: Some(body),
            ok,
            error_id,
            error_reason,
        };
        debug!("{}", resp);
        resp
    }

    /// Build the failed outcome for a request that never produced a server
    /// response (refused connection, timeout, TLS failure).
    pub(crate) fn from_transport_fault(method: &str, path: &str, reason: String) -> Self {
        error!("[{}] {} => {}", method, path, reason);
        CouchResponse {
            method: method.to_string(),
            path: path.to_string(),
            status: None,
            body: None,
            ok: false,
            error_id: Some("exception".to_string()),
            error_reason: Some(reason),
        }
    }

    /// Was the request successful?
    pub fn is_ok(&self) -> bool {
        self.ok
    }

    /// HTTP status code, absent for transport faults.
    pub fn status(&self) -> Option<u16> {
        self.status
    }

    /// The verb of the request that produced this response.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// The server-relative path of the request, including any query string.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Raw response body, absent for transport faults.
    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    /// Short error identifier: the body's `error` field for classified
    /// failures, `"exception"` for transport faults.
    pub fn error_id(&self) -> Option<&str> {
        self.error_id.as_deref()
    }

    /// Human-readable failure reason, when the server (or transport) gave one.
    pub fn error_reason(&self) -> Option<&str> {
        self.error_reason.as_deref()
    }

    /// Parse the body as a JSON object.
    pub fn json_object(&self) -> Option<Map<String, Value>> {
        match serde_json::from_str(self.body.as_deref()?) {
            Ok(Value::Object(map)) => Some(map),
            _ => None,
        }
    }

    /// Parse the body as a JSON array.
    pub fn json_array(&self) -> Option<Vec<Value>> {
        match serde_json::from_str(self.body.as_deref()?) {
            Ok(Value::Array(items)) => Some(items),
            _ => None,
        }
    }

    /// One-line failure description for log messages.
    pub(crate) fn error_summary(&self) -> String {
        match (self.error_id.as_deref(), self.error_reason.as_deref()) {
            (Some(id), Some(reason)) => format!("{}: {}", id, reason),
            (Some(id), None) => id.to_string(),
            _ => match self.status {
                Some(code) => format!("http status {}", code),
                None => "transport fault".to_string(),
            },
        }
    }
}

impl fmt::Display for CouchResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.method, self.path)?;
        match self.status {
            Some(code) => write!(f, " [{}]", code)?,
            None => write!(f, " [fault]")?,
        }
        let detail = self
            .body
            .as_deref()
            .or(self.error_reason.as_deref())
            .unwrap_or("");
        write!(f, " => {}", detail)
    }
}
