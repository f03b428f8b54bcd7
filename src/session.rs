//! Connection to a server: owns the HTTP client, builds request URLs,
//! executes exchanges, and exposes the server-level operations (database
//! listing and lifecycle, active tasks, replication triggering).
//!
//! A [`Session`] is cheap to clone: clones share one HTTP client and one
//! last-response slot, so a handle can be passed to every [`Database`]
//! without re-negotiating connections.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use log::warn;
use reqwest::blocking::Client;
use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;

use crate::database::Database;
use crate::replication::{ActiveTask, ReplicationTask};
use crate::response::CouchResponse;

// ============ Request payloads ============

/// Body variants a request can carry.
#[derive(Debug, Clone)]
pub(crate) enum Payload {
    /// No body.
    Empty,
    /// A JSON body, sent with `Content-Type: application/json`.
    Json(Value),
    /// Form fields, sent URL-encoded.
    Form(Vec<(String, String)>),
    /// An arbitrary body with an explicit content type.
    Raw { content_type: String, data: String },
}

// ============ Options ============

/// Tunable connection settings, deserializable from configuration.
///
/// Every field has a default, so a partial configuration file works:
///
/// ```toml
/// user = "admin"
/// password = "hunter2"
/// timeout_secs = 5
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct SessionOptions {
    /// Username for HTTP basic auth; anonymous when unset.
    #[serde(default)]
    pub user: Option<String>,
    /// Password for HTTP basic auth.
    #[serde(default)]
    pub password: Option<String>,
    /// Use https instead of http.
    #[serde(default)]
    pub secure: bool,
    /// Overall per-request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Timeout for establishing the TCP connection.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// User-Agent header sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    15
}

fn default_user_agent() -> String {
    format!("couch-client/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for SessionOptions {
    fn default() -> Self {
        SessionOptions {
            user: None,
            password: None,
            secure: false,
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

// ============ Session ============

/// An open connection to one server.
#[derive(Debug, Clone)]
pub struct Session {
    host: String,
    port: u16,
    secure: bool,
    user: Option<String>,
    password: Option<String>,
    client: Client,
    last_response: Arc<Mutex<Option<CouchResponse>>>,
}

impl Session {
    /// Connect anonymously over plain HTTP with default timeouts.
    pub fn new(host: &str, port: u16) -> Result<Self> {
        Self::with_options(host, port, SessionOptions::default())
    }

    /// Connect with HTTP basic auth credentials.
    pub fn with_auth(host: &str, port: u16, user: &str, password: &str) -> Result<Self> {
        Self::with_options(
            host,
            port,
            SessionOptions {
                user: Some(user.to_string()),
                password: Some(password.to_string()),
                ..SessionOptions::default()
            },
        )
    }

    /// Connect with explicit options.
    ///
    /// # Errors
    ///
    /// Fails when the HTTP client cannot be constructed (for example when
    /// no TLS backend is available and `secure` was requested).
    pub fn with_options(host: &str, port: u16, options: SessionOptions) -> Result<Self> {
        let client = Client::builder()
            .user_agent(options.user_agent.as_str())
            .timeout(Duration::from_secs(options.timeout_secs))
            .connect_timeout(Duration::from_secs(options.connect_timeout_secs))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Session {
            host: host.to_string(),
            port,
            secure: options.secure,
            user: options.user,
            password: options.password,
            client,
            last_response: Arc::new(Mutex::new(None)),
        })
    }

    /// Server host name.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Server port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Whether requests go over https.
    pub fn is_secure(&self) -> bool {
        self.secure
    }

    /// The outcome of the most recent exchange on this session, shared
    /// across clones. `None` until the first request goes out.
    pub fn last_response(&self) -> Option<CouchResponse> {
        match self.last_response.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    // ============ Transport ============

    /// Build the absolute URL for a server-relative path.
    ///
    /// The path is split on `/` and appended segment by segment, so ids with
    /// reserved characters are percent-encoded without mangling the `/` that
    /// separates `_design` from a design document name. The query string is
    /// attached verbatim; callers pre-encode values where the server needs
    /// them encoded.
    fn build_url(&self, path: &str, query: Option<&str>) -> Result<Url> {
        let scheme = if self.secure { "https" } else { "http" };
        let mut url = Url::parse(&format!("{}://{}:{}/", scheme, self.host, self.port))
            .with_context(|| format!("invalid server address {}:{}", self.host, self.port))?;
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("server URL cannot carry a path"))?
            .extend(path.split('/'));
        url.set_query(query);
        Ok(url)
    }

    /// Execute one exchange and record its outcome as the session's last
    /// response. Transport faults are folded into the returned
    /// [`CouchResponse`] instead of propagating.
    pub(crate) fn request(
        &self,
        method: &str,
        path: &str,
        query: Option<&str>,
        payload: Payload,
    ) -> CouchResponse {
        let shown_path = match query {
            Some(query) => format!("{}?{}", path, query),
            None => path.to_string(),
        };
        let resp = match self.execute(method, path, query, payload) {
            Ok((status, body)) => CouchResponse::classify(method, &shown_path, status, body),
            Err(err) => {
                CouchResponse::from_transport_fault(method, &shown_path, format!("{:#}", err))
            }
        };
        match self.last_response.lock() {
            Ok(mut guard) => *guard = Some(resp.clone()),
            Err(poisoned) => *poisoned.into_inner() = Some(resp.clone()),
        }
        resp
    }

    fn execute(
        &self,
        method: &str,
        path: &str,
        query: Option<&str>,
        payload: Payload,
    ) -> Result<(u16, String)> {
        let url = self.build_url(path, query)?;
        let mut req = match method {
            "GET" => self.client.get(url),
            "PUT" => self.client.put(url),
            "POST" => self.client.post(url),
            "DELETE" => self.client.delete(url),
            other => bail!("unsupported HTTP method '{}'", other),
        };
        if let Some(user) = &self.user {
            req = req.basic_auth(user, self.password.as_deref());
        }
        req = match payload {
            Payload::Empty => req,
            Payload::Json(body) => req.json(&body),
            Payload::Form(fields) => req.form(&fields),
            Payload::Raw { content_type, data } => {
                req.header("Content-Type", content_type).body(data)
            }
        };
        let resp = req.send()?;
        let status = resp.status().as_u16();
        let body = resp.text()?;
        Ok((status, body))
    }

    // ============ Server operations ============

    /// List the names of every database on the server.
    ///
    /// Returns an empty list (with a warning) when the server refuses.
    pub fn database_names(&self) -> Result<Vec<String>> {
        let resp = self.request("GET", "_all_dbs", None, Payload::Empty);
        if !resp.is_ok() {
            warn!("error listing databases: {}", resp.error_summary());
            return Ok(Vec::new());
        }
        let names = resp
            .json_array()
            .ok_or_else(|| anyhow::anyhow!("database listing is not a JSON array"))?;
        Ok(names
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect())
    }

    /// Fetch a handle to an existing database. `None` (with a warning) when
    /// it does not exist.
    pub fn database(&self, name: &str) -> Result<Option<Database>> {
        let resp = self.request("GET", name, None, Payload::Empty);
        if !resp.is_ok() {
            warn!("error getting database '{}': {}", name, resp.error_summary());
            return Ok(None);
        }
        let info = resp
            .json_object()
            .ok_or_else(|| anyhow::anyhow!("database info for '{}' is not a JSON object", name))?;
        Ok(Some(Database::from_info(&info, self.clone())?))
    }

    /// Create a database, then fetch a handle to it.
    ///
    /// The name is normalized to the server's rules first (lowercased,
    /// disallowed characters replaced with `_`, trailing `/` appended), so
    /// creating `"My DB"` creates `my_db/`. Creation failures (typically
    /// the database already existing) are logged and the fetch is attempted
    /// anyway, so calling this on an existing database hands back its handle.
    pub fn create_database(&self, name: &str) -> Result<Option<Database>> {
        let dbname = normalize_database_name(name);
        let resp = self.request("PUT", &dbname, None, Payload::Empty);
        if !resp.is_ok() {
            warn!("error creating database '{}': {}", dbname, resp.error_summary());
        }
        self.database(&dbname)
    }

    /// Delete a database. Returns false (with a warning) when the server
    /// refuses, for example because the database does not exist.
    pub fn delete_database(&self, name: &str) -> Result<bool> {
        let resp = self.request("DELETE", name, None, Payload::Empty);
        if resp.is_ok() {
            Ok(true)
        } else {
            warn!("error deleting database '{}': {}", name, resp.error_summary());
            Ok(false)
        }
    }

    /// List the tasks currently running on the server.
    ///
    /// Returns an empty list (with a warning) when the server refuses.
    pub fn active_tasks(&self) -> Result<Vec<ActiveTask>> {
        let resp = self.request("GET", "_active_tasks", None, Payload::Empty);
        if !resp.is_ok() {
            warn!("error listing active tasks: {}", resp.error_summary());
            return Ok(Vec::new());
        }
        let entries = resp
            .json_array()
            .ok_or_else(|| anyhow::anyhow!("active task listing is not a JSON array"))?;
        Ok(entries.iter().map(ActiveTask::from_json).collect())
    }

    /// Trigger a replication described by the given task.
    ///
    /// # Errors
    ///
    /// Fails when the task's source or target cannot be turned into a
    /// replication endpoint (see [`ReplicationTask::create_request`]).
    pub fn replicate(&self, task: &ReplicationTask) -> Result<bool> {
        let body = match task.create_request() {
            Some(body) => body,
            None => bail!("replication request could not be built from the task's endpoints"),
        };
        let resp = self.request("POST", "_replicate", None, Payload::Json(body));
        if !resp.is_ok() {
            warn!("error triggering replication: {}", resp.error_summary());
        }
        Ok(resp.is_ok())
    }
}

/// Rewrite a database name to the server's naming rules: lowercase letters,
/// digits, and `_$()+-/` survive, everything else becomes `_`, and a
/// trailing `/` is appended when absent.
fn normalize_database_name(name: &str) -> String {
    let mut normalized: String = name
        .to_lowercase()
        .chars()
        .map(|c| {
            if matches!(c, 'a'..='z' | '0'..='9' | '_' | '$' | '(' | ')' | '+' | '-' | '/') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if !normalized.ends_with('/') {
        normalized.push('/');
    }
    normalized
}
