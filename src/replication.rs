//! Replication descriptors: the endpoints a replication copies between, the
//! task that pairs them with its flags, and the `_active_tasks` entries the
//! server reports.
//!
//! Tasks come from two directions. Outbound, a task is built from two
//! [`ReplicationTarget`]s and serialized into the `_replicate` request body.
//! Inbound, the server describes a running replication with a free-form
//! status line (`<taskId> <sourceUrl> -> <destinationUrl>`) that is parsed
//! back into targets; a line that does not parse leaves the task without
//! endpoints rather than failing the listing.

use std::net::{IpAddr, ToSocketAddrs};

use log::{debug, error, warn};
use serde_json::{Map, Value};

// ============ Targets ============

/// One side of a replication: a database (or document path) that is either
/// local to the server executing the replication or on a remote host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicationTarget {
    entity: String,
    host: Option<String>,
    port: Option<u16>,
    remote: bool,
}

impl ReplicationTarget {
    /// A database local to the replicating server.
    pub fn local(entity: impl Into<String>) -> Self {
        ReplicationTarget {
            entity: entity.into(),
            host: None,
            port: None,
            remote: false,
        }
    }

    /// A database on another host. `port` of `None` means the host's
    /// default port.
    pub fn remote(entity: impl Into<String>, host: impl Into<String>, port: Option<u16>) -> Self {
        ReplicationTarget {
            entity: entity.into(),
            host: Some(host.into()),
            port,
            remote: true,
        }
    }

    /// Parse a target out of a status-line endpoint.
    ///
    /// Text without an `http://` or `https://` scheme is taken verbatim as a
    /// local entity. Otherwise the URL's host, port, and path become the
    /// target; exactly one leading and one trailing `/` are stripped from
    /// the path. A host that is (or resolves to) a loopback address makes
    /// the target local; failure to resolve is logged and the target is
    /// treated as local.
    ///
    /// Returns `None` when the text looks like a URL but does not parse.
    pub fn from_url(url: &str) -> Option<Self> {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Some(ReplicationTarget {
                entity: url.to_string(),
                host: None,
                port: None,
                remote: false,
            });
        }

        let parsed = match reqwest::Url::parse(url) {
            Ok(parsed) => parsed,
            Err(err) => {
                error!("failed to parse replication endpoint '{}': {}", url, err);
                return None;
            }
        };

        let mut entity = parsed.path();
        entity = entity.strip_prefix('/').unwrap_or(entity);
        entity = entity.strip_suffix('/').unwrap_or(entity);

        let host = parsed.host_str().map(str::to_string);
        let port = parsed.port();
        let remote = match &host {
            Some(host) => match host_is_loopback(host, port) {
                Some(loopback) => !loopback,
                None => {
                    warn!(
                        "could not resolve replication host '{}'; treating it as local",
                        host
                    );
                    false
                }
            },
            None => false,
        };

        let target = ReplicationTarget {
            entity: entity.to_string(),
            host,
            port,
            remote,
        };
        debug!("parsed replication endpoint: {:?}", target);
        Some(target)
    }

    /// The database or document path being replicated.
    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// Host of a remote target.
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    /// Explicit port of a remote target; `None` means the default.
    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// Whether this target lives on another host.
    pub fn is_remote(&self) -> bool {
        self.remote
    }

    /// Render the endpoint the way `_replicate` expects it: the bare entity
    /// for a local target, `http://host[:port]/entity` for a remote one.
    ///
    /// Returns `None` (error-logged) for a remote target without a host.
    pub fn build_url(&self) -> Option<String> {
        if !self.remote {
            return Some(self.entity.clone());
        }
        let host = match &self.host {
            Some(host) => host,
            None => {
                error!("remote replication target '{}' has no host", self.entity);
                return None;
            }
        };
        Some(match self.port {
            Some(port) => format!("http://{}:{}/{}", host, port, self.entity),
            None => format!("http://{}/{}", host, self.entity),
        })
    }
}

/// Whether the host is (or resolves to) a loopback address. `None` when it
/// is not an address literal and resolution fails.
fn host_is_loopback(host: &str, port: Option<u16>) -> Option<bool> {
    if let Ok(addr) = host.parse::<IpAddr>() {
        return Some(addr.is_loopback());
    }
    match (host, port.unwrap_or(5984)).to_socket_addrs() {
        Ok(mut addrs) => Some(addrs.any(|addr| addr.ip().is_loopback())),
        Err(_) => None,
    }
}

// ============ Tasks ============

/// A replication between two targets: either assembled locally for
/// submission, or reconstructed from a server-reported status line.
#[derive(Debug, Clone)]
pub struct ReplicationTask {
    task: Option<String>,
    status: Option<String>,
    pid: Option<String>,
    source: Option<ReplicationTarget>,
    destination: Option<ReplicationTarget>,
    continuous: bool,
    create_target: bool,
    cancel: bool,
}

impl ReplicationTask {
    /// A task ready for submission, copying from `source` to `destination`.
    pub fn new(source: ReplicationTarget, destination: ReplicationTarget) -> Self {
        ReplicationTask {
            task: None,
            status: None,
            pid: None,
            source: Some(source),
            destination: Some(destination),
            continuous: false,
            create_target: false,
            cancel: false,
        }
    }

    /// A task as reported by the server. The endpoints stay unset until
    /// [`load_details`](Self::load_details) parses the status line.
    pub fn from_status(task: &str, status: &str, pid: &str) -> Self {
        ReplicationTask {
            task: Some(task.to_string()),
            status: Some(status.to_string()),
            pid: Some(pid.to_string()),
            source: None,
            destination: None,
            continuous: false,
            create_target: false,
            cancel: false,
        }
    }

    /// The raw status line, when this task came from the server.
    pub fn task(&self) -> Option<&str> {
        self.task.as_deref()
    }

    /// The server's progress string for this task.
    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    /// The server process id running this task.
    pub fn pid(&self) -> Option<&str> {
        self.pid.as_deref()
    }

    /// Where documents are copied from.
    pub fn source(&self) -> Option<&ReplicationTarget> {
        self.source.as_ref()
    }

    /// Where documents are copied to.
    pub fn destination(&self) -> Option<&ReplicationTarget> {
        self.destination.as_ref()
    }

    /// Whether the replication keeps running after catching up.
    pub fn is_continuous(&self) -> bool {
        self.continuous
    }

    /// Keep the replication running after it catches up.
    pub fn set_continuous(&mut self, continuous: bool) {
        self.continuous = continuous;
    }

    /// Create the destination database when it does not exist.
    pub fn set_create_target(&mut self, create_target: bool) {
        self.create_target = create_target;
    }

    /// Cancel a running replication instead of starting one.
    pub fn set_cancel(&mut self, cancel: bool) {
        self.cancel = cancel;
    }

    /// Populate source and destination from the status line.
    ///
    /// The line is tokenized on whitespace and must have at least four
    /// tokens, `<taskId> <sourceUrl> -> <destinationUrl>`. Malformed lines
    /// are logged and reported as `false`, leaving the endpoints unset;
    /// this never errors, so one bad line cannot sink a task listing.
    pub fn load_details(&mut self) -> bool {
        let line = match &self.task {
            Some(line) => line,
            None => return false,
        };
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 4 {
            error!("unable to parse replication task: {}", line);
            return false;
        }
        match (
            ReplicationTarget::from_url(parts[1]),
            ReplicationTarget::from_url(parts[3]),
        ) {
            (Some(source), Some(destination)) => {
                self.source = Some(source);
                self.destination = Some(destination);
                true
            }
            _ => {
                error!(
                    "unable to extract source and destination from replication task: {}",
                    line
                );
                false
            }
        }
    }

    /// Serialize this task as a `_replicate` request body: `source` and
    /// `target`, plus `create_target`/`continuous`/`cancel` for whichever
    /// flags are set.
    ///
    /// Returns `None` (error-logged) when either endpoint is absent or
    /// cannot render a URL.
    pub fn create_request(&self) -> Option<Value> {
        let source = self.source.as_ref().and_then(ReplicationTarget::build_url);
        let destination = self
            .destination
            .as_ref()
            .and_then(ReplicationTarget::build_url);
        let (source, destination) = match (source, destination) {
            (Some(source), Some(destination)) => (source, destination),
            _ => {
                error!("unable to build source or destination URL");
                return None;
            }
        };

        let mut body = Map::new();
        body.insert("source".to_string(), Value::String(source));
        body.insert("target".to_string(), Value::String(destination));
        if self.create_target {
            body.insert("create_target".to_string(), Value::Bool(true));
        }
        if self.continuous {
            body.insert("continuous".to_string(), Value::Bool(true));
        }
        if self.cancel {
            body.insert("cancel".to_string(), Value::Bool(true));
        }
        Some(Value::Object(body))
    }
}

// ============ Active tasks ============

/// One entry from `_active_tasks`.
#[derive(Debug, Clone)]
pub enum ActiveTask {
    /// A running replication, with its status line parsed into endpoints
    /// where possible.
    Replication(ReplicationTask),
    /// Any other kind of task, carried verbatim.
    Other {
        task_type: Option<String>,
        task: Option<String>,
        status: Option<String>,
        pid: Option<String>,
    },
}

impl ActiveTask {
    /// Interpret one task entry. Entries whose `type` is `replication`
    /// (case-insensitive) get their status line parsed eagerly; a line that
    /// fails to parse leaves the endpoints unset without failing the batch.
    pub(crate) fn from_json(entry: &Value) -> Self {
        let field = |key: &str| {
            entry
                .get(key)
                .and_then(Value::as_str)
                .map(str::to_string)
        };
        let task_type = field("type");
        let task = field("task");
        let status = field("status");
        let pid = field("pid");

        let is_replication = task_type
            .as_deref()
            .is_some_and(|t| t.eq_ignore_ascii_case("replication"));
        if !is_replication {
            return ActiveTask::Other {
                task_type,
                task,
                status,
                pid,
            };
        }

        let mut replication = ReplicationTask {
            task,
            status,
            pid,
            source: None,
            destination: None,
            continuous: false,
            create_target: false,
            cancel: false,
        };
        replication.load_details();
        ActiveTask::Replication(replication)
    }
}
