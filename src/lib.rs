//! # Couch Client
//!
//! A synchronous client for CouchDB-style document databases.
//!
//! Couch Client speaks the plain HTTP/JSON protocol: documents are schemaless
//! JSON objects addressed by id and revision, views are map functions living
//! in design documents, and every exchange is interpreted through a fixed
//! verb/status table so callers see one consistent outcome shape. On top of
//! that sit bulk writes, update handlers, attachments, and replication task
//! management.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────┐   ┌──────────┐   ┌─────────────┐
//! │ Session │──▶│ Database │──▶│   Server    │
//! │  (HTTP) │   │  (paths) │   │ (HTTP/JSON) │
//! └────┬────┘   └──────────┘   └──────┬──────┘
//!      │                              │
//!      │       ┌───────────────┐      │
//!      └──────▶│ CouchResponse │◀─────┘
//!              │ (verb/status) │
//!              └───────┬───────┘
//!                      ▼
//!       Document · ViewResults · ActiveTask
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! # fn main() -> anyhow::Result<()> {
//! use couch_client::document::Document;
//! use couch_client::session::Session;
//!
//! let session = Session::new("localhost", 5984)?;
//! let db = session
//!     .create_database("accounts")?
//!     .ok_or_else(|| anyhow::anyhow!("database unavailable"))?;
//!
//! let mut doc = Document::new();
//! doc.insert("owner", "miako");
//! db.save_document(&mut doc)?;
//! println!("saved {} at revision {:?}", doc.id().unwrap(), doc.rev());
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`session`] | Server connection, URL building, server-level operations |
//! | [`database`] | Document CRUD, views, bulk writes, update handlers |
//! | [`document`] | Document identity, revisions, lazy loading |
//! | [`view`] | View descriptors and query building |
//! | [`view_results`] | Rows of a view response |
//! | [`update`] | Update handler invocations |
//! | [`replication`] | Replication targets, tasks, active task listing |
//! | [`response`] | Verb/status response classification |

pub mod database;
pub mod document;
pub mod replication;
pub mod response;
pub mod session;
pub mod update;
pub mod view;
pub mod view_results;
