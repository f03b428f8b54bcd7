use std::io::Read;
use std::net::TcpListener;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use couch_client::database::Database;
use couch_client::document::{Document, LoadState};
use couch_client::replication::{ActiveTask, ReplicationTarget, ReplicationTask};
use couch_client::session::Session;
use couch_client::update::Update;
use couch_client::view::View;
use serde_json::{json, Value};
use tiny_http::{Header, Response, Server};

/// One recorded exchange: method, URL (path plus query), request body.
type Exchange = (String, String, String);

/// A server that answers each request through the supplied routing closure
/// and records every exchange for later assertions.
struct MockCouch {
    server: Arc<Server>,
    port: u16,
    exchanges: Arc<Mutex<Vec<Exchange>>>,
    handle: Option<JoinHandle<()>>,
}

impl MockCouch {
    fn spawn<F>(handler: F) -> MockCouch
    where
        F: Fn(&str, &str, &str) -> (u16, String) + Send + 'static,
    {
        let _ = env_logger::builder().is_test(true).try_init();

        let server = Arc::new(Server::http("127.0.0.1:0").unwrap());
        let port = server.server_addr().to_ip().unwrap().port();
        let exchanges: Arc<Mutex<Vec<Exchange>>> = Arc::new(Mutex::new(Vec::new()));

        let thread_server = Arc::clone(&server);
        let thread_exchanges = Arc::clone(&exchanges);
        let handle = thread::spawn(move || {
            for mut rq in thread_server.incoming_requests() {
                let method = rq.method().as_str().to_string();
                let url = rq.url().to_string();
                let mut body = String::new();
                let _ = rq.as_reader().read_to_string(&mut body);
                thread_exchanges
                    .lock()
                    .unwrap()
                    .push((method.clone(), url.clone(), body.clone()));

                let (status, reply) = handler(&method, &url, &body);
                let response = Response::from_string(reply).with_status_code(status).with_header(
                    Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]).unwrap(),
                );
                let _ = rq.respond(response);
            }
        });

        MockCouch {
            server,
            port,
            exchanges,
            handle: Some(handle),
        }
    }

    fn session(&self) -> Session {
        Session::new("127.0.0.1", self.port).unwrap()
    }

    fn exchanges(&self) -> Vec<Exchange> {
        self.exchanges.lock().unwrap().clone()
    }
}

impl Drop for MockCouch {
    fn drop(&mut self) {
        self.server.unblock();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn accounts_info() -> (u16, String) {
    (
        200,
        json!({"db_name": "accounts", "doc_count": 3, "update_seq": 11}).to_string(),
    )
}

fn not_found() -> (u16, String) {
    (
        404,
        json!({"error": "not_found", "reason": "missing"}).to_string(),
    )
}

fn accounts(mock: &MockCouch) -> Database {
    mock.session()
        .database("accounts")
        .expect("database lookup failed")
        .expect("mock did not serve the database info")
}

// ============ Documents ============

#[test]
fn test_save_assigns_generated_id_and_rev() {
    let mock = MockCouch::spawn(|method, url, _| match (method, url) {
        ("GET", "/accounts") => accounts_info(),
        ("POST", "/accounts") => (
            201,
            json!({"ok": true, "id": "123BAC", "rev": "946B7D1C"}).to_string(),
        ),
        _ => not_found(),
    });
    let db = accounts(&mock);

    let mut doc = Document::new();
    doc.insert("owner", "miako");
    assert!(db.save_document(&mut doc).unwrap());
    assert_eq!(doc.id(), Some("123BAC"));
    assert_eq!(doc.rev(), Some("946B7D1C"));
    assert_eq!(doc.state(), LoadState::Full);

    let exchanges = mock.exchanges();
    assert_eq!(exchanges[1].0, "POST");
    assert_eq!(exchanges[1].1, "/accounts");
}

#[test]
fn test_save_with_explicit_id_puts_to_the_document_path() {
    let mock = MockCouch::spawn(|method, url, _| match (method, url) {
        ("GET", "/accounts") => accounts_info(),
        ("PUT", "/accounts/acct-7") => (
            201,
            json!({"ok": true, "id": "acct-7", "rev": "1-abc"}).to_string(),
        ),
        _ => not_found(),
    });
    let db = accounts(&mock);

    let mut doc = Document::new();
    doc.insert("owner", "miako");
    assert!(db.save_document_as(&mut doc, "acct-7").unwrap());
    assert_eq!(doc.id(), Some("acct-7"));
    assert_eq!(doc.rev(), Some("1-abc"));
}

#[test]
fn test_save_conflict_reports_failure_not_error() {
    let mock = MockCouch::spawn(|method, url, _| match (method, url) {
        ("GET", "/accounts") => accounts_info(),
        ("PUT", "/accounts/acct-7") => (
            409,
            json!({"error": "conflict", "reason": "Document update conflict."}).to_string(),
        ),
        _ => not_found(),
    });
    let db = accounts(&mock);
    let session = db.session().clone();

    let mut doc = Document::new();
    doc.set_id("acct-7");
    assert!(!db.save_document(&mut doc).unwrap());
    assert!(doc.rev().is_none(), "a refused save must not set a revision");

    let last = session.last_response().expect("an exchange was recorded");
    assert!(!last.is_ok());
    assert_eq!(last.error_id(), Some("conflict"));
    assert_eq!(last.error_reason(), Some("Document update conflict."));
}

#[test]
fn test_get_document_materializes_a_full_document() {
    let mock = MockCouch::spawn(|method, url, _| match (method, url) {
        ("GET", "/accounts") => accounts_info(),
        ("GET", "/accounts/acct-7") => (
            200,
            json!({"_id": "acct-7", "_rev": "1-abc", "owner": "miako"}).to_string(),
        ),
        _ => not_found(),
    });
    let db = accounts(&mock);

    let doc = db.get_document("acct-7").unwrap().expect("document exists");
    assert_eq!(doc.id(), Some("acct-7"));
    assert_eq!(doc.rev(), Some("1-abc"));
    assert_eq!(doc.get_str("owner").unwrap(), "miako");
    assert_eq!(doc.state(), LoadState::Full);
}

#[test]
fn test_get_missing_document_is_none() {
    let mock = MockCouch::spawn(|method, url, _| match (method, url) {
        ("GET", "/accounts") => accounts_info(),
        _ => not_found(),
    });
    let db = accounts(&mock);
    let session = db.session().clone();

    assert!(db.get_document("nope").unwrap().is_none());
    let last = session.last_response().unwrap();
    assert_eq!(last.status(), Some(404));
    assert_eq!(last.error_id(), Some("not_found"));
}

#[test]
fn test_delete_document_sends_the_revision() {
    let mock = MockCouch::spawn(|method, url, _| match (method, url) {
        ("GET", "/accounts") => accounts_info(),
        ("DELETE", "/accounts/acct-7?rev=1-abc") => (200, json!({"ok": true}).to_string()),
        _ => not_found(),
    });
    let db = accounts(&mock);

    let mut doc = Document::new();
    doc.set_id("acct-7");
    doc.set_rev("1-abc");
    assert!(db.delete_document(&doc).unwrap());
}

#[test]
fn test_delete_without_id_fails_before_any_request() {
    let mock = MockCouch::spawn(|method, url, _| match (method, url) {
        ("GET", "/accounts") => accounts_info(),
        _ => not_found(),
    });
    let db = accounts(&mock);

    assert!(db.delete_document(&Document::new()).is_err());
    assert_eq!(
        mock.exchanges().len(),
        1,
        "only the database lookup may hit the wire"
    );
}

#[test]
fn test_revisions_are_fetched_lazily_and_only_once() {
    let mock = MockCouch::spawn(|method, url, _| match (method, url) {
        ("GET", "/accounts") => accounts_info(),
        ("GET", "/accounts/acct-7") => (
            200,
            json!({"_id": "acct-7", "_rev": "2-def", "owner": "miako"}).to_string(),
        ),
        ("GET", "/accounts/acct-7?revs=true") => (
            200,
            json!({
                "_id": "acct-7",
                "_rev": "2-def",
                "owner": "miako",
                "_revisions": {"start": 2, "ids": ["def", "abc"]},
            })
            .to_string(),
        ),
        _ => not_found(),
    });
    let db = accounts(&mock);

    let mut doc = db.get_document("acct-7").unwrap().unwrap();
    let revisions = doc.revisions().unwrap();
    assert_eq!(revisions, vec!["def".to_string(), "abc".to_string()]);

    // The history is now part of the document; asking again must not refetch.
    doc.revisions().unwrap();
    assert_eq!(mock.exchanges().len(), 3);
}

#[test]
fn test_revision_history_grows_across_updates() {
    let writes = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&writes);
    let mock = MockCouch::spawn(move |method, url, _| match (method, url) {
        ("GET", "/accounts") => accounts_info(),
        ("PUT", "/accounts/acct-7") => {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            (
                201,
                json!({"ok": true, "id": "acct-7", "rev": format!("{}-r{}", n, n)}).to_string(),
            )
        }
        ("GET", "/accounts/acct-7?revs=true") => {
            let n = counter.load(Ordering::SeqCst);
            let ids: Vec<String> = (1..=n).rev().map(|i| format!("r{}", i)).collect();
            (
                200,
                json!({
                    "_id": "acct-7",
                    "_rev": format!("{}-r{}", n, n),
                    "_revisions": {"start": n, "ids": ids},
                })
                .to_string(),
            )
        }
        _ => not_found(),
    });
    let db = accounts(&mock);

    let mut doc = Document::new();
    doc.set_id("acct-7");
    doc.insert("owner", "miako");
    assert!(db.save_document(&mut doc).unwrap());

    let mut first = db.get_document_with_revisions("acct-7").unwrap().unwrap();
    assert_eq!(first.revisions().unwrap().len(), 1, "one rev after the first save");

    doc.insert("balance", 250);
    assert!(db.save_document(&mut doc).unwrap());

    let mut second = db.get_document_with_revisions("acct-7").unwrap().unwrap();
    assert_eq!(second.revisions().unwrap().len(), 2, "two revs after the update");
}

// ============ Bulk writes ============

#[test]
fn test_bulk_save_reconciles_positionally() {
    let mock = MockCouch::spawn(|method, url, _| match (method, url) {
        ("GET", "/accounts") => accounts_info(),
        ("POST", "/accounts/_bulk_docs") => (
            201,
            json!([
                {"id": "gen-1", "rev": "1-a"},
                {"id": "acct-1", "rev": "2-b"},
                {"id": "acct-2", "rev": "4-c"},
            ])
            .to_string(),
        ),
        _ => not_found(),
    });
    let db = accounts(&mock);

    let mut fresh = Document::new();
    fresh.insert("owner", "miako");
    let mut first = Document::new();
    first.set_id("acct-1");
    let mut second = Document::new();
    second.set_id("acct-2");

    let mut batch = [fresh, first, second];
    assert!(db.bulk_save(&mut batch).unwrap());

    assert_eq!(batch[0].id(), Some("gen-1"));
    assert_eq!(batch[0].rev(), Some("1-a"));
    assert_eq!(batch[1].rev(), Some("2-b"));
    assert_eq!(batch[2].rev(), Some("4-c"));

    let body: Value = serde_json::from_str(&mock.exchanges()[1].2).unwrap();
    assert_eq!(body["docs"].as_array().unwrap().len(), 3);
}

#[test]
fn test_bulk_save_length_mismatch_is_an_error() {
    let mock = MockCouch::spawn(|method, url, _| match (method, url) {
        ("GET", "/accounts") => accounts_info(),
        ("POST", "/accounts/_bulk_docs") => {
            (201, json!([{"id": "acct-1", "rev": "2-b"}]).to_string())
        }
        _ => not_found(),
    });
    let db = accounts(&mock);

    let mut first = Document::new();
    first.set_id("acct-1");
    let mut second = Document::new();
    second.set_id("acct-2");

    let mut batch = [first, second];
    let err = db.bulk_save(&mut batch).unwrap_err();
    assert!(
        err.to_string().contains("1 entries for 2 documents"),
        "unexpected error: {}",
        err
    );
}

// ============ Views ============

#[test]
fn test_named_view_returns_partial_rows() {
    let mock = MockCouch::spawn(|method, url, _| match (method, url) {
        ("GET", "/accounts") => accounts_info(),
        ("GET", "/accounts/_design/ledger/_view/by_owner") => (
            200,
            json!({
                "total_rows": 2,
                "offset": 0,
                "rows": [
                    {"id": "acct-1", "key": "miako", "value": 2},
                    {"id": "acct-2", "key": "miako", "value": 5},
                ],
            })
            .to_string(),
        ),
        _ => not_found(),
    });
    let db = accounts(&mock);

    let results = db
        .view_by_name("ledger/by_owner")
        .unwrap()
        .expect("view exists");
    assert_eq!(results.total_rows(), Some(2));
    assert_eq!(results.offset(), Some(0));

    let rows = results.rows();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].id(), Some("acct-1"));
    assert_eq!(rows[0].state(), LoadState::Partial);
}

#[test]
fn test_view_parameters_keep_their_fixed_order() {
    let mock = MockCouch::spawn(|method, url, _| match (method, url) {
        ("GET", "/accounts") => accounts_info(),
        _ if url.starts_with("/accounts/_all_docs") => (
            200,
            json!({"total_rows": 0, "offset": 0, "rows": []}).to_string(),
        ),
        _ => not_found(),
    });
    let db = accounts(&mock);

    db.all_design_documents().unwrap();
    assert_eq!(
        mock.exchanges()[1].1,
        "/accounts/_all_docs?startkey=%22_design%2F%22&endkey=%22_design0%22&include_docs=true"
    );

    db.all_documents_with_limit(10).unwrap();
    assert_eq!(mock.exchanges()[2].1, "/accounts/_all_docs?limit=10");
}

#[test]
fn test_all_documents_since_starts_from_the_sequence() {
    let mock = MockCouch::spawn(|method, url, _| match (method, url) {
        ("GET", "/accounts") => accounts_info(),
        ("GET", "/accounts/_all_docs_by_seq?startkey=11") => (
            200,
            json!({"total_rows": 0, "offset": 0, "rows": []}).to_string(),
        ),
        _ => not_found(),
    });
    let db = accounts(&mock);

    let results = db.all_documents_since(11).unwrap().expect("view answered");
    assert!(results.rows().is_empty());
}

#[test]
fn test_adhoc_view_posts_the_map_function() {
    let mock = MockCouch::spawn(|method, url, _| match (method, url) {
        ("GET", "/accounts") => accounts_info(),
        _ if url.starts_with("/accounts/_temp_view") => (
            200,
            json!({
                "total_rows": 1,
                "offset": 0,
                "rows": [{"id": "acct-1", "key": null, "value": null}],
            })
            .to_string(),
        ),
        _ => not_found(),
    });
    let db = accounts(&mock);

    let results = db
        .adhoc("function(doc) { emit(null, null); }")
        .unwrap()
        .expect("view answered");
    assert_eq!(results.rows().len(), 1);

    let body: Value = serde_json::from_str(&mock.exchanges()[1].2).unwrap();
    assert_eq!(
        body["map"].as_str().unwrap(),
        "function(doc) { emit(null, null); }"
    );

    // Filtering parameters apply to temporary views too.
    let mut narrowed = View::adhoc("function(doc) { emit(null, null); }");
    narrowed.set_limit(2);
    db.adhoc_view(&narrowed).unwrap();
    assert_eq!(mock.exchanges()[2].1, "/accounts/_temp_view?limit=2");
}

#[test]
fn test_rejected_view_is_none_and_recorded() {
    let mock = MockCouch::spawn(|method, url, _| match (method, url) {
        ("GET", "/accounts") => accounts_info(),
        _ => not_found(),
    });
    let db = accounts(&mock);
    let session = db.session().clone();

    assert!(db.view(&View::new("ledger/missing")).unwrap().is_none());
    assert_eq!(
        session.last_response().unwrap().error_id(),
        Some("not_found")
    );
}

// ============ Update handlers ============

#[test]
fn test_update_handler_put_carries_a_raw_query_string() {
    let mock = MockCouch::spawn(|method, url, _| match (method, url) {
        ("GET", "/accounts") => accounts_info(),
        ("PUT", "/accounts/_design/ledger/_update/bump/acct-7?amount=5&note=interest") => {
            (201, json!({"ok": true}).to_string())
        }
        _ => not_found(),
    });
    let db = accounts(&mock);

    let mut update = Update::with_doc_id("ledger/bump", "acct-7");
    update.add_parameter("amount", "5");
    update.add_parameter("note", "interest");
    assert!(db.update_document(&update).unwrap());
}

#[test]
fn test_update_handler_post_sends_form_fields() {
    let mock = MockCouch::spawn(|method, url, _| match (method, url) {
        ("GET", "/accounts") => accounts_info(),
        ("POST", "/accounts/_design/ledger/_update/bump/acct-7") => {
            (200, json!({"ok": true}).to_string())
        }
        _ => not_found(),
    });
    let db = accounts(&mock);

    let mut update = Update::with_doc_id("ledger/bump", "acct-7");
    update.set_method_post(true);
    update.add_parameter("amount", "5");
    update.add_parameter("note", "two words");
    assert!(db.update_document(&update).unwrap());

    let body = &mock.exchanges()[1].2;
    assert_eq!(body, "amount=5&note=two+words");
}

#[test]
fn test_update_handler_response_body_survives_failure() {
    let mock = MockCouch::spawn(|method, url, _| match (method, url) {
        ("GET", "/accounts") => accounts_info(),
        ("PUT", "/accounts/_design/ledger/_update/bump/acct-7") => {
            (500, "handler blew up".to_string())
        }
        _ => not_found(),
    });
    let db = accounts(&mock);

    let update = Update::with_doc_id("ledger/bump", "acct-7");
    assert!(!db.update_document(&update).unwrap());
    assert_eq!(
        db.update_document_with_response(&update).unwrap().as_deref(),
        Some("handler blew up")
    );
}

#[test]
fn test_update_handler_requires_a_document_id() {
    let mock = MockCouch::spawn(|method, url, _| match (method, url) {
        ("GET", "/accounts") => accounts_info(),
        _ => not_found(),
    });
    let db = accounts(&mock);

    assert!(db.update_document(&Update::new("ledger/bump")).is_err());
    assert_eq!(mock.exchanges().len(), 1);
}

// ============ Attachments and maintenance ============

#[test]
fn test_attachment_round_trip() {
    let mock = MockCouch::spawn(|method, url, _| match (method, url) {
        ("GET", "/accounts") => accounts_info(),
        ("PUT", "/accounts/acct-7/notes.txt") => (
            201,
            json!({"ok": true, "id": "acct-7", "rev": "2-def"}).to_string(),
        ),
        ("GET", "/accounts/acct-7/notes.txt") => (200, "hello".to_string()),
        _ => not_found(),
    });
    let db = accounts(&mock);

    db.put_attachment("acct-7", "notes.txt", "text/plain", "hello")
        .unwrap();
    assert_eq!(mock.exchanges()[1].2, "hello");

    let body = db.get_attachment("acct-7", "notes.txt").unwrap();
    assert_eq!(body.as_deref(), Some("hello"));
}

#[test]
fn test_compact_hands_back_the_raw_body() {
    let mock = MockCouch::spawn(|method, url, _| match (method, url) {
        ("GET", "/accounts") => accounts_info(),
        ("POST", "/accounts/_compact") => (202, json!({"ok": true}).to_string()),
        _ => not_found(),
    });
    let db = accounts(&mock);

    let body = db.compact().unwrap().expect("a body came back");
    assert!(body.contains(r#""ok":true"#), "unexpected body: {}", body);
}

// ============ Databases and the server ============

#[test]
fn test_create_database_normalizes_and_fetches() {
    let mock = MockCouch::spawn(|method, url, _| match (method, url) {
        ("PUT", "/my_db/") => (201, json!({"ok": true}).to_string()),
        ("GET", "/my_db/") => (
            200,
            json!({"db_name": "my_db", "doc_count": 0, "update_seq": 0}).to_string(),
        ),
        _ => not_found(),
    });
    let session = mock.session();

    let db = session
        .create_database("My DB")
        .unwrap()
        .expect("creation hands back a handle");
    assert_eq!(db.name(), "my_db");
    assert_eq!(db.doc_count(), 0);
}

#[test]
fn test_create_database_on_an_existing_one_still_hands_back_a_handle() {
    let mock = MockCouch::spawn(|method, url, _| match (method, url) {
        ("PUT", "/accounts/") => (
            412,
            json!({"error": "file_exists", "reason": "The database could not be created."})
                .to_string(),
        ),
        ("GET", "/accounts/") => accounts_info(),
        _ => not_found(),
    });
    let session = mock.session();

    let db = session.create_database("accounts").unwrap();
    assert_eq!(db.unwrap().name(), "accounts");
}

#[test]
fn test_database_names_lists_the_server() {
    let mock = MockCouch::spawn(|method, url, _| match (method, url) {
        ("GET", "/_all_dbs") => (200, json!(["accounts", "ledger"]).to_string()),
        _ => not_found(),
    });

    let names = mock.session().database_names().unwrap();
    assert_eq!(names, vec!["accounts".to_string(), "ledger".to_string()]);
}

#[test]
fn test_delete_database_reports_refusal() {
    let mock = MockCouch::spawn(|method, url, _| match (method, url) {
        ("DELETE", "/accounts") => (200, json!({"ok": true}).to_string()),
        _ => not_found(),
    });
    let session = mock.session();

    assert!(session.delete_database("accounts").unwrap());
    assert!(!session.delete_database("missing").unwrap());
}

// ============ Replication ============

#[test]
fn test_active_tasks_split_replications_from_the_rest() {
    let mock = MockCouch::spawn(|method, url, _| match (method, url) {
        ("GET", "/_active_tasks") => (
            200,
            json!([
                {
                    "type": "Replication",
                    "task": "e9db21: testDb -> http://10.11.12.13:5984/testDb/",
                    "status": "MR Processed source update #594",
                    "pid": "<0.201.0>",
                },
                {
                    "type": "Indexer",
                    "task": "accounts _design/ledger",
                    "status": "Processed 4 of 9 changes",
                    "pid": "<0.188.0>",
                },
            ])
            .to_string(),
        ),
        _ => not_found(),
    });

    let tasks = mock.session().active_tasks().unwrap();
    assert_eq!(tasks.len(), 2);
    match &tasks[0] {
        ActiveTask::Replication(task) => {
            assert_eq!(task.source().unwrap().entity(), "testDb");
            assert!(task.destination().unwrap().is_remote());
        }
        other => panic!("expected a replication task, got {:?}", other),
    }
    match &tasks[1] {
        ActiveTask::Other { task_type, .. } => {
            assert_eq!(task_type.as_deref(), Some("Indexer"));
        }
        other => panic!("expected a generic task, got {:?}", other),
    }
}

#[test]
fn test_replicate_submits_the_request_body() {
    let mock = MockCouch::spawn(|method, url, _| match (method, url) {
        ("POST", "/_replicate") => (200, json!({"ok": true}).to_string()),
        _ => not_found(),
    });
    let session = mock.session();

    let mut task = ReplicationTask::new(
        ReplicationTarget::local("accounts"),
        ReplicationTarget::remote("accounts", "10.11.12.13", Some(5984)),
    );
    task.set_create_target(true);
    assert!(session.replicate(&task).unwrap());

    let body: Value = serde_json::from_str(&mock.exchanges()[0].2).unwrap();
    assert_eq!(body["source"], "accounts");
    assert_eq!(body["target"], "http://10.11.12.13:5984/accounts");
    assert_eq!(body["create_target"], true);
    assert!(body.get("continuous").is_none());
}

#[test]
fn test_replicate_rejects_a_task_without_endpoints() {
    let mock = MockCouch::spawn(|_, _, _| not_found());
    let session = mock.session();

    let task = ReplicationTask::from_status("garbled", "status", "<0.1.0>");
    assert!(session.replicate(&task).is_err());
    assert!(mock.exchanges().is_empty());
}

// ============ Transport faults ============

#[test]
fn test_transport_fault_is_folded_into_the_outcome() {
    // Bind and immediately drop a listener so the port refuses connections.
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let session = Session::new("127.0.0.1", port).unwrap();
    let names = session.database_names().unwrap();
    assert!(names.is_empty());

    let last = session.last_response().expect("the fault was recorded");
    assert!(!last.is_ok());
    assert_eq!(last.error_id(), Some("exception"));
    assert!(last.status().is_none());
    assert!(last.error_reason().is_some());
}
