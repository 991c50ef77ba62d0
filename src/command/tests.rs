use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tempfile::tempdir;
use tokio::sync::mpsc::{self, UnboundedReceiver};

use super::parser::{Command, parse};
use super::{Dispatcher, Outcome};
use crate::broker::Broker;
use crate::broker::engine::lock;
use crate::client::{Client, Issuer};
use crate::persistence::{JsonFileStore, Snapshot, SnapshotStore};
use crate::utils::error::{BrokerError, PersistenceError};

#[derive(Debug, Default)]
struct MemoryStore {
    files: Mutex<HashMap<PathBuf, Snapshot>>,
}

impl SnapshotStore for MemoryStore {
    async fn save(&self, path: &Path, snapshot: &Snapshot) -> Result<(), PersistenceError> {
        self.files
            .lock()
            .unwrap()
            .insert(path.to_path_buf(), snapshot.clone());
        Ok(())
    }

    async fn load(&self, path: &Path) -> Result<Snapshot, PersistenceError> {
        self.files
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| PersistenceError::Io {
                path: path.to_path_buf(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            })
    }
}

fn dispatcher() -> Dispatcher<MemoryStore> {
    Dispatcher::new(Broker::default().into_shared(), MemoryStore::default())
}

fn connect<S: SnapshotStore>(dispatcher: &Dispatcher<S>) -> (Issuer, UnboundedReceiver<String>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let client = Client::new(tx);
    let issuer = Issuer::Client(client.id.clone());
    lock(dispatcher.broker()).connect(client).unwrap();
    (issuer, rx)
}

async fn reply<S: SnapshotStore>(dispatcher: &Dispatcher<S>, issuer: &Issuer, line: &str) -> String {
    dispatcher.dispatch(issuer, line).await.text().to_string()
}

#[test]
fn test_parse_joins_topic_tokens_with_single_spaces() {
    assert_eq!(
        parse("add  build   finished ").unwrap(),
        Command::Add("build finished".into())
    );
    assert_eq!(parse("sub deploy").unwrap(), Command::Sub("deploy".into()));
}

#[test]
fn test_parse_file_commands_take_second_token_only() {
    assert_eq!(
        parse("save topics.json extra").unwrap(),
        Command::Save(PathBuf::from("topics.json"))
    );
    assert_eq!(
        parse("load /tmp/t.json").unwrap(),
        Command::Load(PathBuf::from("/tmp/t.json"))
    );
}

#[test]
fn test_parse_trigger_forms() {
    assert_eq!(parse("trigger").unwrap(), Command::Trigger(None));
    assert_eq!(
        parse("trigger deploy prod").unwrap(),
        Command::Trigger(Some("deploy prod".into()))
    );
}

#[test]
fn test_parse_rejects_unknown_and_blank_lines() {
    assert!(matches!(
        parse("publish x"),
        Err(BrokerError::UnrecognizedCommand(_))
    ));
    assert!(matches!(parse("   "), Err(BrokerError::UnrecognizedCommand(_))));
    assert!(matches!(parse("ADD x"), Err(BrokerError::UnrecognizedCommand(_))));
}

#[test]
fn test_parse_missing_arguments() {
    assert!(matches!(parse("add"), Err(BrokerError::MissingArgument("add"))));
    assert!(matches!(parse("save"), Err(BrokerError::MissingArgument("save"))));
}

#[tokio::test]
async fn test_add_twice_reports_already_exists() {
    let d = dispatcher();
    assert_eq!(reply(&d, &Issuer::Console, "add deploy").await, "ok: topic 'deploy' added");
    assert_eq!(
        reply(&d, &Issuer::Console, "add deploy").await,
        "info: topic 'deploy' already exists"
    );
    assert_eq!(lock(d.broker()).topics().len(), 1);
}

#[tokio::test]
async fn test_remove_is_idempotent() {
    let d = dispatcher();
    reply(&d, &Issuer::Console, "add deploy").await;
    assert_eq!(
        reply(&d, &Issuer::Console, "remove deploy").await,
        "ok: topic 'deploy' removed"
    );
    assert_eq!(
        reply(&d, &Issuer::Console, "remove deploy").await,
        "ok: topic 'deploy' was not registered"
    );
}

#[tokio::test]
async fn test_list_tracks_subscribers_through_disconnect() {
    let d = dispatcher();
    let (h1, _rx1) = connect(&d);
    let (h2, _rx2) = connect(&d);

    reply(&d, &Issuer::Console, "add deploy").await;
    assert_eq!(reply(&d, &h1, "sub deploy").await, "ok: subscribed to 'deploy'");
    reply(&d, &h2, "sub deploy").await;
    assert_eq!(
        reply(&d, &h1, "list deploy").await,
        "ok: 'deploy' has 2 subscriber(s)"
    );

    let Issuer::Client(id1) = &h1 else { unreachable!() };
    assert!(lock(d.broker()).disconnect(id1));

    assert_eq!(
        reply(&d, &h2, "list deploy").await,
        "ok: 'deploy' has 1 subscriber(s)"
    );
}

#[tokio::test]
async fn test_sub_after_disconnect_leaves_no_entry() {
    let d = dispatcher();
    let (h1, _rx1) = connect(&d);
    let (h2, _rx2) = connect(&d);
    reply(&d, &Issuer::Console, "add deploy").await;

    let Issuer::Client(id1) = &h1 else { unreachable!() };
    assert!(lock(d.broker()).disconnect(id1));

    assert_eq!(
        reply(&d, &h1, "sub deploy").await,
        format!("error: '{id1}' is not connected")
    );
    assert_eq!(
        reply(&d, &h2, "list deploy").await,
        "info: no subscriptions recorded for 'deploy'"
    );
    assert_eq!(reply(&d, &h2, "clients").await, "ok: 1 client(s) connected");
}

#[tokio::test]
async fn test_sub_to_missing_topic_creates_no_entry() {
    let d = dispatcher();
    let (h1, _rx) = connect(&d);

    assert_eq!(
        reply(&d, &h1, "sub missing-topic").await,
        "error: topic 'missing-topic' does not exist"
    );
    assert_eq!(lock(d.broker()).subscriber_count("missing-topic"), None);
    assert_eq!(
        reply(&d, &h1, "list missing-topic").await,
        "info: no subscriptions recorded for 'missing-topic'"
    );
}

#[tokio::test]
async fn test_duplicate_sub_and_double_unsub() {
    let d = dispatcher();
    let (h1, _rx) = connect(&d);
    reply(&d, &Issuer::Console, "add deploy").await;

    reply(&d, &h1, "sub deploy").await;
    assert_eq!(reply(&d, &h1, "sub deploy").await, "ok: already subscribed to 'deploy'");
    assert_eq!(reply(&d, &h1, "unsub deploy").await, "ok: unsubscribed from 'deploy'");
    assert_eq!(reply(&d, &h1, "unsub deploy").await, "info: not subscribed to 'deploy'");
    assert_eq!(
        reply(&d, &h1, "list deploy").await,
        "ok: 'deploy' has 0 subscriber(s)"
    );
}

#[tokio::test]
async fn test_ask_lists_topics() {
    let d = dispatcher();
    let (h1, _rx) = connect(&d);
    assert_eq!(reply(&d, &h1, "ask").await, "ok: no topics");
    reply(&d, &h1, "add b").await;
    reply(&d, &h1, "add a").await;
    assert_eq!(reply(&d, &h1, "ask").await, "ok: topics: a, b");
}

#[tokio::test]
async fn test_trigger_reaches_every_client_once_despite_closed_one() {
    let d = dispatcher();
    let (_h1, mut rx1) = connect(&d);
    let (_h2, rx2) = connect(&d);
    reply(&d, &Issuer::Console, "add deploy").await;

    // second client's socket is closing
    drop(rx2);

    assert_eq!(
        reply(&d, &Issuer::Console, "trigger").await,
        "ok: trigger delivered to 1 client(s), 1 failed"
    );
    assert_eq!(rx1.try_recv().unwrap(), "topics available: deploy");
    assert!(rx1.try_recv().is_err());
}

#[tokio::test]
async fn test_trigger_with_topic_only_reaches_subscribers() {
    let d = dispatcher();
    let (h1, mut rx1) = connect(&d);
    let (_h2, mut rx2) = connect(&d);
    reply(&d, &Issuer::Console, "add deploy").await;
    reply(&d, &h1, "sub deploy").await;

    assert_eq!(
        reply(&d, &Issuer::Console, "trigger deploy").await,
        "ok: trigger delivered to 1 client(s)"
    );
    assert_eq!(rx1.try_recv().unwrap(), "event 'deploy' triggered");
    assert!(rx2.try_recv().is_err());

    assert_eq!(
        reply(&d, &Issuer::Console, "trigger nope").await,
        "error: topic 'nope' does not exist"
    );
}

#[tokio::test]
async fn test_operator_commands_refused_for_network_clients() {
    let d = dispatcher();
    let (h1, _rx) = connect(&d);
    let mut shutdown = d.shutdown_signal();

    assert_eq!(
        reply(&d, &h1, "exit").await,
        "error: 'exit' is only available from the operator console"
    );
    assert_eq!(
        reply(&d, &h1, "all").await,
        "error: 'all' is only available from the operator console"
    );
    assert!(!d.is_shutting_down());

    assert_eq!(reply(&d, &Issuer::Console, "exit").await, "ok: shutting down");
    assert!(shutdown.has_changed().unwrap());
    assert!(*shutdown.borrow_and_update());
}

#[tokio::test]
async fn test_all_dumps_state_for_console() {
    let d = dispatcher();
    let (h1, _rx) = connect(&d);
    reply(&d, &Issuer::Console, "add deploy").await;
    reply(&d, &h1, "sub deploy").await;
    reply(&d, &Issuer::Console, "remove deploy").await;

    let dump = reply(&d, &Issuer::Console, "all").await;
    assert!(dump.starts_with("ok: state\ntopics (0):"));
    assert!(dump.contains("deploy [removed]"));
    assert!(dump.contains("clients (1):"));
}

#[tokio::test]
async fn test_console_cannot_subscribe_or_disconnect() {
    let d = dispatcher();
    reply(&d, &Issuer::Console, "add deploy").await;
    assert_eq!(
        reply(&d, &Issuer::Console, "sub deploy").await,
        "error: 'sub' needs a network connection"
    );
    assert_eq!(
        d.dispatch(&Issuer::Console, "disconnect").await,
        Outcome::Reply("error: 'disconnect' needs a network connection".into())
    );
}

#[tokio::test]
async fn test_disconnect_purges_and_closes() {
    let d = dispatcher();
    let (h1, _rx) = connect(&d);
    reply(&d, &Issuer::Console, "add deploy").await;
    reply(&d, &h1, "sub deploy").await;

    assert_eq!(
        d.dispatch(&h1, "disconnect").await,
        Outcome::Close("ok: goodbye".into())
    );
    let broker = lock(d.broker());
    assert_eq!(broker.connected_count(), 0);
    assert_eq!(broker.subscriber_count("deploy"), Some(0));
}

#[tokio::test]
async fn test_clients_reports_connected_count() {
    let d = dispatcher();
    let (h1, _rx1) = connect(&d);
    let (_h2, _rx2) = connect(&d);
    assert_eq!(reply(&d, &h1, "clients").await, "ok: 2 client(s) connected");
}

#[tokio::test]
async fn test_unrecognized_command_is_reported() {
    let d = dispatcher();
    let (h1, _rx) = connect(&d);
    assert_eq!(
        reply(&d, &h1, "publish x").await,
        "error: unrecognized command: 'publish x'"
    );
}

#[tokio::test]
async fn test_load_replaces_registry_wholesale() {
    let d = dispatcher();
    reply(&d, &Issuer::Console, "add a").await;
    reply(&d, &Issuer::Console, "add b").await;
    assert_eq!(
        reply(&d, &Issuer::Console, "save snap").await,
        "ok: saved 2 topic(s) to snap"
    );

    reply(&d, &Issuer::Console, "remove a").await;
    reply(&d, &Issuer::Console, "add c").await;
    assert_eq!(
        reply(&d, &Issuer::Console, "load snap").await,
        "ok: loaded 2 topic(s) from snap"
    );
    assert_eq!(reply(&d, &Issuer::Console, "ask").await, "ok: topics: a, b");
}

#[tokio::test]
async fn test_load_failure_keeps_current_registry() {
    let d = dispatcher();
    reply(&d, &Issuer::Console, "add a").await;
    let response = reply(&d, &Issuer::Console, "load missing").await;
    assert!(response.starts_with("error: failed to access 'missing'"));
    assert_eq!(reply(&d, &Issuer::Console, "ask").await, "ok: topics: a");
}

#[tokio::test]
async fn test_save_and_load_through_json_files() {
    let dir = tempdir().unwrap();
    let d = Dispatcher::new(
        Broker::default().into_shared(),
        JsonFileStore::new(dir.path()),
    );
    let (h1, _rx) = connect(&d);

    reply(&d, &h1, "add deploy").await;
    reply(&d, &h1, "sub deploy").await;
    reply(&d, &h1, "save topics.json").await;
    reply(&d, &h1, "remove deploy").await;

    assert_eq!(
        reply(&d, &h1, "load topics.json").await,
        "ok: loaded 1 topic(s) from topics.json"
    );
    assert!(lock(d.broker()).topic_exists("deploy"));
}
