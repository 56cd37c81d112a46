//! Engine integration tests against a scripted mock port, run under paused
//! tokio time so debounce windows and staleness TTLs are deterministic.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::{mpsc, oneshot};
use tokio::time;

use huddle_common::{
    ChangeEvent, ChangeOp, Notification, QueryIdentity, Severity, SyncError, Table, TaskStatus,
};
use huddle_sync::{
    AuthIdentity, ChangeFilter, ChangeSubscription, MutationOp, RemoteAccessPort, Scope,
    ScopeKind, SyncEngine,
};

// ---------------------------------------------------------------------------
// Mock port
// ---------------------------------------------------------------------------

struct Scripted {
    result: Result<Value, SyncError>,
    gate: Option<oneshot::Receiver<()>>,
}

#[derive(Default)]
struct SubState {
    next_id: u64,
    senders: HashMap<u64, mpsc::UnboundedSender<ChangeEvent>>,
    max_concurrent: usize,
}

/// Scripted in-process stand-in for the remote service.
#[derive(Default)]
struct MockPort {
    defaults: Mutex<HashMap<String, Value>>,
    scripts: Mutex<HashMap<String, VecDeque<Scripted>>>,
    subscribe_gate: Mutex<Option<oneshot::Receiver<()>>>,
    call_log: Mutex<Vec<String>>,
    sub_log: Mutex<Vec<String>>,
    subs: Mutex<SubState>,
}

impl MockPort {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Set the standing response for a procedure.
    fn respond(&self, procedure: &str, value: Value) {
        self.defaults.lock().unwrap().insert(procedure.into(), value);
    }

    /// Queue a one-shot scripted response consumed before the default.
    fn script(&self, procedure: &str, result: Result<Value, SyncError>) {
        self.scripts
            .lock()
            .unwrap()
            .entry(procedure.into())
            .or_default()
            .push_back(Scripted { result, gate: None });
    }

    /// Queue a scripted response that is held until the returned sender
    /// fires.
    fn script_gated(
        &self,
        procedure: &str,
        result: Result<Value, SyncError>,
    ) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.scripts
            .lock()
            .unwrap()
            .entry(procedure.into())
            .or_default()
            .push_back(Scripted { result, gate: Some(rx) });
        tx
    }

    /// Hold the next `subscribe_changes` call until the sender fires.
    fn gate_next_subscribe(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.subscribe_gate.lock().unwrap() = Some(rx);
        tx
    }

    fn call_count(&self, procedure: &str) -> usize {
        self.call_log.lock().unwrap().iter().filter(|c| c.as_str() == procedure).count()
    }

    fn sub_log(&self) -> Vec<String> {
        self.sub_log.lock().unwrap().clone()
    }

    fn active_subscriptions(&self) -> usize {
        self.subs.lock().unwrap().senders.len()
    }

    fn max_concurrent_subscriptions(&self) -> usize {
        self.subs.lock().unwrap().max_concurrent
    }

    /// Deliver a change event on every open subscription.
    fn send_event(&self, event: ChangeEvent) {
        for sender in self.subs.lock().unwrap().senders.values() {
            let _ = sender.send(event.clone());
        }
    }
}

#[async_trait]
impl RemoteAccessPort for MockPort {
    async fn call(&self, procedure: &str, _params: Value) -> Result<Value, SyncError> {
        self.call_log.lock().unwrap().push(procedure.into());
        let scripted = {
            let mut scripts = self.scripts.lock().unwrap();
            scripts.get_mut(procedure).and_then(|queue| queue.pop_front())
        };
        if let Some(scripted) = scripted {
            if let Some(gate) = scripted.gate {
                let _ = gate.await;
            }
            return scripted.result;
        }
        Ok(self.defaults.lock().unwrap().get(procedure).cloned().unwrap_or(Value::Null))
    }

    async fn mutate(
        &self,
        table: Table,
        op: MutationOp,
        _payload: Value,
        _filter: Value,
    ) -> Result<Value, SyncError> {
        self.call_log.lock().unwrap().push(format!("mutate:{table:?}:{op:?}"));
        Ok(json!({ "id": "row-1" }))
    }

    async fn subscribe_changes(
        &self,
        _filters: Vec<ChangeFilter>,
    ) -> Result<ChangeSubscription, SyncError> {
        let gate = self.subscribe_gate.lock().unwrap().take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        let (id, events) = {
            let mut subs = self.subs.lock().unwrap();
            subs.next_id += 1;
            let id = subs.next_id;
            let (tx, rx) = mpsc::unbounded_channel();
            subs.senders.insert(id, tx);
            subs.max_concurrent = subs.max_concurrent.max(subs.senders.len());
            (id, rx)
        };
        self.sub_log.lock().unwrap().push(format!("subscribe:{id}"));
        Ok(ChangeSubscription { id, events })
    }

    async fn unsubscribe(&self, subscription_id: u64) {
        self.subs.lock().unwrap().senders.remove(&subscription_id);
        self.sub_log.lock().unwrap().push(format!("unsubscribe:{subscription_id}"));
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

fn task_row(id: &str, status: &str) -> Value {
    json!({
        "id": id,
        "project_id": "p1",
        "title": format!("task {id}"),
        "status": status,
        "created_by": "u1",
    })
}

fn chat_row(id: &str, created_at: u64) -> Value {
    json!({
        "id": id,
        "project_id": "p1",
        "author_id": "u2",
        "content": format!("message {id}"),
        "created_at": created_at,
    })
}

fn project_defaults(port: &MockPort) {
    port.respond("get_project_detail", json!({ "id": "p1", "name": "Apollo" }));
    port.respond("list_project_members", json!([]));
    port.respond("list_project_tasks", json!([task_row("t1", "TODO")]));
    port.respond("list_project_notes", json!([]));
    port.respond("list_chat_messages", json!([chat_row("m1", 10)]));
    port.respond("list_mentor_requests", json!([]));
}

fn task_event() -> ChangeEvent {
    ChangeEvent { table: Table::Tasks, op: ChangeOp::Update, row_id: "t1".into(), new_row: None }
}

fn task_list() -> QueryIdentity {
    QueryIdentity::TaskList { project_id: "p1".into() }
}

fn engine(port: &Arc<MockPort>) -> SyncEngine<MockPort> {
    // Opt-in log output for debugging: RUST_LOG=huddle_sync=trace.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
    SyncEngine::new(Arc::clone(port), AuthIdentity::signed_in("u1"))
}

/// Let spawned tasks run without advancing the paused clock.
async fn settle() {
    for _ in 0..25 {
        tokio::task::yield_now().await;
    }
}

async fn open_project(engine: &SyncEngine<MockPort>) {
    engine.activate(Scope::Project { project_id: "p1".into() }).await.unwrap();
    settle().await;
}

// ---------------------------------------------------------------------------
// Fetch executor
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn initial_fetch_populates_cache() {
    let port = MockPort::new();
    project_defaults(&port);
    let engine = engine(&port);

    open_project(&engine).await;

    let snapshot = engine.snapshot(&task_list());
    let tasks = snapshot.data.unwrap();
    assert_eq!(tasks.as_tasks().unwrap().len(), 1);
    assert!(!snapshot.is_loading);
    assert_eq!(port.call_count("list_project_tasks"), 1);
}

#[tokio::test(start_paused = true)]
async fn concurrent_runs_share_one_remote_call() {
    let port = MockPort::new();
    let release = port.script_gated("list_project_tasks", Ok(json!([task_row("t1", "TODO")])));
    let engine = engine(&port);

    let id = task_list();
    let first = tokio::spawn({
        let engine = engine.clone();
        let id = id.clone();
        async move { engine.run(&id, false).await }
    });
    let second = tokio::spawn({
        let engine = engine.clone();
        let id = id.clone();
        async move { engine.run(&id, false).await }
    });
    settle().await;

    assert_eq!(port.call_count("list_project_tasks"), 1, "second run must attach, not refetch");

    release.send(()).unwrap();
    let first = first.await.unwrap().unwrap();
    let second = second.await.unwrap().unwrap();
    assert_eq!(first, second);
    assert_eq!(port.call_count("list_project_tasks"), 1);
}

#[tokio::test(start_paused = true)]
async fn fresh_entry_is_served_without_a_remote_call() {
    let port = MockPort::new();
    project_defaults(&port);
    let engine = engine(&port);
    open_project(&engine).await;
    assert_eq!(port.call_count("list_project_tasks"), 1);

    engine.run(&task_list(), false).await.unwrap();
    assert_eq!(port.call_count("list_project_tasks"), 1, "fresh entry must come from cache");

    // Past the task-list TTL the entry is stale and refetched.
    time::advance(Duration::from_secs(61)).await;
    engine.run(&task_list(), false).await.unwrap();
    assert_eq!(port.call_count("list_project_tasks"), 2);
}

#[tokio::test(start_paused = true)]
async fn superseded_fetch_result_is_discarded() {
    let port = MockPort::new();
    project_defaults(&port);
    let engine = engine(&port);

    // The initial fetch is held; a forced refetch completes first with the
    // newer list.
    let release = port.script_gated("list_project_tasks", Ok(json!([task_row("t1", "TODO")])));
    engine.activate(Scope::Project { project_id: "p1".into() }).await.unwrap();
    settle().await;

    port.respond("list_project_tasks", json!([task_row("t1", "IN_PROGRESS"), task_row("t2", "TODO")]));
    engine.refetch(&task_list()).await.unwrap();

    // The held (older) fetch now completes and must not clobber the newer
    // result.
    release.send(()).unwrap();
    settle().await;

    let snapshot = engine.snapshot(&task_list());
    let tasks = snapshot.data.unwrap();
    assert_eq!(tasks.as_tasks().unwrap().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn failed_refetch_keeps_stale_data_and_notifies() {
    let port = MockPort::new();
    project_defaults(&port);
    let engine = engine(&port);
    let mut notifications = engine.notifications();
    open_project(&engine).await;

    port.script("list_project_tasks", Err(SyncError::remote("connection reset")));
    let err = engine.refetch(&task_list()).await.unwrap_err();
    assert!(matches!(err, SyncError::RemoteCall { .. }));
    settle().await;

    let snapshot = engine.snapshot(&task_list());
    assert!(snapshot.data.is_some(), "stale data must survive a failed refetch");
    assert!(snapshot.error.as_deref().unwrap().contains("connection reset"));

    let notification: Notification = notifications.try_recv().unwrap();
    assert_eq!(notification.severity, Severity::Error);
    assert!(notification.message.contains("connection reset"));
}

// ---------------------------------------------------------------------------
// Invalidation coalescer
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn event_burst_collapses_into_one_refetch_timed_from_last_event() {
    let port = MockPort::new();
    project_defaults(&port);
    let engine = engine(&port);
    open_project(&engine).await;
    assert_eq!(port.call_count("list_project_tasks"), 1);

    port.respond("list_project_tasks", json!([task_row("t1", "IN_PROGRESS"), task_row("t2", "TODO")]));

    // Three events spaced inside the window.
    port.send_event(task_event());
    settle().await;
    time::advance(Duration::from_millis(300)).await;
    port.send_event(task_event());
    settle().await;
    time::advance(Duration::from_millis(300)).await;
    port.send_event(task_event());
    settle().await;

    // 999 ms after the last event: window not yet elapsed.
    time::advance(Duration::from_millis(999)).await;
    settle().await;
    assert_eq!(port.call_count("list_project_tasks"), 1, "refetch must wait for the trailing edge");

    time::advance(Duration::from_millis(2)).await;
    settle().await;
    assert_eq!(port.call_count("list_project_tasks"), 2, "burst must collapse into one refetch");

    // The refetched entry reflects the remote state exactly.
    let snapshot = engine.snapshot(&task_list());
    let tasks = snapshot.data.unwrap();
    let statuses: Vec<_> = tasks
        .as_tasks()
        .unwrap()
        .iter()
        .map(|t| (t.id.as_str(), t.status))
        .collect();
    assert_eq!(
        statuses,
        vec![("t1", TaskStatus::InProgress), ("t2", TaskStatus::Todo)]
    );
}

#[tokio::test(start_paused = true)]
async fn distinct_identities_debounce_independently() {
    let port = MockPort::new();
    project_defaults(&port);
    let engine = engine(&port);
    open_project(&engine).await;

    port.send_event(task_event());
    settle().await;
    time::advance(Duration::from_millis(600)).await;
    port.send_event(ChangeEvent {
        table: Table::Notes,
        op: ChangeOp::Insert,
        row_id: "n1".into(),
        new_row: None,
    });
    settle().await;

    // Task deadline (t=1000) elapses while the note deadline (t=1600) has
    // not.
    time::advance(Duration::from_millis(500)).await;
    settle().await;
    assert_eq!(port.call_count("list_project_tasks"), 2);
    assert_eq!(port.call_count("list_project_notes"), 1);

    time::advance(Duration::from_millis(600)).await;
    settle().await;
    assert_eq!(port.call_count("list_project_notes"), 2);
}

#[tokio::test(start_paused = true)]
async fn chat_insert_appends_in_place_without_refetch() {
    let port = MockPort::new();
    project_defaults(&port);
    let engine = engine(&port);
    open_project(&engine).await;
    assert_eq!(port.call_count("list_chat_messages"), 1);

    let insert = ChangeEvent {
        table: Table::ChatMessages,
        op: ChangeOp::Insert,
        row_id: "m2".into(),
        new_row: Some(chat_row("m2", 20)),
    };
    port.send_event(insert.clone());
    settle().await;

    let chat_id = QueryIdentity::ChatLog { project_id: "p1".into() };
    let snapshot = engine.snapshot(&chat_id);
    let chat = snapshot.data.unwrap();
    let ids: Vec<_> = chat.as_chat().unwrap().iter().map(|m| m.id.clone()).collect();
    assert_eq!(ids, vec!["m1", "m2"], "insert must be appended immediately, in order");
    assert_eq!(port.call_count("list_chat_messages"), 1, "no refetch for an appendable insert");

    // Duplicate delivery of the same message id is a no-op.
    port.send_event(insert);
    settle().await;
    time::advance(Duration::from_secs(2)).await;
    settle().await;
    let snapshot = engine.snapshot(&chat_id);
    let chat = snapshot.data.unwrap();
    assert_eq!(chat.as_chat().unwrap().len(), 2);
    assert_eq!(port.call_count("list_chat_messages"), 1);
}

#[tokio::test(start_paused = true)]
async fn chat_insert_without_row_still_skips_the_debounce_window() {
    let port = MockPort::new();
    project_defaults(&port);
    let engine = engine(&port);
    open_project(&engine).await;
    assert_eq!(port.call_count("list_chat_messages"), 1);

    // The port delivered the insert without the row payload; the message
    // must still arrive via an immediate refetch, not a second later.
    port.respond("list_chat_messages", json!([chat_row("m1", 10), chat_row("m2", 20)]));
    port.send_event(ChangeEvent {
        table: Table::ChatMessages,
        op: ChangeOp::Insert,
        row_id: "m2".into(),
        new_row: None,
    });
    settle().await;

    assert_eq!(port.call_count("list_chat_messages"), 2, "rowless insert must refetch at once");
    let chat_id = QueryIdentity::ChatLog { project_id: "p1".into() };
    let chat = engine.snapshot(&chat_id).data.unwrap();
    assert_eq!(chat.as_chat().unwrap().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn dropping_the_engine_cancels_scheduled_refetches() {
    let port = MockPort::new();
    project_defaults(&port);
    let engine = engine(&port);
    open_project(&engine).await;
    assert_eq!(port.call_count("list_project_tasks"), 1);

    port.send_event(task_event());
    settle().await;
    drop(engine);
    settle().await;

    time::advance(Duration::from_secs(2)).await;
    settle().await;
    assert_eq!(port.call_count("list_project_tasks"), 1, "no refetch after the engine is gone");
}

// ---------------------------------------------------------------------------
// Subscription lifecycle
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn switching_projects_closes_the_old_subscription_first() {
    let port = MockPort::new();
    project_defaults(&port);
    let engine = engine(&port);

    engine.activate(Scope::Project { project_id: "p1".into() }).await.unwrap();
    engine.activate(Scope::Project { project_id: "p2".into() }).await.unwrap();
    settle().await;

    assert_eq!(port.max_concurrent_subscriptions(), 1, "descriptors must never overlap");
    assert_eq!(port.active_subscriptions(), 1);
    assert_eq!(port.sub_log(), vec!["subscribe:1", "unsubscribe:1", "subscribe:2"]);
}

#[tokio::test(start_paused = true)]
async fn deactivation_during_subscribe_discards_the_confirmation() {
    let port = MockPort::new();
    project_defaults(&port);
    let release = port.gate_next_subscribe();
    let engine = engine(&port);

    let activation = tokio::spawn({
        let engine = engine.clone();
        async move { engine.activate(Scope::Project { project_id: "p1".into() }).await }
    });
    settle().await;

    engine.deactivate(ScopeKind::Project).await;
    release.send(()).unwrap();
    activation.await.unwrap().unwrap();
    settle().await;

    assert_eq!(port.active_subscriptions(), 0, "stale confirmation must be unsubscribed");
    assert_eq!(port.sub_log(), vec!["subscribe:1", "unsubscribe:1"]);
}

#[tokio::test(start_paused = true)]
async fn unmount_then_event_mutates_nothing() {
    let port = MockPort::new();
    project_defaults(&port);
    let engine = engine(&port);
    open_project(&engine).await;
    let fetches_before = port.call_count("list_project_tasks");

    engine.deactivate(ScopeKind::Project).await;
    settle().await;

    // An event races past the unmount.
    port.send_event(task_event());
    settle().await;
    time::advance(Duration::from_secs(2)).await;
    settle().await;

    assert_eq!(port.call_count("list_project_tasks"), fetches_before, "no refetch after unmount");
    assert!(engine.snapshot(&task_list()).data.is_none(), "entry must be evicted");
}

#[tokio::test(start_paused = true)]
async fn fetch_completing_after_unmount_is_dropped() {
    let port = MockPort::new();
    project_defaults(&port);
    let release = port.script_gated("list_project_tasks", Ok(json!([task_row("t1", "TODO")])));
    let engine = engine(&port);

    engine.activate(Scope::Project { project_id: "p1".into() }).await.unwrap();
    settle().await;
    engine.deactivate(ScopeKind::Project).await;

    release.send(()).unwrap();
    settle().await;

    assert!(engine.snapshot(&task_list()).data.is_none(), "late result must not be written");
}

#[tokio::test(start_paused = true)]
async fn activation_without_session_is_rejected() {
    let port = MockPort::new();
    let engine = SyncEngine::new(Arc::clone(&port), AuthIdentity::signed_out());

    let err = engine.activate(Scope::Project { project_id: "p1".into() }).await.unwrap_err();
    assert!(matches!(err, SyncError::Validation { .. }));
    assert_eq!(port.active_subscriptions(), 0);
}

// ---------------------------------------------------------------------------
// Mutation dispatcher
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn successful_mutation_invalidates_and_notifies() {
    let port = MockPort::new();
    project_defaults(&port);
    let engine = engine(&port);
    let mut notifications = engine.notifications();
    open_project(&engine).await;
    assert_eq!(port.call_count("list_project_tasks"), 1);

    let affected = [task_list()];
    let write = {
        let port = engine.port();
        async move {
            port.mutate(Table::Tasks, MutationOp::Update, json!({}), json!({ "id": "t1" })).await
        }
    };
    engine.execute("Task updated", &affected, write).await.unwrap();
    settle().await;

    assert_eq!(port.call_count("list_project_tasks"), 2, "affected identity must be refetched");
    let notification = notifications.try_recv().unwrap();
    assert_eq!(notification.severity, Severity::Success);
    assert_eq!(notification.message, "Task updated");
}

#[tokio::test(start_paused = true)]
async fn failed_mutation_touches_no_cache_and_notifies() {
    let port = MockPort::new();
    project_defaults(&port);
    let engine = engine(&port);
    let mut notifications = engine.notifications();
    open_project(&engine).await;
    let before = engine.snapshot(&task_list());

    let affected = [task_list()];
    let write =
        async move { Err::<(), _>(SyncError::remote("permission denied")) };
    let err = engine.execute("Task updated", &affected, write).await.unwrap_err();
    settle().await;

    assert!(matches!(err, SyncError::RemoteCall { .. }));
    assert_eq!(port.call_count("list_project_tasks"), 1, "failure must not trigger a refetch");
    let after = engine.snapshot(&task_list());
    assert_eq!(before.data, after.data);
    let notification = notifications.try_recv().unwrap();
    assert_eq!(notification.severity, Severity::Error);
    assert!(notification.message.contains("permission denied"));
}

#[tokio::test(start_paused = true)]
async fn partial_write_still_invalidates_affected_identities() {
    let port = MockPort::new();
    project_defaults(&port);
    let engine = engine(&port);
    open_project(&engine).await;
    assert_eq!(port.call_count("list_project_tasks"), 1);

    let affected = [task_list()];
    let write = async move {
        Err::<(), _>(SyncError::PartialWrite {
            committed: "task t9".into(),
            failed_step: "assigning the task".into(),
            message: "connection reset".into(),
        })
    };
    let err = engine.execute("Task created", &affected, write).await.unwrap_err();
    settle().await;

    assert!(err.is_partial_write());
    assert_eq!(
        port.call_count("list_project_tasks"),
        2,
        "committed partial state must become visible"
    );
}
