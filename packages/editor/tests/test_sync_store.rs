//! SyncStore against an in-memory remote: optimistic apply, rollback,
//! suppression, reconciliation and debounced property writes.

use async_trait::async_trait;
use blueprint_diff::BuildState;
use blueprint_editor::{
    GraphRemote, Mutation, MutationError, MutationState, PropertyWrite, Received, SyncConfig,
    SyncError, SyncResult, SyncStore,
};
use blueprint_model::{FieldValue, Graph, Node, Position, Property};
use blueprint_workspace::{SnapshotUpdate, WriteOrigin};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
enum RemoteWrite {
    Graph(Graph),
    Property {
        node_id: String,
        property_id: String,
        value: FieldValue,
    },
}

#[derive(Default)]
struct RemoteState {
    graph: Graph,
    base: Option<Graph>,
    version: u64,
    base_version: u64,
    writes: Vec<RemoteWrite>,
    fail_next: bool,
}

#[derive(Clone, Default)]
struct MockRemote {
    state: Arc<Mutex<RemoteState>>,
}

impl MockRemote {
    fn with_graph(graph: Graph) -> Self {
        let remote = Self::default();
        {
            let mut state = remote.state.lock().unwrap();
            state.graph = graph;
            state.version = 1;
        }
        remote
    }

    fn writes(&self) -> Vec<RemoteWrite> {
        self.state.lock().unwrap().writes.clone()
    }

    fn fail_next(&self) {
        self.state.lock().unwrap().fail_next = true;
    }

    fn set_base(&self, base: Graph, base_version: u64) {
        let mut state = self.state.lock().unwrap();
        state.base = Some(base);
        state.base_version = base_version;
    }

    fn restart(&self, graph: Graph) {
        let mut state = self.state.lock().unwrap();
        state.graph = graph;
        state.version = 1;
        state.base_version = 0;
    }

    fn check_failure(state: &mut RemoteState) -> SyncResult<()> {
        if std::mem::take(&mut state.fail_next) {
            return Err(SyncError::Remote("connection reset".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl GraphRemote for MockRemote {
    async fn fetch_current(&self) -> SyncResult<SnapshotUpdate> {
        let state = self.state.lock().unwrap();
        Ok(update(state.version, state.base_version, &state.graph))
    }

    async fn fetch_base(&self) -> SyncResult<Option<Graph>> {
        Ok(self.state.lock().unwrap().base.clone())
    }

    async fn write_current(&self, graph: Graph, _broadcast: bool) -> SyncResult<u64> {
        let mut state = self.state.lock().unwrap();
        Self::check_failure(&mut state)?;
        state.graph = graph.clone();
        state.version += 1;
        state.writes.push(RemoteWrite::Graph(graph));
        Ok(state.version)
    }

    async fn patch_property(
        &self,
        node_id: &str,
        property_id: &str,
        value: FieldValue,
        _broadcast: bool,
    ) -> SyncResult<u64> {
        let mut state = self.state.lock().unwrap();
        Self::check_failure(&mut state)?;
        if let Some(property) = state
            .graph
            .node_mut(node_id)
            .and_then(|n| n.property_mut(property_id))
        {
            property.value = value.clone();
        }
        state.version += 1;
        state.writes.push(RemoteWrite::Property {
            node_id: node_id.to_string(),
            property_id: property_id.to_string(),
            value,
        });
        Ok(state.version)
    }
}

fn update(version: u64, base_version: u64, graph: &Graph) -> SnapshotUpdate {
    SnapshotUpdate {
        version,
        base_version,
        document: blueprint_codec::encode(graph),
        origin: WriteOrigin::Agent,
        timestamp: chrono::Utc::now(),
    }
}

fn card(title: &str) -> Graph {
    Graph::new()
        .with_node(
            Node::new("A", title)
                .with_prompt("Pricing card")
                .with_property(Property::slider("opacity", "Opacity", 1.0, 0.0, 1.0, 0.1))
                .with_property(Property::select(
                    "size",
                    "Size",
                    "sm",
                    vec!["sm".to_string(), "md".to_string(), "lg".to_string()],
                ))
                .with_property(Property::number("radius", "Radius", 4.0)),
        )
        .with_node(Node::new("B", "Footer").at(0.0, 200.0))
}

async fn connected(graph: Graph) -> SyncStore<MockRemote> {
    let mut store = SyncStore::new(MockRemote::with_graph(graph), SyncConfig::default());
    store.connect().await.unwrap();
    store
}

fn retitle(node_id: &str, title: &str) -> Mutation {
    Mutation::UpdateNode {
        node_id: node_id.to_string(),
        title: Some(title.to_string()),
        prompt: None,
    }
}

fn property(store: &SyncStore<MockRemote>, node_id: &str, property_id: &str) -> FieldValue {
    store
        .graph()
        .node(node_id)
        .unwrap()
        .property(property_id)
        .unwrap()
        .value
        .clone()
}

#[tokio::test]
async fn test_connect_loads_current_and_base() {
    let remote = MockRemote::with_graph(card("Card"));
    remote.set_base(card("Card"), 1);

    let mut store = SyncStore::new(remote, SyncConfig::default());
    store.connect().await.unwrap();

    assert_eq!(store.graph(), &card("Card"));
    assert_eq!(store.base(), Some(&card("Card")));
    assert_eq!(store.last_applied_version(), Some(1));
    assert_eq!(store.state(), MutationState::Idle);
    assert!(store.diff().is_empty());
}

#[tokio::test]
async fn test_drag_position_survives_incoming_snapshot() {
    let mut store = connected(card("Card")).await;

    store.begin_manipulation("A").unwrap();
    store.drag("A", Position::new(10.0, 20.0)).unwrap();

    let received = store.receive(update(2, 0, &card("Card v2"))).await.unwrap();
    assert_eq!(received, Received::Applied);

    let a = store.graph().node("A").unwrap();
    assert_eq!(a.position, Position::new(10.0, 20.0));
    assert_eq!(a.title, "Card v2");

    let version = store.end_manipulation("A").await.unwrap();
    assert_eq!(version, Some(2));
    assert!(!store.is_manipulating("A"));

    let writes = store.remote().writes();
    let RemoteWrite::Graph(written) = &writes[0] else {
        panic!("expected a graph write");
    };
    assert_eq!(written.node("A").unwrap().position, Position::new(10.0, 20.0));
}

#[tokio::test]
async fn test_drag_requires_manipulation() {
    let mut store = connected(card("Card")).await;

    assert_eq!(
        store.drag("A", Position::new(1.0, 1.0)),
        Err(SyncError::NotManipulating("A".to_string()))
    );
    assert!(matches!(
        store.begin_manipulation("zzz"),
        Err(SyncError::Mutation(MutationError::NodeNotFound(_)))
    ));
}

#[tokio::test]
async fn test_failed_write_rolls_back() {
    let mut store = connected(card("Card")).await;
    store.remote().fail_next();

    let result = store.apply(retitle("A", "Broken")).await;

    assert_eq!(result, Err(SyncError::Remote("connection reset".to_string())));
    assert_eq!(store.graph(), &card("Card"));
    assert_eq!(store.state(), MutationState::RolledBack);
    assert!(store.take_error().is_some());
    assert_eq!(store.state(), MutationState::Idle);
}

#[tokio::test]
async fn test_rejected_mutation_never_reaches_remote() {
    let mut store = connected(card("Card")).await;

    let result = store
        .apply(Mutation::DeleteNode {
            node_id: "zzz".to_string(),
        })
        .await;

    assert!(matches!(result, Err(SyncError::Mutation(_))));
    assert!(store.remote().writes().is_empty());
    assert_eq!(store.pending_count(), 0);
}

#[tokio::test]
async fn test_rollback_keeps_later_pending_mutations() {
    let mut store = connected(card("Card")).await;

    let first = store.begin(retitle("A", "One")).unwrap();
    let _second = store
        .begin(Mutation::UpdateNode {
            node_id: "B".to_string(),
            title: None,
            prompt: Some("Links and legal".to_string()),
        })
        .unwrap();

    store.fail(first, SyncError::Remote("timeout".to_string()));

    assert_eq!(store.graph().node("A").unwrap().title, "Card");
    assert_eq!(store.graph().node("B").unwrap().prompt, "Links and legal");
    assert_eq!(store.state(), MutationState::Applying { pending: 1 });
}

#[tokio::test]
async fn test_snapshots_are_deferred_while_pending() {
    let mut store = connected(card("Card")).await;
    let token = store.begin(retitle("A", "Mine")).unwrap();

    let mut theirs = card("Mine");
    theirs.node_mut("B").unwrap().title = "Their footer".to_string();

    let stale_title = card("Card");
    assert_eq!(
        store.receive(update(2, 0, &stale_title)).await.unwrap(),
        Received::Deferred
    );
    assert_eq!(
        store.receive(update(3, 0, &theirs)).await.unwrap(),
        Received::Deferred
    );

    // the optimistic edit is untouched while suppressed
    assert_eq!(store.graph().node("A").unwrap().title, "Mine");
    assert_eq!(store.graph().node("B").unwrap().title, "Footer");

    store.confirm(token, 2);

    assert!(!store.has_deferred());
    assert_eq!(store.last_applied_version(), Some(3));
    assert_eq!(store.graph().node("A").unwrap().title, "Mine");
    assert_eq!(store.graph().node("B").unwrap().title, "Their footer");
}

#[tokio::test]
async fn test_deferred_snapshot_older_than_own_write_is_dropped() {
    let mut store = connected(card("Card")).await;
    let token = store.begin(retitle("A", "Mine")).unwrap();

    assert_eq!(
        store.receive(update(2, 0, &card("Old"))).await.unwrap(),
        Received::Deferred
    );
    store.confirm(token, 3);

    assert!(!store.has_deferred());
    assert_eq!(store.graph().node("A").unwrap().title, "Mine");
    assert_eq!(store.last_applied_version(), Some(1));
}

#[tokio::test]
async fn test_stale_versions_are_ignored() {
    let mut store = connected(card("Card")).await;

    assert_eq!(
        store.receive(update(3, 0, &card("Three"))).await.unwrap(),
        Received::Applied
    );
    assert_eq!(
        store.receive(update(2, 0, &card("Two"))).await.unwrap(),
        Received::Stale
    );
    assert_eq!(
        store.receive(update(3, 0, &card("Three again"))).await.unwrap(),
        Received::Stale
    );
    assert_eq!(store.graph().node("A").unwrap().title, "Three");

    // same version, newer base: a build was recorded
    store.remote().set_base(card("Three"), 1);
    assert_eq!(
        store.receive(update(3, 1, &card("Three"))).await.unwrap(),
        Received::Applied
    );
    assert_eq!(store.base(), Some(&card("Three")));
    assert_eq!(store.build_state("A"), Some(BuildState::Built));
}

#[tokio::test(start_paused = true)]
async fn test_expired_pending_lifts_suppression() {
    let mut store = connected(card("Card")).await;
    store.begin(retitle("A", "Mine")).unwrap();

    assert_eq!(
        store.receive(update(2, 0, &card("Theirs"))).await.unwrap(),
        Received::Deferred
    );

    tokio::time::advance(Duration::from_secs(1)).await;
    assert_eq!(store.expire_pending(), 0);
    assert_eq!(store.graph().node("A").unwrap().title, "Mine");

    tokio::time::advance(Duration::from_millis(1500)).await;
    assert_eq!(store.expire_pending(), 1);

    assert_eq!(store.pending_count(), 0);
    assert_eq!(store.state(), MutationState::Idle);
    assert!(!store.has_deferred());
    assert_eq!(store.graph().node("A").unwrap().title, "Theirs");
}

#[tokio::test(start_paused = true)]
async fn test_snapshot_after_deadline_is_applied() {
    let mut store = connected(card("Card")).await;
    store.begin(retitle("A", "Mine")).unwrap();

    tokio::time::advance(Duration::from_secs(5)).await;

    assert_eq!(
        store.receive(update(2, 0, &card("Theirs"))).await.unwrap(),
        Received::Applied
    );
    assert_eq!(store.pending_count(), 0);
    assert_eq!(store.graph().node("A").unwrap().title, "Theirs");
}

#[tokio::test(start_paused = true)]
async fn test_rapid_slider_updates_persist_once() {
    let mut store = connected(card("Card")).await;

    assert_eq!(
        store
            .set_property("A", "opacity", FieldValue::Number(0.2))
            .await
            .unwrap(),
        PropertyWrite::Queued
    );
    tokio::time::advance(Duration::from_millis(30)).await;
    assert_eq!(
        store
            .set_property("A", "opacity", FieldValue::Number(0.7))
            .await
            .unwrap(),
        PropertyWrite::Queued
    );

    // local and preview state follow every change
    assert_eq!(property(&store, "A", "opacity"), FieldValue::Number(0.7));
    assert_eq!(store.preview()["opacity"], FieldValue::Number(0.7));

    assert_eq!(store.flush_due().await, 0);
    assert!(store.remote().writes().is_empty());

    tokio::time::advance(Duration::from_millis(80)).await;
    assert_eq!(store.flush_due().await, 1);

    assert_eq!(
        store.remote().writes(),
        vec![RemoteWrite::Property {
            node_id: "A".to_string(),
            property_id: "opacity".to_string(),
            value: FieldValue::Number(0.7),
        }]
    );
    assert_eq!(store.pending_count(), 0);
    assert_eq!(store.next_flush(), None);
}

#[tokio::test]
async fn test_discrete_property_changes_persist_immediately() {
    let mut store = connected(card("Card")).await;

    assert_eq!(
        store
            .set_property("A", "size", FieldValue::text("md"))
            .await
            .unwrap(),
        PropertyWrite::Persisted(2)
    );
    assert_eq!(
        store
            .set_property("A", "size", FieldValue::text("md"))
            .await
            .unwrap(),
        PropertyWrite::Unchanged
    );
    assert_eq!(
        store
            .set_property("A", "size", FieldValue::text("lg"))
            .await
            .unwrap(),
        PropertyWrite::Persisted(3)
    );
    assert_eq!(store.remote().writes().len(), 2);

    // text for a number property is coerced before it is compared
    store
        .set_property("A", "radius", FieldValue::text("8"))
        .await
        .unwrap();
    assert_eq!(property(&store, "A", "radius"), FieldValue::Number(8.0));
    assert_eq!(
        store
            .set_property("A", "radius", FieldValue::text("8"))
            .await
            .unwrap(),
        PropertyWrite::Unchanged
    );
}

#[tokio::test]
async fn test_failed_debounced_write_rolls_back() {
    let mut store = connected(card("Card")).await;

    store
        .set_property("A", "opacity", FieldValue::Number(0.5))
        .await
        .unwrap();
    store
        .set_property("A", "opacity", FieldValue::Number(0.3))
        .await
        .unwrap();
    store.remote().fail_next();

    assert_eq!(store.flush_all().await, 1);

    assert_eq!(property(&store, "A", "opacity"), FieldValue::Number(1.0));
    assert_eq!(
        store.take_error(),
        Some(SyncError::Remote("connection reset".to_string()))
    );
}

#[tokio::test]
async fn test_rollback_keeps_drag_in_progress() {
    let mut store = connected(card("Card")).await;

    store
        .set_property("A", "opacity", FieldValue::Number(0.5))
        .await
        .unwrap();
    store.begin_manipulation("B").unwrap();
    store.drag("B", Position::new(50.0, 60.0)).unwrap();
    store.remote().fail_next();

    assert_eq!(store.flush_all().await, 1);

    assert_eq!(property(&store, "A", "opacity"), FieldValue::Number(1.0));
    assert_eq!(
        store.graph().node("B").unwrap().position,
        Position::new(50.0, 60.0)
    );
    assert!(store.is_manipulating("B"));
    assert!(store.take_error().is_some());
}

#[tokio::test]
async fn test_unknown_property_is_rejected() {
    let mut store = connected(card("Card")).await;

    let result = store
        .set_property("A", "shadow", FieldValue::Boolean(true))
        .await;

    assert!(matches!(
        result,
        Err(SyncError::Mutation(MutationError::PropertyNotFound { .. }))
    ));
}

#[tokio::test]
async fn test_build_state_and_diff_follow_local_edits() {
    let remote = MockRemote::with_graph(card("Card"));
    remote.set_base(card("Card"), 1);
    let mut store = SyncStore::new(remote, SyncConfig::default());
    store.connect().await.unwrap();

    store
        .set_property("A", "size", FieldValue::text("lg"))
        .await
        .unwrap();
    assert_eq!(store.build_state("A"), Some(BuildState::Built));

    store.apply(retitle("A", "Card v2")).await.unwrap();
    assert_eq!(store.build_state("A"), Some(BuildState::Unbuilt));
    assert_eq!(store.diff().modified_nodes, vec!["A"]);
    assert_eq!(store.build_state("zzz"), None);
}

#[tokio::test]
async fn test_deletions_arrive_only_through_refresh() {
    let mut store = connected(card("Card")).await;

    let without_footer = Graph::new().with_node(card("Card").nodes[0].clone());
    store.remote().restart(without_footer.clone());
    store.receive(update(2, 0, &without_footer)).await.unwrap();
    assert!(store.graph().contains_node("B"));

    store.refresh().await.unwrap();
    assert!(!store.graph().contains_node("B"));
}

#[tokio::test]
async fn test_connect_resets_versions_after_authority_restart() {
    let mut store = connected(card("Card")).await;
    store.receive(update(5, 0, &card("Five"))).await.unwrap();

    store.remote().restart(card("Fresh"));
    store.connect().await.unwrap();
    assert_eq!(store.last_applied_version(), Some(1));

    assert_eq!(
        store.receive(update(2, 0, &card("Two"))).await.unwrap(),
        Received::Applied
    );
    assert_eq!(store.graph().node("A").unwrap().title, "Two");
}
