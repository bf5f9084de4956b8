use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use hotgraph::config::EngineConfig;
use hotgraph::engine::Engine;
use hotgraph::errors::HotError;
use hotgraph::loader::{LoadContext, LoadFuture, ModuleLoader};
use hotgraph::types::{Artifact, ModuleId, Version};
use hotgraph_test_utils::{init_tracing, with_timeout, RecordingLifecycle, TestEngineBuilder};
use tokio::sync::Notify;

fn consumer() -> ModuleId {
    ModuleId::new("test:consumer")
}

fn value(artifact: Option<Artifact<hotgraph_test_utils::TinyModule>>) -> i64 {
    artifact
        .expect("subscription open")
        .into_result()
        .expect("module loaded")
        .default
}

#[tokio::test]
async fn yields_current_value_then_each_reload() {
    init_tracing();
    let mut t = TestEngineBuilder::new()
        .with_file("m.tiny", "export default 1\n")
        .build();
    let m = t.id("m.tiny");
    let mut updates = t.engine.subscribe(&consumer(), &m);

    assert_eq!(value(with_timeout(updates.next()).await), 1);

    t.change("m.tiny", "export default 2\n");
    assert_eq!(value(with_timeout(updates.next()).await), 2);

    let report = t.next_report().await;
    assert_eq!(report.accepted, vec![(consumer(), m)]);
    assert!(!report.restart_required);
    assert_eq!(t.lifecycle.restarts(), 0);
}

#[tokio::test]
async fn syntax_error_yields_sentinel_and_subscription_survives() {
    init_tracing();
    let mut t = TestEngineBuilder::new()
        .with_file("m.tiny", "export default 1\n")
        .build();
    let mut updates = t.engine.subscribe(&consumer(), &t.id("m.tiny"));
    assert_eq!(value(with_timeout(updates.next()).await), 1);

    t.change("m.tiny", "export default = nope\n");
    let broken = with_timeout(updates.next()).await.unwrap();
    match broken {
        Artifact::LoadError(failure) => {
            assert_eq!(failure.module, t.id("m.tiny"));
            assert!(failure.message.contains("line 1"), "{}", failure.message);
        }
        Artifact::Module(m) => panic!("expected a load error, got {m:?}"),
    }
    t.next_report().await;

    t.change("m.tiny", "export default 3\n");
    assert_eq!(value(with_timeout(updates.next()).await), 3);
    assert_eq!(t.lifecycle.restarts(), 0);
}

#[tokio::test]
async fn missing_module_yields_sentinel_until_it_appears() {
    init_tracing();
    let t = TestEngineBuilder::new().build();
    let later = t.id("later.tiny");
    let mut updates = t.engine.subscribe(&consumer(), &later);

    let first = with_timeout(updates.next()).await.unwrap();
    assert!(first.is_load_error());
    assert!(t.engine.registry().contains(&later));

    t.change("later.tiny", "export default 7\n");
    assert_eq!(value(with_timeout(updates.next()).await), 7);
}

#[tokio::test]
async fn values_arrive_in_settle_order_without_gaps() {
    init_tracing();
    let mut t = TestEngineBuilder::new()
        .with_file("m.tiny", "export default 1\n")
        .build();
    let mut updates = t.engine.subscribe(&consumer(), &t.id("m.tiny"));
    assert_eq!(value(with_timeout(updates.next()).await), 1);

    // Three separate passes before the consumer reads anything.
    for n in 2..=4 {
        t.change("m.tiny", &format!("export default {n}\n"));
        t.next_report().await;
    }

    for expected in 2..=4 {
        assert_eq!(value(with_timeout(updates.next()).await), expected);
    }
    assert!(
        tokio::time::timeout(Duration::from_millis(100), updates.next())
            .await
            .is_err()
    );
}

#[tokio::test]
async fn burst_of_changes_delivers_one_value() {
    init_tracing();
    let mut t = TestEngineBuilder::new()
        .with_file("m.tiny", "export default 0\n")
        .build();
    let m = t.id("m.tiny");
    let mut updates = t.engine.subscribe(&consumer(), &m);
    assert_eq!(value(with_timeout(updates.next()).await), 0);

    for n in 1..=5 {
        t.change("m.tiny", &format!("export default {n}\n"));
    }

    assert_eq!(value(with_timeout(updates.next()).await), 5);
    t.next_report().await;
    t.assert_quiet(Duration::from_millis(100)).await;
    assert_eq!(t.compiler.loads(&m), 2);
    assert!(
        tokio::time::timeout(Duration::from_millis(50), updates.next())
            .await
            .is_err()
    );
}

#[tokio::test]
async fn cancelled_subscription_no_longer_masks_escalation() {
    init_tracing();
    let mut t = TestEngineBuilder::new()
        .with_file("m.tiny", "export default 1\n")
        .build();
    let mut updates = t.engine.subscribe(&consumer(), &t.id("m.tiny"));
    assert_eq!(value(with_timeout(updates.next()).await), 1);

    updates.cancel();
    assert!(updates.is_cancelled());
    assert!(updates.next().await.is_none());

    t.change("m.tiny", "export default 2\n");
    let report = t.next_report().await;

    assert!(report.accepted.is_empty());
    assert!(report.escalated.contains(&consumer()));
    assert!(report.restart_required);
    assert_eq!(t.lifecycle.restarts(), 1);
}

#[tokio::test]
async fn dropped_subscription_declines() {
    init_tracing();
    let mut t = TestEngineBuilder::new()
        .with_file("m.tiny", "export default 1\n")
        .build();
    {
        let mut updates = t.engine.subscribe(&consumer(), &t.id("m.tiny"));
        assert_eq!(value(with_timeout(updates.next()).await), 1);
    }

    t.change("m.tiny", "export default 2\n");
    let report = t.next_report().await;
    assert!(report.accepted.is_empty());
    assert!(report.restart_required);
}

#[tokio::test]
async fn hot_handle_import_records_the_edge_and_follows_changes() {
    init_tracing();
    let mut t = TestEngineBuilder::new()
        .with_file("app.tiny", "export default 0\n")
        .with_file("dep.tiny", "export default 5\n")
        .build();
    let app = t.id("app.tiny");
    let dep = t.id("dep.tiny");

    let hot = t.engine.hot_handle(&app);
    assert_eq!(hot.owner(), &app);
    let mut updates = hot.import("./dep.tiny").unwrap();
    assert_eq!(updates.id(), &dep);
    assert_eq!(value(with_timeout(updates.next()).await), 5);
    assert_eq!(t.engine.registry().dependents(&dep), vec![app.clone()]);

    t.change("dep.tiny", "export default 6\n");
    assert_eq!(value(with_timeout(updates.next()).await), 6);
    let report = t.next_report().await;
    assert_eq!(report.accepted, vec![(app, dep)]);
    assert_eq!(t.lifecycle.restarts(), 0);
}

#[tokio::test]
async fn hot_handle_reports_resolve_failures() {
    init_tracing();
    let t = TestEngineBuilder::new().build();
    let hot = t.engine.hot_handle(&consumer());

    let err = hot.import("./dep.tiny").unwrap_err();
    assert!(matches!(err, HotError::Resolve { .. }));

    let err = hot.accept("", |_| Ok(())).unwrap_err();
    assert!(matches!(err, HotError::Resolve { .. }));
}

/// Produces the version it was loaded at; the first load stalls until
/// released.
#[derive(Debug, Clone, Default)]
struct StallingLoader {
    loads: Arc<AtomicUsize>,
    started: Arc<Notify>,
    release: Arc<Notify>,
}

impl ModuleLoader for StallingLoader {
    type Module = Option<Version>;

    fn load(&self, cx: LoadContext<Self::Module>) -> LoadFuture<'_, Self::Module> {
        Box::pin(async move {
            if self.loads.fetch_add(1, Ordering::SeqCst) == 0 {
                self.started.notify_one();
                self.release.notified().await;
            }
            Ok(cx.version())
        })
    }
}

#[tokio::test]
async fn slow_initial_load_does_not_replace_a_newer_reload() {
    init_tracing();
    let loader = StallingLoader::default();
    let engine = Engine::builder(loader.clone())
        .config(
            EngineConfig::default()
                .with_watch_enabled(false)
                .with_debounce(Duration::from_millis(20)),
        )
        .lifecycle(Arc::new(RecordingLifecycle::new()))
        .build()
        .unwrap();
    let mut reports = engine.reports();

    let m = ModuleId::new("test:stalled");
    engine.registry().ensure(&m);
    let mut updates = engine.subscribe(&consumer(), &m);
    with_timeout(loader.started.notified()).await;

    // The pass reloads at the new version while the first load still waits.
    engine.notify_changed(&m);
    let report = with_timeout(reports.recv()).await.unwrap();
    assert_eq!(report.accepted, vec![(consumer(), m.clone())]);
    loader.release.notify_one();

    let first = with_timeout(updates.next()).await.unwrap().into_result().unwrap();
    let second = with_timeout(updates.next()).await.unwrap().into_result().unwrap();
    assert_eq!(first, None);
    assert_eq!(second, Some(report.version));
    assert_eq!(loader.loads.load(Ordering::SeqCst), 2);

    let current = engine.import(&m).await.into_result().unwrap();
    assert_eq!(current, Some(report.version));
    assert_eq!(loader.loads.load(Ordering::SeqCst), 2, "current version is served from cache");
}
