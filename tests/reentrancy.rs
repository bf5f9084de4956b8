use std::sync::{Arc, Mutex};
use std::time::Duration;

use hotgraph::types::{Acceptance, ModuleId};
use hotgraph_test_utils::builders::TinyEngine;
use hotgraph_test_utils::{init_tracing, with_timeout, TestEngineBuilder};
use tokio::sync::Notify;

type Log = Arc<Mutex<Vec<&'static str>>>;

/// Accepts changes of `dependency` after sleeping, logging start and end.
fn add_slow_acceptor(
    engine: &TinyEngine,
    owner: &ModuleId,
    dependency: &ModuleId,
    log: Log,
    started: Arc<Notify>,
) {
    engine.accept_dependency_async(owner, dependency, move |_| {
        let log = Arc::clone(&log);
        let started = Arc::clone(&started);
        async move {
            log.lock().unwrap().push("x-start");
            started.notify_one();
            tokio::time::sleep(Duration::from_millis(200)).await;
            log.lock().unwrap().push("x-end");
            Ok::<_, anyhow::Error>(Acceptance::Accepted)
        }
    });
}

#[tokio::test]
async fn second_burst_waits_for_the_running_pass() {
    init_tracing();
    let mut t = TestEngineBuilder::new()
        .with_file("x.tiny", "export default 1\n")
        .with_file("y.tiny", "export default 1\n")
        .build();
    let owner = ModuleId::new("test:owner");
    let (x, y) = (t.id("x.tiny"), t.id("y.tiny"));

    let log: Log = Arc::default();
    let started = Arc::new(Notify::new());
    add_slow_acceptor(&t.engine, &owner, &x, Arc::clone(&log), Arc::clone(&started));
    {
        let log = Arc::clone(&log);
        t.engine.accept_dependency(&owner, &y, move |_| {
            log.lock().unwrap().push("y");
            Ok(())
        });
    }

    t.engine.notify_changed(&x);
    with_timeout(started.notified()).await;
    assert!(t.engine.is_settling());

    // Lands in the collector and flushes while x's acceptor still sleeps.
    t.engine.notify_changed(&y);

    let first = t.next_report().await;
    let second = t.next_report().await;

    assert_eq!(first.batch, vec![x]);
    assert_eq!(second.batch, vec![y]);
    assert_eq!(second.pass, first.pass + 1);
    assert_eq!(*log.lock().unwrap(), vec!["x-start", "x-end", "y"]);
    assert!(!t.engine.is_settling());
}

#[tokio::test]
async fn repeated_changes_during_a_pass_run_once_more() {
    init_tracing();
    let mut t = TestEngineBuilder::new()
        .with_file("x.tiny", "export default 1\n")
        .build();
    let owner = ModuleId::new("test:owner");
    let x = t.id("x.tiny");

    let log: Log = Arc::default();
    let started = Arc::new(Notify::new());
    add_slow_acceptor(&t.engine, &owner, &x, Arc::clone(&log), Arc::clone(&started));

    t.change("x.tiny", "export default 2\n");
    with_timeout(started.notified()).await;

    t.change("x.tiny", "export default 3\n");
    tokio::time::sleep(Duration::from_millis(60)).await;
    t.change("x.tiny", "export default 4\n");

    let first = t.next_report().await;
    let second = t.next_report().await;
    assert_eq!(first.batch, vec![x.clone()]);
    assert_eq!(second.batch, vec![x.clone()]);
    assert_eq!(second.pass, first.pass + 1);

    t.assert_quiet(Duration::from_millis(150)).await;
    assert_eq!(t.compiler.loads(&x), 2);
    assert_eq!(
        t.engine.import(&x).await.into_result().unwrap().default,
        4
    );
}
