mod common;

use common::*;
use std::time::Duration;
use wavecore::{ParameterMap, ProducerNode, RunOptions, Value};
use waveruntime::WorkflowHandle;

async fn started(handle: &WorkflowHandle) {
    while !handle.is_running() {
        tokio::task::yield_now().await;
    }
}

fn input() -> Value {
    Value::from(vec![1])
}

#[tokio::test]
async fn pause_holds_between_waves_until_resume() {
    init_tracing();
    let manager = slow_chain(&["A", "B", "C"], 20);
    let handle = manager.handle();

    let control = async {
        started(&handle).await;
        handle.pause().await.unwrap();
        assert_eq!(manager.finished(), vec!["A".to_string()]);

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(manager.finished(), vec!["A".to_string()]);
        assert!(handle.is_running());

        assert_eq!(handle.pause().await.unwrap_err().kind(), "Conflict");
        handle.resume().unwrap();
    };
    let (result, _) = tokio::join!(manager.run(input(), ParameterMap::new(), RunOptions::default()), control);

    let result = result.unwrap();
    assert!(result.finished);
    let order: Vec<&str> = result.data.iter().map(|r| r.producer.as_str()).collect();
    assert_eq!(order, vec!["A", "B", "C"]);
    assert_eq!(result.last_data(), &[Value::from(1)]);
}

#[tokio::test]
async fn concurrent_pause_requests_conflict() {
    let manager = slow_chain(&["A", "B"], 20);
    let handle = manager.handle();

    let control = async {
        started(&handle).await;
        let (first, second) = tokio::join!(handle.pause(), handle.pause());
        first.unwrap();
        assert_eq!(second.unwrap_err().kind(), "Conflict");
        handle.resume().unwrap();
    };
    let (result, _) = tokio::join!(manager.run(input(), ParameterMap::new(), RunOptions::default()), control);
    assert!(result.unwrap().finished);
}

#[tokio::test]
async fn stop_ends_run_at_next_checkpoint() {
    let manager = slow_chain(&["A", "B", "C"], 20);
    let handle = manager.handle();

    let control = async {
        started(&handle).await;
        let (first, second) = tokio::join!(handle.stop(), handle.stop());
        first.unwrap();
        assert_eq!(second.unwrap_err().kind(), "Conflict");
    };
    let (result, _) = tokio::join!(manager.run(input(), ParameterMap::new(), RunOptions::default()), control);

    let result = result.unwrap();
    assert!(!result.finished);
    assert_eq!(manager.finished(), vec!["A".to_string()]);
    assert_eq!(result.data.len(), 1);
    assert!(!manager.is_running());

    let again = manager.run(input(), ParameterMap::new(), RunOptions::default()).await.unwrap();
    assert!(again.finished);
    assert_eq!(again.data.len(), 3);
}

#[tokio::test]
async fn stop_releases_a_paused_run() {
    let manager = slow_chain(&["A", "B", "C"], 20);
    let handle = manager.handle();

    let control = async {
        started(&handle).await;
        handle.pause().await.unwrap();
        assert_eq!(handle.pause().await.unwrap_err().kind(), "Conflict");
        handle.stop().await.unwrap();
    };
    let (result, _) = tokio::join!(manager.run(input(), ParameterMap::new(), RunOptions::default()), control);

    let result = result.unwrap();
    assert!(!result.finished);
    assert_eq!(manager.finished(), vec!["A".to_string()]);
}

#[tokio::test]
async fn resume_requires_a_pause() {
    let manager = slow_chain(&["A", "B"], 20);
    let handle = manager.handle();

    let control = async {
        started(&handle).await;
        let err = handle.resume().unwrap_err();
        assert_eq!(err.kind(), "Unavailable");
        assert!(err.to_string().contains("not paused"));
    };
    let (result, _) = tokio::join!(manager.run(input(), ParameterMap::new(), RunOptions::default()), control);
    assert!(result.unwrap().finished);
}

#[tokio::test]
async fn idle_manager_rejects_control_requests() {
    let manager = slow_chain(&["A"], 0);
    assert_eq!(manager.pause().await.unwrap_err().kind(), "Unavailable");
    assert_eq!(manager.stop().await.unwrap_err().kind(), "Unavailable");
    let err = manager.resume().unwrap_err();
    assert_eq!(err.kind(), "Unavailable");
    assert!(err.to_string().contains("not running"));
}

#[tokio::test]
async fn second_concurrent_run_conflicts() {
    let manager = slow_chain(&["A", "B"], 20);

    let (first, second) = tokio::join!(
        manager.run(input(), ParameterMap::new(), RunOptions::default()),
        manager.run(input(), ParameterMap::new(), RunOptions::default())
    );

    assert!(first.unwrap().finished);
    assert_eq!(second.unwrap_err().kind(), "Conflict");
}

#[tokio::test]
async fn cancellation_requests_a_stop() {
    let manager = GraphBuilder::new()
        .add(ProducerNode::new("A", Canceller))
        .add(echo("B"))
        .add(echo("C"))
        .link("A", "B")
        .link("B", "C")
        .build("A");

    let result = manager.run(input(), ParameterMap::new(), RunOptions::default()).await.unwrap();

    assert!(!result.finished);
    assert_eq!(manager.finished(), vec!["A".to_string()]);
    assert_eq!(result.data.len(), 1);
}

#[tokio::test]
async fn cancellation_does_not_abort_siblings() {
    let manager = GraphBuilder::new()
        .add(echo("root"))
        .add(ProducerNode::new("A", Canceller))
        .add(slow("S", 20))
        .add(echo("after"))
        .link("root", "A")
        .link("root", "S")
        .link("S", "after")
        .build("root");

    let result = manager.run(input(), ParameterMap::new(), RunOptions::default()).await.unwrap();

    assert!(!result.finished);
    let mut finished = manager.finished();
    finished.sort();
    assert_eq!(finished, vec!["A".to_string(), "S".to_string(), "root".to_string()]);
}
