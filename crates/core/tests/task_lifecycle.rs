//! Task lifecycle integration tests.
//!
//! These tests drive the task manager with a mock fetcher:
//! - Admission limits and slot release on both terminal paths
//! - Validation order for submitted files
//! - Exactly one pipeline launch per task
//! - Archive contents and file order
//! - Shutdown draining

use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use zip::ZipArchive;

use zipper_core::{
    testing::{fixtures, MockFetcher},
    FetchError, ShutdownOutcome, TaskError, TaskManager, TaskStatus,
};

fn read_archive(path: &Path) -> Vec<(String, String)> {
    let mut archive = ZipArchive::new(File::open(path).expect("open archive")).expect("valid zip");
    let mut entries: Vec<_> = (0..archive.len())
        .map(|i| {
            let mut entry = archive.by_index(i).unwrap();
            let mut body = String::new();
            entry.read_to_string(&mut body).unwrap();
            (entry.name().to_string(), body)
        })
        .collect();
    entries.sort();
    entries
}

/// Fill a task with the fixture URLs and wait for its pipeline.
async fn fill_and_wait(manager: &TaskManager, task_id: &str, urls: &[String]) -> TaskStatus {
    let mut handle = None;
    for url in urls {
        handle = manager.add_file(task_id, url).expect("add file").pipeline;
    }
    let report = handle
        .expect("last add starts the pipeline")
        .wait()
        .await
        .expect("pipeline not aborted");
    report.status
}

#[tokio::test]
async fn test_done_task_has_archive_with_decoded_names() {
    let (manager, dirs) = fixtures::manager_with_fetcher(3, MockFetcher::new());
    let urls = fixtures::three_urls();
    manager.create_task("alpha").unwrap();

    let status = fill_and_wait(&manager, "alpha", &urls).await;
    assert_eq!(status, TaskStatus::Done);

    let snapshot = manager.snapshot("alpha").unwrap();
    assert_eq!(snapshot.status, TaskStatus::Done);
    assert!(snapshot.error.is_none());
    assert!(snapshot.finished_at.is_some());
    let archive = snapshot.archive_path.expect("archive path");
    assert_eq!(archive, dirs.config.output_dir.join("alpha.zip"));

    let entries = read_archive(&archive);
    let names: Vec<_> = entries.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(names, vec!["photo one.jpg", "report.pdf", "scan.JPEG"]);
    assert_eq!(
        entries[1].1,
        "content of https://files.test/docs/report.pdf"
    );
    assert_eq!(dirs.workspace_entries(), 0);
}

#[tokio::test]
async fn test_admission_limit_and_release() {
    let fetcher = MockFetcher::new();
    let urls = fixtures::three_urls();
    fetcher.fail_always(&urls[0], FetchError::Status(404));
    let (manager, _dirs) = fixtures::manager_with_fetcher(2, fetcher);

    manager.create_task("ok").unwrap();
    manager.create_task("bad").unwrap();
    assert_eq!(
        manager.create_task("third").unwrap_err(),
        TaskError::CapacityExceeded { max: 2 }
    );

    // The failing task frees its slot too.
    assert_eq!(fill_and_wait(&manager, "bad", &urls).await, TaskStatus::Error);
    assert_eq!(manager.active_count(), 1);
    manager.create_task("third").unwrap();
    assert!(manager.create_task("fourth").is_err());

    // Finished tasks stay queryable.
    let bad = manager.snapshot("bad").unwrap();
    assert_eq!(bad.status, TaskStatus::Error);
    assert!(bad.archive_path.is_none());
    assert!(!bad.files[0].success);
    assert!(bad.files[1].success);
}

#[tokio::test]
async fn test_validation_order() {
    let (manager, _dirs) = fixtures::manager_with_fetcher(3, MockFetcher::new());

    // Unknown task wins over a bad extension.
    assert!(matches!(
        manager.add_file("ghost", "https://files.test/notes.txt"),
        Err(TaskError::NotFound(_))
    ));

    manager.create_task("t").unwrap();
    let mut handle = None;
    for url in fixtures::three_urls() {
        handle = manager.add_file("t", &url).unwrap().pipeline;
    }

    // A bad extension wins over a full quota.
    assert!(matches!(
        manager.add_file("t", "https://files.test/notes.txt"),
        Err(TaskError::UnsupportedType { .. })
    ));
    assert!(matches!(
        manager.add_file("t", "https://files.test/more.pdf"),
        Err(TaskError::QuotaExceeded { .. })
    ));

    handle.unwrap().wait().await.unwrap();
    assert!(matches!(
        manager.add_file("t", "https://files.test/late.pdf"),
        Err(TaskError::QuotaExceeded { .. })
    ));
    assert_eq!(manager.snapshot("t").unwrap().files.len(), 3);
}

#[tokio::test]
async fn test_concurrent_adds_launch_exactly_once() {
    let fetcher = MockFetcher::new();
    let (manager, _dirs) = fixtures::manager_with_fetcher(3, fetcher.clone());
    let manager = Arc::new(manager);
    manager.create_task("race").unwrap();

    let adds = (0..8).map(|i| {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move {
            manager.add_file("race", &format!("https://files.test/file-{i}.pdf"))
        })
    });

    let mut accepted = 0;
    let mut rejected = 0;
    let mut handles = Vec::new();
    for join in futures::future::join_all(adds).await {
        match join.unwrap() {
            Ok(added) => {
                accepted += 1;
                handles.extend(added.pipeline);
            }
            Err(TaskError::QuotaExceeded { .. }) => rejected += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(accepted, 3);
    assert_eq!(rejected, 5);
    assert_eq!(handles.len(), 1);

    let report = handles.pop().unwrap().wait().await.unwrap();
    assert_eq!(report.status, TaskStatus::Done);
    let fetched: HashSet<_> = fetcher.calls().into_iter().collect();
    assert_eq!(fetched.len(), 3);
}

#[tokio::test]
async fn test_file_order_survives_out_of_order_completion() {
    let fetcher = MockFetcher::new();
    let urls = fixtures::three_urls();
    fetcher.set_delay(&urls[0], Duration::from_millis(80));
    fetcher.set_delay(&urls[1], Duration::from_millis(40));
    let (manager, _dirs) = fixtures::manager_with_fetcher(3, fetcher.clone());
    manager.create_task("order").unwrap();

    assert_eq!(fill_and_wait(&manager, "order", &urls).await, TaskStatus::Done);

    assert_eq!(
        fetcher.completions(),
        vec![urls[2].clone(), urls[1].clone(), urls[0].clone()]
    );
    let files = manager.snapshot("order").unwrap().files;
    let recorded: Vec<_> = files.iter().map(|f| f.url.clone()).collect();
    assert_eq!(recorded, urls.to_vec());
}

#[tokio::test]
async fn test_transient_failures_are_retried() {
    let fetcher = MockFetcher::new();
    let urls = fixtures::three_urls();
    fetcher.fail_times(&urls[1], 2, FetchError::Status(503));
    let (manager, _dirs) = fixtures::manager_with_fetcher(3, fetcher.clone());
    manager.create_task("flaky").unwrap();

    assert_eq!(fill_and_wait(&manager, "flaky", &urls).await, TaskStatus::Done);
    assert_eq!(fetcher.attempts(&urls[1]), 3);
    assert_eq!(fetcher.attempts(&urls[0]), 1);
}

#[tokio::test]
async fn test_snapshots_are_consistent_during_pipeline() {
    let fetcher = MockFetcher::new();
    let urls = fixtures::three_urls();
    fetcher.set_delay(&urls[0], Duration::from_millis(30));
    let (manager, _dirs) = fixtures::manager_with_fetcher(3, fetcher);
    let manager = Arc::new(manager);
    manager.create_task("watch").unwrap();

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move {
                for _ in 0..50 {
                    let snapshot = manager.snapshot("watch").unwrap();
                    match snapshot.status {
                        TaskStatus::InProgress => {
                            assert!(snapshot.archive_path.is_none());
                            assert!(snapshot.finished_at.is_none());
                        }
                        TaskStatus::Done => {
                            assert!(snapshot.archive_path.is_some());
                            assert_eq!(snapshot.files.len(), 3);
                            assert!(snapshot.files.iter().all(|f| f.success));
                        }
                        TaskStatus::Error => panic!("task should not fail"),
                    }
                    tokio::time::sleep(Duration::from_millis(1)).await;
                }
            })
        })
        .collect();

    assert_eq!(fill_and_wait(&manager, "watch", &urls).await, TaskStatus::Done);
    for reader in readers {
        reader.await.unwrap();
    }
}

#[tokio::test]
async fn test_shutdown_deadline_clears_everything() {
    let fetcher = MockFetcher::new();
    let urls = fixtures::three_urls();
    fetcher.set_delay(&urls[2], Duration::from_millis(300));
    let (manager, _dirs) = fixtures::manager_with_fetcher(3, fetcher);

    manager.create_task("slow").unwrap();
    manager.create_task("idle").unwrap();
    for url in &urls {
        manager.add_file("slow", url).unwrap();
    }

    let outcome = manager.shutdown(Duration::from_millis(50)).await;

    assert_eq!(outcome, ShutdownOutcome::TimedOut { active: 2 });
    assert_eq!(manager.task_count(), 0);
    assert_eq!(manager.active_count(), 0);
    assert!(matches!(
        manager.snapshot("idle"),
        Err(TaskError::NotFound(_))
    ));
}
