//! Workflow tests against a live server over the in-memory store

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use doublons_client::{default_merge_request, ApiClient, LocalCache, WorkflowController};
use doublons_common::config::AppConfig;
use doublons_common::models::{GroupStatus, ScanStatus, Student};
use doublons_common::MemStore;
use doublons_server::{create_router, AppState};
use tempfile::TempDir;
use uuid::Uuid;

fn twin(nom: &str, prenom: &str) -> Student {
    let mut s = Student::new(nom, prenom);
    s.date_naissance = NaiveDate::from_ymd_opt(2001, 5, 2);
    s
}

async fn spawn_server(students: Vec<Student>, throttle_ms: u64) -> (String, Arc<MemStore>) {
    let mut config = AppConfig::default();
    config.database.backend = "memory".to_string();
    config.scan.block_throttle_ms = throttle_ms;

    let store = Arc::new(MemStore::new());
    store.seed_students(students).await;

    let state = AppState::new(Arc::new(config), store.clone());
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", addr), store)
}

fn controller(base_url: &str, dir: &TempDir) -> WorkflowController {
    let api = ApiClient::new(base_url).unwrap();
    let cache = LocalCache::load(dir.path().join("cache.json"));
    WorkflowController::new(api, cache).with_poll_interval(Duration::from_millis(10))
}

#[tokio::test]
async fn test_full_review_session() {
    let (base_url, _store) = spawn_server(
        vec![
            twin("Rakoto", "Jean"),
            twin("Rakoto", "Jean"),
            twin("Andria", "Miora"),
        ],
        0,
    )
    .await;
    let dir = TempDir::new().unwrap();
    let mut workflow = controller(&base_url, &dir);

    let job_id = workflow.start_or_resume().await.unwrap();
    assert_eq!(workflow.cache().active_job(), Some(job_id));

    let refreshes = AtomicU32::new(0);
    let snapshot = workflow
        .poll_until_terminal(job_id, |_| {
            refreshes.fetch_add(1, Ordering::SeqCst);
        })
        .await
        .unwrap();

    assert_eq!(snapshot.status, ScanStatus::Completed);
    assert_eq!(snapshot.found_count, 1);
    assert!(refreshes.load(Ordering::SeqCst) >= 1);
    // A completed job must not be resumed on the next visit
    assert_eq!(workflow.cache().active_job(), None);

    let groups = workflow.to_review(1, 20).await.unwrap();
    assert_eq!(groups.len(), 1);
    let group = &groups[0];

    // Merge with the pre-filled request, then the group leaves the view
    let request = default_merge_request(group).unwrap();
    let outcome = workflow.merge_group(group, request).await.unwrap();
    assert_eq!(outcome.merged_count, 1);
    assert!(outcome.group_resolved);

    assert!(workflow.to_review(1, 20).await.unwrap().is_empty());

    // The server no longer lists the group, so reconciliation also
    // drops the local history entry
    let displayed = workflow.reconcile(100).await.unwrap();
    assert!(displayed.is_empty());
    assert!(workflow.cache().handled_signatures().is_empty());

    // The loser is gone; the master survives with the merged dossiers
    let master = workflow
        .api()
        .get_student(outcome.master.id)
        .await
        .unwrap();
    assert_eq!(master.id, outcome.master.id);
}

#[tokio::test]
async fn test_optimistic_hiding_before_server_catches_up() {
    let (base_url, _store) =
        spawn_server(vec![twin("Rabe", "Noro"), twin("Rabe", "Noro")], 0).await;
    let dir = TempDir::new().unwrap();
    let mut workflow = controller(&base_url, &dir);

    let job_id = workflow.start_or_resume().await.unwrap();
    workflow.poll_until_terminal(job_id, |_| {}).await.unwrap();

    let groups = workflow.to_review(1, 20).await.unwrap();
    assert_eq!(groups.len(), 1);

    // Dismissing flips the group to IGNORE server-side and hides it
    // locally right away
    let updated = workflow.dismiss_group(&groups[0]).await.unwrap();
    assert_eq!(updated.statut, GroupStatus::Ignore);
    assert!(workflow.to_review(1, 20).await.unwrap().is_empty());

    // The ignore entry suppresses the pair on the next pass
    let job_id = workflow.start_or_resume().await.unwrap();
    let snapshot = workflow.poll_until_terminal(job_id, |_| {}).await.unwrap();
    assert_eq!(snapshot.found_count, 0);
}

#[tokio::test]
async fn test_stale_cached_job_falls_back_to_fresh_start() {
    let (base_url, _store) = spawn_server(vec![], 0).await;
    let dir = TempDir::new().unwrap();

    let stale = Uuid::new_v4();
    {
        let mut cache = LocalCache::load(dir.path().join("cache.json"));
        cache.set_active_job(Some(stale)).unwrap();
    }

    let mut workflow = controller(&base_url, &dir);
    let job_id = workflow.start_or_resume().await.unwrap();
    assert_ne!(job_id, stale);
    assert_eq!(workflow.cache().active_job(), Some(job_id));
}

#[tokio::test]
async fn test_unknown_job_clears_local_reference() {
    let (base_url, _store) = spawn_server(vec![], 0).await;
    let dir = TempDir::new().unwrap();
    let mut workflow = controller(&base_url, &dir);

    let ghost = Uuid::new_v4();
    let snapshot = workflow.poll_until_terminal(ghost, |_| {}).await.unwrap();
    assert_eq!(snapshot.status, ScanStatus::Unknown);
    assert_eq!(workflow.cache().active_job(), None);
}

#[tokio::test]
async fn test_stop_confirms_pause_and_resume_finishes() {
    let mut students = Vec::new();
    for i in 0..10 {
        let nom = format!("{}rakoto", (b'a' + i as u8) as char);
        students.push(twin(&nom, "Jean"));
    }
    students.push(twin("Zafy", "Lova"));
    students.push(twin("Zafy", "Lova"));

    let (base_url, _store) = spawn_server(students, 25).await;
    let dir = TempDir::new().unwrap();
    let mut workflow = controller(&base_url, &dir);

    let job_id = workflow.start_or_resume().await.unwrap();
    tokio::time::sleep(Duration::from_millis(40)).await;

    let snapshot = workflow.stop(job_id).await.unwrap();
    assert_eq!(snapshot.status, ScanStatus::Paused);
    // Paused jobs keep their local reference for the next visit
    assert_eq!(workflow.cache().active_job(), Some(job_id));

    let resumed = workflow.start_or_resume().await.unwrap();
    assert_eq!(resumed, job_id);
    let snapshot = workflow.poll_until_terminal(job_id, |_| {}).await.unwrap();
    assert_eq!(snapshot.status, ScanStatus::Completed);
    assert_eq!(snapshot.found_count, 1);
}
