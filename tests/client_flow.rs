//! End-to-end tests for the client library against a live server:
//! `TasksClient` wire calls and the `TaskBrowser` cached-view discipline
//! (validate before dispatch, refetch after every successful mutation).

use std::sync::Arc;
use taskd::client::state::{EditorState, SaveRequest, TaskBrowser};
use taskd::client::{ClientError, ListQuery, TasksClient};
use taskd::config::ServerConfig;
use taskd::storage::Storage;
use taskd::tasks::model::{CreateTask, Priority, UpdateTask};
use taskd::tasks::query::Selector;
use taskd::tasks::TaskStore;
use taskd::{rest, AppContext};
use tempfile::TempDir;
use uuid::Uuid;

/// Boot the real server on an ephemeral port and return the base URL.
async fn spawn_server(dir: &TempDir) -> String {
    let config = Arc::new(ServerConfig::new(
        Some(0),
        Some(dir.path().to_path_buf()),
        Some("error".to_string()),
        None,
    ));
    let storage = Storage::new(dir.path()).await.unwrap();
    let store = TaskStore::new(storage.pool());
    let ctx = Arc::new(AppContext {
        config,
        store,
        started_at: std::time::Instant::now(),
    });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = rest::serve(ctx, listener).await;
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn test_client_crud_round_trip() {
    let dir = TempDir::new().unwrap();
    let base = spawn_server(&dir).await;
    let client = TasksClient::new(&base).unwrap();

    assert!(client.is_reachable().await, "health probe should succeed");

    let created = client
        .create(&CreateTask {
            title: "Buy milk".to_string(),
            tags: Some(vec!["Home".to_string()]),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(created.title, "Buy milk");
    assert_eq!(created.priority, Priority::Medium);
    assert!(!created.completed);

    let fetched = client.get(created.id).await.unwrap();
    assert_eq!(fetched, created, "get must return the task exactly as created");

    let updated = client
        .update(
            created.id,
            &UpdateTask {
                starred: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(updated.starred);

    let listed = client
        .list(&ListQuery {
            filter: Some(Selector::Starred),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);

    client.delete(created.id).await.unwrap();
    let err = client.get(created.id).await.unwrap_err();
    assert!(matches!(err, ClientError::NotFound), "got: {err:?}");
}

#[tokio::test]
async fn test_server_validation_surfaces_as_invalid() {
    let dir = TempDir::new().unwrap();
    let base = spawn_server(&dir).await;
    let client = TasksClient::new(&base).unwrap();

    // Bypass the client-side check to prove the server detail comes through.
    let err = client
        .create(&CreateTask {
            title: "   ".to_string(),
            ..Default::default()
        })
        .await
        .unwrap_err();
    match err {
        ClientError::Invalid(msg) => {
            assert!(msg.contains("title"), "message should carry the server detail: {msg}")
        }
        other => panic!("expected Invalid, got {other:?}"),
    }
}

#[tokio::test]
async fn test_browser_save_toggle_and_refetch() {
    let dir = TempDir::new().unwrap();
    let base = spawn_server(&dir).await;
    let mut browser = TaskBrowser::new(TasksClient::new(&base).unwrap());

    browser.refresh().await.unwrap();
    assert!(browser.tasks().is_empty());

    let saved = browser
        .save(SaveRequest::Create(CreateTask {
            title: "Write report".to_string(),
            tags: Some(vec!["Work".to_string()]),
            starred: Some(true),
            ..Default::default()
        }))
        .await
        .unwrap();
    assert_eq!(browser.tasks().len(), 1, "save must refetch the list");
    assert_eq!(browser.editor, EditorState::Closed, "save closes the editor");

    let renamed = browser
        .save(SaveRequest::Update {
            id: saved.id,
            patch: UpdateTask {
                title: Some("Write quarterly report".to_string()),
                ..Default::default()
            },
        })
        .await
        .unwrap();
    assert_eq!(renamed.title, "Write quarterly report");
    assert_eq!(browser.tasks()[0].title, "Write quarterly report");

    let toggled = browser.toggle_completed(saved.id).await.unwrap();
    assert!(toggled);
    assert!(
        browser.tasks()[0].completed,
        "cache reflects the toggle after refetch"
    );

    // Unknown id is a cache-level no-op, not an error.
    let missing = browser.toggle_completed(Uuid::new_v4()).await.unwrap();
    assert!(!missing);

    browser.selector = Selector::Starred;
    let visible = browser.visible_tasks();
    assert_eq!(visible.len(), 1, "starred view runs the same pure pipeline");

    assert_eq!(browser.all_tags(), ["Work"]);

    browser.delete(saved.id).await.unwrap();
    assert!(browser.tasks().is_empty(), "delete must refetch");
}

#[tokio::test]
async fn test_browser_rejects_invalid_save_before_dispatch() {
    let dir = TempDir::new().unwrap();
    let base = spawn_server(&dir).await;
    let mut browser = TaskBrowser::new(TasksClient::new(&base).unwrap());

    let err = browser
        .save(SaveRequest::Create(CreateTask::default()))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Invalid(_)), "got: {err:?}");

    browser.refresh().await.unwrap();
    assert!(browser.tasks().is_empty(), "nothing must reach the server");
}

#[tokio::test]
async fn test_browser_editor_lifecycle() {
    let dir = TempDir::new().unwrap();
    let base = spawn_server(&dir).await;
    let mut browser = TaskBrowser::new(TasksClient::new(&base).unwrap());

    browser
        .save(SaveRequest::Create(CreateTask {
            title: "Plan trip".to_string(),
            ..Default::default()
        }))
        .await
        .unwrap();

    assert!(browser.open_editor(None));
    assert_eq!(browser.editor, EditorState::Creating);
    browser.close_editor();
    assert_eq!(browser.editor, EditorState::Closed);

    let id = browser.tasks()[0].id;
    assert!(browser.open_editor(Some(id)));
    match &browser.editor {
        EditorState::Editing(task) => assert_eq!(task.id, id),
        other => panic!("expected Editing, got {other:?}"),
    }

    assert!(
        !browser.open_editor(Some(Uuid::new_v4())),
        "an id missing from the cache cannot open the editor"
    );
}
