use super::*;
use crate::testing;
use zapgate_whatsapp::{SessionStatus, TeardownStep};

fn create_request(session_id: &str, phone: Option<&str>) -> Json<CreateSessionRequest> {
    Json(CreateSessionRequest {
        session_id: session_id.to_string(),
        phone_number: phone.map(str::to_string),
        auth_folder_path: None,
        server_port: Some(8080),
    })
}

#[tokio::test]
async fn test_create_and_list_sessions() {
    let dir = tempfile::tempdir().unwrap();
    let (store, _factory) = testing::store(dir.path());
    let state = testing::app_state(store);

    let (status, response) = create_session(State(state.clone()), create_request("s1", None)).await;
    assert_eq!(status, StatusCode::CREATED);
    let snapshot = response.0.data.unwrap();
    assert_eq!(snapshot.status, SessionStatus::Connecting);
    assert_eq!(snapshot.server_port, Some(8080));

    let response = list_sessions(State(state)).await;
    let sessions = response.0.data.unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].session_id, "s1");
}

#[tokio::test]
async fn test_create_duplicate_is_conflict() {
    let dir = tempfile::tempdir().unwrap();
    let (store, _factory) = testing::store(dir.path());
    let state = testing::app_state(store);

    create_session(State(state.clone()), create_request("s1", None)).await;
    let (status, response) = create_session(State(state), create_request("s1", None)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(!response.0.success);
}

#[tokio::test]
async fn test_create_rejects_blank_id() {
    let dir = tempfile::tempdir().unwrap();
    let (store, _factory) = testing::store(dir.path());

    let (status, _) = create_session(State(testing::app_state(store)), create_request("  ", None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_create_rejects_path_like_id() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().join("auth");
    std::fs::create_dir_all(dir.path().join("victim")).unwrap();
    let (store, factory) = testing::store(&base);
    let state = testing::app_state(store);

    for id in ["../victim", "/tmp/elsewhere", "a/b"] {
        let (status, response) = create_session(State(state.clone()), create_request(id, None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{id}");
        assert!(response.0.error.unwrap().contains("invalid session id"));
    }
    assert!(factory.senders.lock().unwrap().is_empty());
    assert!(dir.path().join("victim").exists());
}

#[tokio::test]
async fn test_unknown_session_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let (store, _factory) = testing::store(dir.path());
    let state = testing::app_state(store);

    let (status, _) = get_session(State(state.clone()), Path("nope".into())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = get_qr_code(State(state.clone()), Path("nope".into())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = restart_session(State(state.clone()), Path("nope".into())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = delete_session(
        State(state),
        Path("nope".into()),
        Query(RemoveQuery { notify: false }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_send_requires_connection() {
    let dir = tempfile::tempdir().unwrap();
    let (store, _factory) = testing::store(dir.path());
    let state = testing::app_state(store);
    create_session(State(state.clone()), create_request("s1", None)).await;

    let (status, response) = send_message(
        State(state),
        Path("s1".into()),
        Json(SendMessageRequest {
            to: "5491144445555".into(),
            text: "hola".into(),
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(response.0.error.unwrap().contains("not connected"));
}

#[tokio::test]
async fn test_send_message_on_connected_session() {
    let dir = tempfile::tempdir().unwrap();
    let (store, factory) = testing::store(dir.path());
    testing::connected_session(&store, &factory, "s1", "5491100000000").await;
    let state = testing::app_state(store);

    let (status, response) = send_message(
        State(state.clone()),
        Path("s1".into()),
        Json(SendMessageRequest {
            to: "5491144445555".into(),
            text: "hola".into(),
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response.0.data.unwrap().message_id, "3EB0TEST");

    // The loopback socket reports numbers starting with 000 as unregistered.
    let (status, _) = send_message(
        State(state),
        Path("s1".into()),
        Json(SendMessageRequest {
            to: "0001234".into(),
            text: "hola".into(),
        }),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_delete_reports_teardown_steps() {
    let dir = tempfile::tempdir().unwrap();
    let (store, factory) = testing::store(dir.path());
    testing::connected_session(&store, &factory, "s1", "5491100000000").await;
    let state = testing::app_state(store);

    let (status, response) = delete_session(
        State(state.clone()),
        Path("s1".into()),
        Query(RemoveQuery { notify: false }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let report = response.0.data.unwrap();
    assert_eq!(report.logout, TeardownStep::Done);
    assert_eq!(report.auth_folder, TeardownStep::Done);
    assert!(state.store.get_session_status("s1").await.is_none());
}

#[tokio::test]
async fn test_qr_code_lookup() {
    let dir = tempfile::tempdir().unwrap();
    let (store, factory) = testing::store(dir.path());
    let state = testing::app_state(store);
    create_session(State(state.clone()), create_request("s1", None)).await;

    factory
        .sender("s1")
        .send(zapgate_whatsapp::socket::SocketEvent::ConnectionUpdate(
            zapgate_whatsapp::socket::ConnectionUpdate {
                qr: Some("2@pair".into()),
                connection: None,
            },
        ))
        .await
        .unwrap();

    let mut qr = None;
    for _ in 0..50 {
        let (_, response) = get_qr_code(State(state.clone()), Path("s1".into())).await;
        qr = response.0.data.and_then(|r| r.qr_code);
        if qr.is_some() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert_eq!(qr.as_deref(), Some("2@pair"));
}

#[test]
fn test_remove_query_defaults_to_notify() {
    let query: RemoveQuery = serde_json::from_str("{}").unwrap();
    assert!(query.notify);
}
