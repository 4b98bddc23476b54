use super::*;
use crate::{
    config::normalize_server_url,
    mock_server::{spawn_board_server, MockBoardServer, VALID_TOKEN},
    session::StaticToken,
};
use reqwest::Method;
use shared::domain::TaskStatus;

async fn api_with_token(token: Option<&str>) -> (HttpBoardApi, MockBoardServer) {
    let (server_url, server) = spawn_board_server().await.expect("spawn server");
    let session = StaticToken(token.map(str::to_string));
    let api = HttpBoardApi::new(
        Client::new(),
        normalize_server_url(&server_url).expect("url"),
        Arc::new(session),
    );
    (api, server)
}

#[tokio::test]
async fn list_boards_sends_bearer_token_and_decodes_tasks() {
    let (api, server) = api_with_token(Some(VALID_TOKEN)).await;
    server
        .seed_board("Sprint 1", &[("Write spec", TaskStatus::Todo)])
        .await;

    let boards = api.list_boards().await.expect("list boards");
    assert_eq!(boards.len(), 1);
    assert_eq!(boards[0].tasks[0].title, "Write spec");

    let requests = server.requests_to(Method::GET, "/api/workboards/").await;
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0].authorization.as_deref(),
        Some("Bearer test-token")
    );
}

#[tokio::test]
async fn missing_token_fails_without_touching_the_network() {
    let (api, server) = api_with_token(None).await;

    let err = api.list_boards().await.expect_err("should fail");
    assert_eq!(err, BoardError::Unauthorized(None));
    assert!(server.requests().await.is_empty());
}

#[tokio::test]
async fn blank_token_counts_as_missing() {
    let (api, server) = api_with_token(Some("  ")).await;

    let err = api
        .create_board("Sprint", "")
        .await
        .expect_err("should fail");
    assert!(err.is_unauthorized());
    assert!(server.requests().await.is_empty());
}

#[tokio::test]
async fn rejected_token_surfaces_unauthorized_with_server_detail() {
    let (api, _server) = api_with_token(Some("expired")).await;

    let err = api.list_boards().await.expect_err("should fail");
    assert_eq!(
        err,
        BoardError::Unauthorized(Some("Given token not valid for any token type".into()))
    );
}

#[tokio::test]
async fn create_board_posts_name_and_description() {
    let (api, server) = api_with_token(Some(VALID_TOKEN)).await;

    let board = api
        .create_board("Sprint 1", "first sprint")
        .await
        .expect("create");
    assert_eq!(board.name, "Sprint 1");
    assert!(board.tasks.is_empty());

    let requests = server.requests_to(Method::POST, "/api/workboards/").await;
    assert_eq!(requests[0].body["name"], "Sprint 1");
    assert_eq!(requests[0].body["description"], "first sprint");
}

#[tokio::test]
async fn empty_board_name_is_a_validation_error() {
    let (api, _server) = api_with_token(Some(VALID_TOKEN)).await;

    let err = api.create_board("", "").await.expect_err("should fail");
    assert_eq!(
        err,
        BoardError::Validation(Some("name: This field may not be blank.".into()))
    );
}

#[tokio::test]
async fn add_task_to_unknown_board_is_not_found() {
    let (api, _server) = api_with_token(Some(VALID_TOKEN)).await;

    let err = api
        .add_task(BoardId(999), &TaskDraft::new("orphan"))
        .await
        .expect_err("should fail");
    assert!(matches!(err, BoardError::NotFound(_)), "unexpected: {err:?}");
}

#[tokio::test]
async fn add_task_returns_server_assigned_id() {
    let (api, server) = api_with_token(Some(VALID_TOKEN)).await;
    let board = server.seed_board("Sprint 1", &[]).await;

    let task = api
        .add_task(
            board.id,
            &TaskDraft::new("Write spec")
                .with_status(TaskStatus::InProgress)
                .assigned_to("alice"),
        )
        .await
        .expect("add task");
    assert!(task.id.0 > board.id.0);
    assert_eq!(task.status, TaskStatus::InProgress);
    assert_eq!(task.assigned_to.as_deref(), Some("alice"));

    let requests = server.requests_to(Method::POST, "/add_task/").await;
    assert_eq!(
        requests[0].path,
        format!("/api/workboards/{}/add_task/", board.id)
    );
    assert_eq!(requests[0].body["status"], "IN_PROGRESS");
    assert!(requests[0].body.get("id").is_none());
}

#[tokio::test]
async fn update_task_sends_the_full_task_payload() {
    let (api, server) = api_with_token(Some(VALID_TOKEN)).await;
    let board = server
        .seed_board("Sprint 1", &[("Write spec", TaskStatus::Todo)])
        .await;
    let mut task = board.tasks[0].clone();
    task.description = Some("outline first".into());
    task.status = TaskStatus::Completed;

    let updated = api.update_task(board.id, &task).await.expect("update");
    assert_eq!(updated, task);

    let requests = server.requests_to(Method::PUT, "/update_task/").await;
    let body = &requests[0].body;
    assert_eq!(body["id"], task.id.0);
    assert_eq!(body["title"], "Write spec");
    assert_eq!(body["description"], "outline first");
    assert_eq!(body["status"], "COMPLETED");
}

#[tokio::test]
async fn update_of_unknown_task_is_not_found() {
    let (api, server) = api_with_token(Some(VALID_TOKEN)).await;
    let board = server.seed_board("Sprint 1", &[]).await;
    let ghost = shared::domain::Task {
        id: shared::domain::TaskId(404),
        title: "ghost".into(),
        description: None,
        assigned_to: None,
        status: TaskStatus::Todo,
    };

    let err = api
        .update_task(board.id, &ghost)
        .await
        .expect_err("should fail");
    assert_eq!(err, BoardError::NotFound(Some("Not found.".into())));
}

#[tokio::test]
async fn server_failure_is_typed_and_not_retried() {
    let (api, server) = api_with_token(Some(VALID_TOKEN)).await;
    let board = server.seed_board("Sprint 1", &[]).await;
    server.fail_tasks_titled("explode").await;

    let err = api
        .add_task(board.id, &TaskDraft::new("explode"))
        .await
        .expect_err("should fail");
    assert_eq!(
        err,
        BoardError::Server {
            status: 500,
            message: Some("boom".into())
        }
    );
    assert_eq!(server.requests_to(Method::POST, "/add_task/").await.len(), 1);
}

#[tokio::test]
async fn unreachable_server_is_a_network_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let api = HttpBoardApi::new(
        Client::new(),
        normalize_server_url(&format!("http://{addr}")).expect("url"),
        Arc::new(StaticToken::new(VALID_TOKEN)),
    );
    let err = api.list_boards().await.expect_err("should fail");
    assert!(matches!(err, BoardError::Network(_)), "unexpected: {err:?}");
}
