use super::*;
use serde_json::json;
use wiremock::matchers::{basic_auth, body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn engine(server: &MockServer) -> RestProcessEngine {
    RestProcessEngine::new(server.uri()).with_deletion_policy(DeletionPolicy::new(
        Duration::from_millis(10),
        Duration::from_millis(100),
    ))
}

#[test]
fn test_url_joins_without_double_slash() {
    let engine = RestProcessEngine::new("http://engine/service/");
    assert_eq!(engine.url("runtime/executions"), "http://engine/service/runtime/executions");
}

#[test]
fn test_from_config_copies_credentials() {
    let config = EngineConfig {
        username: Some("admin".into()),
        password: Some("secret".into()),
        ..EngineConfig::default()
    };
    let engine = RestProcessEngine::from_config(&config).unwrap();
    assert_eq!(engine.username.as_deref(), Some("admin"));
    assert_eq!(engine.deletion, DeletionPolicy::from_config(&config));
}

#[tokio::test]
async fn test_start_process_posts_definition_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/runtime/process-instances"))
        .and(body_json(json!({
            "processDefinitionKey": "xs2-deploy",
            "variables": [{"name": "user", "value": "alice"}]
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "p1"})))
        .mount(&server)
        .await;

    let mut variables = Variables::new();
    variables.insert("user".into(), json!("alice"));
    let id = engine(&server).start_process("xs2-deploy", variables).await.unwrap();
    assert_eq!(id, "p1");
}

#[tokio::test]
async fn test_requests_carry_basic_auth() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/management/deadletter-jobs"))
        .and(basic_auth("admin", "secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": [{"id": "job-1"}]})))
        .mount(&server)
        .await;

    let jobs = engine(&server)
        .with_credentials("admin", "secret")
        .dead_letter_work("p1")
        .await
        .unwrap();
    assert_eq!(jobs, ["job-1"]);
}

#[tokio::test]
async fn test_describe_missing_process_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/runtime/process-instances/ghost"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    assert!(engine(&server).describe_process("ghost").await.unwrap().is_none());
}

#[tokio::test]
async fn test_describe_reads_variables() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/runtime/process-instances/p1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "p1",
            "processDefinitionKey": "xs2-bg-deploy"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/runtime/process-instances/p1/variables"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"name": "spaceId", "value": "space-1"},
            {"name": "user", "value": "alice"}
        ])))
        .mount(&server)
        .await;

    let description = engine(&server).describe_process("p1").await.unwrap().unwrap();
    assert_eq!(description.definition_key, "xs2-bg-deploy");
    assert_eq!(description.string_variable("spaceId").as_deref(), Some("space-1"));
}

#[tokio::test]
async fn test_active_sub_executions_walks_tree_in_start_order() {
    let server = MockServer::start().await;
    let children = |parent: &str, body: serde_json::Value| {
        Mock::given(method("GET"))
            .and(path("/runtime/process-instances"))
            .and(query_param("superProcessInstanceId", parent))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
    };
    children(
        "root",
        json!({"data": [
            {"id": "b", "startTime": "2024-01-01T00:00:02.000Z"},
            {"id": "a", "startTime": "2024-01-01T00:00:01.000Z"}
        ]}),
    )
    .mount(&server)
    .await;
    children("a", json!({"data": [{"id": "c", "startTime": "2024-01-01T00:00:03.000Z"}]}))
        .mount(&server)
        .await;
    children("b", json!({"data": []})).mount(&server).await;
    children("c", json!({"data": []})).mount(&server).await;

    let ids = engine(&server).active_sub_executions("root").await.unwrap();
    assert_eq!(ids, ["a", "b", "c"]);
}

#[tokio::test]
async fn test_wait_point_executions_are_parked_at_named_activity() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/runtime/executions"))
        .and(query_param("processInstanceId", "p1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": [
            {"id": "p1", "activityId": null},
            {"id": "e1", "activityId": "waitForConfirmation"},
            {"id": "e2", "activityId": "deployAppServiceTask"}
        ]})))
        .mount(&server)
        .await;

    let waiting = engine(&server).executions_at_wait_point("p1").await.unwrap();
    assert_eq!(waiting, ["e1"]);
}

#[tokio::test]
async fn test_service_task_execution_is_not_parked() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/runtime/executions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": [
            {"id": "p1", "activityId": null},
            {"id": "e2", "activityId": "deployAppServiceTask"}
        ]})))
        .mount(&server)
        .await;

    let waiting = engine(&server).executions_at_wait_point("p1").await.unwrap();
    assert!(waiting.is_empty());

    let custom = engine(&server).with_wait_points(["deployAppServiceTask"]);
    assert_eq!(custom.executions_at_wait_point("p1").await.unwrap(), ["e2"]);
}

#[test]
fn test_from_config_copies_wait_points() {
    let config = EngineConfig {
        wait_points: vec!["awaitApproval".into()],
        ..EngineConfig::default()
    };
    let engine = RestProcessEngine::from_config(&config).unwrap();
    assert!(engine.is_wait_point(Some("awaitApproval")));
    assert!(!engine.is_wait_point(Some("waitForConfirmation")));
    assert!(!engine.is_wait_point(None));
}

#[tokio::test]
async fn test_delete_tree_retries_conflicts() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/runtime/process-instances/p1"))
        .and(query_param("deleteReason", "ABORTED"))
        .respond_with(ResponseTemplate::new(409).set_body_string("modified concurrently"))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/runtime/process-instances/p1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    engine(&server).delete_execution_tree("p1", "ABORTED").await.unwrap();
}

#[tokio::test]
async fn test_delete_tree_gives_up_after_deadline() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/runtime/process-instances/p1"))
        .respond_with(ResponseTemplate::new(409))
        .mount(&server)
        .await;

    let result = engine(&server).delete_execution_tree("p1", "ABORTED").await;
    assert!(matches!(result, Err(EngineError::DeadlineExceeded { .. })));
}

#[tokio::test]
async fn test_delete_missing_tree_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/runtime/process-instances/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    engine(&server).delete_execution_tree("gone", "ABORTED").await.unwrap();
}

#[tokio::test]
async fn test_is_finished_when_instance_missing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/runtime/process-instances/done"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/runtime/process-instances/live"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "live", "ended": false})))
        .mount(&server)
        .await;

    let engine = engine(&server);
    assert!(engine.is_finished("done").await.unwrap());
    assert!(!engine.is_finished("live").await.unwrap());
}

#[tokio::test]
async fn test_get_variable_missing_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/runtime/executions/p1/variables/user"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    assert!(engine(&server).get_variable("p1", "user").await.unwrap().is_none());
}

#[tokio::test]
async fn test_move_to_executable_sends_retries() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/management/deadletter-jobs/job-1"))
        .and(body_json(json!({"action": "move", "retries": 0})))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    engine(&server).move_to_executable("job-1", 0).await.unwrap();
}

#[tokio::test]
async fn test_server_error_maps_to_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/history/historic-process-instances"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let result = engine(&server)
        .finished_processes_started_before(Utc::now(), 0, 10)
        .await;
    match result {
        Err(EngineError::ApiError { status, message }) => {
            assert_eq!(status, 500);
            assert_eq!(message, "boom");
        }
        other => panic!("expected api error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_finished_roots_exclude_subprocesses() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/history/historic-process-instances"))
        .and(query_param("finished", "true"))
        .and(query_param("excludeSubprocesses", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": [
            {"id": "root-1", "startTime": "2026-01-01T00:00:00.000Z"}
        ]})))
        .expect(1)
        .mount(&server)
        .await;

    let roots = engine(&server)
        .finished_processes_started_before(Utc::now(), 0, 10)
        .await
        .unwrap();
    assert_eq!(roots, ["root-1"]);
}
