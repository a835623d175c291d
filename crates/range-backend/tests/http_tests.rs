use futures::StreamExt;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use range_backend::wire::{ScenarioDocument, ToolRecordPayload, UninstallRequest};
use range_backend::{Backend, BackendError, BackendSettings, HttpBackend};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use warp::http::StatusCode;
use warp::Filter;

type Posted = Arc<Mutex<Vec<Value>>>;

fn spawn_server(posted: Posted) -> String {
    let instances = warp::path!("api" / "openstack" / "instances")
        .and(warp::get())
        .map(|| {
            warp::reply::json(&json!({
                "instances": [
                    {"id": "i-1", "name": "victim-1", "ip_private": "10.0.0.5", "ip_floating": null,
                     "image_name": "ubuntu", "flavor_name": "m1.small", "status": "ACTIVE"}
                ]
            }))
        });

    let tools = warp::path!("api" / "get_tools_for_instance")
        .and(warp::get())
        .and(warp::query::<HashMap<String, String>>())
        .map(|query: HashMap<String, String>| {
            warp::reply::json(&json!({
                "instance": query.get("instance"),
                "tools": ["nmap", "hydra"]
            }))
        });

    let add_posted = posted.clone();
    let add = warp::path!("api" / "add_tool_to_instance")
        .and(warp::post())
        .and(warp::body::json())
        .map(move |body: Value| {
            add_posted.lock().push(body);
            warp::reply::json(&json!({"status": "success"}))
        });

    let uninstall = warp::path!("api" / "uninstall_tool_from_instance")
        .and(warp::post())
        .and(warp::body::json())
        .map(|body: Value| {
            let (status, exit_code) = if body["tool"] == "nmap" {
                ("success", 0)
            } else {
                ("warning", 1)
            };
            warp::reply::json(&json!({"status": status, "exit_code": exit_code, "msg": "done"}))
        });

    let scenario = warp::path!("api" / "get_scenario" / String).map(|name: String| {
        if name == "file" || name.starts_with("lab") {
            warp::reply::with_status(
                warp::reply::json(&json!({
                    "nodes": [{"id": "n1", "name": "attack-1", "properties": {}}],
                    "edges": []
                })),
                StatusCode::OK,
            )
        } else {
            warp::reply::with_status(
                warp::reply::json(&json!({"status": "error", "message": "not found"})),
                StatusCode::NOT_FOUND,
            )
        }
    });

    let configs = warp::path!("api" / "read_tools_configs").map(|| "this is not json");

    let install = warp::path!("api" / "install_tools").and(warp::post()).map(|| {
        let chunks = futures::stream::iter(
            ["data: line1\n", "data: li", "ne2\n"]
                .into_iter()
                .map(Ok::<_, Infallible>),
        );
        warp::http::Response::builder()
            .header("content-type", "text/event-stream")
            .body(warp::hyper::Body::wrap_stream(chunks))
    });

    let routes = instances
        .or(tools)
        .or(add)
        .or(uninstall)
        .or(scenario)
        .or(configs)
        .or(install);

    let (addr, server) = warp::serve(routes).bind_ephemeral(([127, 0, 0, 1], 0));
    tokio::spawn(server);
    format!("http://{addr}")
}

/// Serves the JSON routes slowly and streams the install one chunk at a time
fn spawn_slow_server(delay: Duration) -> String {
    let tools = warp::path!("api" / "get_tools_for_instance").and_then(move || async move {
        tokio::time::sleep(delay * 4).await;
        Ok::<_, Infallible>(warp::reply::json(&json!({"tools": ["nmap"]})))
    });

    let install = warp::path!("api" / "install_tools").and(warp::post()).map(move || {
        let chunks = futures::stream::unfold(0, move |step| async move {
            if step == 3 {
                return None;
            }
            tokio::time::sleep(delay).await;
            Some((Ok::<_, Infallible>(format!("data: step {step}\n")), step + 1))
        });
        warp::http::Response::builder()
            .header("content-type", "text/event-stream")
            .body(warp::hyper::Body::wrap_stream(chunks))
    });

    let (addr, server) = warp::serve(tools.or(install)).bind_ephemeral(([127, 0, 0, 1], 0));
    tokio::spawn(server);
    format!("http://{addr}")
}

/// Answers every request with a 200, part of a JSON body, then hangs up
async fn spawn_truncating_server() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let mut request = [0u8; 2048];
            let _ = socket.read(&mut request).await;
            let _ = socket
                .write_all(
                    b"HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: 64\r\n\r\n{\"tools\":[\"nm",
                )
                .await;
            let _ = socket.flush().await;
        }
    });
    format!("http://{addr}")
}

fn client(base_url: &str) -> HttpBackend {
    HttpBackend::new(BackendSettings::new(base_url)).unwrap()
}

#[tokio::test]
async fn test_lists_instances() {
    let backend = client(&spawn_server(Posted::default()));

    let listing = backend.list_instances().await.unwrap();

    assert_eq!(listing.instances.len(), 1);
    assert_eq!(listing.instances[0].name, "victim-1");
    assert_eq!(listing.instances[0].ip_floating, None);
}

#[tokio::test]
async fn test_fetch_tools_sends_instance_query() {
    let backend = client(&spawn_server(Posted::default()));

    let listing = backend.fetch_tools("victim-1").await.unwrap();

    assert_eq!(listing.instance.as_deref(), Some("victim-1"));
    assert_eq!(listing.tools, vec!["nmap".to_string(), "hydra".to_string()]);
}

#[tokio::test]
async fn test_persist_posts_full_record() {
    let posted = Posted::default();
    let backend = client(&spawn_server(posted.clone()));
    let record = ToolRecordPayload {
        instance: "victim-1".into(),
        id: "i-1".into(),
        name: "victim-1".into(),
        role: "victim".into(),
        ip: "10.0.0.5".into(),
        tools: vec!["nmap".into()],
        ..ToolRecordPayload::default()
    };

    backend.persist_tools(&record).await.unwrap();

    let bodies = posted.lock().clone();
    assert_eq!(bodies.len(), 1);
    assert_eq!(bodies[0]["tools"], json!(["nmap"]));
    assert_eq!(bodies[0]["role"], "victim");
}

#[tokio::test]
async fn test_uninstall_decodes_exit_code() {
    let backend = client(&spawn_server(Posted::default()));
    let request = |tool: &str| UninstallRequest {
        instance: "victim-1".into(),
        tool: tool.into(),
        ..UninstallRequest::default()
    };

    assert!(backend.uninstall_tool(&request("nmap")).await.unwrap().is_confirmed());

    let refused = backend.uninstall_tool(&request("hydra")).await.unwrap();
    assert_eq!(refused.exit_code, Some(1));
    assert!(!refused.is_confirmed());
}

#[tokio::test]
async fn test_scenario_not_found_is_rejection() {
    let backend = client(&spawn_server(Posted::default()));

    let found: ScenarioDocument = backend.fetch_scenario("file").await.unwrap();
    assert_eq!(found.nodes.len(), 1);

    let err = backend.fetch_scenario("nope").await.unwrap_err();
    assert!(matches!(err, BackendError::Rejected { status: 404, ref body } if body.contains("not found")));
}

#[tokio::test]
async fn test_non_json_body_is_malformed() {
    let backend = client(&spawn_server(Posted::default()));

    let err = backend.read_tool_configs().await.unwrap_err();

    assert!(err.is_malformed());
}

#[tokio::test]
async fn test_install_streams_all_bytes() {
    let backend = client(&spawn_server(Posted::default()));

    let mut stream = backend.install_all().await.unwrap();
    let mut body = Vec::new();
    while let Some(chunk) = stream.next().await {
        body.extend(chunk.unwrap());
    }

    assert_eq!(String::from_utf8(body).unwrap(), "data: line1\ndata: line2\n");
}

#[tokio::test]
async fn test_connection_refused_is_transport() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let backend = client(&format!("http://127.0.0.1:{port}"));

    let err = backend.list_instances().await.unwrap_err();

    assert!(err.is_transport());
}

#[tokio::test]
async fn test_body_cut_mid_read_is_transport() {
    let backend = client(&spawn_truncating_server().await);

    let err = backend.fetch_tools("victim-1").await.unwrap_err();

    assert!(err.is_transport(), "{err:?}");
    assert!(!err.is_malformed());
}

#[tokio::test]
async fn test_slow_install_stream_outlives_request_timeout() {
    let base_url = spawn_slow_server(Duration::from_millis(600));
    let backend =
        HttpBackend::new(BackendSettings::new(base_url).with_timeout(Duration::from_secs(1)))
            .unwrap();

    let mut stream = backend.install_all().await.unwrap();
    let mut body = Vec::new();
    while let Some(chunk) = stream.next().await {
        body.extend(chunk.unwrap());
    }

    assert_eq!(
        String::from_utf8(body).unwrap(),
        "data: step 0\ndata: step 1\ndata: step 2\n"
    );
}

#[tokio::test]
async fn test_json_route_timeout_is_transport() {
    let base_url = spawn_slow_server(Duration::from_millis(600));
    let backend =
        HttpBackend::new(BackendSettings::new(base_url).with_timeout(Duration::from_secs(1)))
            .unwrap();

    let err = backend.fetch_tools("victim-1").await.unwrap_err();

    assert!(err.is_transport(), "{err:?}");
}

#[tokio::test]
async fn test_scenario_name_is_sent_as_one_segment() {
    let backend = client(&spawn_server(Posted::default()));

    let found = backend.fetch_scenario("lab 2/ics").await.unwrap();

    assert_eq!(found.nodes.len(), 1);
}
