// In-process stand-in for the task service and the OAuth token endpoint.
// Runs on its own thread and runtime so tests can use the blocking client.

#![allow(dead_code)]

use std::net::{SocketAddr, TcpListener};
use std::sync::{Arc, Mutex};

use axum::body::Bytes;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use serde_json::{json, Value};

#[derive(Clone, Debug)]
pub struct Recorded {
    pub method: Method,
    pub path: String,
    pub authorization: Option<String>,
    pub content_type: Option<String>,
    pub body: String,
}

#[derive(Default)]
struct Inner {
    tasks: Vec<Value>,
    requests: Vec<Recorded>,
    next_id: usize,
}

#[derive(Clone)]
pub struct MockServer {
    pub addr: SocketAddr,
    inner: Arc<Mutex<Inner>>,
}

pub const VALID_TOKEN: &str = "valid-token";

impl MockServer {
    pub fn start() -> Self {
        let _ = env_logger::builder().is_test(true).try_init();

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.set_nonblocking(true).unwrap();
        let addr = listener.local_addr().unwrap();
        let server = MockServer {
            addr,
            inner: Arc::new(Mutex::new(Inner::default())),
        };

        let app = Router::new().fallback(handle).with_state(server.clone());
        std::thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            runtime.block_on(async move {
                let listener = tokio::net::TcpListener::from_std(listener).unwrap();
                axum::serve(listener, app).await.unwrap();
            });
        });
        server
    }

    pub fn tasks_url(&self) -> String {
        format!("http://{}/tasks", self.addr)
    }

    pub fn token_url(&self) -> String {
        format!("http://{}/token", self.addr)
    }

    /// Seed a task the way the service would report it.
    pub fn add_task(&self, subject: &str, status: &str) -> String {
        let mut inner = self.inner.lock().unwrap();
        Self::push(&mut inner, self.addr, json!({"Subject": subject, "Status": status}))
    }

    fn push(inner: &mut Inner, addr: SocketAddr, mut task: Value) -> String {
        inner.next_id += 1;
        let id = format!("T{}", inner.next_id);
        task["Id"] = json!(id);
        task["@odata.id"] = json!(format!("http://{}/tasks/{}", addr, id));
        task.as_object_mut()
            .unwrap()
            .entry("Status")
            .or_insert(json!("NotStarted"));
        inner.tasks.push(task);
        id
    }

    pub fn tasks(&self) -> Vec<Value> {
        self.inner.lock().unwrap().tasks.clone()
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.inner.lock().unwrap().requests.clone()
    }

    /// Requests other than plain listings.
    pub fn mutations(&self) -> Vec<Recorded> {
        self.requests()
            .into_iter()
            .filter(|r| r.method != Method::GET)
            .collect()
    }
}

async fn handle(
    axum::extract::State(server): axum::extract::State<MockServer>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    let recorded = Recorded {
        method: method.clone(),
        path: uri.path().to_string(),
        authorization: header("authorization"),
        content_type: header("content-type"),
        body: String::from_utf8_lossy(&body).into_owned(),
    };
    let mut inner = server.inner.lock().unwrap();
    inner.requests.push(recorded.clone());

    if recorded.path == "/token" {
        return token_reply(&recorded.body);
    }

    if recorded.authorization.as_deref() != Some(&format!("Bearer {}", VALID_TOKEN)) {
        return (StatusCode::UNAUTHORIZED, "invalid token").into_response();
    }

    let segments: Vec<&str> = recorded.path.trim_matches('/').split('/').collect();
    match (method, segments.as_slice()) {
        (Method::GET, ["tasks"]) => axum::Json(json!({"value": inner.tasks})).into_response(),
        (Method::POST, ["tasks"]) => match serde_json::from_slice::<Value>(&body) {
            Ok(task) => {
                let id = MockServer::push(&mut inner, server.addr, task);
                let created = inner.tasks.iter().find(|t| t["Id"] == id).cloned();
                (StatusCode::CREATED, axum::Json(created)).into_response()
            }
            Err(_) => (StatusCode::BAD_REQUEST, "bad json").into_response(),
        },
        (Method::POST, ["tasks", id, "complete"]) => {
            match inner.tasks.iter_mut().find(|t| t["Id"] == *id) {
                Some(task) => {
                    task["Status"] = json!("Completed");
                    axum::Json(json!({"value": [task.clone()]})).into_response()
                }
                None => StatusCode::NOT_FOUND.into_response(),
            }
        }
        (Method::DELETE, ["tasks", id]) => {
            let before = inner.tasks.len();
            inner.tasks.retain(|t| t["Id"] != *id);
            if inner.tasks.len() == before {
                StatusCode::NOT_FOUND.into_response()
            } else {
                StatusCode::NO_CONTENT.into_response()
            }
        }
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

fn token_reply(form: &str) -> Response {
    let params: std::collections::HashMap<String, String> =
        url::form_urlencoded::parse(form.as_bytes()).into_owned().collect();
    let grant = params.get("grant_type").map(String::as_str);
    match grant {
        Some("authorization_code") if params.get("code").map(String::as_str) == Some("good-code") => {
            axum::Json(json!({
                "token_type": "Bearer",
                "access_token": VALID_TOKEN,
                "refresh_token": "first-refresh",
                "expires_in": 3600
            }))
            .into_response()
        }
        Some("refresh_token") if params.get("refresh_token").map(String::as_str) == Some("stored-refresh") => {
            axum::Json(json!({
                "token_type": "Bearer",
                "access_token": VALID_TOKEN,
                "expires_in": 3600
            }))
            .into_response()
        }
        _ => (
            StatusCode::BAD_REQUEST,
            axum::Json(json!({"error": "invalid_grant"})),
        )
            .into_response(),
    }
}
