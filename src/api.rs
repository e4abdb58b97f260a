// API client module: a small blocking HTTP client that talks to the remote
// task service. Every call is one request/response cycle with a JSON body
// and the bearer token attached; there are no retries.

use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::auth::Token;
use crate::error::{Error, Result};
use crate::task::{Task, TaskList};

pub const DEFAULT_API_URL: &str = "https://outlook.office.com/api/v2.0/me/tasks";

/// Holds a reqwest blocking client, the task collection URL and the headers
/// sent with every call.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    tasks_url: String,
    headers: HeaderMap,
}

impl ApiClient {
    /// Create a client for the collection at `tasks_url` (the default
    /// service when `None`), authenticated with `token`.
    pub fn new(tasks_url: Option<&str>, token: &Token) -> Result<Self> {
        let client = Client::builder().build()?;
        let bearer = format!("Bearer {}", token.access_token);
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&bearer).map_err(|_| Error::InvalidToken)?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(ApiClient {
            client,
            tasks_url: tasks_url
                .unwrap_or(DEFAULT_API_URL)
                .trim_end_matches('/')
                .to_string(),
            headers,
        })
    }

    pub fn tasks_url(&self) -> &str {
        &self.tasks_url
    }

    /// Send one request and return the raw response. Any non-2xx status is
    /// turned into an error carrying the body the server sent back.
    fn execute<B: Serialize + ?Sized>(
        &self,
        method: Method,
        uri: &str,
        payload: Option<&B>,
    ) -> Result<Response> {
        log::debug!("{} {}", method, uri);
        let mut req = self
            .client
            .request(method.clone(), uri)
            .headers(self.headers.clone());
        if let Some(payload) = payload {
            req = req.body(serde_json::to_vec(payload)?);
        }
        let res = req.send()?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().unwrap_or_default();
            log::warn!("{} {} answered {}", method, uri, status);
            return Err(Error::Status {
                method,
                uri: uri.to_string(),
                status,
                body,
            });
        }
        Ok(res)
    }

    /// Perform a call and deserialize the JSON response into `R`.
    pub fn fetch<B, R>(&self, method: Method, uri: &str, payload: Option<&B>) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let res = self.execute(method, uri, payload)?;
        let bytes = res.bytes()?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Perform a call and discard whatever the server answered with.
    pub fn dispatch<B>(&self, method: Method, uri: &str, payload: Option<&B>) -> Result<()>
    where
        B: Serialize + ?Sized,
    {
        let res = self.execute(method, uri, payload)?;
        // drain so the connection can be reused
        let _ = res.bytes()?;
        Ok(())
    }

    /// All tasks, in the order the server returns them.
    pub fn list_tasks(&self) -> Result<Vec<Task>> {
        let list: TaskList = self.fetch::<(), _>(Method::GET, &self.tasks_url, None)?;
        Ok(list.value)
    }

    pub fn create_task(&self, task: &Task) -> Result<()> {
        self.dispatch(Method::POST, &self.tasks_url, Some(task))
    }

    pub fn complete_task(&self, task: &Task) -> Result<()> {
        let uri = self.task_uri(task)?;
        self.dispatch::<()>(Method::POST, &format!("{}/complete", uri), None)
    }

    pub fn delete_task(&self, task: &Task) -> Result<()> {
        let uri = self.task_uri(task)?;
        self.dispatch::<()>(Method::DELETE, &uri, None)
    }

    fn task_uri(&self, task: &Task) -> Result<String> {
        task.resource_url(&self.tasks_url).ok_or(Error::MissingTaskUri)
    }
}
