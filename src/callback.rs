// Loopback listener for the OAuth redirect. The caller binds the socket
// (so a busy port fails before the browser is opened) and hands it here;
// the handler passes the first conclusive callback over a one-slot channel.

use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Query, State};
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use tokio::sync::oneshot;

use crate::error::{Error, Result};

const CLOSE_PAGE: &str = r#"<script>window.open("about:blank","_self").close()</script>"#;
const FRAGMENT_PAGE: &str = r#"<script>document.write(location.hash)</script>"#;

/// How long the server may keep serving the final page after the code
/// arrived.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Deserialize)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

type Outcome = Result<String>;

#[derive(Clone)]
struct CallbackState {
    expected_state: Arc<str>,
    slot: Arc<Mutex<Option<oneshot::Sender<Outcome>>>>,
}

impl CallbackState {
    fn deliver(&self, outcome: Outcome) {
        let sender = match self.slot.lock() {
            Ok(mut slot) => slot.take(),
            Err(_) => None,
        };
        match sender {
            Some(tx) => {
                let _ = tx.send(outcome);
            }
            None => log::debug!("ignoring late authorization callback"),
        }
    }
}

async fn handle_callback(
    State(state): State<CallbackState>,
    Query(params): Query<CallbackParams>,
) -> Html<&'static str> {
    if let Some(error) = params.error {
        let detail = params.error_description.unwrap_or(error);
        state.deliver(Err(Error::AuthorizationDenied(detail)));
        return Html(CLOSE_PAGE);
    }
    match params.code.filter(|c| !c.is_empty()) {
        Some(code) => {
            if params.state.as_deref() != Some(&*state.expected_state) {
                state.deliver(Err(Error::StateMismatch));
            } else {
                state.deliver(Ok(code));
            }
            Html(CLOSE_PAGE)
        }
        // Providers answering with a fragment never reach us with a query;
        // show it so the user can see what came back.
        None => Html(FRAGMENT_PAGE),
    }
}

/// Serve the redirect URI on `listener` until a callback carrying `code` (or
/// an `error`) arrives, at most `timeout`. The listener is closed before
/// this returns, whatever the outcome.
pub fn wait_for_code(listener: TcpListener, expected_state: &str, timeout: Duration) -> Result<String> {
    listener.set_nonblocking(true)?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let expected_state: Arc<str> = Arc::from(expected_state);
    runtime.block_on(async move {
        let listener = tokio::net::TcpListener::from_std(listener)?;
        let (tx, rx) = oneshot::channel::<Outcome>();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let app = Router::new().route("/", get(handle_callback)).with_state(CallbackState {
            expected_state,
            slot: Arc::new(Mutex::new(Some(tx))),
        });

        let server = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        let outcome = match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(Error::AuthorizationDenied("callback listener stopped".into())),
            Err(_) => Err(Error::AuthorizationTimeout(timeout)),
        };

        let _ = shutdown_tx.send(());
        if tokio::time::timeout(DRAIN_TIMEOUT, server).await.is_err() {
            log::debug!("callback server did not drain in time");
        }
        outcome
    })
}
