//! Loopback listener that captures the single OAuth2 redirect.
//!
//! The browser is sent to the provider's consent page with a fixed
//! `127.0.0.1:8008` redirect. A short-lived axum server owns the port,
//! captures the `code` query parameter from the one expected redirect and
//! signals the waiting flow; the listener is shut down on every exit path.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Mutex, Notify};

use crate::client::FreesoundClient;
use crate::error::{GatewayError, GatewayResult};

/// Redirect URI registered with the provider. Fixed: the provider matches it
/// byte-for-byte against the application settings.
pub const REDIRECT_URI: &str = "http://127.0.0.1:8008/";
pub const CALLBACK_ADDR: &str = "127.0.0.1:8008";
const AUTH_TIMEOUT: Duration = Duration::from_secs(120);

const SUCCESS_PAGE: &str = "<html><head><style>body { font-family: sans-serif; \
background-color: #222; color: #eee; text-align: center; padding-top: 50px; }\
</style></head><body><h1>Authentication successful!</h1>\
<p>You can close this window now and return to your project.</p></body></html>";

const FAILURE_PAGE: &str = "<html><head><style>body { font-family: sans-serif; \
background-color: #222; color: #eee; text-align: center; padding-top: 50px; }\
</style></head><body><h1>Authentication failed.</h1>\
<p>Please try again from your project.</p></body></html>";

struct FlowState {
    code: Mutex<Option<String>>,
    notify: Notify,
}

#[derive(Deserialize)]
struct CallbackQuery {
    code: Option<String>,
}

/// Short-lived local HTTP server owning the loopback callback port.
pub struct CallbackListener {
    state: Arc<FlowState>,
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
}

impl CallbackListener {
    /// Bind the callback port and start serving. A bind failure (typically a
    /// second concurrent authorize) surfaces as a user-facing error.
    pub async fn bind(addr: &str) -> GatewayResult<Self> {
        let listener = TcpListener::bind(addr).await.map_err(|error| {
            GatewayError::Environment(format!(
                "Could not start local server. Is port 8008 in use? Details: {error}"
            ))
        })?;
        let addr = listener.local_addr().map_err(|error| {
            GatewayError::Environment(format!("failed to resolve listener address: {error}"))
        })?;

        let state = Arc::new(FlowState {
            code: Mutex::new(None),
            notify: Notify::new(),
        });
        let app = Router::new()
            .route("/", get(callback))
            .with_state(state.clone());
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            let _ = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await;
        });

        Ok(Self {
            state,
            addr,
            shutdown: Some(shutdown_tx),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Wait up to `timeout` for the redirect to deliver an authorization
    /// code. Returns `None` on timeout.
    pub async fn wait_for_code(&self, timeout: Duration) -> Option<String> {
        if let Some(code) = self.state.code.lock().await.clone() {
            return Some(code);
        }
        match tokio::time::timeout(timeout, self.state.notify.notified()).await {
            Ok(()) => self.state.code.lock().await.clone(),
            Err(_) => None,
        }
    }

    pub fn shutdown(&mut self) {
        if let Some(sender) = self.shutdown.take() {
            let _ = sender.send(());
        }
    }
}

impl Drop for CallbackListener {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn callback(
    State(state): State<Arc<FlowState>>,
    Query(query): Query<CallbackQuery>,
) -> Html<&'static str> {
    match query.code {
        Some(code) if !code.is_empty() => {
            *state.code.lock().await = Some(code);
            // notify_one stores a permit, so a waiter that registers after
            // the redirect still wakes immediately.
            state.notify.notify_one();
            Html(SUCCESS_PAGE)
        }
        _ => Html(FAILURE_PAGE),
    }
}

/// Provider consent URL for the authorization-code flow.
pub fn consent_url(base_url: &str, client_id: &str) -> String {
    format!(
        "{}/oauth2/authorize/?client_id={}&response_type=code&redirect_uri={}",
        base_url,
        urlencoding::encode(client_id),
        urlencoding::encode(REDIRECT_URI)
    )
}

/// Full authorization flow: listener, browser, bounded wait, token exchange.
pub async fn authorize(
    client: &FreesoundClient,
    client_id: &str,
    client_secret: &str,
) -> GatewayResult<Value> {
    let mut listener = CallbackListener::bind(CALLBACK_ADDR).await?;

    let url = consent_url(client.base_url(), client_id);
    if let Err(error) = opener::open(&url) {
        // The flow can still complete if the user opens the URL by hand.
        tracing::warn!("could not open browser: {error}; open {url} manually");
    }

    let code = listener.wait_for_code(AUTH_TIMEOUT).await;
    listener.shutdown();

    let Some(code) = code else {
        return Err(GatewayError::Network(
            "Authorization timed out or was cancelled.".to_string(),
        ));
    };
    let tokens = client
        .exchange_token(client_id, client_secret, &code, REDIRECT_URI)
        .await?;
    Ok(json!({ "status": "success", "tokens": tokens }))
}
