//! Web-view session kind
//!
//! An in-memory navigation state machine. Input is either a JSON command
//! `{"type": "navigate", "url": "..."}` or bare text treated as a URL, with
//! `http://` prepended when the scheme is missing. Only http and https pass
//! validation; a rejected navigation raises an error event and leaves the
//! session and its current URL untouched.

use std::any::Any;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use url::Url;
use uuid::Uuid;

use crate::adapter::{
    resolve_cwd, AdapterError, AdapterResult, CreateParams, SessionAdapter, SessionHandle,
    SessionProcess,
};
use crate::config::WorkspaceSettings;
use crate::event::EventCallback;
use crate::session::{SessionCore, SessionKind};

/// Options accepted by the web-view adapter
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WebViewOptions {
    /// Initial URL shown by the view
    pub url: Option<String>,
}

/// A live web-view session
pub struct WebViewProcess {
    core: SessionCore,
    current_url: RwLock<Option<Url>>,
    initial_url: Option<String>,
}

impl WebViewProcess {
    /// Construct an uninitialized web-view process
    pub fn new(cwd: PathBuf, options: WebViewOptions, on_event: EventCallback) -> Self {
        Self {
            core: SessionCore::new(SessionKind::WebView, cwd, on_event),
            current_url: RwLock::new(None),
            initial_url: options.url,
        }
    }

    /// URL the view currently points at
    pub async fn current_url(&self) -> Option<Url> {
        self.current_url.read().await.clone()
    }

    /// Validate a URL string: must parse and carry an http(s) scheme
    fn validate_url(raw: &str) -> Result<Url, String> {
        let url = Url::parse(raw).map_err(|e| format!("invalid url {raw:?}: {e}"))?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(format!("unsupported url scheme {other:?} in {raw:?}")),
        }
    }

    /// Interpret free text as a navigation target.
    ///
    /// Phrases like "navigate to example.com" reduce to their last word;
    /// a missing scheme defaults to `http://`.
    fn coerce_bare_url(text: &str) -> Result<Url, String> {
        let candidate = text
            .split_whitespace()
            .last()
            .ok_or_else(|| "empty navigation input".to_string())?;
        let with_scheme = if candidate.contains("://") {
            candidate.to_string()
        } else {
            format!("http://{candidate}")
        };
        Self::validate_url(&with_scheme)
    }

    /// Parse one input into a navigation target: JSON command first, bare
    /// URL fallback when the input is not valid JSON
    fn parse_navigation(text: &str) -> Result<Url, String> {
        match serde_json::from_str::<Value>(text) {
            Ok(value) => {
                if value.get("type").and_then(Value::as_str) == Some("navigate") {
                    let raw = value
                        .get("url")
                        .and_then(Value::as_str)
                        .filter(|u| !u.is_empty())
                        .ok_or_else(|| {
                            "navigate command requires a non-empty \"url\" string".to_string()
                        })?;
                    Self::validate_url(raw)
                } else {
                    Err(format!("unrecognized web-view command: {text}"))
                }
            }
            Err(_) => Self::coerce_bare_url(text),
        }
    }

    async fn navigate(&self, url: Url) {
        *self.current_url.write().await = Some(url.clone());
        self.core
            .emit("navigation", "url-changed", json!({ "url": url.as_str() }))
            .await;
    }
}

#[async_trait]
impl SessionProcess for WebViewProcess {
    fn kind(&self) -> SessionKind {
        SessionKind::WebView
    }

    fn id(&self) -> Uuid {
        self.core.id()
    }

    fn cwd(&self) -> &Path {
        self.core.cwd()
    }

    async fn initialize(&self) -> AdapterResult<()> {
        if !self.core.begin_initialize().await {
            return Err(AdapterError::AlreadyInitialized);
        }

        let initial = match self.initial_url.as_deref() {
            Some(raw) => match Self::coerce_bare_url(raw) {
                Ok(url) => {
                    *self.current_url.write().await = Some(url.clone());
                    Some(url)
                }
                // A bad initial URL is not fatal; the view starts blank and
                // the first navigation can fix it
                Err(_) => None,
            },
            None => None,
        };

        self.core
            .complete_initialize(json!({
                "url": initial.as_ref().map(Url::as_str),
            }))
            .await;
        Ok(())
    }

    /// The one input parser with real structure: see the module docs for
    /// the accepted forms
    async fn handle_input(&self, data: &[u8]) {
        if !self.core.is_active().await {
            return;
        }
        let text = String::from_utf8_lossy(data);
        match Self::parse_navigation(text.trim()) {
            Ok(url) => self.navigate(url).await,
            // A bad navigation does not kill the session
            Err(message) => self.core.send_error(message).await,
        }
    }

    async fn close(&self) {
        self.core.close().await;
    }

    async fn is_alive(&self) -> bool {
        self.core.is_active().await
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Factory for web-view sessions
#[derive(Debug, Default)]
pub struct WebViewAdapter {
    settings: WorkspaceSettings,
}

impl WebViewAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adapter applying the workspace root as the cwd fallback
    pub fn with_settings(settings: WorkspaceSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl SessionAdapter for WebViewAdapter {
    fn kind(&self) -> SessionKind {
        SessionKind::WebView
    }

    async fn create(&self, params: CreateParams) -> AdapterResult<SessionHandle> {
        let options: WebViewOptions = if params.options.is_null() {
            WebViewOptions::default()
        } else {
            serde_json::from_value(params.options)?
        };
        let cwd = resolve_cwd(params.cwd.as_deref(), &self.settings)?;
        let process = Arc::new(WebViewProcess::new(cwd, options, params.on_event));
        SessionHandle::start(process).await
    }
}
