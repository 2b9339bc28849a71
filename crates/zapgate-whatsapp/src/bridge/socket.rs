use super::config::BridgeConfig;
use super::types::{
    AckResponse, BridgeEvent, ConnectRequest, ExistsResponse, MediaResponse, SendResponse,
};
use crate::classifier::MediaDownloader;
use crate::socket::{
    SentMessage, SocketConnection, SocketEvent, SocketFactory, SocketOptions, WaSocket,
};
use async_trait::async_trait;
use base64::Engine as _;
use chrono::{TimeZone, Utc};
use dashmap::DashMap;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use zapgate_core::{Error, Result};

const EVENT_BUFFER: usize = 256;

type Routes = Arc<DashMap<String, mpsc::Sender<SocketEvent>>>;

/// Opens sessions on a Baileys Node.js bridge. Requests go out over HTTP;
/// events come back through [`dispatch`](Self::dispatch), fed by the
/// webhook route.
pub struct BridgeSocketFactory {
    config: BridgeConfig,
    client: reqwest::Client,
    routes: Routes,
}

impl BridgeSocketFactory {
    /// Create a new bridge factory
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: BridgeConfig) -> Result<Self> {
        warn!("Using the unofficial WhatsApp Web API through the Baileys bridge; accounts may be banned");

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Configuration(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            config,
            client,
            routes: Arc::new(DashMap::new()),
        })
    }

    /// Bridge settings
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Route a webhook event to the session's event stream.
    pub async fn dispatch(&self, session_id: &str, event: BridgeEvent) -> Result<()> {
        let sender = self
            .routes
            .get(session_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| Error::SessionNotFound(session_id.to_string()))?;

        sender
            .send(SocketEvent::from(event))
            .await
            .map_err(|_| Error::Socket(format!("event stream for {session_id} is closed")))
    }

    /// A socket is currently open for the session
    pub fn is_routed(&self, session_id: &str) -> bool {
        self.routes.contains_key(session_id)
    }
}

#[async_trait]
impl SocketFactory for BridgeSocketFactory {
    async fn open(&self, options: SocketOptions) -> Result<SocketConnection> {
        let url = self.config.session_url(&options.session_id, "connect");
        let request = ConnectRequest {
            creds: options.auth_state.creds.as_ref(),
            keys: &options.auth_state.keys,
            version: options.version,
            print_qr_in_terminal: options.print_qr_in_terminal,
            callback_url: self.config.callback_for(&options.session_id),
        };

        let resp: AckResponse = post_json(&self.client, &url, &request, "connect").await?;
        if !resp.success {
            return Err(Error::Socket(
                resp.error
                    .unwrap_or_else(|| "Bridge refused connection".to_string()),
            ));
        }

        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        // replacing an older route ends that socket's event stream
        self.routes.insert(options.session_id.clone(), tx.clone());
        info!(session_id = %options.session_id, "Bridge session opened");

        let socket = BridgeSocket {
            session_id: options.session_id,
            config: self.config.clone(),
            client: self.client.clone(),
            routes: Arc::clone(&self.routes),
            events: tx,
        };
        Ok(SocketConnection {
            socket: Arc::new(socket),
            events: rx,
        })
    }
}

/// One session on the bridge
pub struct BridgeSocket {
    session_id: String,
    config: BridgeConfig,
    client: reqwest::Client,
    routes: Routes,
    events: mpsc::Sender<SocketEvent>,
}

impl BridgeSocket {
    fn url(&self, action: &str) -> String {
        self.config.session_url(&self.session_id, action)
    }

    fn unroute(&self) {
        self.routes
            .remove_if(&self.session_id, |_, tx| tx.same_channel(&self.events));
    }
}

async fn post_json<B, R>(client: &reqwest::Client, url: &str, body: &B, what: &str) -> Result<R>
where
    B: Serialize + ?Sized,
    R: serde::de::DeserializeOwned,
{
    let resp = client
        .post(url)
        .json(body)
        .send()
        .await
        .map_err(|e| Error::Socket(format!("Failed to {what}: {e}")))?;

    let status = resp.status();
    if !status.is_success() {
        let text = resp.text().await.unwrap_or_default();
        return Err(Error::Socket(format!("Bridge {what} returned {status}: {text}")));
    }

    resp.json()
        .await
        .map_err(|e| Error::Socket(format!("Invalid {what} response: {e}")))
}

#[async_trait]
impl MediaDownloader for BridgeSocket {
    async fn download_media(&self, raw: &Value) -> Result<Vec<u8>> {
        #[derive(Serialize)]
        struct MediaRequest<'a> {
            message: &'a Value,
        }

        let resp: MediaResponse = post_json(
            &self.client,
            &self.url("media"),
            &MediaRequest { message: raw },
            "download media",
        )
        .await?;

        let data = resp.data.ok_or_else(|| {
            Error::Socket(resp.error.unwrap_or_else(|| "No media returned".to_string()))
        })?;
        base64::engine::general_purpose::STANDARD
            .decode(data)
            .map_err(|e| Error::Socket(format!("Invalid media encoding: {e}")))
    }
}

#[async_trait]
impl WaSocket for BridgeSocket {
    async fn send_text(&self, jid: &str, text: &str) -> Result<SentMessage> {
        #[derive(Serialize)]
        struct SendRequest<'a> {
            to: &'a str,
            message: &'a str,
        }

        let resp: SendResponse = post_json(
            &self.client,
            &self.url("send"),
            &SendRequest { to: jid, message: text },
            "send message",
        )
        .await?;

        if !resp.success {
            return Err(Error::Socket(
                resp.error.unwrap_or_else(|| "Unknown error".to_string()),
            ));
        }

        let timestamp = resp
            .timestamp
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
            .unwrap_or_else(Utc::now);
        Ok(SentMessage {
            message_id: resp.message_id.unwrap_or_default(),
            timestamp,
        })
    }

    async fn on_whatsapp(&self, jid: &str) -> Result<Option<String>> {
        #[derive(Serialize)]
        struct ExistsRequest<'a> {
            jid: &'a str,
        }

        let resp: ExistsResponse = post_json(
            &self.client,
            &self.url("exists"),
            &ExistsRequest { jid },
            "check number",
        )
        .await?;

        Ok(resp
            .exists
            .then(|| resp.jid.unwrap_or_else(|| jid.to_string())))
    }

    async fn logout(&self) -> Result<()> {
        let resp: AckResponse =
            post_json(&self.client, &self.url("logout"), &Value::Null, "logout").await?;
        if resp.success {
            Ok(())
        } else {
            Err(Error::Socket(
                resp.error.unwrap_or_else(|| "Logout failed".to_string()),
            ))
        }
    }

    async fn close(&self) {
        self.unroute();
        if let Err(e) =
            post_json::<_, AckResponse>(&self.client, &self.url("close"), &Value::Null, "close")
                .await
        {
            debug!(session_id = %self.session_id, error = %e, "Bridge close failed");
        }
    }
}
