//! In-process socket factory for handler and wiring tests

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use zapgate_core::{Error, Result};
use zapgate_whatsapp::classifier::MediaDownloader;
use zapgate_whatsapp::socket::{
    ConnectionState, ConnectionUpdate, SocketConnection, SocketEvent, SocketFactory,
    SocketOptions,
};
use zapgate_whatsapp::{SentMessage, SessionStore, StoreConfig, WaSocket};

pub struct LoopbackSocket;

#[async_trait]
impl MediaDownloader for LoopbackSocket {
    async fn download_media(&self, _raw: &Value) -> Result<Vec<u8>> {
        Err(Error::Socket("no media in tests".into()))
    }
}

#[async_trait]
impl WaSocket for LoopbackSocket {
    async fn send_text(&self, _jid: &str, _text: &str) -> Result<SentMessage> {
        Ok(SentMessage {
            message_id: "3EB0TEST".into(),
            timestamp: Utc::now(),
        })
    }

    async fn on_whatsapp(&self, jid: &str) -> Result<Option<String>> {
        Ok((!jid.starts_with("000")).then(|| jid.to_string()))
    }

    async fn logout(&self) -> Result<()> {
        Ok(())
    }

    async fn close(&self) {}
}

/// Opens loopback sockets and keeps their event senders
#[derive(Default)]
pub struct LoopbackFactory {
    pub senders: Mutex<Vec<(String, mpsc::Sender<SocketEvent>)>>,
}

impl LoopbackFactory {
    pub fn sender(&self, session_id: &str) -> mpsc::Sender<SocketEvent> {
        let senders = self.senders.lock().unwrap();
        senders
            .iter()
            .rev()
            .find(|(id, _)| id == session_id)
            .map(|(_, tx)| tx.clone())
            .unwrap()
    }
}

#[async_trait]
impl SocketFactory for LoopbackFactory {
    async fn open(&self, options: SocketOptions) -> Result<SocketConnection> {
        let (tx, rx) = mpsc::channel(16);
        self.senders
            .lock()
            .unwrap()
            .push((options.session_id, tx));
        Ok(SocketConnection {
            socket: Arc::new(LoopbackSocket),
            events: rx,
        })
    }
}

pub fn store(dir: &std::path::Path) -> (SessionStore, Arc<LoopbackFactory>) {
    let factory = Arc::new(LoopbackFactory::default());
    let config = StoreConfig {
        auth_base_dir: dir.to_path_buf(),
        ..StoreConfig::default()
    };
    (SessionStore::new(config, factory.clone()), factory)
}

/// Create a session and drive it to `connected`
pub async fn connected_session(
    store: &SessionStore,
    factory: &LoopbackFactory,
    session_id: &str,
    phone: &str,
) {
    store
        .create_session(session_id, Some(phone.to_string()), None, None)
        .await
        .unwrap();
    connected_session_update(&factory.sender(session_id), phone).await;

    for _ in 0..100 {
        if store
            .get_session_status(session_id)
            .await
            .is_some_and(|s| s.status == zapgate_whatsapp::SessionStatus::Connected)
        {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("session {session_id} never connected");
}

/// Push a `connection: open` update confirming `phone`
pub async fn connected_session_update(tx: &mpsc::Sender<SocketEvent>, phone: &str) {
    tx.send(SocketEvent::ConnectionUpdate(ConnectionUpdate {
        qr: None,
        connection: Some(ConnectionState::Open {
            user_id: Some(format!("{phone}:1@s.whatsapp.net")),
        }),
    }))
    .await
    .unwrap();
}

/// Handler state around `store`, with an idle bridge
pub fn app_state(store: SessionStore) -> crate::api::AppState {
    crate::api::AppState {
        store,
        bridge: Arc::new(
            zapgate_whatsapp::BridgeSocketFactory::new(zapgate_whatsapp::BridgeConfig::default())
                .unwrap(),
        ),
        metrics: zapgate_core::MetricsCollector::new(),
    }
}
