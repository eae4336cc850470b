use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use url::Url;

use crate::api::events::{ClientCommand, ServerEvent, SocketEvent};
use crate::api::service::SocketLink;
use crate::error::{ClientError, Result};

/// WebSocket link to the chat gateway.
///
/// One reader task decodes frames into [`SocketEvent`]s, one writer task
/// drains the outgoing queue. There is no automatic reconnect: callers
/// decide when to call [`SocketClient::connect`] again.
pub struct SocketClient {
    url: Url,
    token: Option<String>,
    connected: Arc<AtomicBool>,
    generation: Arc<AtomicU64>,
    outgoing: Mutex<Option<mpsc::UnboundedSender<Message>>>,
    events: mpsc::UnboundedSender<SocketEvent>,
}

impl SocketClient {
    /// The event stream is unbounded: `connect` runs on the same task that
    /// drains it, so a full buffer would never be emptied.
    pub fn new(url: Url, token: Option<String>) -> (Self, mpsc::UnboundedReceiver<SocketEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let client = Self {
            url,
            token,
            connected: Arc::new(AtomicBool::new(false)),
            generation: Arc::new(AtomicU64::new(0)),
            outgoing: Mutex::new(None),
            events,
        };
        (client, rx)
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub async fn connect(&self) -> Result<()> {
        let mut request = self.url.as_str().into_client_request()?;
        if let Some(token) = &self.token {
            let value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| ClientError::Config(format!("token is not a valid header: {e}")))?;
            request.headers_mut().insert("Authorization", value);
        }

        let (ws_stream, _) = connect_async(request).await?;
        let (mut sink, mut stream) = ws_stream.split();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Message>();

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        if let Ok(mut slot) = self.outgoing.lock() {
            *slot = Some(out_tx.clone());
        }
        self.connected.store(true, Ordering::SeqCst);
        log::info!("socket connected to {}", self.url);

        tokio::spawn(async move {
            while let Some(msg) = out_rx.recv().await {
                let closing = matches!(msg, Message::Close(_));
                if let Err(e) = sink.send(msg).await {
                    log::warn!("socket write failed: {}", e);
                    break;
                }
                if closing {
                    break;
                }
            }
            let _ = sink.close().await;
        });

        let events = self.events.clone();
        let connected = self.connected.clone();
        let current = self.generation.clone();
        tokio::spawn(async move {
            while let Some(frame) = stream.next().await {
                match frame {
                    Ok(Message::Text(text)) => match ServerEvent::decode(&text) {
                        Ok(Some(event)) => {
                            log::debug!("socket event {:?}", event.conversation_id());
                            if events.send(SocketEvent::Server(event)).is_err() {
                                break;
                            }
                        }
                        Ok(None) => log::debug!("ignoring socket frame: {}", text),
                        Err(e) => log::warn!("undecodable socket frame ({}): {}", e, text),
                    },
                    Ok(Message::Ping(payload)) => {
                        let _ = out_tx.send(Message::Pong(payload));
                    }
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        log::warn!("socket read failed: {}", e);
                        break;
                    }
                }
            }
            if current.load(Ordering::SeqCst) == generation {
                connected.store(false, Ordering::SeqCst);
                log::info!("socket disconnected");
                let _ = events.send(SocketEvent::Disconnected);
            }
        });

        // Queued behind any frames already received, so consumers resync after them.
        self.notify(SocketEvent::Connected);
        Ok(())
    }

    fn notify(&self, event: SocketEvent) {
        if self.events.send(event).is_err() {
            log::debug!("socket event dropped, nobody is listening");
        }
    }

    pub fn disconnect(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
        if let Ok(mut slot) = self.outgoing.lock() {
            if let Some(tx) = slot.take() {
                let _ = tx.send(Message::Close(None));
            }
        }
    }
}

impl SocketLink for SocketClient {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn emit(&self, command: ClientCommand) -> Result<()> {
        if !self.is_connected() {
            return Err(ClientError::SocketClosed);
        }
        let text = serde_json::to_string(&command)?;
        let slot = self.outgoing.lock().map_err(|_| ClientError::SocketClosed)?;
        let tx = slot.as_ref().ok_or(ClientError::SocketClosed)?;
        tx.send(Message::Text(text)).map_err(|_| ClientError::SocketClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::ConversationId;

    #[test]
    fn emit_before_connect_reports_closed() {
        let url = Url::parse("wss://chat.example.com/socket").unwrap();
        let (client, _rx) = SocketClient::new(url, None);
        assert!(!client.is_connected());
        let res = client.emit(ClientCommand::JoinConversation {
            conversation_id: ConversationId::new("1"),
        });
        assert!(matches!(res, Err(ClientError::SocketClosed)));
    }

    #[test]
    fn notifications_never_wait_for_the_consumer() {
        let url = Url::parse("ws://localhost:9/socket").unwrap();
        let (client, mut rx) = SocketClient::new(url, None);
        for _ in 0..1000 {
            client.notify(SocketEvent::Connected);
        }
        let mut received = 0;
        while rx.try_recv().is_ok() {
            received += 1;
        }
        assert_eq!(received, 1000);

        drop(rx);
        client.notify(SocketEvent::Disconnected);
    }

    #[test]
    fn disconnect_without_connection_is_harmless() {
        let url = Url::parse("ws://localhost:9/socket").unwrap();
        let (client, _rx) = SocketClient::new(url, Some("t".into()));
        client.disconnect();
        assert!(!client.is_connected());
    }
}
