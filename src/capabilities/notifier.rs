//! The Notifier capability: sends interactive push notifications via ntfy
//! and subscribes to the operator's replies over ntfy's websocket stream.

use async_trait::async_trait;
use base::Error;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct NotificationAction {
    pub label: String,
    pub payload: String,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct NotifierEvent {
    pub id: String,
    pub message: String,
    #[serde(default)]
    pub title: String,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(
        &self,
        message: &str,
        title: &str,
        tags: &[String],
        priority: u8,
        image: Option<Vec<u8>>,
        actions: &[NotificationAction],
    ) -> Result<bool, Error>;

    /// A channel of incoming events; the receiving end stays open across
    /// reconnects, with exponential backoff applied internally.
    fn subscribe_events(&self) -> mpsc::Receiver<NotifierEvent>;
}

pub struct NtfyNotifier {
    client: reqwest::Client,
    server_url: String,
    topic: String,
}

impl NtfyNotifier {
    pub fn new(server_url: String, topic: String) -> Self {
        NtfyNotifier {
            client: reqwest::Client::new(),
            server_url,
            topic,
        }
    }

    fn ws_url(&self) -> String {
        let base = self
            .server_url
            .replacen("https://", "wss://", 1)
            .replacen("http://", "ws://", 1);
        format!("{base}/{}/ws", self.topic)
    }
}

#[async_trait]
impl Notifier for NtfyNotifier {
    async fn send(
        &self,
        message: &str,
        title: &str,
        tags: &[String],
        priority: u8,
        image: Option<Vec<u8>>,
        actions: &[NotificationAction],
    ) -> Result<bool, Error> {
        let mut req = self
            .client
            .post(format!("{}/{}", self.server_url, self.topic))
            .header("Title", title)
            .header("Priority", priority.to_string())
            .header("Tags", tags.join(","));

        if !actions.is_empty() {
            let actions_header = actions
                .iter()
                .map(|a| format!("view, {}, {}", a.label, a.payload))
                .collect::<Vec<_>>()
                .join(";");
            req = req.header("Actions", actions_header);
        }

        req = if let Some(image) = image {
            req.header("Filename", "screenshot.jpg").body(image)
        } else {
            req.body(message.to_owned())
        };

        let resp = req
            .send()
            .await
            .map_err(|e| Error::wrap(base::ErrorKind::Unavailable, "sending ntfy notification", e))?;
        Ok(resp.status().is_success())
    }

    fn subscribe_events(&self) -> mpsc::Receiver<NotifierEvent> {
        let (tx, rx) = mpsc::channel(32);
        let ws_url = self.ws_url();
        tokio::spawn(async move {
            let mut backoff = base::backoff::Backoff::new(
                std::time::Duration::from_secs(3),
                std::time::Duration::from_secs(60),
            );
            loop {
                match tokio_tungstenite::connect_async(&ws_url).await {
                    Ok((ws_stream, _)) => {
                        debug!(%ws_url, "ntfy websocket connected");
                        backoff.reset();
                        let (_, mut read) = ws_stream.split();
                        while let Some(msg) = read.next().await {
                            let Ok(Message::Text(text)) = msg else { continue };
                            match serde_json::from_str::<NotifierEvent>(&text) {
                                Ok(event) => {
                                    if tx.send(event).await.is_err() {
                                        return;
                                    }
                                }
                                Err(e) => warn!(error = %e, "failed to parse ntfy event"),
                            }
                        }
                    }
                    Err(e) => warn!(error = %e, %ws_url, "ntfy websocket connect failed"),
                }
                if tx.is_closed() {
                    return;
                }
                tokio::time::sleep(backoff.next_delay()).await;
            }
        });
        rx
    }
}

#[derive(Default)]
pub struct FakeNotifier {
    pub sent: std::sync::Arc<std::sync::Mutex<Vec<String>>>,
}

#[async_trait]
impl Notifier for FakeNotifier {
    async fn send(
        &self,
        message: &str,
        _title: &str,
        _tags: &[String],
        _priority: u8,
        _image: Option<Vec<u8>>,
        _actions: &[NotificationAction],
    ) -> Result<bool, Error> {
        self.sent.lock().unwrap().push(message.to_owned());
        Ok(true)
    }

    fn subscribe_events(&self) -> mpsc::Receiver<NotifierEvent> {
        let (_tx, rx) = mpsc::channel(1);
        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fake_notifier_records_sent_messages() {
        let notifier = FakeNotifier::default();
        notifier.send("hello", "title", &[], 3, None, &[]).await.unwrap();
        assert_eq!(notifier.sent.lock().unwrap().as_slice(), ["hello"]);
    }
}
