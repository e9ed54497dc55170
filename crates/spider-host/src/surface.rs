use anyhow::{anyhow, Result};
use async_trait::async_trait;
use spider_core::Surface;
use tokio::sync::mpsc;

use crate::protocol::Outbound;

/// Asks the extension to open a page by emitting an `open-surface` event.
pub struct EventSurface {
    tx: mpsc::UnboundedSender<Outbound>,
}

impl EventSurface {
    pub fn new(tx: mpsc::UnboundedSender<Outbound>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl Surface for EventSurface {
    async fn open(&self, url: &str) -> Result<()> {
        self.tx
            .send(Outbound::OpenSurface {
                url: url.to_string(),
            })
            .map_err(|_| anyhow!("Extension connection closed"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_emits_event_and_fails_when_closed() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let surface = EventSurface::new(tx);

        surface.open("https://app.test/api/auth/signout").await.unwrap();
        assert_eq!(
            rx.recv().await,
            Some(Outbound::OpenSurface {
                url: "https://app.test/api/auth/signout".to_string()
            })
        );

        drop(rx);
        assert!(surface.open("https://app.test/api/auth/signin").await.is_err());
    }
}
