// SPDX-FileCopyrightText: 2026 Laika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Websocket groups keyed by room id.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use laika_core::{LaikaError, WebsocketPublisher, WsFrame};
use tokio::sync::broadcast;

/// Frames buffered per room before a slow socket starts missing some.
const ROOM_CAPACITY: usize = 64;

/// Fan-out of JSON frames to every socket subscribed to a room.
#[derive(Clone, Default)]
pub struct WsHub {
    rooms: Arc<DashMap<String, broadcast::Sender<String>>>,
}

impl std::fmt::Debug for WsHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsHub").field("rooms", &self.rooms.len()).finish()
    }
}

impl WsHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, room: &str) -> broadcast::Receiver<String> {
        self.rooms
            .entry(room.to_string())
            .or_insert_with(|| broadcast::channel(ROOM_CAPACITY).0)
            .subscribe()
    }

    pub fn subscriber_count(&self, room: &str) -> usize {
        self.rooms.get(room).map_or(0, |tx| tx.receiver_count())
    }

    /// Send raw text to a room. Returns how many sockets received it.
    pub fn send_text(&self, room: &str, text: String) -> usize {
        let delivered = match self.rooms.get(room) {
            Some(tx) => tx.send(text).unwrap_or(0),
            None => 0,
        };
        if delivered == 0 {
            self.rooms.remove_if(room, |_, tx| tx.receiver_count() == 0);
        }
        delivered
    }
}

#[async_trait]
impl WebsocketPublisher for WsHub {
    async fn publish(&self, frame: &WsFrame) -> Result<(), LaikaError> {
        let text = serde_json::to_string(frame)
            .map_err(|e| LaikaError::delivery("websocket", format!("encode frame: {e}")))?;
        let delivered = self.send_text(&frame.room_id, text);
        tracing::debug!(room = %frame.room_id, alert_id = %frame.alert_id, delivered, "frame published");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use laika_core::AlertType;

    fn frame(room: &str) -> WsFrame {
        WsFrame {
            sender: "B".into(),
            receiver_email: "a@x.com".into(),
            room_id: room.into(),
            alert_id: "al1".into(),
            alert_type: AlertType::ControlMention,
        }
    }

    #[tokio::test]
    async fn frames_reach_only_their_room() {
        let hub = WsHub::new();
        let mut o1 = hub.subscribe("o1");
        let mut o2 = hub.subscribe("o2");

        hub.publish(&frame("o1")).await.unwrap();

        let text = o1.recv().await.unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed["receiver_email"], "a@x.com");
        assert_eq!(parsed["type"], "CONTROL_MENTION");
        assert!(o2.try_recv().is_err());
    }

    #[tokio::test]
    async fn empty_rooms_are_dropped() {
        let hub = WsHub::new();
        let rx = hub.subscribe("o1");
        assert_eq!(hub.subscriber_count("o1"), 1);
        drop(rx);

        hub.publish(&frame("o1")).await.unwrap();
        assert_eq!(hub.subscriber_count("o1"), 0);
        assert_eq!(hub.rooms.len(), 0);
    }
}
