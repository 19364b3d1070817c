//! Console platform: interactions arrive as JSON lines on stdin, everything
//! the server says is printed to stdout as JSON lines.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde_json::json;
use sigil_core::{
    ChannelId, EditFn, MessageEdit, MessageId, Platform, Reply, Responder, SigilError, WorkspaceId,
};
use tokio::sync::Mutex;

/// Keeps posted messages in memory so actions can edit them.
pub struct ConsolePlatform {
    next_id: AtomicU64,
    messages: Mutex<HashMap<MessageId, MessageEdit>>,
}

impl ConsolePlatform {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            messages: Mutex::new(HashMap::new()),
        }
    }

    fn emit(&self, event: serde_json::Value) {
        println!("{event}");
    }

    async fn edit(&self, message: MessageId, edit: EditFn) -> sigil_core::Result<()> {
        let mut messages = self.messages.lock().await;
        let Some(current) = messages.get_mut(&message) else {
            return Err(SigilError::Platform(format!("unknown message {message}")));
        };
        edit(current);
        self.emit(json!({"event": "edit", "message_id": message, "message": current}));
        Ok(())
    }
}

impl Default for ConsolePlatform {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Platform for ConsolePlatform {
    fn workspace_available(&self, _workspace: WorkspaceId) -> bool {
        true
    }

    async fn send_message(&self, channel: ChannelId, reply: Reply) -> sigil_core::Result<MessageId> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.emit(json!({"event": "message", "channel_id": channel, "message_id": id, "reply": reply}));
        self.messages.lock().await.insert(
            id,
            MessageEdit {
                text: reply.text,
                embed: reply.embed,
                buttons: reply.buttons,
            },
        );
        Ok(id)
    }

    async fn delete_message(&self, channel: ChannelId, message: MessageId) -> sigil_core::Result<()> {
        self.messages.lock().await.remove(&message);
        self.emit(json!({"event": "delete", "channel_id": channel, "message_id": message}));
        Ok(())
    }
}

/// Replies for one interaction.
pub struct ConsoleResponder {
    platform: Arc<ConsolePlatform>,
    channel: ChannelId,
}

impl ConsoleResponder {
    pub fn new(platform: Arc<ConsolePlatform>, channel: ChannelId) -> Self {
        Self { platform, channel }
    }
}

#[async_trait]
impl Responder for ConsoleResponder {
    async fn respond(&self, reply: Reply) -> sigil_core::Result<Option<MessageId>> {
        if reply.ephemeral {
            self.platform
                .emit(json!({"event": "ephemeral", "channel_id": self.channel, "reply": reply}));
            return Ok(None);
        }
        self.platform.send_message(self.channel, reply).await.map(Some)
    }

    async fn defer(&self, ephemeral: bool) -> sigil_core::Result<()> {
        self.platform
            .emit(json!({"event": "defer", "channel_id": self.channel, "ephemeral": ephemeral}));
        Ok(())
    }

    async fn update(&self, resource: MessageId, edit: EditFn) -> sigil_core::Result<()> {
        self.platform.edit(resource, edit).await
    }
}
