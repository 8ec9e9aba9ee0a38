use async_trait::async_trait;
use serenity::{
    builder::{CreateMessage, EditMessage},
    http::Http,
    model::id::{ChannelId, MessageId},
};
use std::sync::Arc;
use tracing::debug;

use crate::{
    audio::window::{WindowSurface, WindowView},
    ui::{buttons::MusicControls, embeds::create_window_embed},
};

/// La ventana como mensaje de Discord en el canal donde se usó /play
pub struct ChannelSurface {
    http: Arc<Http>,
    channel_id: ChannelId,
}

impl ChannelSurface {
    pub fn new(http: Arc<Http>, channel_id: ChannelId) -> Self {
        Self { http, channel_id }
    }
}

#[async_trait]
impl WindowSurface for ChannelSurface {
    async fn send(&self, view: WindowView) -> anyhow::Result<MessageId> {
        let message = self
            .channel_id
            .send_message(
                &self.http,
                CreateMessage::new()
                    .embed(create_window_embed(&view))
                    .components(MusicControls::create_player_controls(&view)),
            )
            .await?;

        debug!("Ventana creada en el canal {}: {}", self.channel_id, message.id);
        Ok(message.id)
    }

    async fn edit(&self, message: MessageId, view: WindowView) -> anyhow::Result<()> {
        self.channel_id
            .edit_message(
                &self.http,
                message,
                EditMessage::new()
                    .embed(create_window_embed(&view))
                    .components(MusicControls::create_player_controls(&view)),
            )
            .await?;
        Ok(())
    }

    async fn delete(&self, message: MessageId) -> anyhow::Result<()> {
        self.channel_id.delete_message(&self.http, message).await?;
        Ok(())
    }
}
