use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId};
use songbird::Songbird;
use std::{sync::Arc, time::Duration};
use tracing::{info, warn};

use crate::{
    audio::{
        backend::{DriverKind, VoiceDriver},
        lavalink::{LavalinkNode, UpdatePlayer, UpdatePlayerTrack, VoiceServer},
        signal::CompletionToken,
        track::Playable,
    },
    error::PlayerError,
};

/// Driver remoto: el audio lo emite un nodo Lavalink.
///
/// songbird sólo mantiene el estado de voz en el gateway; el fin de
/// track llega por el websocket del nodo, no por callback.
pub struct RemoteNodeDriver {
    guild_id: GuildId,
    node: Arc<LavalinkNode>,
    manager: Arc<Songbird>,
}

impl RemoteNodeDriver {
    /// Se une al canal por el gateway y entrega las credenciales de voz al nodo
    pub async fn connect(
        node: Arc<LavalinkNode>,
        manager: Arc<Songbird>,
        guild_id: GuildId,
        channel_id: ChannelId,
        volume: u8,
    ) -> Result<Self, PlayerError> {
        let (connection, _call) = manager.join_gateway(guild_id, channel_id).await?;

        let update = UpdatePlayer {
            volume: Some(u16::from(volume)),
            voice: Some(VoiceServer {
                token: connection.token,
                endpoint: connection.endpoint,
                session_id: connection.session_id,
            }),
            ..Default::default()
        };
        node.update_player(guild_id, &update).await?;

        info!("🔗 Nodo de audio conectado al canal {} en guild {}", channel_id, guild_id);
        Ok(Self {
            guild_id,
            node,
            manager,
        })
    }

    async fn update(&self, update: UpdatePlayer) -> Result<(), PlayerError> {
        self.node.update_player(self.guild_id, &update).await
    }
}

#[async_trait]
impl VoiceDriver for RemoteNodeDriver {
    fn kind(&self) -> DriverKind {
        DriverKind::RemoteNode
    }

    async fn play(
        &self,
        source: &Playable,
        _on_finished: Option<CompletionToken>,
    ) -> Result<(), PlayerError> {
        let Playable::Remote(track) = source else {
            return Err(PlayerError::IncompatibleTrack);
        };

        self.update(UpdatePlayer {
            track: Some(UpdatePlayerTrack {
                encoded: Some(track.encoded.clone()),
            }),
            paused: Some(false),
            ..Default::default()
        })
        .await?;

        info!("🎼 Nodo reproduciendo en guild {}: {}", self.guild_id, track.info.title);
        Ok(())
    }

    async fn pause(&self) -> Result<(), PlayerError> {
        self.update(UpdatePlayer {
            paused: Some(true),
            ..Default::default()
        })
        .await
    }

    async fn resume(&self) -> Result<(), PlayerError> {
        self.update(UpdatePlayer {
            paused: Some(false),
            ..Default::default()
        })
        .await
    }

    async fn stop(&self) -> Result<(), PlayerError> {
        self.update(UpdatePlayer {
            track: Some(UpdatePlayerTrack { encoded: None }),
            ..Default::default()
        })
        .await
    }

    async fn seek(&self, position: Duration) -> Result<(), PlayerError> {
        let millis = u64::try_from(position.as_millis()).unwrap_or(u64::MAX);
        self.update(UpdatePlayer {
            position: Some(millis),
            ..Default::default()
        })
        .await
    }

    async fn set_volume(&self, percent: u8) -> Result<(), PlayerError> {
        self.update(UpdatePlayer {
            volume: Some(u16::from(percent)),
            ..Default::default()
        })
        .await
    }

    /// Destruye el player remoto y sale del canal de voz
    async fn disconnect(&self) -> Result<(), PlayerError> {
        if let Err(e) = self.node.destroy_player(self.guild_id).await {
            warn!("No se pudo destruir el player remoto de {}: {:?}", self.guild_id, e);
        }
        self.manager.remove(self.guild_id).await?;
        info!("👋 Desconectado del guild {}", self.guild_id);
        Ok(())
    }
}
