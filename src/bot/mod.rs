//! # Bot Module
//!
//! Capa de Discord de Tempo: registra los comandos slash, traduce
//! comandos y botones a operaciones de la [`PlayerSession`] de cada guild
//! y conecta el backend de voz configurado.
//!
//! El [`TempoBot`] implementa el [`EventHandler`] de serenity. Todo el
//! estado de reproducción vive en el [`SessionRegistry`].

use anyhow::Result;
use serenity::{
    all::{ChannelId, Context, EventHandler, GuildId, Interaction, Ready, VoiceState},
    async_trait,
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub mod commands;
pub mod handlers;

use crate::{
    audio::{
        backend::VoiceDriver,
        lavalink::LavalinkNode,
        local::LocalDriver,
        registry::SessionRegistry,
        remote::RemoteNodeDriver,
        session::PlayerSession,
    },
    config::{BackendKind, Config},
    error::PlayerError,
    sources::{MusicSource, NodeSource, YtDlpSource},
    ui::surface::ChannelSurface,
};

pub struct TempoBot {
    config: Arc<Config>,
    registry: Arc<SessionRegistry>,
    node: Option<Arc<LavalinkNode>>,
    source: Arc<dyn MusicSource>,
    http_client: reqwest::Client,
    /// Serializa conexiones y retiros de voz
    connecting: tokio::sync::Mutex<()>,
}

impl TempoBot {
    /// Sin nodo, las sesiones usan siempre el driver local
    pub fn new(
        config: Config,
        registry: Arc<SessionRegistry>,
        node: Option<Arc<LavalinkNode>>,
    ) -> Self {
        let http_client = reqwest::Client::new();

        let source: Arc<dyn MusicSource> = match &node {
            Some(node) if config.backend == BackendKind::Lavalink => {
                Arc::new(NodeSource::new(Arc::clone(node), config.max_playlist_size))
            }
            _ => Arc::new(YtDlpSource::new(
                http_client.clone(),
                config.max_playlist_size,
            )),
        };
        info!("🎶 Fuente de música: {}", source.source_name());

        Self {
            config: Arc::new(config),
            registry,
            node,
            source,
            http_client,
            connecting: tokio::sync::Mutex::new(()),
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn source(&self) -> &dyn MusicSource {
        self.source.as_ref()
    }

    async fn register_commands(&self, ctx: &Context) -> Result<()> {
        info!("📝 Registrando comandos slash...");

        match self.config.guild_id {
            Some(guild_id) => {
                let guild_id = GuildId::new(guild_id);
                commands::register_guild_commands(ctx, guild_id).await?;
                info!("✅ Comandos de guild registrados para: {}", guild_id);
            }
            None => {
                commands::register_global_commands(ctx).await?;
                info!("✅ Comandos globales registrados");
            }
        }

        Ok(())
    }

    /// Sesión viva de la guild con su backend de voz conectado.
    ///
    /// La ventana de una sesión nueva se publica en `text_channel`.
    pub async fn ensure_session(
        &self,
        ctx: &Context,
        guild_id: GuildId,
        text_channel: ChannelId,
        voice_channel: ChannelId,
    ) -> Result<Arc<PlayerSession>> {
        let _connecting = self.connecting.lock().await;

        let session = self
            .registry
            .get_or_create(guild_id, || {
                PlayerSession::new(
                    guild_id,
                    Arc::new(ChannelSurface::new(Arc::clone(&ctx.http), text_channel)),
                    self.config.session_timeouts(),
                )
            })
            .await;

        if !session.has_backend() {
            let driver = self.connect_driver(ctx, guild_id, voice_channel).await?;
            session.attach_backend(driver);
        }

        Ok(session)
    }

    async fn connect_driver(
        &self,
        ctx: &Context,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<Arc<dyn VoiceDriver>> {
        let manager = songbird::get(ctx)
            .await
            .ok_or_else(|| anyhow::anyhow!("Songbird no inicializado"))?;
        let volume = self.config.default_volume;

        match (&self.node, self.config.backend) {
            (Some(node), BackendKind::Lavalink) => {
                if !node.is_ready() {
                    warn!("El nodo de audio todavía no está listo");
                    return Err(PlayerError::Node("nodo sin sesión".to_string()).into());
                }
                let driver = RemoteNodeDriver::connect(
                    Arc::clone(node),
                    manager,
                    guild_id,
                    channel_id,
                    volume,
                )
                .await?;
                Ok(Arc::new(driver))
            }
            _ => {
                let call = manager.join(guild_id, channel_id).await?;
                info!("🔊 Conectado al canal de voz {} en guild {}", channel_id, guild_id);
                Ok(Arc::new(LocalDriver::new(
                    guild_id,
                    manager,
                    call,
                    self.http_client.clone(),
                    volume,
                )))
            }
        }
    }

    /// Retira la sesión viva de la guild y la saca del registro
    pub async fn retire_session(&self, guild_id: GuildId) -> bool {
        let _connecting = self.connecting.lock().await;
        match self.registry.get(guild_id) {
            Some(session) => {
                self.retire(guild_id, &session).await;
                true
            }
            None => false,
        }
    }

    /// Requiere `connecting` tomado
    async fn retire(&self, guild_id: GuildId, session: &Arc<PlayerSession>) {
        session.shutdown().await;
        if self.registry.remove_if_same(guild_id, session) {
            info!(
                "🧹 Sesión de guild {} retirada ({} activas)",
                guild_id,
                self.registry.active_count()
            );
        }
    }

    /// Si songbird sigue con el bot en un canal de la guild
    async fn still_in_voice(&self, ctx: &Context, guild_id: GuildId) -> bool {
        let Some(manager) = songbird::get(ctx).await else {
            return false;
        };
        match manager.get(guild_id) {
            Some(call) => call.lock().await.current_channel().is_some(),
            None => false,
        }
    }
}

#[async_trait]
impl EventHandler for TempoBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} está en línea!", ready.user.name);
        info!("📊 Conectado a {} servidores", ready.guilds.len());

        if let Err(e) = self.register_commands(&ctx).await {
            error!("Error al registrar comandos: {:?}", e);
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        match interaction {
            Interaction::Command(command) => {
                if let Err(e) = handlers::handle_command(&ctx, command, self).await {
                    error!("Error manejando comando: {:?}", e);
                }
            }
            Interaction::Component(component) => {
                if let Err(e) = handlers::handle_component(&ctx, component, self).await {
                    error!("Error manejando componente: {:?}", e);
                }
            }
            _ => {}
        }
    }

    /// Si alguien saca al bot del canal, la sesión de la guild se retira.
    ///
    /// La salida que provoca una sesión al caducar puede llegar cuando ya
    /// hay otra conectada; en ese caso songbird sigue en un canal y la
    /// sesión nueva no se toca.
    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let current_user_id = ctx.cache.current_user().id;
        if new.user_id != current_user_id || old.is_none() || new.channel_id.is_some() {
            return;
        }
        let Some(guild_id) = new.guild_id else {
            return;
        };
        info!("🔌 Bot desconectado en guild {}", guild_id);

        let _connecting = self.connecting.lock().await;
        let Some(session) = self.registry.current(guild_id) else {
            debug!("Desconexión en guild {} sin sesión registrada", guild_id);
            return;
        };

        if !session.is_stale() && self.still_in_voice(&ctx, guild_id).await {
            debug!(
                "Salida de una conexión anterior en guild {}, la sesión actual sigue",
                guild_id
            );
            return;
        }
        self.retire(guild_id, &session).await;
    }
}
