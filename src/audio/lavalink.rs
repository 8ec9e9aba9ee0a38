//! Cliente mínimo para un nodo Lavalink v4.
//!
//! Sólo cubre lo que necesita la sesión de reproducción: resolver tracks,
//! actualizar/destruir el player de una guild y leer los eventos del
//! websocket para avisar cuándo termina un track.

use futures::StreamExt;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serenity::model::id::{GuildId, UserId};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{client::IntoClientRequest, http::HeaderValue, Message},
};
use tracing::{debug, error, info, warn};

use crate::{audio::signal::Completion, config::Config, error::PlayerError};

/// Track tal como lo devuelve el nodo
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeTrack {
    pub encoded: String,
    pub info: NodeTrackInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeTrackInfo {
    pub identifier: String,
    pub title: String,
    pub author: String,
    /// Milisegundos
    pub length: u64,
    pub is_stream: bool,
    pub is_seekable: bool,
    pub uri: Option<String>,
    pub artwork_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "loadType", content = "data", rename_all = "camelCase")]
pub enum LoadResult {
    Track(NodeTrack),
    Playlist(NodePlaylist),
    Search(Vec<NodeTrack>),
    Empty(Option<serde_json::Value>),
    Error(NodeException),
}

#[derive(Debug, Deserialize)]
pub struct NodePlaylist {
    pub info: NodePlaylistInfo,
    pub tracks: Vec<NodeTrack>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodePlaylistInfo {
    pub name: String,
    pub selected_track: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeException {
    pub message: Option<String>,
    pub severity: String,
}

/// Cuerpo del PATCH de player; los campos `None` no se envían
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePlayer {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track: Option<UpdatePlayerTrack>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paused: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice: Option<VoiceServer>,
}

/// `encoded: None` se serializa como `null` y detiene el track
#[derive(Debug, Serialize)]
pub struct UpdatePlayerTrack {
    pub encoded: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceServer {
    pub token: String,
    pub endpoint: String,
    pub session_id: String,
}

/// Mensajes del websocket del nodo
#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum NodeMessage {
    #[serde(rename_all = "camelCase")]
    Ready { resumed: bool, session_id: String },
    Event(NodeEvent),
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum NodeEvent {
    #[serde(rename_all = "camelCase")]
    TrackEndEvent { guild_id: String, reason: TrackEndReason },
    #[serde(rename_all = "camelCase")]
    TrackExceptionEvent {
        guild_id: String,
        exception: NodeException,
    },
    #[serde(rename_all = "camelCase")]
    TrackStuckEvent { guild_id: String, threshold_ms: u64 },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TrackEndReason {
    Finished,
    LoadFailed,
    Stopped,
    Replaced,
    Cleanup,
}

impl NodeEvent {
    /// Traduce el evento a una finalización para la sesión de la guild.
    ///
    /// `replaced` no es una finalización: otro track ya ocupó su lugar.
    /// Las excepciones sólo se registran, el nodo manda después un
    /// `TrackEndEvent` con `loadFailed`.
    pub fn completion(&self) -> Option<(GuildId, Completion)> {
        let (guild_id, outcome) = match self {
            Self::TrackEndEvent { guild_id, reason } => {
                let outcome = match reason {
                    TrackEndReason::Replaced => return None,
                    TrackEndReason::LoadFailed => {
                        Completion::Failed("el nodo no pudo cargar el track".to_string())
                    }
                    TrackEndReason::Finished
                    | TrackEndReason::Stopped
                    | TrackEndReason::Cleanup => Completion::Finished,
                };
                (guild_id, outcome)
            }
            Self::TrackStuckEvent {
                guild_id,
                threshold_ms,
            } => (
                guild_id,
                Completion::Failed(format!("track atascado más de {}ms", threshold_ms)),
            ),
            Self::TrackExceptionEvent {
                guild_id,
                exception,
            } => {
                warn!(
                    "⚠️ Excepción del nodo en guild {}: {} ({})",
                    guild_id,
                    exception.message.as_deref().unwrap_or("sin mensaje"),
                    exception.severity
                );
                return None;
            }
            Self::Other => return None,
        };

        let guild_id = guild_id.parse::<u64>().ok().filter(|id| *id != 0)?;
        Some((GuildId::new(guild_id), outcome))
    }
}

/// Destino de los eventos de fin de track del nodo
pub trait NodeEventSink: Send + Sync {
    fn track_ended(&self, guild_id: GuildId, outcome: Completion);
}

/// Conexión con un nodo Lavalink
pub struct LavalinkNode {
    http: reqwest::Client,
    rest_url: url::Url,
    ws_url: url::Url,
    password: String,
    session_id: RwLock<Option<String>>,
}

impl LavalinkNode {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let (http_scheme, ws_scheme) = if config.lavalink_secure {
            ("https", "wss")
        } else {
            ("http", "ws")
        };
        let authority = format!("{}:{}", config.lavalink_host, config.lavalink_port);

        let rest_url = url::Url::parse(&format!("{}://{}/v4/", http_scheme, authority))?;
        let ws_url = url::Url::parse(&format!("{}://{}/v4/websocket", ws_scheme, authority))?;

        info!("🎼 Configurando nodo de audio en {}", authority);

        Ok(Self {
            http: reqwest::Client::new(),
            rest_url,
            ws_url,
            password: config.lavalink_password.clone(),
            session_id: RwLock::new(None),
        })
    }

    pub fn is_ready(&self) -> bool {
        self.session_id.read().is_some()
    }

    fn session_id(&self) -> Result<String, PlayerError> {
        self.session_id
            .read()
            .clone()
            .ok_or_else(|| PlayerError::Node("el nodo aún no envió su session id".to_string()))
    }

    fn endpoint(&self, path: &str) -> Result<url::Url, PlayerError> {
        self.rest_url
            .join(path)
            .map_err(|e| PlayerError::Node(e.to_string()))
    }

    fn player_endpoint(&self, guild_id: GuildId) -> Result<url::Url, PlayerError> {
        let session = self.session_id()?;
        self.endpoint(&format!("sessions/{}/players/{}", session, guild_id.get()))
    }

    /// Resuelve una URL o una búsqueda (`ytsearch:`) en tracks
    pub async fn load_tracks(&self, identifier: &str) -> Result<LoadResult, PlayerError> {
        let result = self
            .http
            .get(self.endpoint("loadtracks")?)
            .query(&[("identifier", identifier)])
            .header("Authorization", &self.password)
            .send()
            .await?
            .error_for_status()?
            .json::<LoadResult>()
            .await?;

        Ok(result)
    }

    pub async fn update_player(
        &self,
        guild_id: GuildId,
        update: &UpdatePlayer,
    ) -> Result<(), PlayerError> {
        self.http
            .patch(self.player_endpoint(guild_id)?)
            .header("Authorization", &self.password)
            .json(update)
            .send()
            .await?
            .error_for_status()?;

        Ok(())
    }

    /// Destruye el player remoto y libera su conexión de voz
    pub async fn destroy_player(&self, guild_id: GuildId) -> Result<(), PlayerError> {
        self.http
            .delete(self.player_endpoint(guild_id)?)
            .header("Authorization", &self.password)
            .send()
            .await?
            .error_for_status()?;

        info!("💥 Player remoto destruido en guild {}", guild_id);
        Ok(())
    }

    /// Abre el websocket y reparte los eventos en una tarea de fondo
    pub async fn connect(
        self: &Arc<Self>,
        user_id: UserId,
        sink: Arc<dyn NodeEventSink>,
    ) -> anyhow::Result<JoinHandle<()>> {
        let mut request = self.ws_url.as_str().into_client_request()?;
        let headers = request.headers_mut();
        headers.insert("Authorization", HeaderValue::from_str(&self.password)?);
        headers.insert("User-Id", HeaderValue::from_str(&user_id.get().to_string())?);
        headers.insert(
            "Client-Name",
            HeaderValue::from_static(concat!("tempo/", env!("CARGO_PKG_VERSION"))),
        );

        let (stream, _response) = connect_async(request).await?;
        let (_write, mut read) = stream.split();
        info!("🔌 Websocket del nodo conectado");

        let node = Arc::clone(self);
        let handle = tokio::spawn(async move {
            while let Some(frame) = read.next().await {
                match frame {
                    Ok(Message::Text(text)) => node.handle_message(text.as_str(), sink.as_ref()),
                    Ok(Message::Close(_)) => {
                        warn!("🔌 El nodo cerró el websocket");
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!("❌ Error en el websocket del nodo: {:?}", e);
                        break;
                    }
                }
            }
            node.session_id.write().take();
            info!("Tarea del websocket del nodo terminada");
        });

        Ok(handle)
    }

    /// Procesa un frame de texto del websocket
    pub fn handle_message(&self, raw: &str, sink: &dyn NodeEventSink) {
        let message = match serde_json::from_str::<NodeMessage>(raw) {
            Ok(message) => message,
            Err(e) => {
                warn!("Frame del nodo ilegible: {} ({})", e, raw);
                return;
            }
        };

        match message {
            NodeMessage::Ready {
                resumed,
                session_id,
            } => {
                info!("✅ Nodo listo (session {}, resumed={})", session_id, resumed);
                *self.session_id.write() = Some(session_id);
            }
            NodeMessage::Event(event) => {
                if let Some((guild_id, outcome)) = event.completion() {
                    debug!("🎵 Evento de fin de track en guild {}: {:?}", guild_id, outcome);
                    sink.track_ended(guild_id, outcome);
                }
            }
            NodeMessage::Other => {}
        }
    }
}
