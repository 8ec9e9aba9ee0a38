use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::model::id::MessageId;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::audio::track::Song;

/// Estado de la ventana "reproduciendo ahora"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowState {
    NotCreated,
    Active,
    /// Terminal: hace falta una ventana nueva
    Stale,
}

/// Contenido que muestra la ventana
#[derive(Debug, Clone, PartialEq)]
pub enum WindowView {
    Empty,
    NowPlaying {
        title: String,
        thumbnail: Option<String>,
        length: String,
    },
}

impl WindowView {
    pub fn for_song(song: Option<&Song>) -> Self {
        match song {
            Some(song) => {
                let track = song.track();
                Self::NowPlaying {
                    title: track.title().to_string(),
                    thumbnail: track.thumbnail().map(str::to_string),
                    length: track.length().to_string(),
                }
            }
            None => Self::Empty,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Self::Empty => "No hay canciones en la cola",
            Self::NowPlaying { title, .. } => title,
        }
    }
}

/// Acciones de los botones de la ventana, resueltas por nombre
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowAction {
    PlayPause,
    Skip,
    Stop,
    Shuffle,
    Loop,
}

impl WindowAction {
    pub const ALL: [WindowAction; 5] = [
        Self::PlayPause,
        Self::Skip,
        Self::Stop,
        Self::Shuffle,
        Self::Loop,
    ];

    pub fn custom_id(self) -> &'static str {
        match self {
            Self::PlayPause => "music_play_pause",
            Self::Skip => "music_skip",
            Self::Stop => "music_stop",
            Self::Shuffle => "music_shuffle",
            Self::Loop => "music_loop",
        }
    }

    pub fn from_custom_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|action| action.custom_id() == id)
    }
}

/// Mensaje de chat donde vive la ventana (en Discord, un mensaje con
/// embed y botones)
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WindowSurface: Send + Sync {
    async fn send(&self, view: WindowView) -> anyhow::Result<MessageId>;

    async fn edit(&self, message: MessageId, view: WindowView) -> anyhow::Result<()>;

    async fn delete(&self, message: MessageId) -> anyhow::Result<()>;
}

/// Ventana efímera que refleja el track actual.
///
/// El primer render crea el mensaje; los siguientes lo editan en el
/// lugar. Los renders se serializan con el lock del mensaje y cada uno
/// lleva la generación del loop que lo pidió: uno más viejo que el último
/// aplicado se descarta.
pub struct NowPlayingWindow {
    surface: Arc<dyn WindowSurface>,
    state: Mutex<WindowState>,
    rendered: tokio::sync::Mutex<Rendered>,
}

#[derive(Debug, Default)]
struct Rendered {
    message: Option<MessageId>,
    generation: u64,
}

impl NowPlayingWindow {
    pub fn new(surface: Arc<dyn WindowSurface>) -> Self {
        Self {
            surface,
            state: Mutex::new(WindowState::NotCreated),
            rendered: tokio::sync::Mutex::new(Rendered::default()),
        }
    }

    pub fn state(&self) -> WindowState {
        *self.state.lock()
    }

    pub fn is_stale(&self) -> bool {
        self.state() == WindowState::Stale
    }

    /// Muestra `song`, o el estado vacío
    pub async fn render(&self, song: Option<&Song>, generation: u64) -> anyhow::Result<()> {
        let view = WindowView::for_song(song);
        let mut rendered = self.rendered.lock().await;

        if self.is_stale() {
            debug!("Ventana obsoleta, render ignorado");
            return Ok(());
        }
        if generation < rendered.generation {
            debug!(
                "Render de la generación {} descartado (ya se mostró la {})",
                generation, rendered.generation
            );
            return Ok(());
        }
        rendered.generation = generation;

        if let Some(id) = rendered.message {
            match self.surface.edit(id, view.clone()).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    // el mensaje pudo ser borrado a mano
                    warn!("No se pudo editar la ventana, creando otra: {:?}", e);
                    rendered.message = None;
                }
            }
        }

        let id = self.surface.send(view).await?;
        rendered.message = Some(id);

        let mut state = self.state.lock();
        if *state == WindowState::NotCreated {
            *state = WindowState::Active;
        }
        Ok(())
    }

    /// Borra el mensaje y marca la ventana como obsoleta (idempotente)
    pub async fn stale(&self) -> anyhow::Result<()> {
        {
            let mut state = self.state.lock();
            if *state == WindowState::Stale {
                return Ok(());
            }
            *state = WindowState::Stale;
        }

        let taken = self.rendered.lock().await.message.take();
        if let Some(id) = taken {
            self.surface.delete(id).await?;
            info!("🧹 Ventana de reproducción eliminada");
        }
        Ok(())
    }
}
