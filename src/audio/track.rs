use chrono::{DateTime, Utc};
use serenity::model::id::UserId;
use songbird::input::AuxMetadata;
use std::{sync::Arc, time::Duration};

use crate::audio::lavalink::NodeTrack;

/// Recurso reproducible subyacente, opaco para la sesión.
///
/// Cada driver de voz sólo acepta su propia variante.
#[derive(Debug, Clone, PartialEq)]
pub enum Playable {
    /// URL que el driver local entrega a yt-dlp
    Local { url: String },
    /// Track ya resuelto por el nodo de audio remoto
    Remote(NodeTrack),
}

/// Descriptor inmutable de un track, normalizado entre backends
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    title: String,
    thumbnail: Option<String>,
    length: String,
    raw_duration: Option<u64>,
    playable: Playable,
}

impl Track {
    pub fn new(title: impl Into<String>, raw_duration: Option<u64>, playable: Playable) -> Self {
        Self {
            title: title.into(),
            thumbnail: None,
            length: format_length(raw_duration),
            raw_duration,
            playable,
        }
    }

    pub fn with_thumbnail(mut self, thumbnail: impl Into<String>) -> Self {
        self.thumbnail = Some(thumbnail.into());
        self
    }

    /// Adaptador para metadata de yt-dlp (duración en segundos)
    pub fn from_aux_metadata(meta: AuxMetadata, url: String) -> Self {
        let title = meta.title.unwrap_or_else(|| "Desconocido".to_string());
        let seconds = meta.duration.map(|d| d.as_secs());
        let track = Self::new(title, seconds, Playable::Local { url });

        match meta.thumbnail {
            Some(thumbnail) => track.with_thumbnail(thumbnail),
            None => track,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn thumbnail(&self) -> Option<&str> {
        self.thumbnail.as_deref()
    }

    /// Duración legible (`M:SS`, `H:MM:SS` o "En vivo")
    pub fn length(&self) -> &str {
        &self.length
    }

    /// Duración en segundos; `None` para streams en vivo
    pub fn raw_duration(&self) -> Option<u64> {
        self.raw_duration
    }

    pub fn duration(&self) -> Option<Duration> {
        self.raw_duration.map(Duration::from_secs)
    }

    pub fn playable(&self) -> &Playable {
        &self.playable
    }
}

/// Adaptador para tracks del nodo remoto (duración en milisegundos)
impl From<NodeTrack> for Track {
    fn from(node_track: NodeTrack) -> Self {
        let info = &node_track.info;
        let seconds = if info.is_stream {
            None
        } else {
            Some(info.length / 1000)
        };
        let title = info.title.clone();
        let artwork = info.artwork_url.clone();

        let track = Self::new(title, seconds, Playable::Remote(node_track));
        match artwork {
            Some(url) => track.with_thumbnail(url),
            None => track,
        }
    }
}

/// Entrada de la cola: un [`Track`] más quién lo pidió y cuándo.
///
/// Clonar un `Song` comparte el mismo track.
#[derive(Debug, Clone)]
pub struct Song {
    track: Arc<Track>,
    requested_by: UserId,
    enqueued_at: DateTime<Utc>,
}

impl Song {
    pub fn new(track: Track, requested_by: UserId) -> Self {
        Self {
            track: Arc::new(track),
            requested_by,
            enqueued_at: Utc::now(),
        }
    }

    pub fn track(&self) -> &Track {
        &self.track
    }

    pub fn requested_by(&self) -> UserId {
        self.requested_by
    }

    pub fn enqueued_at(&self) -> DateTime<Utc> {
        self.enqueued_at
    }

    /// Identidad del track compartido, útil para detectar duplicados
    pub fn same_track(&self, other: &Song) -> bool {
        Arc::ptr_eq(&self.track, &other.track)
    }
}

/// Formatea una duración en segundos como `M:SS` o `H:MM:SS`
pub fn format_length(seconds: Option<u64>) -> String {
    let Some(total_seconds) = seconds else {
        return "🔴 En vivo".to_string();
    };

    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}
