use async_process::Command;
use async_trait::async_trait;
use serde::Deserialize;
use serenity::model::id::UserId;
use songbird::input::{Compose, YoutubeDl};
use tracing::{debug, info, warn};

use super::{MusicSource, Query};
use crate::{
    audio::track::{Playable, Song, Track},
    error::PlayerError,
};

/// Fuente local: metadata vía yt-dlp, reproducción con el driver local
pub struct YtDlpSource {
    http: reqwest::Client,
    max_playlist_size: usize,
}

/// Entrada de `yt-dlp --flat-playlist --dump-json`
#[derive(Debug, Deserialize)]
struct FlatEntry {
    id: String,
    title: Option<String>,
    url: Option<String>,
    duration: Option<f64>,
}

impl FlatEntry {
    fn into_track(self) -> Track {
        let url = self
            .url
            .unwrap_or_else(|| format!("https://www.youtube.com/watch?v={}", self.id));
        let seconds = self
            .duration
            .filter(|d| d.is_finite() && *d > 0.0)
            .map(|d| d.round() as u64);

        Track::new(
            self.title.unwrap_or_else(|| "Desconocido".to_string()),
            seconds,
            Playable::Local { url },
        )
    }
}

impl YtDlpSource {
    pub fn new(http: reqwest::Client, max_playlist_size: usize) -> Self {
        Self {
            http,
            max_playlist_size,
        }
    }

    async fn resolve_url(&self, url: &str) -> Result<Track, PlayerError> {
        let mut source = YoutubeDl::new(self.http.clone(), url.to_string());
        let meta = source.aux_metadata().await.map_err(|e| {
            warn!("❌ yt-dlp no pudo leer {}: {}", url, e);
            PlayerError::Resolution(url.to_string())
        })?;

        Ok(Track::from_aux_metadata(meta, url.to_string()))
    }

    async fn search_first(&self, query: &str) -> Result<Track, PlayerError> {
        let mut source = YoutubeDl::new_search(self.http.clone(), query.to_string());
        let first = source
            .search(Some(1))
            .await
            .map_err(|e| {
                warn!("❌ Búsqueda fallida para '{}': {}", query, e);
                PlayerError::Resolution(query.to_string())
            })?
            .into_iter()
            .next()
            .ok_or_else(|| PlayerError::Resolution(query.to_string()))?;

        let url = first
            .source_url
            .clone()
            .ok_or_else(|| PlayerError::Resolution(query.to_string()))?;

        Ok(Track::from_aux_metadata(first, url))
    }

    async fn resolve_playlist(&self, url: &str) -> Result<Vec<Track>, PlayerError> {
        let limit = self.max_playlist_size.to_string();
        let output = Command::new("yt-dlp")
            .args([
                "--flat-playlist",
                "--dump-json",
                "--no-warnings",
                "--playlist-end",
                limit.as_str(),
                url,
            ])
            .output()
            .await
            .map_err(|e| {
                warn!("❌ No se pudo ejecutar yt-dlp: {}", e);
                PlayerError::Resolution(url.to_string())
            })?;

        if !output.status.success() {
            warn!(
                "❌ yt-dlp falló con la playlist {}: {}",
                url,
                String::from_utf8_lossy(&output.stderr).trim()
            );
            return Err(PlayerError::Resolution(url.to_string()));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let tracks = parse_flat_playlist(&stdout, self.max_playlist_size);
        if tracks.is_empty() {
            return Err(PlayerError::Resolution(url.to_string()));
        }
        Ok(tracks)
    }
}

fn parse_flat_playlist(output: &str, limit: usize) -> Vec<Track> {
    output
        .lines()
        .filter_map(|line| match serde_json::from_str::<FlatEntry>(line) {
            Ok(entry) => Some(entry),
            Err(e) => {
                debug!("Línea de yt-dlp ignorada: {}", e);
                None
            }
        })
        .take(limit)
        .map(FlatEntry::into_track)
        .collect()
}

#[async_trait]
impl MusicSource for YtDlpSource {
    async fn resolve(&self, query: &str, requested_by: UserId) -> Result<Vec<Song>, PlayerError> {
        let query = Query::parse(query)?;

        let tracks = match &query {
            Query::Url(url) if query.is_playlist() => {
                info!("📜 Cargando playlist: {}", url);
                self.resolve_playlist(url.as_str()).await?
            }
            Query::Url(url) => vec![self.resolve_url(url.as_str()).await?],
            Query::Search(text) => {
                info!("🔍 Buscando en YouTube: {}", text);
                vec![self.search_first(text).await?]
            }
        };

        Ok(tracks
            .into_iter()
            .map(|track| Song::new(track, requested_by))
            .collect())
    }

    fn source_name(&self) -> &'static str {
        "yt-dlp"
    }
}
