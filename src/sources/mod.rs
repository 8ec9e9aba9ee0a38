pub mod lavalink;
pub mod youtube;

use async_trait::async_trait;
use serenity::model::id::UserId;

use crate::{audio::track::Song, error::PlayerError};

pub use lavalink::NodeSource;
pub use youtube::YtDlpSource;

/// Resuelve lo que escribe el usuario en canciones listas para encolar
#[async_trait]
pub trait MusicSource: Send + Sync {
    /// Una URL (video o playlist) o un texto de búsqueda. Una búsqueda
    /// devuelve sólo el primer resultado; una playlist, hasta el máximo
    /// configurado.
    async fn resolve(&self, query: &str, requested_by: UserId) -> Result<Vec<Song>, PlayerError>;

    /// Nombre de la fuente para los logs
    fn source_name(&self) -> &'static str;
}

/// Qué pidió el usuario
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    Url(url::Url),
    Search(String),
}

impl Query {
    pub fn parse(input: &str) -> Result<Self, PlayerError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(PlayerError::Resolution(String::new()));
        }

        match url::Url::parse(input) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(Self::Url(url)),
            _ => Ok(Self::Search(input.to_string())),
        }
    }

    /// Si la URL apunta a una playlist (parámetro `list=`)
    pub fn is_playlist(&self) -> bool {
        match self {
            Self::Url(url) => url.query_pairs().any(|(key, _)| key == "list"),
            Self::Search(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn plain_text_is_a_search() {
        assert_eq!(
            Query::parse("  daft punk  ").unwrap(),
            Query::Search("daft punk".to_string())
        );
        assert_eq!(
            Query::parse("ftp://example.com/song.mp3").unwrap(),
            Query::Search("ftp://example.com/song.mp3".to_string())
        );
    }

    #[test]
    fn http_links_are_urls() {
        let query = Query::parse("https://www.youtube.com/watch?v=dQw4w9WgXcQ").unwrap();
        assert!(matches!(query, Query::Url(_)));
        assert!(!query.is_playlist());

        let playlist = Query::parse("https://www.youtube.com/playlist?list=PL123").unwrap();
        assert!(playlist.is_playlist());
    }

    #[test]
    fn empty_query_is_rejected() {
        assert!(matches!(
            Query::parse("   "),
            Err(PlayerError::Resolution(_))
        ));
    }
}
