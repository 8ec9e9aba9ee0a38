use async_trait::async_trait;
use serenity::model::id::UserId;
use std::sync::Arc;
use tracing::{info, warn};

use super::{MusicSource, Query};
use crate::{
    audio::{
        lavalink::{LavalinkNode, LoadResult, NodeTrack},
        track::{Song, Track},
    },
    error::PlayerError,
};

/// Fuente remota: el nodo Lavalink resuelve URLs y búsquedas
pub struct NodeSource {
    node: Arc<LavalinkNode>,
    max_playlist_size: usize,
}

impl NodeSource {
    pub fn new(node: Arc<LavalinkNode>, max_playlist_size: usize) -> Self {
        Self {
            node,
            max_playlist_size,
        }
    }
}

/// Identificador para `/v4/loadtracks`
fn identifier(query: &Query) -> String {
    match query {
        Query::Url(url) => url.to_string(),
        Query::Search(text) => format!("ytsearch:{}", text),
    }
}

/// Tracks a encolar según el tipo de resultado
fn tracks_from(result: LoadResult, query: &str, limit: usize) -> Result<Vec<NodeTrack>, PlayerError> {
    match result {
        LoadResult::Track(track) => Ok(vec![track]),
        LoadResult::Search(tracks) => tracks
            .into_iter()
            .next()
            .map(|first| vec![first])
            .ok_or_else(|| PlayerError::Resolution(query.to_string())),
        LoadResult::Playlist(playlist) => {
            info!(
                "📜 Playlist '{}' con {} tracks (máx. {})",
                playlist.info.name,
                playlist.tracks.len(),
                limit
            );
            if playlist.tracks.is_empty() {
                return Err(PlayerError::Resolution(query.to_string()));
            }
            Ok(playlist.tracks.into_iter().take(limit).collect())
        }
        LoadResult::Empty(_) => Err(PlayerError::Resolution(query.to_string())),
        LoadResult::Error(exception) => {
            warn!(
                "❌ El nodo no pudo cargar '{}': {}",
                query,
                exception.message.as_deref().unwrap_or("sin mensaje")
            );
            Err(PlayerError::Resolution(query.to_string()))
        }
    }
}

#[async_trait]
impl MusicSource for NodeSource {
    async fn resolve(&self, query: &str, requested_by: UserId) -> Result<Vec<Song>, PlayerError> {
        let parsed = Query::parse(query)?;
        let result = self.node.load_tracks(&identifier(&parsed)).await?;

        Ok(tracks_from(result, query.trim(), self.max_playlist_size)?
            .into_iter()
            .map(|track| Song::new(Track::from(track), requested_by))
            .collect())
    }

    fn source_name(&self) -> &'static str {
        "lavalink"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn load(json: &str) -> LoadResult {
        serde_json::from_str(json).unwrap()
    }

    fn track_json(id: &str) -> String {
        format!(
            r#"{{"encoded":"enc-{id}","info":{{"identifier":"{id}","title":"Tema {id}","author":"X","length":1000,"isStream":false,"isSeekable":true,"uri":null,"artworkUrl":null}}}}"#
        )
    }

    #[test]
    fn search_queries_use_the_youtube_prefix() {
        assert_eq!(
            identifier(&Query::parse("lofi beats").unwrap()),
            "ytsearch:lofi beats"
        );
        assert_eq!(
            identifier(&Query::parse("https://youtu.be/abc").unwrap()),
            "https://youtu.be/abc"
        );
    }

    #[test]
    fn search_keeps_only_the_first_hit() {
        let json = format!(
            r#"{{"loadType":"search","data":[{},{}]}}"#,
            track_json("a"),
            track_json("b")
        );

        let tracks = tracks_from(load(&json), "q", 10).unwrap();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].encoded, "enc-a");
    }

    #[test]
    fn playlists_are_truncated() {
        let items: Vec<String> = ["a", "b", "c"].into_iter().map(track_json).collect();
        let json = format!(
            r#"{{"loadType":"playlist","data":{{"info":{{"name":"Mix","selectedTrack":-1}},"pluginInfo":{{}},"tracks":[{}]}}}}"#,
            items.join(",")
        );

        let tracks = tracks_from(load(&json), "q", 2).unwrap();
        assert_eq!(
            tracks.iter().map(|t| t.info.identifier.as_str()).collect::<Vec<_>>(),
            vec!["a", "b"]
        );
    }

    #[test]
    fn empty_and_error_results_fail_resolution() {
        let empty = load(r#"{"loadType":"empty","data":{}}"#);
        assert!(matches!(
            tracks_from(empty, "nada", 5),
            Err(PlayerError::Resolution(q)) if q == "nada"
        ));

        let error = load(
            r#"{"loadType":"error","data":{"message":"bloqueado","severity":"common","cause":"x"}}"#,
        );
        assert!(matches!(
            tracks_from(error, "q", 5),
            Err(PlayerError::Resolution(_))
        ));
    }
}
