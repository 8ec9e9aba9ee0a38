use parking_lot::Mutex;
use rand::seq::SliceRandom;
use std::{collections::VecDeque, time::Duration};
use tokio::sync::Notify;
use tracing::{debug, info};

use crate::{audio::track::Song, error::PlayerError};

/// Intervalo de sondeo de [`SongQueue::wait_for_non_empty`]
const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Cola FIFO de canciones de una guild.
///
/// Todas las operaciones toman un lock corto y nunca lo mantienen a
/// través de un `.await`, así que la cola se puede compartir entre el
/// loop de la sesión y los comandos sin más sincronización.
#[derive(Debug, Default)]
pub struct SongQueue {
    items: Mutex<VecDeque<Song>>,
    available: Notify,
}

impl SongQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Agrega una canción al final de la cola
    #[allow(dead_code)]
    pub fn enqueue(&self, song: Song) {
        debug!("➕ Agregado a la cola: {}", song.track().title());
        self.items.lock().push_back(song);
        self.available.notify_one();
    }

    /// Agrega varias canciones conservando su orden (playlists)
    pub fn enqueue_all(&self, songs: impl IntoIterator<Item = Song>) -> usize {
        let added = {
            let mut items = self.items.lock();
            let before = items.len();
            items.extend(songs);
            items.len() - before
        };

        if added > 0 {
            info!("➕ Agregadas {} canciones a la cola", added);
            self.available.notify_one();
        }
        added
    }

    /// Espera hasta que haya una canción y la saca de la cola (FIFO)
    #[allow(dead_code)]
    pub async fn dequeue(&self) -> Song {
        loop {
            let notified = self.available.notified();
            if let Some(song) = self.try_dequeue() {
                return song;
            }
            notified.await;
        }
    }

    /// Saca la primera canción si existe, sin esperar
    pub fn try_dequeue(&self) -> Option<Song> {
        let song = self.items.lock().pop_front();
        if let Some(song) = &song {
            debug!("➡️ Siguiente en cola (FIFO): {}", song.track().title());
        }
        song
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    /// Vacía la cola. Los que esperan en `dequeue` no son despertados.
    pub fn clear(&self) -> usize {
        let mut items = self.items.lock();
        let removed = items.len();
        items.clear();
        info!("🗑️ Cola limpiada ({} canciones)", removed);
        removed
    }

    /// Mezcla el orden de las canciones pendientes
    pub fn shuffle(&self) {
        let mut items = self.items.lock();
        items.make_contiguous().shuffle(&mut rand::thread_rng());
        info!("🔀 Cola mezclada ({} canciones)", items.len());
    }

    /// Elimina la canción en `index` (0 = la próxima en sonar)
    pub fn remove_at(&self, index: usize) -> Result<Song, PlayerError> {
        let mut items = self.items.lock();
        let len = items.len();
        let song = items
            .remove(index)
            .ok_or(PlayerError::IndexOutOfRange { index, len })?;
        debug!("❌ Track eliminado en posición {}", index);
        Ok(song)
    }

    /// Copia ordenada de las canciones pendientes
    pub fn snapshot(&self) -> Vec<Song> {
        self.items.lock().iter().cloned().collect()
    }

    /// Duración conocida de todo lo pendiente (los streams no suman)
    pub fn total_duration(&self) -> Duration {
        self.items
            .lock()
            .iter()
            .filter_map(|song| song.track().duration())
            .sum()
    }

    /// Sondea cada 500ms hasta que la cola tenga algo. Quien llama pone
    /// el timeout.
    pub async fn wait_for_non_empty(&self) {
        while self.is_empty() {
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::track::{Playable, Track};
    use pretty_assertions::assert_eq;
    use serenity::model::id::UserId;
    use std::sync::Arc;

    fn song(title: &str, seconds: Option<u64>) -> Song {
        Song::new(
            Track::new(
                title,
                seconds,
                Playable::Local {
                    url: format!("https://example.com/{}", title),
                },
            ),
            UserId::new(42),
        )
    }

    fn titles(queue: &SongQueue) -> Vec<String> {
        queue
            .snapshot()
            .iter()
            .map(|s| s.track().title().to_string())
            .collect()
    }

    #[tokio::test]
    async fn dequeues_in_insertion_order() {
        let queue = SongQueue::new();
        for title in ["a", "b", "c", "d"] {
            queue.enqueue(song(title, Some(10)));
        }

        let mut out = Vec::new();
        for _ in 0..4 {
            out.push(queue.dequeue().await.track().title().to_string());
        }

        assert_eq!(out, vec!["a", "b", "c", "d"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn batch_enqueue_keeps_order_after_existing_items() {
        let queue = SongQueue::new();
        queue.enqueue(song("first", None));
        let added = queue.enqueue_all(vec![song("x", None), song("y", None)]);

        assert_eq!(added, 2);
        assert_eq!(titles(&queue), vec!["first", "x", "y"]);
    }

    #[test]
    fn shuffle_preserves_the_multiset() {
        let queue = SongQueue::new();
        for i in 0..25 {
            queue.enqueue(song(&format!("s{}", i), Some(i)));
        }
        let mut before = titles(&queue);

        queue.shuffle();

        let mut after = titles(&queue);
        assert_eq!(after.len(), 25);
        before.sort();
        after.sort();
        assert_eq!(before, after);
    }

    #[test]
    fn remove_at_validates_the_index() {
        let queue = SongQueue::new();
        queue.enqueue(song("a", None));
        queue.enqueue(song("b", None));
        queue.enqueue(song("c", None));

        let removed = queue.remove_at(1).unwrap();
        assert_eq!(removed.track().title(), "b");
        assert_eq!(titles(&queue), vec!["a", "c"]);

        let err = queue.remove_at(2).unwrap_err();
        assert!(matches!(
            err,
            PlayerError::IndexOutOfRange { index: 2, len: 2 }
        ));
    }

    #[test]
    fn clear_reports_removed_items() {
        let queue = SongQueue::new();
        queue.enqueue(song("a", Some(30)));
        queue.enqueue(song("b", Some(45)));
        queue.enqueue(song("live", None));
        assert_eq!(queue.total_duration(), Duration::from_secs(75));

        assert_eq!(queue.clear(), 3);
        assert!(queue.is_empty());
        assert_eq!(queue.len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn dequeue_waits_for_a_later_enqueue() {
        let queue = Arc::new(SongQueue::new());

        let consumer = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.dequeue().await })
        };

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(!consumer.is_finished());

        queue.enqueue(song("late", Some(5)));
        let got = consumer.await.unwrap();
        assert_eq!(got.track().title(), "late");
    }

    #[tokio::test(start_paused = true)]
    async fn each_item_is_delivered_to_exactly_one_consumer() {
        let queue = Arc::new(SongQueue::new());
        let consumers: Vec<_> = (0..3)
            .map(|_| {
                let queue = Arc::clone(&queue);
                tokio::spawn(async move { queue.dequeue().await.track().title().to_string() })
            })
            .collect();

        for title in ["a", "b", "c"] {
            queue.enqueue(song(title, None));
            tokio::task::yield_now().await;
        }

        let mut got = Vec::new();
        for consumer in consumers {
            got.push(consumer.await.unwrap());
        }
        got.sort();
        assert_eq!(got, vec!["a", "b", "c"]);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_for_non_empty_polls_until_enqueue() {
        let queue = Arc::new(SongQueue::new());
        let waiter = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.wait_for_non_empty().await })
        };

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(!waiter.is_finished());

        queue.enqueue(song("a", None));
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("el sondeo debería notar la canción")
            .unwrap();
    }
}
