use dashmap::{mapref::entry::Entry, DashMap};
use serenity::model::id::GuildId;
use std::sync::Arc;
use tracing::{debug, info};

use crate::audio::{lavalink::NodeEventSink, session::PlayerSession, signal::Completion};

/// Sesiones de reproducción activas, una por guild
#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<GuildId, Arc<PlayerSession>>,
}

impl SessionRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Sesión viva de la guild; si no hay o la que hay está obsoleta se
    /// construye otra con `create`.
    ///
    /// Al reemplazar una sesión obsoleta no vuelve hasta que la anterior
    /// liberó su conexión de voz.
    pub async fn get_or_create<F>(&self, guild_id: GuildId, create: F) -> Arc<PlayerSession>
    where
        F: FnOnce() -> PlayerSession,
    {
        let (session, replaced) = self.swap_in(guild_id, create);

        if let Some(old) = replaced {
            debug!("Esperando que la sesión anterior de {} libere la voz", guild_id);
            old.wait_released().await;
        }
        session
    }

    fn swap_in<F>(
        &self,
        guild_id: GuildId,
        create: F,
    ) -> (Arc<PlayerSession>, Option<Arc<PlayerSession>>)
    where
        F: FnOnce() -> PlayerSession,
    {
        match self.sessions.entry(guild_id) {
            Entry::Occupied(mut entry) if entry.get().is_stale() => {
                info!("♻️ Reemplazando la sesión obsoleta de guild {}", guild_id);
                let old = entry.insert(Arc::new(create()));
                (Arc::clone(entry.get()), Some(old))
            }
            Entry::Occupied(entry) => (Arc::clone(entry.get()), None),
            Entry::Vacant(entry) => {
                debug!("Nueva sesión de reproducción para guild {}", guild_id);
                (Arc::clone(entry.insert(Arc::new(create())).value()), None)
            }
        }
    }

    /// Sesión de la guild si existe y sigue viva
    pub fn get(&self, guild_id: GuildId) -> Option<Arc<PlayerSession>> {
        self.sessions
            .get(&guild_id)
            .filter(|session| !session.is_stale())
            .map(|session| Arc::clone(session.value()))
    }

    /// Sesión registrada de la guild, viva u obsoleta
    pub fn current(&self, guild_id: GuildId) -> Option<Arc<PlayerSession>> {
        self.sessions
            .get(&guild_id)
            .map(|session| Arc::clone(session.value()))
    }

    /// Quita la entrada sólo si sigue siendo `session`
    pub fn remove_if_same(&self, guild_id: GuildId, session: &Arc<PlayerSession>) -> bool {
        self.sessions
            .remove_if(&guild_id, |_, registered| Arc::ptr_eq(registered, session))
            .is_some()
    }

    /// Cantidad de sesiones vivas
    pub fn active_count(&self) -> usize {
        self.sessions
            .iter()
            .filter(|session| !session.is_stale())
            .count()
    }
}

impl NodeEventSink for SessionRegistry {
    fn track_ended(&self, guild_id: GuildId, outcome: Completion) {
        match self.get(guild_id) {
            Some(session) => session.notify_track_end(outcome),
            None => debug!("Evento del nodo para guild {} sin sesión activa", guild_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{
        backend::DriverKind,
        session::SessionTimeouts,
        testing::{song, FakeDriver, RecordingSurface},
    };
    use std::time::Duration;

    fn session(guild_id: GuildId) -> PlayerSession {
        PlayerSession::new(guild_id, RecordingSurface::new(), SessionTimeouts::default())
    }

    #[tokio::test]
    async fn reuses_live_sessions() {
        let registry = SessionRegistry::new();
        let guild = GuildId::new(5);

        let first = registry.get_or_create(guild, || session(guild)).await;
        let second = registry.get_or_create(guild, || session(guild)).await;

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.active_count(), 1);
    }

    #[tokio::test]
    async fn stale_sessions_are_replaced() {
        let registry = SessionRegistry::new();
        let guild = GuildId::new(5);

        let first = registry.get_or_create(guild, || session(guild)).await;
        first.attach_backend(FakeDriver::new(DriverKind::Local));
        first.shutdown().await;

        assert!(registry.get(guild).is_none());
        let second = registry.get_or_create(guild, || session(guild)).await;
        assert!(!Arc::ptr_eq(&first, &second));
        assert!(!second.is_stale());
    }

    #[tokio::test(start_paused = true)]
    async fn node_events_reach_the_guild_session() {
        let registry = SessionRegistry::new();
        let guild = GuildId::new(9);
        let driver = FakeDriver::new(DriverKind::RemoteNode);

        let session = registry.get_or_create(guild, || session(guild)).await;
        session.attach_backend(driver.clone());
        session.play(vec![song("A", 100), song("B", 100)]).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        registry.track_ended(GuildId::new(404), Completion::Finished);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(driver.played(), vec!["A"]);

        registry.track_ended(guild, Completion::Finished);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(driver.played(), vec!["A", "B"]);
    }

    #[tokio::test]
    async fn remove_only_drops_the_same_session() {
        let registry = SessionRegistry::new();
        let guild = GuildId::new(1);

        let old = registry.get_or_create(guild, || session(guild)).await;
        old.shutdown().await;
        let fresh = registry.get_or_create(guild, || session(guild)).await;

        // la salida de voz de `old` llega con `fresh` ya registrada
        assert!(!registry.remove_if_same(guild, &old));
        assert!(Arc::ptr_eq(&registry.get(guild).unwrap(), &fresh));

        assert!(registry.remove_if_same(guild, &fresh));
        assert!(registry.current(guild).is_none());
        assert_eq!(registry.active_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn replacement_waits_for_the_old_connection_to_be_released() {
        let registry = Arc::new(SessionRegistry::default());
        let guild = GuildId::new(3);
        let driver = FakeDriver::new(DriverKind::Local);
        driver.slow_disconnect(Duration::from_secs(2));

        let old = registry.get_or_create(guild, || session(guild)).await;
        old.attach_backend(driver.clone());
        old.play(Vec::new()).unwrap();

        // a los 60s vence la inactividad y empieza la desconexión lenta
        tokio::time::sleep(Duration::from_secs(61)).await;
        assert!(old.is_stale());
        assert!(!driver.disconnected());

        let started = tokio::time::Instant::now();
        let fresh = {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move { registry.get_or_create(guild, || session(guild)).await })
        };
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(!fresh.is_finished());

        let fresh = fresh.await.unwrap();
        assert!(driver.disconnected());
        assert!(started.elapsed() >= Duration::from_secs(1));
        assert!(!Arc::ptr_eq(&old, &fresh));
        assert!(!fresh.is_stale());
    }
}
