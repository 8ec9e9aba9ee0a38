use async_trait::async_trait;
use parking_lot::Mutex;
use std::{sync::Arc, time::Duration};
use tracing::{debug, info};

use crate::{
    audio::{signal::CompletionToken, track::{Playable, Song}},
    error::PlayerError,
};

/// Estado del backend de audio de una sesión
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendState {
    Stopped,
    Playing,
    Paused,
    Waiting,
    /// Terminal: el backend se descarta y nunca vuelve a reproducir
    Stale,
}

/// Tipo de driver detrás de un [`AudioBackend`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverKind {
    /// songbird + yt-dlp en este proceso
    Local,
    /// Nodo Lavalink externo
    RemoteNode,
}

/// Operaciones comunes de los drivers de voz.
///
/// Cada implementación es dueña exclusiva de su conexión de voz.
#[async_trait]
pub trait VoiceDriver: Send + Sync {
    fn kind(&self) -> DriverKind;

    /// Si el driver avisa el fin de track con el callback recibido en
    /// [`VoiceDriver::play`]. Los que no, avisan por eventos externos.
    fn reports_completion(&self) -> bool {
        self.kind() == DriverKind::Local
    }

    fn supports_seek(&self) -> bool {
        self.kind() == DriverKind::RemoteNode
    }

    async fn play(
        &self,
        source: &Playable,
        on_finished: Option<CompletionToken>,
    ) -> Result<(), PlayerError>;

    async fn pause(&self) -> Result<(), PlayerError>;

    async fn resume(&self) -> Result<(), PlayerError>;

    async fn stop(&self) -> Result<(), PlayerError>;

    async fn seek(&self, position: Duration) -> Result<(), PlayerError>;

    /// `percent` en el rango nativo del driver
    async fn set_volume(&self, percent: u8) -> Result<(), PlayerError>;

    /// Libera la conexión de voz
    async fn disconnect(&self) -> Result<(), PlayerError>;
}

/// Máquina de estados sobre un [`VoiceDriver`].
///
/// Los locks de estado nunca se mantienen a través de llamadas al driver.
pub struct AudioBackend {
    driver: Arc<dyn VoiceDriver>,
    state: Mutex<BackendState>,
    current: Mutex<Option<Song>>,
}

impl AudioBackend {
    pub fn new(driver: Arc<dyn VoiceDriver>) -> Self {
        Self {
            driver,
            state: Mutex::new(BackendState::Stopped),
            current: Mutex::new(None),
        }
    }

    pub fn state(&self) -> BackendState {
        *self.state.lock()
    }

    pub fn kind(&self) -> DriverKind {
        self.driver.kind()
    }

    pub fn is_stale(&self) -> bool {
        self.state() == BackendState::Stale
    }

    #[allow(dead_code)]
    pub fn current(&self) -> Option<Song> {
        self.current.lock().clone()
    }

    /// Cambia de estado salvo que el backend ya esté obsoleto
    fn transition(&self, next: BackendState) -> bool {
        let mut state = self.state.lock();
        if *state == BackendState::Stale {
            return false;
        }
        *state = next;
        true
    }

    /// Reproduce `song`, o pasa a `Waiting` si no hay canción.
    ///
    /// El callback sólo se entrega a drivers que avisan el fin de track
    /// por sí mismos. No hace nada si el backend está obsoleto.
    pub async fn play_track(
        &self,
        song: Option<&Song>,
        on_finished: CompletionToken,
    ) -> Result<(), PlayerError> {
        let Some(song) = song else {
            if !self.transition(BackendState::Waiting) {
                return Ok(());
            }
            *self.current.lock() = None;
            return self.driver.stop().await;
        };

        if !self.transition(BackendState::Playing) {
            return Ok(());
        }
        *self.current.lock() = Some(song.clone());

        let callback = self.driver.reports_completion().then_some(on_finished);
        self.driver.play(song.track().playable(), callback).await
    }

    /// Pausa; ignorado si no está sonando nada
    pub async fn pause(&self) -> Result<(), PlayerError> {
        {
            let mut state = self.state.lock();
            if *state != BackendState::Playing {
                debug!("Pausa ignorada en estado {:?}", *state);
                return Ok(());
            }
            *state = BackendState::Paused;
        }
        self.driver.pause().await
    }

    /// Reanuda; ignorado si no estaba en pausa
    pub async fn resume(&self) -> Result<(), PlayerError> {
        {
            let mut state = self.state.lock();
            if *state != BackendState::Paused {
                debug!("Reanudar ignorado en estado {:?}", *state);
                return Ok(());
            }
            *state = BackendState::Playing;
        }
        self.driver.resume().await
    }

    pub async fn stop(&self) -> Result<(), PlayerError> {
        if !self.transition(BackendState::Waiting) {
            return Ok(());
        }
        *self.current.lock() = None;
        self.driver.stop().await
    }

    /// Igual que `stop`: el loop de la sesión ve el fin y avanza
    pub async fn skip(&self) -> Result<(), PlayerError> {
        self.stop().await
    }

    /// Ignorado en drivers sin soporte de seek
    pub async fn seek(&self, position: Duration) -> Result<(), PlayerError> {
        if self.is_stale() {
            return Ok(());
        }
        if !self.driver.supports_seek() {
            debug!("Seek no soportado por el driver {:?}", self.kind());
            return Ok(());
        }
        self.driver.seek(position).await
    }

    pub async fn set_volume(&self, percent: u8) -> Result<(), PlayerError> {
        if self.is_stale() {
            return Ok(());
        }
        self.driver.set_volume(percent).await
    }

    /// Libera la conexión y marca el backend como obsoleto (idempotente)
    pub async fn become_stale(&self) -> Result<(), PlayerError> {
        {
            let mut state = self.state.lock();
            if *state == BackendState::Stale {
                return Ok(());
            }
            *state = BackendState::Stale;
        }
        *self.current.lock() = None;
        info!("💤 Backend {:?} obsoleto, liberando conexión de voz", self.kind());
        self.driver.disconnect().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{
        signal::{Completion, CompletionSignal},
        testing::{song, DriverCall, FakeDriver},
    };
    use pretty_assertions::assert_eq;

    fn backend(kind: DriverKind) -> (AudioBackend, Arc<FakeDriver>) {
        let driver = FakeDriver::new(kind);
        (AudioBackend::new(driver.clone()), driver)
    }

    #[tokio::test]
    async fn play_and_transport_controls_follow_the_state_machine() {
        let (backend, driver) = backend(DriverKind::Local);
        let signal = CompletionSignal::new();
        let a = song("a", 10);

        assert_eq!(backend.state(), BackendState::Stopped);
        backend.play_track(Some(&a), signal.arm()).await.unwrap();
        assert_eq!(backend.state(), BackendState::Playing);

        backend.pause().await.unwrap();
        assert_eq!(backend.state(), BackendState::Paused);
        backend.resume().await.unwrap();
        assert_eq!(backend.state(), BackendState::Playing);

        backend.skip().await.unwrap();
        assert_eq!(backend.state(), BackendState::Waiting);

        assert_eq!(
            driver.calls(),
            vec![
                DriverCall::Play("a".to_string()),
                DriverCall::Pause,
                DriverCall::Resume,
                DriverCall::Stop,
            ]
        );
    }

    #[tokio::test]
    async fn invalid_transport_calls_are_silent_no_ops() {
        let (backend, driver) = backend(DriverKind::Local);

        backend.resume().await.unwrap();
        backend.pause().await.unwrap();
        assert_eq!(backend.state(), BackendState::Stopped);
        assert!(driver.calls().is_empty());
    }

    #[tokio::test]
    async fn empty_play_means_waiting() {
        let (backend, driver) = backend(DriverKind::Local);
        let signal = CompletionSignal::new();

        backend.play_track(None, signal.arm()).await.unwrap();

        assert_eq!(backend.state(), BackendState::Waiting);
        assert_eq!(backend.current().map(|s| s.track().title().to_string()), None);
        assert_eq!(driver.calls(), vec![DriverCall::Stop]);
    }

    #[tokio::test]
    async fn only_local_drivers_receive_the_callback() {
        let signal = CompletionSignal::new();

        let (local, local_driver) = backend(DriverKind::Local);
        local.play_track(Some(&song("a", 3)), signal.arm()).await.unwrap();
        assert!(local_driver.finish(Completion::Finished));

        let (remote, remote_driver) = backend(DriverKind::RemoteNode);
        remote.play_track(Some(&song("b", 3)), signal.arm()).await.unwrap();
        assert!(!remote_driver.finish(Completion::Finished));
    }

    #[tokio::test]
    async fn seek_is_ignored_without_driver_support() {
        let (local, local_driver) = backend(DriverKind::Local);
        local.seek(Duration::from_secs(30)).await.unwrap();
        assert!(local_driver.calls().is_empty());

        let (remote, remote_driver) = backend(DriverKind::RemoteNode);
        remote.seek(Duration::from_secs(30)).await.unwrap();
        assert_eq!(
            remote_driver.calls(),
            vec![DriverCall::Seek(Duration::from_secs(30))]
        );
    }

    #[tokio::test]
    async fn stale_is_terminal_and_idempotent() {
        let (backend, driver) = backend(DriverKind::Local);
        let signal = CompletionSignal::new();

        backend.become_stale().await.unwrap();
        backend.become_stale().await.unwrap();
        backend.play_track(Some(&song("a", 5)), signal.arm()).await.unwrap();
        backend.play_track(None, signal.arm()).await.unwrap();
        backend.stop().await.unwrap();
        backend.set_volume(30).await.unwrap();

        assert_eq!(backend.state(), BackendState::Stale);
        assert_eq!(driver.calls(), vec![DriverCall::Disconnect]);
    }
}
