//! # Player Session
//!
//! Orquestador de reproducción de una guild. Es dueño de la cola, del
//! backend de audio y de la ventana "reproduciendo ahora", y corre un
//! único loop de fondo que:
//!
//! 1. elige la próxima canción (la repetida si el loop está activo, si
//!    no la primera de la cola, o ninguna),
//! 2. lanza sin esperar la reproducción y el render de la ventana,
//! 3. espera el fin del track (duración + gracia) o, sin canción, que
//!    llegue algo a la cola (timeout de inactividad),
//! 4. si vence el plazo, deja backend y ventana obsoletos y termina.
//!
//! Una sesión obsoleta no se reutiliza: el registro crea otra.

use parking_lot::{Mutex, RwLock};
use serenity::model::id::GuildId;
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::sync::{Notify, OwnedMutexGuard};
use tracing::{debug, error, info, warn};

use crate::{
    audio::{
        backend::{AudioBackend, BackendState, VoiceDriver},
        queue::SongQueue,
        signal::{Completion, CompletionSignal, CompletionToken},
        track::Song,
        window::{NowPlayingWindow, WindowSurface},
    },
    error::PlayerError,
};

/// Plazos del loop de la sesión
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTimeouts {
    /// Espera máxima con la cola vacía antes de retirar la sesión
    pub idle: Duration,
    /// Margen sobre la duración nominal de cada track
    pub grace: Duration,
    /// Plazo para tracks sin duración conocida (streams)
    pub unknown_length: Duration,
}

impl Default for SessionTimeouts {
    fn default() -> Self {
        Self {
            idle: Duration::from_secs(60),
            grace: Duration::from_secs(5),
            unknown_length: Duration::from_secs(3600),
        }
    }
}

pub struct PlayerSession {
    guild_id: GuildId,
    queue: SongQueue,
    backend: RwLock<Option<Arc<AudioBackend>>>,
    window: Arc<NowPlayingWindow>,
    current: Mutex<Option<Song>>,
    looping: AtomicBool,
    completion: Arc<CompletionSignal>,
    run_lock: Arc<tokio::sync::Mutex<()>>,
    timeouts: SessionTimeouts,
    retiring: AtomicBool,
    /// Voz y ventana ya liberadas
    released: AtomicBool,
    released_notify: Notify,
}

impl PlayerSession {
    pub fn new(
        guild_id: GuildId,
        surface: Arc<dyn WindowSurface>,
        timeouts: SessionTimeouts,
    ) -> Self {
        Self {
            guild_id,
            queue: SongQueue::new(),
            backend: RwLock::new(None),
            window: Arc::new(NowPlayingWindow::new(surface)),
            current: Mutex::new(None),
            looping: AtomicBool::new(false),
            completion: CompletionSignal::new(),
            run_lock: Arc::new(tokio::sync::Mutex::new(())),
            timeouts,
            retiring: AtomicBool::new(false),
            released: AtomicBool::new(false),
            released_notify: Notify::new(),
        }
    }

    /// Asocia el driver de voz de la sesión; queda fijo hasta que caduque
    pub fn attach_backend(&self, driver: Arc<dyn VoiceDriver>) {
        let mut backend = self.backend.write();
        if backend.is_some() {
            warn!("La sesión de {} ya tenía backend, se reemplaza", self.guild_id);
        }
        info!("🔈 Backend {:?} asociado a guild {}", driver.kind(), self.guild_id);
        *backend = Some(Arc::new(AudioBackend::new(driver)));
    }

    pub fn has_backend(&self) -> bool {
        self.backend.read().is_some()
    }

    fn backend(&self) -> Option<Arc<AudioBackend>> {
        self.backend.read().clone()
    }

    fn connected_backend(&self) -> Result<Arc<AudioBackend>, PlayerError> {
        if self.is_stale() {
            return Err(PlayerError::StaleSession);
        }
        self.backend().ok_or(PlayerError::NotConnected)
    }

    pub fn queue(&self) -> &SongQueue {
        &self.queue
    }

    pub fn current(&self) -> Option<Song> {
        self.current.lock().clone()
    }

    pub fn is_playing(&self) -> bool {
        self.backend()
            .is_some_and(|backend| backend.state() == BackendState::Playing)
    }

    pub fn is_paused(&self) -> bool {
        self.backend()
            .is_some_and(|backend| backend.state() == BackendState::Paused)
    }

    /// Obsoleta si el backend o la ventana lo están. Es permanente.
    pub fn is_stale(&self) -> bool {
        self.window.is_stale() || self.backend().is_some_and(|backend| backend.is_stale())
    }

    pub fn is_looping(&self) -> bool {
        self.looping.load(Ordering::SeqCst)
    }

    /// Encola los tracks y arranca el loop si no hay uno corriendo
    pub fn play(self: &Arc<Self>, songs: Vec<Song>) -> Result<usize, PlayerError> {
        self.connected_backend()?;

        let added = self.queue.enqueue_all(songs);

        // Sólo quien consigue el lock arranca el loop; el resto sólo encola
        if let Ok(guard) = Arc::clone(&self.run_lock).try_lock_owned() {
            let session = Arc::clone(self);
            tokio::spawn(async move { session.run(guard).await });
            debug!("Loop de reproducción iniciado en guild {}", self.guild_id);
        }

        Ok(added)
    }

    pub async fn skip(&self) -> Result<(), PlayerError> {
        let skipped = self.current.lock().take();
        if let Some(song) = skipped {
            info!("⏭️ Saltando {} en guild {}", song.track().title(), self.guild_id);
            self.connected_backend()?.skip().await?;
        }
        Ok(())
    }

    /// Vacía la cola y detiene el audio; el loop sigue y cae en la espera
    /// de inactividad
    pub async fn stop(&self) -> Result<(), PlayerError> {
        self.current.lock().take();
        self.queue.clear();
        self.connected_backend()?.stop().await?;
        info!("⏹️ Reproducción detenida en guild {}", self.guild_id);
        Ok(())
    }

    pub async fn pause(&self) -> Result<(), PlayerError> {
        self.connected_backend()?.pause().await
    }

    pub async fn resume(&self) -> Result<(), PlayerError> {
        self.connected_backend()?.resume().await
    }

    /// Pausa o reanuda según el estado actual (botón ⏯️)
    pub async fn toggle_pause(&self) -> Result<(), PlayerError> {
        if self.is_paused() {
            self.resume().await
        } else {
            self.pause().await
        }
    }

    pub async fn seek(&self, position: Duration) -> Result<(), PlayerError> {
        self.connected_backend()?.seek(position).await
    }

    /// Volumen en porcentaje; fuera de 0..=100 es un error
    pub async fn set_volume(&self, percent: i64) -> Result<(), PlayerError> {
        let percent = u8::try_from(percent)
            .ok()
            .filter(|p| *p <= 100)
            .ok_or(PlayerError::InvalidVolume(percent))?;
        self.connected_backend()?.set_volume(percent).await
    }

    pub fn shuffle(&self) {
        self.queue.shuffle();
    }

    /// Activa o desactiva la repetición de la canción actual
    pub fn toggle_loop(&self) -> bool {
        let enabled = !self.looping.fetch_xor(true, Ordering::SeqCst);
        info!(
            "{} Repetición {} en guild {}",
            if enabled { "🔂" } else { "➡️" },
            if enabled { "activada" } else { "desactivada" },
            self.guild_id
        );
        enabled
    }

    pub fn remove(&self, index: usize) -> Result<Song, PlayerError> {
        self.queue.remove_at(index)
    }

    /// Fin de track notificado desde fuera (eventos del nodo remoto)
    pub fn notify_track_end(&self, outcome: Completion) {
        debug!("Fin de track notificado en guild {}: {:?}", self.guild_id, outcome);
        self.completion.set(outcome);
    }

    /// Retira la sesión ya (comando /leave)
    pub async fn shutdown(&self) {
        self.queue.clear();
        self.current.lock().take();
        self.retire().await;
        // despierta al loop para que vea la sesión obsoleta
        self.completion.set(Completion::Finished);
    }

    /// Espera a que la sesión termine de liberar la conexión de voz.
    ///
    /// Una sesión puede verse obsoleta antes de soltar la conexión; nadie
    /// debe conectarse al canal de la guild hasta que esto vuelva.
    pub async fn wait_released(&self) {
        loop {
            let notified = self.released_notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.released.load(Ordering::SeqCst) {
                return;
            }
            notified.await;
        }
    }

    fn next_song(&self) -> Option<Song> {
        if self.is_looping() {
            if let Some(song) = self.current() {
                return Some(song);
            }
        }
        self.queue.try_dequeue()
    }

    fn track_deadline(&self, song: &Song) -> Duration {
        song.track()
            .duration()
            .unwrap_or(self.timeouts.unknown_length)
            + self.timeouts.grace
    }

    async fn run(self: Arc<Self>, _guard: OwnedMutexGuard<()>) {
        info!("▶️ Loop de reproducción activo en guild {}", self.guild_id);

        let mut shown: Option<Song> = None;

        loop {
            if self.is_stale() {
                break;
            }

            let song = self.next_song();
            *self.current.lock() = song.clone();

            let token = self.completion.arm();
            self.dispatch_playback(song.clone(), token.clone());

            // una repetición no vuelve a editar la ventana
            let repeated = matches!((&shown, &song), (Some(a), Some(b)) if a.same_track(b));
            if !repeated {
                self.dispatch_render(song.clone(), token.generation());
                shown = song.clone();
            }

            let waited = match &song {
                Some(song) => {
                    let deadline = self.track_deadline(song);
                    debug!(
                        "Esperando fin de {} (máx. {})",
                        song.track().title(),
                        humantime::format_duration(deadline)
                    );
                    tokio::time::timeout(deadline, self.completion.wait())
                        .await
                        .map(Some)
                }
                None => tokio::time::timeout(self.timeouts.idle, self.wait_for_songs())
                    .await
                    .map(|()| None),
            };

            // siempre se limpia antes de volver a esperar
            self.completion.clear();

            match waited {
                Err(_) => {
                    info!(
                        "⌛ Sin actividad en guild {}, retirando la sesión",
                        self.guild_id
                    );
                    self.retire().await;
                    break;
                }
                Ok(Some(Completion::Finished)) => {
                    if let Some(song) = &song {
                        info!("✅ Terminó {} en guild {}", song.track().title(), self.guild_id);
                    }
                }
                Ok(Some(Completion::Failed(reason))) => {
                    warn!("❌ Falló la reproducción en guild {}: {}", self.guild_id, reason);
                    // no repetir una canción que falló
                    self.current.lock().take();
                }
                Ok(None) => debug!("Llegaron canciones a la cola de {}", self.guild_id),
            }
        }

        info!("⏹️ Loop de reproducción terminado en guild {}", self.guild_id);
    }

    /// Espera canciones en la cola; vuelve antes si la sesión se retira
    async fn wait_for_songs(&self) {
        tokio::select! {
            () = self.queue.wait_for_non_empty() => {}
            () = self.wait_released() => {}
        }
    }

    /// Lanza la reproducción sin esperarla; un fallo cuenta como fin fallido
    fn dispatch_playback(&self, song: Option<Song>, token: CompletionToken) {
        let Some(backend) = self.backend() else {
            return;
        };
        let guild_id = self.guild_id;

        tokio::spawn(async move {
            if let Err(e) = backend.play_track(song.as_ref(), token.clone()).await {
                error!("❌ Error al reproducir en guild {}: {:?}", guild_id, e);
                token.complete(Completion::Failed(e.to_string()));
            }
        });
    }

    fn dispatch_render(&self, song: Option<Song>, generation: u64) {
        let window = Arc::clone(&self.window);
        let guild_id = self.guild_id;

        tokio::spawn(async move {
            if let Err(e) = window.render(song.as_ref(), generation).await {
                warn!("No se pudo actualizar la ventana de {}: {:?}", guild_id, e);
            }
        });
    }

    /// Libera voz y ventana una sola vez; quien llegue tarde espera a
    /// que termine la primera llamada
    async fn retire(&self) {
        if self.retiring.swap(true, Ordering::SeqCst) {
            self.wait_released().await;
            return;
        }

        if let Some(backend) = self.backend() {
            if let Err(e) = backend.become_stale().await {
                error!("Error al liberar la voz de {}: {:?}", self.guild_id, e);
            }
        }
        if let Err(e) = self.window.stale().await {
            warn!("Error al cerrar la ventana de {}: {:?}", self.guild_id, e);
        }

        self.released.store(true, Ordering::SeqCst);
        self.released_notify.notify_waiters();
        debug!("Sesión de guild {} liberada", self.guild_id);
    }
}
