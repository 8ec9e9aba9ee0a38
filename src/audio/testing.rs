//! Dobles de prueba compartidos por los tests del módulo de audio.

use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::model::id::{MessageId, UserId};
use std::{
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use crate::{
    audio::{
        backend::{DriverKind, VoiceDriver},
        signal::{Completion, CompletionToken},
        track::{Playable, Song, Track},
        window::{WindowSurface, WindowView},
    },
    error::PlayerError,
};

/// Canción local de prueba; el driver falso lee la duración de la URL
pub fn song(title: &str, seconds: u64) -> Song {
    Song::new(
        Track::new(
            title,
            Some(seconds),
            Playable::Local {
                url: format!("fake://{}/{}", seconds, title),
            },
        ),
        UserId::new(7),
    )
}

#[derive(Debug, Clone, PartialEq)]
pub enum DriverCall {
    Play(String),
    Pause,
    Resume,
    Stop,
    Seek(Duration),
    Volume(u8),
    Disconnect,
}

/// Driver que registra las llamadas y simula el fin de los tracks.
///
/// Con `auto_finish` cada track termina solo al cumplirse su duración.
/// `stop` completa el callback pendiente igual que songbird dispara
/// `TrackEvent::End` al detener un track.
pub struct FakeDriver {
    kind: DriverKind,
    calls: Mutex<Vec<DriverCall>>,
    token: Mutex<Option<CompletionToken>>,
    auto_finish: AtomicBool,
    fail_play: AtomicBool,
    disconnect_delay: Mutex<Duration>,
}

impl FakeDriver {
    pub fn new(kind: DriverKind) -> Arc<Self> {
        Arc::new(Self {
            kind,
            calls: Mutex::new(Vec::new()),
            token: Mutex::new(None),
            auto_finish: AtomicBool::new(false),
            fail_play: AtomicBool::new(false),
            disconnect_delay: Mutex::new(Duration::ZERO),
        })
    }

    pub fn auto_finishing(kind: DriverKind) -> Arc<Self> {
        let driver = Self::new(kind);
        driver.auto_finish.store(true, Ordering::SeqCst);
        driver
    }

    pub fn fail_next_plays(&self, fail: bool) {
        self.fail_play.store(fail, Ordering::SeqCst);
    }

    /// `disconnect` tarda `delay` y sólo entonces queda registrado
    pub fn slow_disconnect(&self, delay: Duration) {
        *self.disconnect_delay.lock() = delay;
    }

    pub fn disconnected(&self) -> bool {
        self.calls.lock().contains(&DriverCall::Disconnect)
    }

    pub fn calls(&self) -> Vec<DriverCall> {
        self.calls.lock().clone()
    }

    pub fn played(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                DriverCall::Play(title) => Some(title.clone()),
                _ => None,
            })
            .collect()
    }

    /// Completa el callback pendiente, como haría el fin natural del audio
    pub fn finish(&self, outcome: Completion) -> bool {
        match self.token.lock().take() {
            Some(token) => token.complete(outcome),
            None => false,
        }
    }

    fn record(&self, call: DriverCall) {
        self.calls.lock().push(call);
    }
}

fn parse_fake_url(url: &str) -> (u64, String) {
    let rest = url.trim_start_matches("fake://");
    let (seconds, title) = rest.split_once('/').unwrap_or(("0", rest));
    (seconds.parse().unwrap_or(0), title.to_string())
}

#[async_trait]
impl VoiceDriver for FakeDriver {
    fn kind(&self) -> DriverKind {
        self.kind
    }

    async fn play(
        &self,
        source: &Playable,
        on_finished: Option<CompletionToken>,
    ) -> Result<(), PlayerError> {
        let Playable::Local { url } = source else {
            return Err(PlayerError::IncompatibleTrack);
        };
        let (seconds, title) = parse_fake_url(url);
        self.record(DriverCall::Play(title));

        if self.fail_play.load(Ordering::SeqCst) {
            return Err(PlayerError::Voice("fallo simulado".to_string()));
        }

        if let Some(token) = on_finished {
            if self.auto_finish.load(Ordering::SeqCst) {
                let token = token.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_secs(seconds)).await;
                    token.complete(Completion::Finished);
                });
            }
            *self.token.lock() = Some(token);
        }
        Ok(())
    }

    async fn pause(&self) -> Result<(), PlayerError> {
        self.record(DriverCall::Pause);
        Ok(())
    }

    async fn resume(&self) -> Result<(), PlayerError> {
        self.record(DriverCall::Resume);
        Ok(())
    }

    async fn stop(&self) -> Result<(), PlayerError> {
        self.record(DriverCall::Stop);
        self.finish(Completion::Finished);
        Ok(())
    }

    async fn seek(&self, position: Duration) -> Result<(), PlayerError> {
        self.record(DriverCall::Seek(position));
        Ok(())
    }

    async fn set_volume(&self, percent: u8) -> Result<(), PlayerError> {
        self.record(DriverCall::Volume(percent));
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), PlayerError> {
        let delay = *self.disconnect_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.record(DriverCall::Disconnect);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceCall {
    Send(String),
    Edit(u64, String),
    Delete(u64),
}

/// Superficie de ventana que registra lo que se envía
#[derive(Default)]
pub struct RecordingSurface {
    calls: Mutex<Vec<SurfaceCall>>,
    next_id: AtomicU64,
    failing: AtomicBool,
}

impl RecordingSurface {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<SurfaceCall> {
        self.calls.lock().clone()
    }

    /// Con `fail` activo, `send` y `edit` se registran pero fallan
    pub fn fail_updates(&self, fail: bool) {
        self.failing.store(fail, Ordering::SeqCst);
    }

    fn check(&self) -> anyhow::Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            anyhow::bail!("Missing Permissions");
        }
        Ok(())
    }
}

#[async_trait]
impl WindowSurface for RecordingSurface {
    async fn send(&self, view: WindowView) -> anyhow::Result<MessageId> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.calls
            .lock()
            .push(SurfaceCall::Send(view.title().to_string()));
        self.check()?;
        Ok(MessageId::new(id))
    }

    async fn edit(&self, message: MessageId, view: WindowView) -> anyhow::Result<()> {
        self.calls
            .lock()
            .push(SurfaceCall::Edit(message.get(), view.title().to_string()));
        self.check()
    }

    async fn delete(&self, message: MessageId) -> anyhow::Result<()> {
        self.calls.lock().push(SurfaceCall::Delete(message.get()));
        Ok(())
    }
}
