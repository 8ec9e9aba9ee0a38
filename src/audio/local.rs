use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::model::id::GuildId;
use songbird::{
    input::{Input, YoutubeDl},
    tracks::TrackHandle,
    Call, Event, EventContext, EventHandler as VoiceEventHandler, Songbird, TrackEvent,
};
use std::{
    sync::{
        atomic::{AtomicU8, Ordering},
        Arc,
    },
    time::Duration,
};
use tracing::{debug, error, info};

use crate::{
    audio::{
        backend::{DriverKind, VoiceDriver},
        signal::{Completion, CompletionToken},
        track::Playable,
    },
    error::PlayerError,
};

/// Driver local: yt-dlp + songbird sobre la llamada de voz de la guild
pub struct LocalDriver {
    guild_id: GuildId,
    manager: Arc<Songbird>,
    call: Arc<tokio::sync::Mutex<Call>>,
    http: reqwest::Client,
    track: Mutex<Option<TrackHandle>>,
    volume: AtomicU8,
}

impl LocalDriver {
    pub fn new(
        guild_id: GuildId,
        manager: Arc<Songbird>,
        call: Arc<tokio::sync::Mutex<Call>>,
        http: reqwest::Client,
        volume: u8,
    ) -> Self {
        Self {
            guild_id,
            manager,
            call,
            http,
            track: Mutex::new(None),
            volume: AtomicU8::new(volume),
        }
    }

    fn current_track(&self) -> Option<TrackHandle> {
        self.track.lock().clone()
    }

    fn gain(percent: u8) -> f32 {
        f32::from(percent.min(100)) / 100.0
    }
}

#[async_trait]
impl VoiceDriver for LocalDriver {
    fn kind(&self) -> DriverKind {
        DriverKind::Local
    }

    async fn play(
        &self,
        source: &Playable,
        on_finished: Option<CompletionToken>,
    ) -> Result<(), PlayerError> {
        let Playable::Local { url } = source else {
            return Err(PlayerError::IncompatibleTrack);
        };

        let input = Input::from(YoutubeDl::new(self.http.clone(), url.clone()));

        let handle = {
            let mut call = self.call.lock().await;
            call.stop();
            call.play_input(input)
        };
        handle.set_volume(Self::gain(self.volume.load(Ordering::Relaxed)))?;

        if let Some(token) = on_finished {
            handle.add_event(
                Event::Track(TrackEvent::End),
                TrackEndNotifier {
                    guild_id: self.guild_id,
                    token: token.clone(),
                },
            )?;
            handle.add_event(
                Event::Track(TrackEvent::Error),
                TrackErrorNotifier {
                    guild_id: self.guild_id,
                    token,
                },
            )?;
        }

        *self.track.lock() = Some(handle);
        info!("🎵 Reproduciendo localmente en guild {}: {}", self.guild_id, url);
        Ok(())
    }

    async fn pause(&self) -> Result<(), PlayerError> {
        if let Some(track) = self.current_track() {
            track.pause()?;
            info!("⏸️ Reproducción pausada en guild {}", self.guild_id);
        }
        Ok(())
    }

    async fn resume(&self) -> Result<(), PlayerError> {
        if let Some(track) = self.current_track() {
            track.play()?;
            info!("▶️ Reproducción reanudada en guild {}", self.guild_id);
        }
        Ok(())
    }

    async fn stop(&self) -> Result<(), PlayerError> {
        let taken = self.track.lock().take();
        if let Some(track) = taken {
            // el track puede haber terminado ya; no es un error
            if let Err(e) = track.stop() {
                debug!("Stop sobre un track terminado: {:?}", e);
            }
        }
        Ok(())
    }

    async fn seek(&self, position: Duration) -> Result<(), PlayerError> {
        debug!(
            "Seek a {} ignorado: el stream local no lo garantiza",
            humantime::format_duration(position)
        );
        Ok(())
    }

    async fn set_volume(&self, percent: u8) -> Result<(), PlayerError> {
        self.volume.store(percent, Ordering::Relaxed);
        if let Some(track) = self.current_track() {
            track.set_volume(Self::gain(percent))?;
        }
        info!("🔊 Volumen ajustado a {}% en guild {}", percent, self.guild_id);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), PlayerError> {
        self.track.lock().take();
        self.manager.remove(self.guild_id).await?;
        info!("👋 Desconectado del canal de voz en guild {}", self.guild_id);
        Ok(())
    }
}

/// Avisa a la sesión cuando el track termina (o es detenido)
struct TrackEndNotifier {
    guild_id: GuildId,
    token: CompletionToken,
}

#[async_trait]
impl VoiceEventHandler for TrackEndNotifier {
    async fn act(&self, _ctx: &EventContext<'_>) -> Option<Event> {
        if self.token.complete(Completion::Finished) {
            debug!(
                "🎵 Track terminado en guild {} (generación {})",
                self.guild_id,
                self.token.generation()
            );
        }
        None
    }
}

/// Convierte un error de reproducción en un fin fallido del track
struct TrackErrorNotifier {
    guild_id: GuildId,
    token: CompletionToken,
}

#[async_trait]
impl VoiceEventHandler for TrackErrorNotifier {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        let mut reason = "error de reproducción".to_string();
        if let EventContext::Track(tracks) = ctx {
            for (state, _handle) in *tracks {
                error!(
                    "❌ Error en track para guild {}: {:?}",
                    self.guild_id, state.playing
                );
                reason = format!("{:?}", state.playing);
            }
        }

        self.token.complete(Completion::Failed(reason));
        None
    }
}
