use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::audio::session::SessionTimeouts;

/// Driver de voz que usan las sesiones nuevas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// songbird + yt-dlp en este proceso
    Local,
    /// Nodo Lavalink externo
    Lavalink,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub application_id: u64,
    pub guild_id: Option<u64>, // Para comandos de desarrollo

    // Audio
    pub backend: BackendKind,
    pub default_volume: u8, // Porcentaje
    pub max_playlist_size: usize,

    // Timeouts de sesión (segundos)
    pub idle_timeout_secs: u64,
    pub grace_period_secs: u64,
    pub live_track_timeout_secs: u64,

    // Nodo Lavalink
    pub lavalink_host: String,
    pub lavalink_port: u16,
    pub lavalink_password: String,
    pub lavalink_secure: bool,
}

impl Config {
    /// Carga `.env`, luego `tempo.toml` (opcional) y por último las
    /// variables de entorno (`DISCORD_TOKEN`, `IDLE_TIMEOUT_SECS`, ...)
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config: Self = ::config::Config::builder()
            .add_source(::config::File::with_name("tempo").required(false))
            .add_source(::config::Environment::default().try_parsing(true))
            .build()
            .context("No se pudo leer la configuración")?
            .try_deserialize()
            .context("Configuración con formato inválido")?;

        config.validate()?;

        Ok(config)
    }

    /// Revisa rangos y valores obligatorios
    pub fn validate(&self) -> Result<()> {
        if self.discord_token.trim().is_empty() {
            anyhow::bail!("DISCORD_TOKEN es obligatorio");
        }

        if self.default_volume > 100 {
            anyhow::bail!(
                "El volumen por defecto debe estar entre 0 y 100, se recibió: {}",
                self.default_volume
            );
        }

        if self.idle_timeout_secs == 0
            || self.grace_period_secs == 0
            || self.live_track_timeout_secs == 0
        {
            anyhow::bail!("Los timeouts de sesión deben ser mayores que 0");
        }

        if self.max_playlist_size == 0 {
            anyhow::bail!("El tamaño máximo de playlist debe ser mayor que 0");
        }

        if self.backend == BackendKind::Lavalink && self.lavalink_host.trim().is_empty() {
            anyhow::bail!("LAVALINK_HOST es obligatorio con el backend lavalink");
        }

        Ok(())
    }

    pub fn session_timeouts(&self) -> SessionTimeouts {
        SessionTimeouts {
            idle: Duration::from_secs(self.idle_timeout_secs),
            grace: Duration::from_secs(self.grace_period_secs),
            unknown_length: Duration::from_secs(self.live_track_timeout_secs),
        }
    }

    /// Resumen para el log de arranque, sin credenciales
    pub fn summary(&self) -> String {
        let backend = match self.backend {
            BackendKind::Local => "local (songbird + yt-dlp)".to_string(),
            BackendKind::Lavalink => format!(
                "lavalink ({}:{}{})",
                self.lavalink_host,
                self.lavalink_port,
                if self.lavalink_secure { ", TLS" } else { "" }
            ),
        };

        format!(
            "Config Summary:\n  \
            Discord: App ID {} (Guild: {})\n  \
            Audio: backend {}, {}% vol, playlists de hasta {}\n  \
            Timeouts: inactividad {}s, gracia {}s, en vivo {}s",
            self.application_id,
            self.guild_id.map_or("global".to_string(), |id| id.to_string()),
            backend,
            self.default_volume,
            self.max_playlist_size,
            self.idle_timeout_secs,
            self.grace_period_secs,
            self.live_track_timeout_secs,
        )
    }
}

/// Valores por defecto cuando no hay archivo ni variable de entorno
impl Default for Config {
    fn default() -> Self {
        Self {
            // Discord (sin defaults reales)
            discord_token: String::new(),
            application_id: 0,
            guild_id: None,

            backend: BackendKind::Local,
            default_volume: 50,
            max_playlist_size: 100,

            idle_timeout_secs: 60,
            grace_period_secs: 5,
            live_track_timeout_secs: 3600, // 1 hora

            lavalink_host: "localhost".to_string(),
            lavalink_port: 2333,
            lavalink_password: "youshallnotpass".to_string(),
            lavalink_secure: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn valid() -> Config {
        Config {
            discord_token: "token-secreto".to_string(),
            ..Config::default()
        }
    }

    #[test]
    fn defaults_are_valid_once_a_token_is_set() {
        assert!(Config::default().validate().is_err());
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_values() {
        let loud = Config {
            default_volume: 101,
            ..valid()
        };
        assert!(loud.validate().is_err());

        let no_idle = Config {
            idle_timeout_secs: 0,
            ..valid()
        };
        assert!(no_idle.validate().is_err());

        let no_playlists = Config {
            max_playlist_size: 0,
            ..valid()
        };
        assert!(no_playlists.validate().is_err());

        let hostless = Config {
            backend: BackendKind::Lavalink,
            lavalink_host: " ".to_string(),
            ..valid()
        };
        assert!(hostless.validate().is_err());
    }

    #[test]
    fn session_timeouts_come_from_seconds() {
        let config = Config {
            idle_timeout_secs: 30,
            grace_period_secs: 2,
            live_track_timeout_secs: 900,
            ..valid()
        };

        assert_eq!(
            config.session_timeouts(),
            SessionTimeouts {
                idle: Duration::from_secs(30),
                grace: Duration::from_secs(2),
                unknown_length: Duration::from_secs(900),
            }
        );
    }

    #[test]
    fn summary_never_leaks_credentials() {
        let config = Config {
            backend: BackendKind::Lavalink,
            lavalink_password: "hunter2".to_string(),
            ..valid()
        };
        let summary = config.summary();

        assert!(summary.contains("lavalink (localhost:2333)"));
        assert!(!summary.contains("token-secreto"));
        assert!(!summary.contains("hunter2"));
    }

    #[test]
    fn backend_names_deserialize_in_lowercase() {
        let kind: BackendKind = serde_json::from_str("\"lavalink\"").unwrap();
        assert_eq!(kind, BackendKind::Lavalink);
    }
}
