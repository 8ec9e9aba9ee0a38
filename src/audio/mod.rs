//! # Audio Module
//!
//! Núcleo de reproducción de Tempo: una [`session::PlayerSession`] por
//! guild, que coordina la cola, el backend de voz y la ventana
//! "reproduciendo ahora".
//!
//! ## Arquitectura
//!
//! ### [`session`] - Player Session
//! - Loop de fondo único por guild
//! - Timeouts de inactividad y de duración de track
//! - Estado obsoleto permanente; el [`registry`] crea sesiones nuevas
//!
//! ### [`queue`] - Cola de canciones
//! - FIFO compartida entre comandos y el loop
//! - Shuffle, borrado por índice, vaciado
//!
//! ### [`backend`] - Audio Backend
//! - Máquina de estados `Stopped → Playing ⇄ Paused → Waiting → Stale`
//! - Dos drivers: [`local`] (songbird + yt-dlp) y [`remote`] (Lavalink)
//!
//! ### [`window`] - Ventana "reproduciendo ahora"
//! - Un mensaje por sesión, editado en el lugar
//! - Botones resueltos por nombre ([`window::WindowAction`])
//!
//! ## Finalización de tracks
//!
//! El driver local avisa el fin por callback de songbird; el nodo remoto
//! por su websocket, enrutado por el registro. Ambos terminan en la
//! misma [`signal::CompletionSignal`] de la sesión.

pub mod backend;
pub mod lavalink;
pub mod local;
pub mod queue;
pub mod registry;
pub mod remote;
pub mod session;
pub mod signal;
pub mod track;
pub mod window;

#[cfg(test)]
mod testing;
