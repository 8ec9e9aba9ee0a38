use serenity::{
    all::Timestamp,
    builder::{CreateEmbed, CreateEmbedFooter},
};
use std::time::Duration;

use crate::audio::{track::Song, window::WindowView};

/// Paleta de colores estandarizada para el bot
pub mod colors {
    use serenity::all::Colour;

    pub const SUCCESS_GREEN: Colour = Colour::from_rgb(67, 181, 129);
    pub const ERROR_RED: Colour = Colour::from_rgb(220, 53, 69);
    pub const INFO_BLUE: Colour = Colour::from_rgb(52, 144, 220);
    pub const MUSIC_PURPLE: Colour = Colour::from_rgb(138, 43, 226);
    pub const NEUTRAL_GRAY: Colour = Colour::from_rgb(108, 117, 125);
}

/// Footer estandarizado para todos los embeds
const STANDARD_FOOTER: &str = "🎵 Tempo";

/// Canciones visibles en `/queue`
const QUEUE_PAGE_SIZE: usize = 10;

/// Embed de la ventana "reproduciendo ahora"
pub fn create_window_embed(view: &WindowView) -> CreateEmbed {
    match view {
        WindowView::Empty => CreateEmbed::default()
            .title("💤 Cola vacía")
            .description(view.title())
            .color(colors::NEUTRAL_GRAY)
            .footer(CreateEmbedFooter::new("Usa /play para agregar música")),
        WindowView::NowPlaying {
            title,
            thumbnail,
            length,
        } => {
            let mut embed = CreateEmbed::default()
                .title("🎵 Reproduciendo Ahora")
                .description(format!("**{}**", title))
                .color(colors::MUSIC_PURPLE)
                .field("⏱️ Duración", length, true)
                .timestamp(Timestamp::now())
                .footer(CreateEmbedFooter::new(STANDARD_FOOTER));

            if let Some(thumbnail) = thumbnail {
                embed = embed.thumbnail(thumbnail);
            }
            embed
        }
    }
}

/// Confirmación de `/play`
pub fn create_songs_added_embed(songs: &[Song], queued: usize) -> CreateEmbed {
    match songs {
        [song] => {
            let track = song.track();
            let mut embed = CreateEmbed::default()
                .title("✅ Canción Agregada")
                .description(format!("**{}** se agregó a la cola", track.title()))
                .color(colors::SUCCESS_GREEN)
                .field("⏱️ Duración", track.length(), true)
                .field("👤 Solicitado por", format!("<@{}>", song.requested_by()), true)
                .footer(CreateEmbedFooter::new(STANDARD_FOOTER));

            if let Some(thumbnail) = track.thumbnail() {
                embed = embed.thumbnail(thumbnail);
            }
            embed
        }
        _ => {
            let total: Duration = songs.iter().filter_map(|s| s.track().duration()).sum();
            CreateEmbed::default()
                .title("📋 Playlist Agregada")
                .description(format!("Se agregaron **{} canciones** a la cola", queued))
                .color(colors::SUCCESS_GREEN)
                .field("⏱️ Duración total", format_total(total), true)
                .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
        }
    }
}

/// Vista de `/queue`: canción actual y las próximas
pub fn create_queue_embed(
    current: Option<&Song>,
    upcoming: &[Song],
    total: Duration,
    looping: bool,
) -> CreateEmbed {
    let now = match current {
        Some(song) => format!("🎵 **{}** `{}`", song.track().title(), song.track().length()),
        None => "Nada sonando".to_string(),
    };

    let mut list: String = upcoming
        .iter()
        .take(QUEUE_PAGE_SIZE)
        .enumerate()
        .map(|(i, song)| {
            format!(
                "`{}.` {} `{}` · <@{}> <t:{}:R>\n",
                i + 1,
                song.track().title(),
                song.track().length(),
                song.requested_by(),
                song.enqueued_at().timestamp()
            )
        })
        .collect();

    if upcoming.is_empty() {
        list = "La cola está vacía".to_string();
    } else if upcoming.len() > QUEUE_PAGE_SIZE {
        list.push_str(&format!("… y {} más", upcoming.len() - QUEUE_PAGE_SIZE));
    }

    CreateEmbed::default()
        .title("📋 Cola de Reproducción")
        .color(colors::INFO_BLUE)
        .field("Ahora", now, false)
        .field("Siguientes", list, false)
        .field("🎶 Canciones", upcoming.len().to_string(), true)
        .field("⏱️ Duración", format_total(total), true)
        .field("🔁 Repetir", if looping { "Sí" } else { "No" }, true)
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

pub fn create_success_embed(title: &str, description: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title(title)
        .description(description)
        .color(colors::SUCCESS_GREEN)
}

pub fn create_error_embed(description: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title("❌ Error")
        .description(description)
        .color(colors::ERROR_RED)
}

fn format_total(total: Duration) -> String {
    let secs = total.as_secs();
    let (hours, minutes, seconds) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}
