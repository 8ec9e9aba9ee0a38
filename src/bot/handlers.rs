use anyhow::Result;
use serenity::{
    builder::{
        CreateEmbed, CreateInteractionResponse, CreateInteractionResponseMessage,
        EditInteractionResponse,
    },
    model::{
        application::{CommandInteraction, ComponentInteraction},
        id::{ChannelId, GuildId, UserId},
    },
    prelude::Context,
};
use std::time::Duration;
use tracing::{info, warn};

use crate::{
    audio::{
        session::PlayerSession,
        track::Song,
        window::{WindowAction, WindowView},
    },
    bot::TempoBot,
    error::PlayerError,
    ui::embeds,
};

const NO_PLAYER: &str = "❌ No hay reproductor activo";

/// Maneja comandos slash
pub async fn handle_command(
    ctx: &Context,
    command: CommandInteraction,
    bot: &TempoBot,
) -> Result<()> {
    let guild_id = command
        .guild_id
        .ok_or_else(|| anyhow::anyhow!("Comando usado fuera de un servidor"))?;

    info!(
        "📝 Comando /{} usado por {} en guild {}",
        command.data.name, command.user.name, guild_id
    );

    if command.data.name == "play" {
        return handle_play(ctx, &command, bot, guild_id).await;
    }
    if command.data.name == "leave" {
        return handle_leave(ctx, &command, bot, guild_id).await;
    }

    let Some(session) = bot.registry().get(guild_id) else {
        return reply(ctx, &command, embeds::create_error_embed(NO_PLAYER), true).await;
    };

    let outcome = match command.data.name.as_str() {
        "pause" if !session.is_playing() => {
            Ok(embeds::create_error_embed("⚠️ No hay nada sonando"))
        }
        "pause" => session
            .pause()
            .await
            .map(|()| embeds::create_success_embed("⏸️ Pausado", "Reproducción en pausa")),
        "resume" => session
            .resume()
            .await
            .map(|()| embeds::create_success_embed("▶️ Reanudado", "La música sigue")),
        "skip" => session
            .skip()
            .await
            .map(|()| embeds::create_success_embed("⏭️ Saltado", "Pasando a la siguiente")),
        "stop" => session.stop().await.map(|()| {
            embeds::create_success_embed("⏹️ Detenido", "Cola vaciada y reproducción detenida")
        }),
        "queue" => Ok(queue_embed(&session)),
        "nowplaying" => Ok(embeds::create_window_embed(&WindowView::for_song(
            session.current().as_ref(),
        ))),
        "shuffle" => {
            session.shuffle();
            Ok(embeds::create_success_embed(
                "🔀 Cola mezclada",
                &format!("{} canciones en nuevo orden", session.queue().len()),
            ))
        }
        "loop" => Ok(loop_embed(session.toggle_loop())),
        "volume" => {
            let level = int_option(&command, "level").unwrap_or(-1);
            session.set_volume(level).await.map(|()| {
                embeds::create_success_embed("🔊 Volumen", &format!("Volumen al {}%", level))
            })
        }
        "seek" => {
            let seconds = int_option(&command, "seconds")
                .and_then(|s| u64::try_from(s).ok())
                .unwrap_or(0);
            session
                .seek(Duration::from_secs(seconds))
                .await
                .map(|()| {
                    embeds::create_success_embed(
                        "⏩ Posición",
                        &format!("Saltando a {}", humantime::format_duration(Duration::from_secs(seconds))),
                    )
                })
        }
        "remove" => remove_at_position(&session, int_option(&command, "position")).map(|song| {
            embeds::create_success_embed(
                "🗑️ Quitada",
                &format!("**{}** salió de la cola", song.track().title()),
            )
        }),
        other => {
            warn!("Comando desconocido: {}", other);
            Ok(embeds::create_error_embed("❌ Comando no reconocido"))
        }
    };

    match outcome {
        Ok(embed) => reply(ctx, &command, embed, false).await,
        Err(e) => {
            warn!("Comando /{} falló en guild {}: {}", command.data.name, guild_id, e);
            reply(ctx, &command, embeds::create_error_embed(&e.user_message()), true).await
        }
    }
}

/// Maneja los botones de la ventana de reproducción
pub async fn handle_component(
    ctx: &Context,
    component: ComponentInteraction,
    bot: &TempoBot,
) -> Result<()> {
    let guild_id = component
        .guild_id
        .ok_or_else(|| anyhow::anyhow!("Componente usado fuera de un servidor"))?;

    info!(
        "🔘 Botón {} presionado por {} en guild {}",
        component.data.custom_id, component.user.name, guild_id
    );

    let Some(action) = WindowAction::from_custom_id(&component.data.custom_id) else {
        return ephemeral(ctx, &component, "❌ Acción no reconocida").await;
    };
    let Some(session) = bot.registry().get(guild_id) else {
        return ephemeral(ctx, &component, NO_PLAYER).await;
    };

    let outcome = match action {
        WindowAction::PlayPause => session.toggle_pause().await.map(|()| {
            if session.is_paused() {
                "⏸️ Pausado".to_string()
            } else {
                "▶️ Reanudado".to_string()
            }
        }),
        WindowAction::Skip => session.skip().await.map(|()| "⏭️ Saltado".to_string()),
        WindowAction::Stop => session.stop().await.map(|()| "⏹️ Detenido".to_string()),
        WindowAction::Shuffle => {
            session.shuffle();
            Ok("🔀 Cola mezclada".to_string())
        }
        WindowAction::Loop => Ok(if session.toggle_loop() {
            "🔂 Repetición activada".to_string()
        } else {
            "➡️ Repetición desactivada".to_string()
        }),
    };

    match outcome {
        Ok(message) => ephemeral(ctx, &component, &message).await,
        Err(e) => {
            warn!("Botón {:?} falló en guild {}: {}", action, guild_id, e);
            ephemeral(ctx, &component, &e.user_message()).await
        }
    }
}

async fn handle_play(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &TempoBot,
    guild_id: GuildId,
) -> Result<()> {
    let query = command
        .data
        .options
        .iter()
        .find(|opt| opt.name == "query")
        .and_then(|opt| opt.value.as_str())
        .ok_or_else(|| anyhow::anyhow!("Query no proporcionado"))?
        .to_string();

    // Resolver puede tardar varios segundos
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
        )
        .await?;

    let embed = match play(ctx, command, bot, guild_id, &query).await {
        Ok(embed) => embed,
        Err(e) => {
            warn!("/play '{}' falló en guild {}: {:?}", query, guild_id, e);
            let message = match e.downcast_ref::<PlayerError>() {
                Some(player_error) => player_error.user_message(),
                None => format!("❌ {}", e),
            };
            embeds::create_error_embed(&message)
        }
    };

    command
        .edit_response(&ctx.http, EditInteractionResponse::new().embed(embed))
        .await?;

    Ok(())
}

async fn play(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &TempoBot,
    guild_id: GuildId,
    query: &str,
) -> Result<CreateEmbed> {
    let voice_channel = get_user_voice_channel(ctx, guild_id, command.user.id)?;

    let songs = bot.source().resolve(query, command.user.id).await?;
    let session = bot
        .ensure_session(ctx, guild_id, command.channel_id, voice_channel)
        .await?;

    let added = session.play(songs.clone())?;
    info!("➕ {} canciones encoladas en guild {}", added, guild_id);

    Ok(embeds::create_songs_added_embed(&songs, added))
}

async fn handle_leave(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &TempoBot,
    guild_id: GuildId,
) -> Result<()> {
    let embed = if bot.retire_session(guild_id).await {
        embeds::create_success_embed("👋 Hasta luego", "Desconectado del canal de voz")
    } else {
        embeds::create_error_embed(NO_PLAYER)
    };

    reply(ctx, command, embed, false).await
}

fn queue_embed(session: &PlayerSession) -> CreateEmbed {
    let queue = session.queue();
    embeds::create_queue_embed(
        session.current().as_ref(),
        &queue.snapshot(),
        queue.total_duration(),
        session.is_looping(),
    )
}

fn loop_embed(enabled: bool) -> CreateEmbed {
    if enabled {
        embeds::create_success_embed("🔂 Repetición", "La canción actual se repetirá")
    } else {
        embeds::create_success_embed("➡️ Repetición", "Repetición desactivada")
    }
}

/// `position` cuenta desde 1, como se muestra en `/queue`
fn remove_at_position(
    session: &PlayerSession,
    position: Option<i64>,
) -> Result<Song, PlayerError> {
    let len = session.queue().len();
    let index = position
        .and_then(|p| usize::try_from(p).ok())
        .and_then(|p| p.checked_sub(1))
        .ok_or(PlayerError::IndexOutOfRange { index: 0, len })?;

    session.remove(index)
}

fn int_option(command: &CommandInteraction, name: &str) -> Option<i64> {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_i64())
}

async fn reply(
    ctx: &Context,
    command: &CommandInteraction,
    embed: CreateEmbed,
    ephemeral: bool,
) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .embed(embed)
                    .ephemeral(ephemeral),
            ),
        )
        .await?;
    Ok(())
}

async fn ephemeral(ctx: &Context, component: &ComponentInteraction, content: &str) -> Result<()> {
    component
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .content(content)
                    .ephemeral(true),
            ),
        )
        .await?;
    Ok(())
}

fn get_user_voice_channel(ctx: &Context, guild_id: GuildId, user_id: UserId) -> Result<ChannelId> {
    let guild = guild_id
        .to_guild_cached(&ctx.cache)
        .ok_or_else(|| anyhow::anyhow!("Guild no encontrada en caché"))?;

    let channel_id = guild
        .voice_states
        .get(&user_id)
        .and_then(|voice_state| voice_state.channel_id)
        .ok_or_else(|| anyhow::anyhow!("Debes estar en un canal de voz"))?;

    Ok(channel_id)
}
