use anyhow::Result;
use serenity::{
    builder::{
        CreateInteractionResponse, CreateInteractionResponseMessage, EditInteractionResponse,
    },
    model::{
        application::CommandInteraction,
        id::{ChannelId, GuildId, UserId},
    },
    prelude::Context,
};
use tracing::info;

use crate::{
    bot::CodaBot,
    playback::{
        queueable::{AudioStream, Queueable, Song, SongListing},
        GateRefusal, MusicService, PositionControls, SkipMode,
    },
};

/// Maneja comandos slash
pub async fn handle_command(
    ctx: &Context,
    command: CommandInteraction,
    bot: &CodaBot,
) -> Result<()> {
    let guild_id = command
        .guild_id
        .ok_or_else(|| anyhow::anyhow!("Comando usado fuera de un servidor"))?;

    info!(
        "📝 Comando /{} usado por {} en guild {}",
        command.data.name, command.user.name, guild_id
    );

    let service = bot.service(ctx).await?;

    match command.data.name.as_str() {
        "play" => handle_play(ctx, command, guild_id, &service).await?,
        "skip" => handle_skip(ctx, command, guild_id, &service).await?,
        "skip-to" => handle_skip_to(ctx, command, guild_id, &service).await?,
        "unskip" => handle_unskip(ctx, command, guild_id, &service).await?,
        "replay" => handle_replay(ctx, command, guild_id, &service).await?,
        "pause" => handle_pause(ctx, command, guild_id, &service).await?,
        "resume" => handle_resume(ctx, command, guild_id, &service).await?,
        "volume" => handle_volume(ctx, command, guild_id, &service).await?,
        "loop" => handle_loop(ctx, command, guild_id, &service).await?,
        "stop" => handle_stop(ctx, command, guild_id, &service).await?,
        _ => {
            respond(ctx, &command, "❌ Comando no reconocido", true).await?;
        }
    }

    Ok(())
}

// Handlers específicos para cada comando

async fn handle_play(
    ctx: &Context,
    command: CommandInteraction,
    guild_id: GuildId,
    service: &MusicService,
) -> Result<()> {
    let query = option_str(&command, "query")
        .ok_or_else(|| anyhow::anyhow!("Query no proporcionado"))?
        .to_string();
    let as_stream = option_bool(&command, "stream").unwrap_or(false);

    // Defer: la resolución puede tardar
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
        )
        .await?;

    let user_channel = user_voice_channel(ctx, guild_id, command.user.id);
    if let Err(refusal) = service.can_request_playback(guild_id, user_channel).await {
        command
            .edit_response(
                &ctx.http,
                EditInteractionResponse::new().content(format!("🚫 {}", refusal)),
            )
            .await?;
        return Ok(());
    }
    let Some(voice_channel) = user_channel else {
        command
            .edit_response(
                &ctx.http,
                EditInteractionResponse::new()
                    .content(format!("🚫 {}", GateRefusal::NotInVoice)),
            )
            .await?;
        return Ok(());
    };

    let queueable = if as_stream {
        Queueable::Stream(AudioStream::new(query.as_str()))
    } else {
        Queueable::Song(Song::new(query.as_str(), query.as_str()))
    };
    let listing = SongListing::new(queueable, command.user.id);

    let accepted = service
        .receive_listing(guild_id, voice_channel, command.channel_id, listing)
        .await?;

    let content = if accepted {
        format!("🎵 Pedido agregado: **{}**", query)
    } else {
        format!("🚫 {}", GateRefusal::QueueFull)
    };
    command
        .edit_response(&ctx.http, EditInteractionResponse::new().content(content))
        .await?;

    Ok(())
}

async fn handle_skip(
    ctx: &Context,
    command: CommandInteraction,
    guild_id: GuildId,
    service: &MusicService,
) -> Result<()> {
    let Some(session) = gate_managed(ctx, &command, guild_id, service).await? else {
        return Ok(());
    };
    let mode = option_scope(&command);
    let controls = PositionControls {
        by: option_usize(&command, "by"),
        to: None,
    };

    session.lock().await.skip(mode, controls).await;

    respond(ctx, &command, "⏭️ Saltado", false).await
}

async fn handle_skip_to(
    ctx: &Context,
    command: CommandInteraction,
    guild_id: GuildId,
    service: &MusicService,
) -> Result<()> {
    let Some(session) = gate_managed(ctx, &command, guild_id, service).await? else {
        return Ok(());
    };
    let mode = option_scope(&command);
    let controls = PositionControls {
        by: None,
        to: option_usize(&command, "to"),
    };

    session.lock().await.skip(mode, controls).await;

    respond(ctx, &command, "⏭️ Saltando a la posición pedida", false).await
}

async fn handle_unskip(
    ctx: &Context,
    command: CommandInteraction,
    guild_id: GuildId,
    service: &MusicService,
) -> Result<()> {
    let Some(session) = gate_managed(ctx, &command, guild_id, service).await? else {
        return Ok(());
    };
    let mode = option_scope(&command);
    let controls = PositionControls {
        by: option_usize(&command, "by"),
        to: None,
    };

    session.lock().await.unskip(mode, controls).await;

    respond(ctx, &command, "⏮️ Volviendo atrás", false).await
}

async fn handle_replay(
    ctx: &Context,
    command: CommandInteraction,
    guild_id: GuildId,
    service: &MusicService,
) -> Result<()> {
    let Some(session) = gate_managed(ctx, &command, guild_id, service).await? else {
        return Ok(());
    };
    let mode = option_scope(&command);

    session.lock().await.replay(mode).await;

    respond(ctx, &command, "🔄 Reproduciendo desde el inicio", false).await
}

async fn handle_pause(
    ctx: &Context,
    command: CommandInteraction,
    guild_id: GuildId,
    service: &MusicService,
) -> Result<()> {
    let Some(session) = gate_managed(ctx, &command, guild_id, service).await? else {
        return Ok(());
    };

    session.lock().await.set_paused(true).await?;

    respond(ctx, &command, "⏸️ Reproducción pausada", false).await
}

async fn handle_resume(
    ctx: &Context,
    command: CommandInteraction,
    guild_id: GuildId,
    service: &MusicService,
) -> Result<()> {
    let Some(session) = gate_managed(ctx, &command, guild_id, service).await? else {
        return Ok(());
    };

    session.lock().await.set_paused(false).await?;

    respond(ctx, &command, "▶️ Reproducción reanudada", false).await
}

async fn handle_volume(
    ctx: &Context,
    command: CommandInteraction,
    guild_id: GuildId,
    service: &MusicService,
) -> Result<()> {
    let Some(session) = gate_managed(ctx, &command, guild_id, service).await? else {
        return Ok(());
    };
    let level = option_usize(&command, "level").unwrap_or(100);
    let normalized = (level as f32 / 100.0).clamp(0.0, 2.0);

    session.lock().await.set_volume(normalized).await?;

    respond(
        ctx,
        &command,
        &format!("🔊 Volumen ajustado a {}%", level),
        false,
    )
    .await
}

async fn handle_loop(
    ctx: &Context,
    command: CommandInteraction,
    guild_id: GuildId,
    service: &MusicService,
) -> Result<()> {
    use crate::playback::queueable::LoopScope;

    let Some(session) = gate_managed(ctx, &command, guild_id, service).await? else {
        return Ok(());
    };
    let mode = option_str(&command, "mode").unwrap_or("off").to_string();

    let changed = {
        let mut session = session.lock().await;
        match mode.as_str() {
            "track" => session.set_loop(LoopScope::Playable, true),
            "collection" => session.set_loop(LoopScope::Collection, true),
            _ => {
                session.set_loop(LoopScope::Playable, false)
                    && session.set_loop(LoopScope::Collection, false)
            }
        }
    };

    let message = if !changed {
        "❌ No hay nada reproduciéndose actualmente"
    } else {
        match mode.as_str() {
            "track" => "🔂 Repetir pista activado",
            "collection" => "🔁 Repetir colección activado",
            _ => "➡️ Repetición desactivada",
        }
    };
    respond(ctx, &command, message, !changed).await
}

async fn handle_stop(
    ctx: &Context,
    command: CommandInteraction,
    guild_id: GuildId,
    service: &MusicService,
) -> Result<()> {
    if gate_managed(ctx, &command, guild_id, service).await?.is_none() {
        return Ok(());
    }

    service.destroy_session(guild_id).await;

    respond(ctx, &command, "⏹️ Reproducción detenida y sesión cerrada", false).await
}

// Funciones auxiliares

/// Aplica el gate de manejo y responde el rechazo; `None` corta el
/// handler
async fn gate_managed(
    ctx: &Context,
    command: &CommandInteraction,
    guild_id: GuildId,
    service: &MusicService,
) -> Result<Option<std::sync::Arc<tokio::sync::Mutex<crate::playback::session::MusicSession>>>> {
    let user_channel = user_voice_channel(ctx, guild_id, command.user.id);
    if let Err(refusal) = service.can_manage_playback(guild_id, user_channel).await {
        respond(ctx, command, &format!("🚫 {}", refusal), true).await?;
        return Ok(None);
    }
    Ok(service.session(guild_id))
}

async fn respond(
    ctx: &Context,
    command: &CommandInteraction,
    content: &str,
    ephemeral: bool,
) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .content(content)
                    .ephemeral(ephemeral),
            ),
        )
        .await?;
    Ok(())
}

fn option_str<'a>(command: &'a CommandInteraction, name: &str) -> Option<&'a str> {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_str())
}

fn option_bool(command: &CommandInteraction, name: &str) -> Option<bool> {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_bool())
}

fn option_usize(command: &CommandInteraction, name: &str) -> Option<usize> {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_i64())
        .and_then(|v| usize::try_from(v).ok())
}

fn option_scope(command: &CommandInteraction) -> SkipMode {
    match option_str(command, "scope") {
        Some("collection") => SkipMode::Collection,
        _ => SkipMode::Track,
    }
}

fn user_voice_channel(ctx: &Context, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
    let guild = guild_id.to_guild_cached(&ctx.cache)?;

    guild
        .voice_states
        .get(&user_id)
        .and_then(|voice_state| voice_state.channel_id)
}
