use anyhow::Result;
use serenity::{
    builder::{CreateInteractionResponse, CreateInteractionResponseMessage, EditInteractionResponse},
    model::{
        application::{CommandInteraction, ComponentInteraction},
        id::{ChannelId, GuildId, UserId},
    },
    prelude::Context,
};
use tracing::{info, warn};

use super::executor::{self, CommandArgs, Invocation, MusicCommand, Reply, SERVER_ONLY};
use crate::{
    audio::MusicManager,
    ui::{buttons, embeds},
};

/// Maneja comandos slash
pub async fn handle_command(
    ctx: &Context,
    command: CommandInteraction,
    manager: &MusicManager,
) -> Result<()> {
    let Some(guild_id) = command.guild_id else {
        command
            .create_response(&ctx.http, message_response(Reply::ephemeral(SERVER_ONLY)))
            .await?;
        return Ok(());
    };

    info!(
        "📝 Comando /{} usado por {} en guild {}",
        command.data.name, command.user.name, guild_id
    );

    let args = CommandArgs::from_options(&command.data.options);
    let music_command = match MusicCommand::parse(&command.data.name, &args) {
        Ok(music_command) => music_command,
        Err(e) => {
            warn!("⚠️ Comando /{} inválido: {}", command.data.name, e);
            command
                .create_response(
                    &ctx.http,
                    message_response(Reply::ephemeral("Unknown music command.")),
                )
                .await?;
            return Ok(());
        }
    };

    let invocation = Invocation {
        guild_id,
        text_channel_id: command.channel_id,
        voice_channel_id: user_voice_channel(ctx, guild_id, command.user.id),
        user_id: command.user.id,
    };

    // Defer la respuesta ya que puede tomar tiempo
    if music_command.is_slow() && invocation.voice_channel_id.is_some() {
        command.defer(&ctx.http).await?;

        let reply = executor::execute(manager, music_command, invocation).await;
        command.edit_response(&ctx.http, edit_response(reply)).await?;
    } else {
        let reply = executor::execute(manager, music_command, invocation).await;
        command
            .create_response(&ctx.http, message_response(reply))
            .await?;
    }

    Ok(())
}

/// Maneja los botones del mensaje de `/nowplaying`
pub async fn handle_component(
    ctx: &Context,
    component: ComponentInteraction,
    manager: &MusicManager,
) -> Result<()> {
    let Some(guild_id) = component.guild_id else {
        return Ok(());
    };

    info!(
        "🔘 Botón {} presionado por {} en guild {}",
        component.data.custom_id, component.user.name, guild_id
    );

    let Some(music_command) = MusicCommand::from_button(&component.data.custom_id) else {
        component
            .create_response(
                &ctx.http,
                message_response(Reply::ephemeral("❌ Unknown action.")),
            )
            .await?;
        return Ok(());
    };

    let invocation = Invocation {
        guild_id,
        text_channel_id: component.channel_id,
        voice_channel_id: user_voice_channel(ctx, guild_id, component.user.id),
        user_id: component.user.id,
    };

    let reply = match executor::execute(manager, music_command, invocation).await {
        // Los botones no deben ensuciar el canal
        Reply::Text { content, .. } => Reply::ephemeral(content),
        other => other,
    };

    component
        .create_response(&ctx.http, message_response(reply))
        .await?;

    Ok(())
}

fn message_response(reply: Reply) -> CreateInteractionResponse {
    let message = CreateInteractionResponseMessage::new();

    let message = match reply {
        Reply::Text { content, ephemeral } => message.content(content).ephemeral(ephemeral),
        Reply::TrackAdded { track, position } => {
            message.embed(embeds::create_track_added_embed(&track, position))
        }
        Reply::Queue(snapshot) => message.embed(embeds::create_queue_embed(&snapshot)),
        Reply::NowPlaying(snapshot) => match embeds::create_now_playing_status_embed(&snapshot) {
            Some(embed) => message
                .embed(embed)
                .components(buttons::create_player_buttons(snapshot.is_playing)),
            None => message
                .embed(embeds::create_error_embed("❌ No music is currently playing!"))
                .ephemeral(true),
        },
    };

    CreateInteractionResponse::Message(message)
}

/// Las respuestas diferidas no pueden volverse efímeras
fn edit_response(reply: Reply) -> EditInteractionResponse {
    let edit = EditInteractionResponse::new();

    match reply {
        Reply::Text { content, .. } => edit.content(content),
        Reply::TrackAdded { track, position } => {
            edit.embed(embeds::create_track_added_embed(&track, position))
        }
        Reply::Queue(snapshot) => edit.embed(embeds::create_queue_embed(&snapshot)),
        Reply::NowPlaying(snapshot) => match embeds::create_now_playing_status_embed(&snapshot) {
            Some(embed) => edit
                .embed(embed)
                .components(buttons::create_player_buttons(snapshot.is_playing)),
            None => edit.content("❌ No music is currently playing!"),
        },
    }
}

/// Canal de voz del usuario según la caché de la guild
fn user_voice_channel(ctx: &Context, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
    let guild = guild_id.to_guild_cached(&ctx.cache)?;

    guild
        .voice_states
        .get(&user_id)
        .and_then(|voice_state| voice_state.channel_id)
}
