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
use tracing::{info, warn};

use crate::{
    bot::MusicBot,
    coordinator::{Caller, CommandError, LoopRequest, Reply},
    ui::embeds,
};

/// Handles a slash command.
pub async fn handle_command(ctx: &Context, command: CommandInteraction, bot: &MusicBot) -> Result<()> {
    let Some(guild_id) = command.guild_id else {
        return respond_ephemeral(ctx, &command, "Commands only work inside a server.").await;
    };

    info!(
        "📝 /{} used by {} in guild {}",
        command.data.name, command.user.name, guild_id
    );

    if command.data.name == "help" {
        return command
            .create_response(
                &ctx.http,
                CreateInteractionResponse::Message(
                    CreateInteractionResponseMessage::new()
                        .embed(embeds::help_embed())
                        .ephemeral(true),
                ),
            )
            .await
            .map_err(Into::into);
    }

    // Searches and voice joins can exceed the 3 second response window
    command.defer(&ctx.http).await?;

    let caller = Caller {
        guild_id,
        voice_channel: user_voice_channel(ctx, guild_id, command.user.id),
        text_channel: command.channel_id,
    };
    let coordinator = &bot.coordinator;

    let outcome = match command.data.name.as_str() {
        "join" => coordinator.join(caller).await,
        "leave" => coordinator.leave(guild_id).await,
        "play" => {
            let query = string_option(&command, "query").unwrap_or_default();
            coordinator.play(caller, query).await
        }
        "list" => coordinator.list(guild_id).await,
        "skip" => coordinator.skip(caller).await,
        "loop" => match LoopRequest::from_arg(integer_option(&command, "times")) {
            Ok(request) => coordinator.loop_track(caller, request).await,
            Err(e) => Err(e),
        },
        "volume" => match integer_option(&command, "level") {
            Some(level) => coordinator.volume(guild_id, level).await,
            None => Err(CommandError::VolumeOutOfRange(0)),
        },
        "effect" => {
            let name = string_option(&command, "name").unwrap_or_default();
            coordinator.effect(caller, name).await
        }
        other => {
            warn!("Unknown command /{}", other);
            command
                .edit_response(&ctx.http, EditInteractionResponse::new().content("❌ Unknown command"))
                .await?;
            return Ok(());
        }
    };

    command
        .edit_response(&ctx.http, EditInteractionResponse::new().embed(render(&outcome)))
        .await?;

    Ok(())
}

fn render(outcome: &Result<Reply, CommandError>) -> serenity::builder::CreateEmbed {
    match outcome {
        Ok(reply) => embeds::reply_embed(reply),
        Err(e) => {
            if e.is_internal() {
                warn!("Command failed: {}", e);
            }
            embeds::error_embed(e)
        }
    }
}

async fn respond_ephemeral(ctx: &Context, command: &CommandInteraction, content: &str) -> Result<()> {
    command
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

fn string_option<'a>(command: &'a CommandInteraction, name: &str) -> Option<&'a str> {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_str())
}

fn integer_option(command: &CommandInteraction, name: &str) -> Option<i64> {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_i64())
}

/// Voice channel the user sits in, from the gateway cache.
fn user_voice_channel(ctx: &Context, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
    let guild = guild_id.to_guild_cached(&ctx.cache)?;

    guild
        .voice_states
        .get(&user_id)
        .and_then(|voice_state| voice_state.channel_id)
}
