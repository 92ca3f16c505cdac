use anyhow::Result;
use serenity::{
    builder::{CreateCommand, CreateCommandOption},
    model::{application::CommandOptionType, id::GuildId},
    prelude::Context,
};

use crate::audio::effects::Effect;

/// Registers the commands globally.
pub async fn register_global_commands(ctx: &Context) -> Result<()> {
    for command in all_commands() {
        ctx.http.create_global_command(&command).await?;
    }

    Ok(())
}

/// Registers the commands in a single guild (development).
pub async fn register_guild_commands(ctx: &Context, guild_id: GuildId) -> Result<()> {
    guild_id.set_commands(&ctx.http, all_commands()).await?;

    Ok(())
}

fn all_commands() -> Vec<CreateCommand> {
    vec![
        join_command(),
        leave_command(),
        play_command(),
        list_command(),
        skip_command(),
        loop_command(),
        volume_command(),
        effect_command(),
        help_command(),
    ]
}

// Connection

fn join_command() -> CreateCommand {
    CreateCommand::new("join").description("Join your voice channel")
}

fn leave_command() -> CreateCommand {
    CreateCommand::new("leave").description("Leave the voice channel")
}

// Playback

fn play_command() -> CreateCommand {
    CreateCommand::new("play")
        .description("Play a track, or add it to the queue")
        .add_option(
            CreateCommandOption::new(CommandOptionType::String, "query", "URL or search terms")
                .required(true),
        )
}

fn list_command() -> CreateCommand {
    CreateCommand::new("list").description("Show the current track and the queue")
}

fn skip_command() -> CreateCommand {
    CreateCommand::new("skip").description("Skip to the next track")
}

fn loop_command() -> CreateCommand {
    CreateCommand::new("loop")
        .description("Loop the current track")
        .add_option(CreateCommandOption::new(
            CommandOptionType::Integer,
            "times",
            "How many more times; leave empty or -1 to toggle",
        ))
}

// Audio

fn volume_command() -> CreateCommand {
    CreateCommand::new("volume")
        .description("Set the playback volume")
        .add_option(
            CreateCommandOption::new(CommandOptionType::Integer, "level", "Volume from 1 to 150")
                .required(true),
        )
}

fn effect_command() -> CreateCommand {
    let mut option = CreateCommandOption::new(CommandOptionType::String, "name", "Effect to apply")
        .required(true);
    for name in Effect::NAMES {
        option = option.add_string_choice(name, name);
    }

    CreateCommand::new("effect")
        .description("Apply an audio effect")
        .add_option(option)
}

fn help_command() -> CreateCommand {
    CreateCommand::new("help").description("List the available commands")
}
