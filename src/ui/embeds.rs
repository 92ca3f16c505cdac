use serenity::{
    all::Timestamp,
    builder::{CreateEmbed, CreateEmbedFooter},
};
use std::time::Duration;

use crate::{
    audio::{effects::Effect, track::TrackRef},
    coordinator::{CommandError, Notice, QueueListing, Reply},
};

/// Standard palette for every embed.
pub mod colors {
    use serenity::all::Colour;

    pub const SUCCESS_GREEN: Colour = Colour::from_rgb(67, 181, 129);
    pub const ERROR_RED: Colour = Colour::from_rgb(220, 53, 69);
    pub const WARNING_ORANGE: Colour = Colour::from_rgb(255, 193, 7);
    pub const INFO_BLUE: Colour = Colour::from_rgb(52, 144, 220);
    pub const MUSIC_PURPLE: Colour = Colour::from_rgb(138, 43, 226);
    pub const NEUTRAL_GRAY: Colour = Colour::from_rgb(108, 117, 125);
}

const STANDARD_FOOTER: &str = "🎵 Music Coordinator";

/// Queued tracks shown by `/list` before the rest is summarized.
const MAX_LISTED: usize = 20;

/// Slash commands and their help line, in display order.
pub const COMMAND_HELP: [(&str, &str); 9] = [
    ("join", "Join your voice channel"),
    ("leave", "Leave the voice channel and forget the queue"),
    ("play <query>", "Play a URL or search result, or queue it"),
    ("list", "Show the current track and the queue"),
    ("skip", "Skip to the next track in the queue"),
    ("loop [times]", "Loop the current track; no value or -1 toggles"),
    ("volume <1-150>", "Set the playback volume"),
    ("effect <name>", "Apply an audio effect"),
    ("help", "Show this message"),
];

pub fn reply_embed(reply: &Reply) -> CreateEmbed {
    let embed = match reply {
        Reply::NowPlaying(track) => return now_playing_embed(track),
        Reply::Queued { track, .. } => {
            let mut embed = CreateEmbed::default()
                .title("✅ Added to the queue")
                .color(colors::SUCCESS_GREEN);
            if let Some(thumbnail) = track.thumbnail_url() {
                embed = embed.thumbnail(thumbnail);
            }
            embed
        }
        Reply::Queue(_) => CreateEmbed::default()
            .title("📋 Queue")
            .color(colors::INFO_BLUE),
        Reply::Joined { .. } => CreateEmbed::default()
            .title("🔊 Connected")
            .color(colors::SUCCESS_GREEN),
        Reply::Left => CreateEmbed::default()
            .title("👋 Disconnected")
            .color(colors::NEUTRAL_GRAY),
        Reply::Skipped { .. } => CreateEmbed::default()
            .title("⏭️ Skipped")
            .color(colors::MUSIC_PURPLE),
        Reply::Looping { .. } => CreateEmbed::default()
            .title("🔂 Looping")
            .color(colors::MUSIC_PURPLE),
        Reply::Unlooped(_) => CreateEmbed::default()
            .title("➡️ Loop disabled")
            .color(colors::MUSIC_PURPLE),
        Reply::VolumeSet(_) => CreateEmbed::default()
            .title("🔊 Volume")
            .color(colors::INFO_BLUE),
        Reply::EffectApplied(_) => CreateEmbed::default()
            .title("🎛️ Effect")
            .color(colors::MUSIC_PURPLE),
    };

    embed
        .description(reply_description(reply))
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

pub fn notice_embed(notice: &Notice) -> CreateEmbed {
    let embed = match notice {
        Notice::NowPlaying(track) => return now_playing_embed(track),
        Notice::QueueCompleted => CreateEmbed::default()
            .title("📭 Queue finished")
            .color(colors::NEUTRAL_GRAY),
        Notice::IdleDisconnectScheduled(_) => CreateEmbed::default()
            .title("⏳ Auto-disconnect")
            .color(colors::WARNING_ORANGE),
        Notice::IdleDisconnectCancelled => CreateEmbed::default()
            .title("🎶 Staying")
            .color(colors::SUCCESS_GREEN),
        Notice::IdleDisconnected => CreateEmbed::default()
            .title("👋 Disconnected")
            .color(colors::NEUTRAL_GRAY),
        Notice::Error(_) => CreateEmbed::default()
            .title("❌ Error")
            .color(colors::ERROR_RED),
    };

    embed
        .description(notice_description(notice))
        .timestamp(Timestamp::now())
}

pub fn error_embed(error: &CommandError) -> CreateEmbed {
    let (title, color) = if error.is_internal() {
        ("❌ Something went wrong", colors::ERROR_RED)
    } else {
        ("⚠️ Can't do that", colors::WARNING_ORANGE)
    };

    CreateEmbed::default()
        .title(title)
        .description(error.to_string())
        .color(color)
}

pub fn help_embed() -> CreateEmbed {
    let commands = COMMAND_HELP
        .iter()
        .map(|(usage, summary)| format!("• `/{}` - {}", usage, summary))
        .collect::<Vec<_>>()
        .join("\n");

    CreateEmbed::default()
        .title("🎵 Commands")
        .color(colors::INFO_BLUE)
        .description(commands)
        .field("🎛️ Effects", Effect::NAMES.join(", "), false)
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

fn now_playing_embed(track: &TrackRef) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("🎵 Now playing")
        .description(track.markdown())
        .color(colors::SUCCESS_GREEN);

    if let Some(author) = &track.author {
        embed = embed.field("🎤 Artist", author, true);
    }
    if let Some(duration) = track.duration {
        embed = embed.field("⏱️ Duration", format_duration(duration), true);
    }
    if let Some(thumbnail) = track.thumbnail_url() {
        embed = embed.thumbnail(thumbnail);
    }

    embed
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

pub fn reply_description(reply: &Reply) -> String {
    match reply {
        Reply::Joined { voice_channel } => format!("Joined <#{}>.", voice_channel),
        Reply::Left => "Left the voice channel.".to_string(),
        Reply::NowPlaying(track) => format!("Now playing: {}", track.markdown()),
        Reply::Queued { track, position } => {
            format!("{} is #{} in the queue.", track.markdown(), position)
        }
        Reply::Queue(listing) => queue_description(listing),
        Reply::Skipped { skipped, next } => {
            let mut text = match skipped {
                Some(track) => format!("Skipped {}.", track.markdown()),
                None => "Skipped.".to_string(),
            };
            match next {
                Some(track) => text.push_str(&format!("\nNow playing: {}", track.markdown())),
                None => text.push_str("\nThe queue is empty."),
            }
            text
        }
        Reply::Looping {
            track,
            times: Some(times),
        } => format!(
            "Looping {} {} more {}.",
            track.markdown(),
            times,
            if *times == 1 { "time" } else { "times" }
        ),
        Reply::Looping { track, times: None } => {
            format!("Looping {} until told otherwise.", track.markdown())
        }
        Reply::Unlooped(track) => format!("Stopped looping {}.", track.markdown()),
        Reply::VolumeSet(volume) => format!("Volume set to {}%.", volume),
        Reply::EffectApplied(Effect::Reset) => "Effects cleared.".to_string(),
        Reply::EffectApplied(effect) => format!("Applied the **{}** effect.", effect),
    }
}

pub fn notice_description(notice: &Notice) -> String {
    match notice {
        Notice::NowPlaying(track) => format!("Now playing: {}", track.markdown()),
        Notice::QueueCompleted => "The queue is finished.".to_string(),
        Notice::IdleDisconnectScheduled(delay) => format!(
            "Nothing left to play. I'll leave the voice channel in {} unless something new starts.",
            humantime::format_duration(*delay)
        ),
        Notice::IdleDisconnectCancelled => "Music is back, I'm staying.".to_string(),
        Notice::IdleDisconnected => "Invite me again sometime, sugar.".to_string(),
        Notice::Error(message) => message.clone(),
    }
}

/// `/list` body: the playing track, then `#2`, `#3`, ... for the queue.
pub fn queue_description(listing: &QueueListing) -> String {
    let mut text = format!("**Now playing:** {}", listing.now_playing.markdown());

    if listing.upcoming.is_empty() {
        text.push_str("\n\nThe queue is empty.");
        return text;
    }

    text.push('\n');
    for (index, track) in listing.upcoming.iter().take(MAX_LISTED).enumerate() {
        text.push_str(&format!("\n`#{}` {}", index + 2, track.markdown()));
    }

    let hidden = listing.upcoming.len().saturating_sub(MAX_LISTED);
    if hidden > 0 {
        text.push_str(&format!("\n...and {} more", hidden));
    }

    text
}

fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}
