use serenity::{
    all::Timestamp,
    builder::{CreateEmbed, CreateEmbedFooter},
};

use crate::audio::{QueueSnapshot, Track};

/// Paleta de colores estandarizada para el bot
pub mod colors {
    use serenity::all::Colour;

    pub const SUCCESS_GREEN: Colour = Colour::new(0x00FF00);
    pub const ERROR_RED: Colour = Colour::from_rgb(220, 53, 69);
    pub const WARNING_ORANGE: Colour = Colour::from_rgb(255, 193, 7);
}

/// Footer estandarizado para todos los embeds
const STANDARD_FOOTER: &str = "🎵 Roommates Music";

/// Canciones de la cola que se listan en `/queue`
pub const QUEUE_PAGE_SIZE: usize = 10;

fn mention(track: &Track) -> String {
    format!("<@{}>", track.requested_by())
}

fn plural(count: usize) -> &'static str {
    if count == 1 {
        ""
    } else {
        "s"
    }
}

/// Aviso automático al empezar una canción
pub fn create_now_playing_embed(track: &Track, remaining: usize) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("🎵 Now Playing")
        .description(format!("**{}**", track.title()))
        .field("Duration", track.formatted_duration(), true)
        .field("Requested By", mention(track), true)
        .field("Queue Position", format!("{} track(s) remaining", remaining), true)
        .color(colors::SUCCESS_GREEN)
        .timestamp(Timestamp::now());

    if let Some(thumbnail) = track.thumbnail() {
        embed = embed.thumbnail(thumbnail);
    }

    embed
}

/// Confirmación de `/play`
pub fn create_track_added_embed(track: &Track, position: usize) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("🎵 Track Added to Queue")
        .description(format!("**{}**", track.title()))
        .url(track.url())
        .field("Duration", track.formatted_duration(), true)
        .field("Position in Queue", position.to_string(), true)
        .field("Requested By", mention(track), true)
        .color(colors::SUCCESS_GREEN)
        .timestamp(Timestamp::now());

    if let Some(thumbnail) = track.thumbnail() {
        embed = embed.thumbnail(thumbnail);
    }

    embed
}

pub fn status_label(snapshot: &QueueSnapshot) -> &'static str {
    if snapshot.is_playing {
        "Playing"
    } else if snapshot.is_paused {
        "Paused"
    } else {
        "Idle"
    }
}

/// Lista numerada de las primeras canciones pendientes
pub fn queue_list(tracks: &[Track]) -> String {
    tracks
        .iter()
        .take(QUEUE_PAGE_SIZE)
        .enumerate()
        .map(|(i, track)| {
            format!(
                "{}. **{}** - {}\n   Requested by: {}",
                i + 1,
                track.title(),
                track.formatted_duration(),
                mention(track)
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Pie "And N more tracks..." cuando la lista se corta
pub fn overflow_footer(total: usize) -> Option<String> {
    (total > QUEUE_PAGE_SIZE).then(|| format!("And {} more tracks...", total - QUEUE_PAGE_SIZE))
}

pub fn create_queue_embed(snapshot: &QueueSnapshot) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("🎵 Music Queue")
        .color(colors::SUCCESS_GREEN)
        .timestamp(Timestamp::now());

    if let Some(current) = &snapshot.current {
        embed = embed.field(
            "🎵 Now Playing",
            format!("**{}**\nRequested by: {}", current.title(), mention(current)),
            false,
        );
    }

    let total = snapshot.tracks.len();
    if total > 0 {
        embed = embed.field(
            format!("📝 Up Next ({} track{})", total, plural(total)),
            queue_list(&snapshot.tracks),
            false,
        );
    } else {
        embed = embed.field("📝 Up Next", "Queue is empty", false);
    }

    embed = embed
        .field("🔊 Volume", format!("{}%", snapshot.volume), true)
        .field("▶️ Status", status_label(snapshot), true);

    match overflow_footer(total) {
        Some(footer) => embed.footer(CreateEmbedFooter::new(footer)),
        None => embed.footer(CreateEmbedFooter::new(STANDARD_FOOTER)),
    }
}

/// Respuesta de `/nowplaying`; `None` si no hay canción actual
pub fn create_now_playing_status_embed(snapshot: &QueueSnapshot) -> Option<CreateEmbed> {
    let track = snapshot.current.as_ref()?;
    let remaining = snapshot.tracks.len();

    let status = if snapshot.is_playing {
        "▶️ Playing"
    } else if snapshot.is_paused {
        "⏸️ Paused"
    } else {
        "⏹️ Stopped"
    };

    let mut embed = CreateEmbed::default()
        .title("🎵 Now Playing")
        .description(format!("**{}**", track.title()))
        .field("Duration", track.formatted_duration(), true)
        .field("Requested By", mention(track), true)
        .field("Volume", format!("{}%", snapshot.volume), true)
        .field("Status", status, true)
        .field(
            "Queue",
            format!("{} track{} remaining", remaining, plural(remaining)),
            true,
        )
        .color(colors::SUCCESS_GREEN)
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
        .timestamp(Timestamp::now());

    if let Some(thumbnail) = track.thumbnail() {
        embed = embed.thumbnail(thumbnail);
    }

    Some(embed)
}

pub fn create_error_embed(description: &str) -> CreateEmbed {
    CreateEmbed::default()
        .description(description)
        .color(colors::ERROR_RED)
}

pub fn create_warning_embed(title: &str, description: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title(title)
        .description(description)
        .color(colors::WARNING_ORANGE)
        .timestamp(Timestamp::now())
}
