//! Traducción de comandos a operaciones del [`MusicManager`].
//!
//! Cada comando llama exactamente a una operación del manager y devuelve un
//! [`Reply`] que `handlers` convierte en respuesta de Discord.

use serenity::model::{
    application::{CommandDataOption, CommandDataOptionValue},
    id::{ChannelId, GuildId, UserId},
};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{error, info};

use crate::{
    audio::{queue::QueueError, LoopMode, MusicManager, PlayError, QueueSnapshot, Track},
    ui::buttons::button_ids,
};

pub const SERVER_ONLY: &str = "This command can only be used in a server!";
pub const NOT_IN_VOICE: &str = "❌ You need to be in a voice channel to play music!";
const NOTHING_PLAYING: &str = "❌ No music is currently playing!";
const NO_QUEUE: &str = "❌ No music queue found!";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MusicCommand {
    Play { query: String },
    Skip,
    Stop,
    Pause,
    Resume,
    /// Botón de pausa: pausa o reanuda según el estado
    TogglePause,
    Queue,
    Volume { level: i64 },
    Shuffle,
    Leave,
    NowPlaying,
    /// Posición 1-based tal como la escribe el usuario
    Remove { position: i64 },
    Loop { mode: LoopMode },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("comando desconocido: {0}")]
    Unknown(String),
    #[error("falta la opción `{0}`")]
    MissingOption(&'static str),
    #[error("valor inválido para `{option}`: {value}")]
    InvalidOption { option: &'static str, value: String },
}

/// Opciones de un comando slash ya separadas por tipo
#[derive(Debug, Default, Clone)]
pub struct CommandArgs {
    strings: HashMap<String, String>,
    integers: HashMap<String, i64>,
}

impl CommandArgs {
    pub fn from_options(options: &[CommandDataOption]) -> Self {
        let mut args = Self::default();

        for option in options {
            match &option.value {
                CommandDataOptionValue::String(value) => {
                    args.strings.insert(option.name.clone(), value.clone());
                }
                CommandDataOptionValue::Integer(value) => {
                    args.integers.insert(option.name.clone(), *value);
                }
                _ => {}
            }
        }

        args
    }

    fn string(&self, name: &'static str) -> Result<&str, ParseError> {
        self.strings
            .get(name)
            .map(String::as_str)
            .ok_or(ParseError::MissingOption(name))
    }

    fn integer(&self, name: &'static str) -> Result<i64, ParseError> {
        self.integers
            .get(name)
            .copied()
            .ok_or(ParseError::MissingOption(name))
    }
}

#[cfg(test)]
impl CommandArgs {
    pub fn with_string(mut self, name: &str, value: &str) -> Self {
        self.strings.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_integer(mut self, name: &str, value: i64) -> Self {
        self.integers.insert(name.to_string(), value);
        self
    }
}

impl MusicCommand {
    pub fn parse(name: &str, args: &CommandArgs) -> Result<Self, ParseError> {
        let command = match name {
            "play" => Self::Play {
                query: args.string("query")?.to_string(),
            },
            "skip" => Self::Skip,
            "stop" => Self::Stop,
            "pause" => Self::Pause,
            "resume" => Self::Resume,
            "queue" => Self::Queue,
            "volume" => Self::Volume {
                level: args.integer("level")?,
            },
            "shuffle" => Self::Shuffle,
            "leave" => Self::Leave,
            "nowplaying" => Self::NowPlaying,
            "remove" => Self::Remove {
                position: args.integer("position")?,
            },
            "loop" => Self::Loop {
                mode: parse_loop_mode(args.string("mode")?)?,
            },
            other => return Err(ParseError::Unknown(other.to_string())),
        };

        Ok(command)
    }

    pub fn from_button(custom_id: &str) -> Option<Self> {
        match custom_id {
            button_ids::PAUSE => Some(Self::TogglePause),
            button_ids::SKIP => Some(Self::Skip),
            button_ids::STOP => Some(Self::Stop),
            _ => None,
        }
    }

    /// `play` necesita tiempo (búsqueda + conexión) y se difiere
    pub fn is_slow(&self) -> bool {
        matches!(self, Self::Play { .. })
    }
}

fn parse_loop_mode(value: &str) -> Result<LoopMode, ParseError> {
    match value {
        "off" => Ok(LoopMode::None),
        "track" => Ok(LoopMode::Track),
        "queue" => Ok(LoopMode::Queue),
        other => Err(ParseError::InvalidOption {
            option: "mode",
            value: other.to_string(),
        }),
    }
}

/// Contexto de quien ejecuta el comando
#[derive(Debug, Clone, Copy)]
pub struct Invocation {
    pub guild_id: GuildId,
    pub text_channel_id: ChannelId,
    pub voice_channel_id: Option<ChannelId>,
    pub user_id: UserId,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Text { content: String, ephemeral: bool },
    TrackAdded { track: Track, position: usize },
    Queue(QueueSnapshot),
    NowPlaying(QueueSnapshot),
}

impl Reply {
    pub fn public(content: impl Into<String>) -> Self {
        Self::Text {
            content: content.into(),
            ephemeral: false,
        }
    }

    pub fn ephemeral(content: impl Into<String>) -> Self {
        Self::Text {
            content: content.into(),
            ephemeral: true,
        }
    }

    fn outcome(ok: bool, success: &str, failure: &str) -> Self {
        if ok {
            Self::public(success)
        } else {
            Self::ephemeral(failure)
        }
    }
}

pub async fn execute(manager: &MusicManager, command: MusicCommand, invocation: Invocation) -> Reply {
    let guild_id = invocation.guild_id;

    let needs_queue = !matches!(command, MusicCommand::Play { .. });
    if needs_queue && manager.get_queue(guild_id).is_none() {
        return Reply::ephemeral(match command {
            MusicCommand::Queue | MusicCommand::Shuffle | MusicCommand::Remove { .. } => NO_QUEUE,
            MusicCommand::Leave => "❌ I'm not currently in a voice channel!",
            _ => NOTHING_PLAYING,
        });
    }

    match command {
        MusicCommand::Play { query } => play(manager, &query, invocation).await,
        MusicCommand::Skip => Reply::outcome(
            manager.skip(guild_id).await,
            "⏭️ Skipped the current track!",
            "❌ Nothing to skip!",
        ),
        MusicCommand::Stop => Reply::outcome(
            manager.stop(guild_id).await,
            "⏹️ Stopped playing music and cleared the queue!",
            "❌ Nothing to stop!",
        ),
        MusicCommand::Pause => Reply::outcome(
            manager.pause(guild_id).await,
            "⏸️ Paused the current track!",
            "❌ Nothing to pause!",
        ),
        MusicCommand::Resume => Reply::outcome(
            manager.resume(guild_id).await,
            "▶️ Resumed the current track!",
            "❌ Nothing to resume!",
        ),
        MusicCommand::TogglePause => {
            let playing = manager
                .get_queue_info(guild_id)
                .await
                .is_some_and(|info| info.is_playing);

            if playing {
                Reply::outcome(
                    manager.pause(guild_id).await,
                    "⏸️ Paused the current track!",
                    "❌ Nothing to pause!",
                )
            } else {
                Reply::outcome(
                    manager.resume(guild_id).await,
                    "▶️ Resumed the current track!",
                    "❌ Nothing to resume!",
                )
            }
        }
        MusicCommand::Queue => match manager.get_queue_info(guild_id).await {
            Some(snapshot) => Reply::Queue(snapshot),
            None => Reply::ephemeral(NO_QUEUE),
        },
        MusicCommand::Volume { level } => match manager.set_volume(guild_id, level).await {
            Some(applied) => Reply::public(format!("🔊 Volume set to {}%!", applied)),
            None => Reply::ephemeral("❌ Failed to set volume!"),
        },
        MusicCommand::Shuffle => Reply::outcome(
            manager.shuffle(guild_id).await,
            "🔀 Queue has been shuffled!",
            "❌ Not enough tracks in queue to shuffle!",
        ),
        MusicCommand::Leave => Reply::outcome(
            manager.destroy_queue(guild_id).await,
            "👋 Left the voice channel and cleared the queue!",
            "❌ I'm not currently in a voice channel!",
        ),
        MusicCommand::NowPlaying => match manager.get_queue_info(guild_id).await {
            Some(snapshot) if snapshot.current.is_some() => Reply::NowPlaying(snapshot),
            _ => Reply::ephemeral(NOTHING_PLAYING),
        },
        MusicCommand::Remove { position } => {
            let removed = match usize::try_from(position) {
                Ok(position) if position >= 1 => manager.remove_track(guild_id, position - 1).await,
                _ => None,
            };

            match removed {
                Some(track) => {
                    Reply::public(format!("🗑️ Removed **{}** from the queue!", track.title()))
                }
                None => Reply::ephemeral("❌ Invalid queue position!"),
            }
        }
        MusicCommand::Loop { mode } => {
            if !manager.set_loop_mode(guild_id, mode).await {
                return Reply::ephemeral(NOTHING_PLAYING);
            }

            Reply::public(match mode {
                LoopMode::None => "➡️ Repeat disabled!",
                LoopMode::Track => "🔂 Repeating the current track!",
                LoopMode::Queue => "🔁 Repeating the whole queue!",
            })
        }
    }
}

async fn play(manager: &MusicManager, query: &str, invocation: Invocation) -> Reply {
    let Some(voice_channel_id) = invocation.voice_channel_id else {
        return Reply::ephemeral(NOT_IN_VOICE);
    };

    let result = manager
        .play(
            invocation.guild_id,
            invocation.text_channel_id,
            voice_channel_id,
            query,
            invocation.user_id,
        )
        .await;

    match result {
        Ok(outcome) => {
            if outcome.started {
                info!(
                    "▶️ {} empieza de inmediato (guild {})",
                    outcome.track.title(),
                    invocation.guild_id
                );
            } else {
                info!(
                    "🎵 {} agregado en posición {} (guild {})",
                    outcome.track.title(),
                    outcome.position,
                    invocation.guild_id
                );
            }
            Reply::TrackAdded {
                track: outcome.track,
                position: outcome.position,
            }
        }
        Err(e) => {
            error!("❌ Error en /play para guild {}: {}", invocation.guild_id, e);
            Reply::public(play_error_message(&e))
        }
    }
}

pub fn play_error_message(error: &PlayError) -> String {
    match error {
        PlayError::NotFound => "❌ No tracks found for your search query.".to_string(),
        PlayError::MissingLocator => {
            "❌ Could not get a playable link for that track.".to_string()
        }
        PlayError::TimedOut => "❌ The search took too long. Please try again.".to_string(),
        PlayError::Queue(QueueError::Full { max }) => {
            format!("❌ The queue is full ({} tracks max)!", max)
        }
        PlayError::Voice(_) => "❌ I couldn't join your voice channel!".to_string(),
        PlayError::Cancelled => {
            "⏹️ Playback was stopped before the track could be added.".to_string()
        }
        PlayError::Resolve(_) | PlayError::Queue(QueueError::Destroyed) => {
            "❌ An error occurred while trying to play the track.".to_string()
        }
    }
}
