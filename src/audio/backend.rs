//! Contratos con los colaboradores externos de la cola.
//!
//! La cola nunca habla directamente con songbird, yt-dlp ni la API HTTP de
//! Discord: todo pasa por estos traits. Las implementaciones de producción
//! viven en [`crate::audio::voice`], [`crate::sources::youtube`] y
//! [`crate::bot::notifier`].

use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId};
use songbird::input::Input;
use std::{fmt, str::FromStr};
use thiserror::Error;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

use super::track::Track;

/// Señales de ciclo de vida que emiten la sesión de reproducción y el
/// transporte de voz. Conjunto cerrado: cualquier otra cosa se ignora.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleSignal {
    /// El elemento `playback_id` terminó (de forma natural o detenido)
    Ended { playback_id: u64 },
    /// El elemento `playback_id` falló durante la reproducción
    Errored { playback_id: u64, reason: String },
    /// El transporte perdió la conexión con el canal de voz
    Disconnected,
}

pub type SignalSender = UnboundedSender<(GuildId, LifecycleSignal)>;
pub type SignalReceiver = UnboundedReceiver<(GuildId, LifecycleSignal)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamQuality {
    Low,
    Medium,
    High,
}

impl StreamQuality {
    /// Selector de formato de yt-dlp para esta calidad
    pub fn format_selector(self) -> &'static str {
        match self {
            Self::Low => "worstaudio/worst",
            Self::Medium => "bestaudio[abr<=96]/bestaudio/best",
            Self::High => "bestaudio/best",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("calidad desconocida `{0}` (usa low, medium o high)")]
pub struct UnknownQuality(String);

impl FromStr for StreamQuality {
    type Err = UnknownQuality;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            _ => Err(UnknownQuality(value.to_string())),
        }
    }
}

/// Etiqueta del tipo de stream que devolvió la fuente.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    WebmOpus,
    OggOpus,
    Arbitrary,
}

impl StreamKind {
    pub fn detect(ext: Option<&str>, acodec: Option<&str>) -> Self {
        match (ext, acodec) {
            (Some("webm"), Some("opus")) => Self::WebmOpus,
            (Some("ogg") | Some("opus"), Some("opus")) => Self::OggOpus,
            _ => Self::Arbitrary,
        }
    }
}

pub struct AudioStream {
    pub input: Input,
    pub kind: StreamKind,
}

impl fmt::Debug for AudioStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioStream")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("no se pudo obtener el stream: {0}")]
    Unavailable(String),
    #[error("tiempo de espera agotado al obtener el stream")]
    TimedOut,
}

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("la sesión de reproducción rechazó el stream: {0}")]
    Rejected(String),
}

#[derive(Debug, Error)]
pub enum VoiceError {
    #[error("no se pudo unir al canal de voz: {0}")]
    Join(String),
}

/// Adquisición de streams de audio a partir de un localizador reproducible.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StreamSource: Send + Sync {
    async fn acquire(&self, url: &str, quality: StreamQuality) -> Result<AudioStream, StreamError>;
}

/// Sesión de reproducción local conectada a un transporte de voz.
///
/// `play` reemplaza lo que estuviera sonando. La implementación debe emitir
/// `Ended`/`Errored` con el mismo `playback_id` que recibió.
#[async_trait]
pub trait PlaybackSession: Send + Sync {
    async fn play(
        &mut self,
        stream: AudioStream,
        volume: f32,
        playback_id: u64,
    ) -> Result<(), PlaybackError>;

    fn stop(&mut self);

    fn pause(&mut self) -> bool;

    fn resume(&mut self) -> bool;

    fn set_volume(&mut self, volume: f32);
}

#[async_trait]
pub trait VoiceTransport: Send + Sync {
    async fn is_connected(&self) -> bool;

    /// Libera la conexión. Llamarlo más de una vez no tiene efecto.
    async fn leave(&mut self);
}

/// Resultado de unirse a un canal: el transporte y su única sesión.
pub struct VoiceLink {
    pub transport: Box<dyn VoiceTransport>,
    pub session: Box<dyn PlaybackSession>,
}

#[async_trait]
pub trait VoiceGateway: Send + Sync {
    /// Se une al canal y suscribe las señales de ciclo de vida a `signals`
    async fn join(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        signals: SignalSender,
    ) -> Result<VoiceLink, VoiceError>;
}

/// Avisos que la cola envía al canal de texto de la guild.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    NowPlaying { track: Track, remaining: usize },
    PlaybackFailed { title: Option<String> },
    GaveUp { failures: u32 },
}

/// Envío "fire-and-forget" de avisos a un canal de texto.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, channel_id: ChannelId, notice: Notice);
}
