use rand::seq::SliceRandom;
use serenity::model::id::{ChannelId, GuildId};
use std::{collections::VecDeque, sync::Arc};
use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use super::{
    backend::{
        Notice, Notifier, PlaybackError, PlaybackSession, StreamError, StreamSource, VoiceLink,
        VoiceTransport,
    },
    track::Track,
};
use crate::config::PlayerConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopMode {
    /// Sin repetición
    None,
    /// Repetir la canción actual
    Track,
    /// Repetir toda la cola
    Queue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Loading,
    Playing,
    Paused,
    Destroyed,
}

/// Motivo por el que se avanza la cola.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceCause {
    /// La canción actual terminó de forma natural
    Finished,
    /// El usuario saltó la canción actual
    Skipped,
    /// La canción actual falló y se descarta
    Failed,
    /// Se agregó una canción con la cola inactiva
    Enqueued,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("la cola está llena (máximo {max} canciones)")]
    Full { max: usize },
    #[error("la cola ya fue destruida")]
    Destroyed,
}

#[derive(Debug, Error)]
enum StartError {
    #[error(transparent)]
    Stream(#[from] StreamError),
    #[error(transparent)]
    Playback(#[from] PlaybackError),
}

/// Foto del estado de una cola para mostrarla al usuario.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueSnapshot {
    pub tracks: Vec<Track>,
    pub current: Option<Track>,
    pub is_playing: bool,
    pub is_paused: bool,
    pub volume: u8,
    pub loop_mode: LoopMode,
}

/// Estado de reproducción de una guild.
///
/// Dueña exclusiva de su sesión de reproducción y de su transporte de voz;
/// ambos se liberan una sola vez en [`MusicQueue::destroy`].
pub struct MusicQueue {
    guild_id: GuildId,
    text_channel_id: ChannelId,
    voice_channel_id: ChannelId,
    tracks: VecDeque<Track>,
    current: Option<Track>,
    loop_mode: LoopMode,
    volume: f32,
    state: PlaybackState,
    playback_id: u64,
    generation: u64,
    consecutive_failures: u32,
    session: Box<dyn PlaybackSession>,
    transport: Box<dyn VoiceTransport>,
    streams: Arc<dyn StreamSource>,
    notifier: Arc<dyn Notifier>,
    config: PlayerConfig,
}

impl MusicQueue {
    pub fn new(
        guild_id: GuildId,
        text_channel_id: ChannelId,
        voice_channel_id: ChannelId,
        link: VoiceLink,
        streams: Arc<dyn StreamSource>,
        notifier: Arc<dyn Notifier>,
        config: PlayerConfig,
    ) -> Self {
        Self {
            guild_id,
            text_channel_id,
            voice_channel_id,
            tracks: VecDeque::new(),
            current: None,
            loop_mode: LoopMode::None,
            volume: config.default_volume.clamp(0.0, 1.0),
            state: PlaybackState::Idle,
            playback_id: 0,
            generation: 0,
            consecutive_failures: 0,
            session: link.session,
            transport: link.transport,
            streams,
            notifier,
            config,
        }
    }

    pub fn voice_channel_id(&self) -> ChannelId {
        self.voice_channel_id
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_idle(&self) -> bool {
        self.state == PlaybackState::Idle
    }

    fn is_active(&self) -> bool {
        matches!(self.state, PlaybackState::Playing | PlaybackState::Paused)
    }

    /// Agrega un track al final de la cola y devuelve su posición (1-based)
    pub fn add_track(&mut self, track: Track) -> Result<usize, QueueError> {
        if self.state == PlaybackState::Destroyed {
            return Err(QueueError::Destroyed);
        }

        if self.tracks.len() >= self.config.max_queue_size {
            return Err(QueueError::Full {
                max: self.config.max_queue_size,
            });
        }

        info!("➕ Agregado a la cola: {}", track.title());
        self.tracks.push_back(track);

        Ok(self.tracks.len())
    }

    /// Elimina el track en `index` (0-based) de los pendientes
    pub fn remove_track(&mut self, index: usize) -> Option<Track> {
        let removed = self.tracks.remove(index)?;
        debug!("❌ Track eliminado en posición {}: {}", index, removed.title());
        Some(removed)
    }

    /// Mezcla los pendientes (Fisher–Yates); la canción actual no se toca
    pub fn shuffle(&mut self) -> bool {
        if self.tracks.len() <= 1 {
            return false;
        }

        self.tracks
            .make_contiguous()
            .shuffle(&mut rand::thread_rng());
        info!("🔀 Cola mezclada en guild {}", self.guild_id);
        true
    }

    pub fn set_loop_mode(&mut self, mode: LoopMode) {
        self.loop_mode = mode;
        match mode {
            LoopMode::None => info!("➡️ Repetición desactivada"),
            LoopMode::Track => info!("🔂 Repetir canción activado"),
            LoopMode::Queue => info!("🔁 Repetir cola activado"),
        }
    }

    /// Ajusta el volumen en porcentaje (se limita a 0..=100) y lo devuelve
    pub fn set_volume(&mut self, percent: i64) -> u8 {
        let percent = percent.clamp(0, 100) as u8;
        self.volume = f32::from(percent) / 100.0;

        if self.is_active() {
            self.session.set_volume(self.volume);
        }

        info!("🔊 Volumen ajustado a {}%", percent);
        percent
    }

    pub fn volume_percent(&self) -> u8 {
        (self.volume * 100.0).round() as u8
    }

    pub fn pause(&mut self) -> bool {
        if self.state != PlaybackState::Playing || !self.session.pause() {
            return false;
        }

        self.state = PlaybackState::Paused;
        info!("⏸️ Reproducción pausada en guild {}", self.guild_id);
        true
    }

    pub fn resume(&mut self) -> bool {
        if self.state != PlaybackState::Paused || !self.session.resume() {
            return false;
        }

        self.state = PlaybackState::Playing;
        info!("▶️ Reproducción reanudada en guild {}", self.guild_id);
        true
    }

    /// Detiene la canción actual y deja la cola esperando [`MusicQueue::complete_skip`].
    ///
    /// Devuelve el `playback_id` que identifica este salto; el avance real
    /// (que puede tardar en obtener el siguiente stream) se hace aparte.
    pub fn skip(&mut self) -> Option<u64> {
        if self.current.is_none() || !self.is_active() {
            return None;
        }

        self.playback_id += 1;
        self.session.stop();
        self.state = PlaybackState::Loading;

        info!("⏭️ Saltando canción en guild {}", self.guild_id);
        Some(self.playback_id)
    }

    /// Avanza después de un `skip`. Con repetir canción activo también avanza.
    /// Se ignora si otro stop, skip o destroy ocurrió entre medio.
    pub async fn complete_skip(&mut self, skip_id: u64) {
        if skip_id != self.playback_id || self.state != PlaybackState::Loading {
            debug!("Salto obsoleto ({}) en guild {}, ignorado", skip_id, self.guild_id);
            return;
        }

        self.advance(AdvanceCause::Skipped).await;
    }

    /// Vacía la cola y detiene la reproducción sin salir del canal
    pub fn stop(&mut self) -> bool {
        if self.state == PlaybackState::Destroyed {
            return false;
        }

        self.tracks.clear();
        self.current = None;
        self.generation += 1;
        self.playback_id += 1;
        self.session.stop();
        self.state = PlaybackState::Idle;

        info!("⏹️ Reproducción detenida en guild {}", self.guild_id);
        true
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            tracks: self.tracks.iter().cloned().collect(),
            current: self.current.clone(),
            is_playing: self.state == PlaybackState::Playing,
            is_paused: self.state == PlaybackState::Paused,
            volume: self.volume_percent(),
            loop_mode: self.loop_mode,
        }
    }

    pub async fn transport_connected(&self) -> bool {
        self.transport.is_connected().await
    }

    /// Detiene todo y libera el transporte. Idempotente.
    pub async fn destroy(&mut self) {
        if self.state == PlaybackState::Destroyed {
            return;
        }

        self.tracks.clear();
        self.current = None;
        self.generation += 1;
        self.playback_id += 1;
        self.session.stop();
        self.transport.leave().await;
        self.state = PlaybackState::Destroyed;
    }

    /// Fin del elemento `playback_id`; se ignora si ya no es el actual
    pub async fn handle_playback_end(&mut self, playback_id: u64) {
        if !self.is_current_playback(playback_id) {
            debug!(
                "Señal de fin obsoleta ({}) en guild {}, ignorada",
                playback_id, self.guild_id
            );
            return;
        }

        debug!("⏹️ Track terminado en guild {}", self.guild_id);
        self.advance(AdvanceCause::Finished).await;
    }

    /// Error del elemento `playback_id`: se avisa una vez y se descarta
    pub async fn handle_playback_error(&mut self, playback_id: u64, reason: &str) {
        if !self.is_current_playback(playback_id) {
            debug!(
                "Señal de error obsoleta ({}) en guild {}, ignorada",
                playback_id, self.guild_id
            );
            return;
        }

        error!("❌ Error del reproductor en guild {}: {}", self.guild_id, reason);
        let failed = self.current.take();
        self.notifier
            .notify(
                self.text_channel_id,
                Notice::PlaybackFailed {
                    title: failed.map(|track| track.title().to_string()),
                },
            )
            .await;

        self.advance(AdvanceCause::Failed).await;
    }

    fn is_current_playback(&self, playback_id: u64) -> bool {
        playback_id == self.playback_id && self.is_active()
    }

    /// Paso de la máquina de estados: elige el siguiente track y lo reproduce.
    ///
    /// Los tracks que no se pueden reproducir se descartan y se prueba el
    /// siguiente, hasta `max_consecutive_failures` fallos seguidos; después
    /// la cola queda inactiva con los pendientes intactos.
    pub async fn advance(&mut self, cause: AdvanceCause) {
        if self.state == PlaybackState::Destroyed {
            return;
        }

        let mut cause = cause;
        loop {
            let Some(next) = self.select_next(cause) else {
                self.current = None;
                self.state = PlaybackState::Idle;
                info!("📭 Cola vacía en guild {}", self.guild_id);
                return;
            };

            self.current = Some(next.clone());

            match self.start(&next).await {
                Ok(()) => {
                    self.consecutive_failures = 0;
                    info!("🎵 Reproduciendo: {} en guild {}", next.title(), self.guild_id);
                    self.notifier
                        .notify(
                            self.text_channel_id,
                            Notice::NowPlaying {
                                track: next,
                                remaining: self.tracks.len(),
                            },
                        )
                        .await;
                    return;
                }
                Err(e) => {
                    warn!("❌ No se pudo reproducir {}: {}", next.title(), e);
                    self.current = None;
                    self.consecutive_failures += 1;
                    self.notifier
                        .notify(
                            self.text_channel_id,
                            Notice::PlaybackFailed {
                                title: Some(next.title().to_string()),
                            },
                        )
                        .await;

                    if self.consecutive_failures >= self.config.max_consecutive_failures {
                        error!(
                            "🚫 {} fallos seguidos en guild {}, deteniendo la cola",
                            self.consecutive_failures, self.guild_id
                        );
                        self.notifier
                            .notify(
                                self.text_channel_id,
                                Notice::GaveUp {
                                    failures: self.consecutive_failures,
                                },
                            )
                            .await;
                        self.consecutive_failures = 0;
                        self.state = PlaybackState::Idle;
                        return;
                    }

                    cause = AdvanceCause::Failed;
                }
            }
        }
    }

    fn select_next(&mut self, cause: AdvanceCause) -> Option<Track> {
        if let Some(current) = self.current.take() {
            match (self.loop_mode, cause) {
                (LoopMode::Track, AdvanceCause::Finished) => {
                    debug!("🔂 Repitiendo track: {}", current.title());
                    return Some(current);
                }
                (LoopMode::Queue, AdvanceCause::Finished | AdvanceCause::Skipped) => {
                    debug!("🔁 Track agregado al final por loop de cola: {}", current.title());
                    self.tracks.push_back(current);
                }
                _ => {}
            }
        }

        self.tracks.pop_front()
    }

    async fn start(&mut self, track: &Track) -> Result<(), StartError> {
        self.state = PlaybackState::Loading;

        let stream = match timeout(
            self.config.stream_timeout,
            self.streams.acquire(track.url(), self.config.stream_quality),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => return Err(StreamError::TimedOut.into()),
        };

        debug!("🎧 Stream obtenido ({:?}) para {}", stream.kind, track.title());

        self.playback_id += 1;
        self.session.play(stream, self.volume, self.playback_id).await?;
        self.state = PlaybackState::Playing;

        Ok(())
    }
}

#[cfg(test)]
impl MusicQueue {
    pub fn current(&self) -> Option<&Track> {
        self.current.as_ref()
    }

    pub fn tracks(&self) -> &VecDeque<Track> {
        &self.tracks
    }
}
