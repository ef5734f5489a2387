//! Implementaciones de voz sobre songbird.

use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId};
use songbird::{
    events::{CoreEvent, Event, EventContext, EventHandler as VoiceEventHandler, TrackEvent},
    tracks::{PlayMode, Track as SongbirdTrack, TrackHandle},
    Call, Songbird,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::backend::{
    AudioStream, LifecycleSignal, PlaybackError, PlaybackSession, SignalSender, VoiceError,
    VoiceGateway, VoiceLink, VoiceTransport,
};

/// Se une a canales de voz usando el cliente songbird registrado en serenity
pub struct SongbirdGateway {
    manager: Arc<Songbird>,
}

impl SongbirdGateway {
    pub fn new(manager: Arc<Songbird>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl VoiceGateway for SongbirdGateway {
    async fn join(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        signals: SignalSender,
    ) -> Result<VoiceLink, VoiceError> {
        let call = match self.manager.join(guild_id, channel_id).await {
            Ok(call) => call,
            Err(e) => {
                // Songbird puede dejar una llamada a medias
                let _ = self.manager.remove(guild_id).await;
                return Err(VoiceError::Join(e.to_string()));
            }
        };

        {
            let mut handler = call.lock().await;

            if let Err(e) = handler.deafen(true).await {
                warn!("⚠️ No se pudo ensordecer al bot en guild {}: {}", guild_id, e);
            }

            handler.remove_all_global_events();
            handler.add_global_event(
                CoreEvent::DriverDisconnect.into(),
                DisconnectForwarder {
                    guild_id,
                    signals: signals.clone(),
                },
            );
        }

        info!("🔊 Conectado al canal de voz {} en guild {}", channel_id, guild_id);

        Ok(VoiceLink {
            transport: Box::new(SongbirdTransport {
                manager: self.manager.clone(),
                call: call.clone(),
                guild_id,
                left: false,
            }),
            session: Box::new(SongbirdSession {
                guild_id,
                call,
                current: None,
                signals,
            }),
        })
    }
}

pub struct SongbirdTransport {
    manager: Arc<Songbird>,
    call: Arc<Mutex<Call>>,
    guild_id: GuildId,
    left: bool,
}

#[async_trait]
impl VoiceTransport for SongbirdTransport {
    async fn is_connected(&self) -> bool {
        !self.left && self.call.lock().await.current_connection().is_some()
    }

    async fn leave(&mut self) {
        if self.left {
            return;
        }
        self.left = true;

        self.call.lock().await.remove_all_global_events();

        if let Err(e) = self.manager.remove(self.guild_id).await {
            debug!("Salida de voz en guild {}: {}", self.guild_id, e);
        }
    }
}

/// Sesión de reproducción: un solo track activo por llamada
pub struct SongbirdSession {
    guild_id: GuildId,
    call: Arc<Mutex<Call>>,
    current: Option<TrackHandle>,
    signals: SignalSender,
}

#[async_trait]
impl PlaybackSession for SongbirdSession {
    async fn play(
        &mut self,
        stream: AudioStream,
        volume: f32,
        playback_id: u64,
    ) -> Result<(), PlaybackError> {
        let handle = self
            .call
            .lock()
            .await
            .play_only(SongbirdTrack::new(stream.input).volume(volume));

        let forwarder = TrackSignalForwarder {
            guild_id: self.guild_id,
            playback_id,
            signals: self.signals.clone(),
        };

        for event in [TrackEvent::End, TrackEvent::Error] {
            handle
                .add_event(Event::Track(event), forwarder.clone())
                .map_err(|e| PlaybackError::Rejected(e.to_string()))?;
        }

        self.current = Some(handle);
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(handle) = self.current.take() {
            let _ = handle.stop();
        }
    }

    fn pause(&mut self) -> bool {
        self.current
            .as_ref()
            .is_some_and(|handle| handle.pause().is_ok())
    }

    fn resume(&mut self) -> bool {
        self.current
            .as_ref()
            .is_some_and(|handle| handle.play().is_ok())
    }

    fn set_volume(&mut self, volume: f32) {
        if let Some(handle) = &self.current {
            let _ = handle.set_volume(volume);
        }
    }
}

/// Traduce eventos de track de songbird a señales de la cola
#[derive(Clone)]
struct TrackSignalForwarder {
    guild_id: GuildId,
    playback_id: u64,
    signals: SignalSender,
}

#[async_trait]
impl VoiceEventHandler for TrackSignalForwarder {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        let EventContext::Track(tracks) = ctx else {
            return None;
        };

        for (state, _) in tracks.iter() {
            let signal = match &state.playing {
                PlayMode::Errored(e) => LifecycleSignal::Errored {
                    playback_id: self.playback_id,
                    reason: format!("{:?}", e),
                },
                PlayMode::End | PlayMode::Stop => LifecycleSignal::Ended {
                    playback_id: self.playback_id,
                },
                _ => continue,
            };

            let _ = self.signals.send((self.guild_id, signal));
        }

        None
    }
}

struct DisconnectForwarder {
    guild_id: GuildId,
    signals: SignalSender,
}

#[async_trait]
impl VoiceEventHandler for DisconnectForwarder {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        if let EventContext::DriverDisconnect(data) = ctx {
            debug!("🔌 DriverDisconnect en guild {}: {:?}", self.guild_id, data.reason);
            let _ = self
                .signals
                .send((self.guild_id, LifecycleSignal::Disconnected));
        }

        None
    }
}
