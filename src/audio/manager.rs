use dashmap::DashMap;
use serenity::model::id::{ChannelId, GuildId, UserId};
use std::sync::Arc;
use thiserror::Error;
use tokio::{
    sync::{mpsc, Mutex},
    time::{sleep, timeout},
};
use tracing::{debug, error, info, warn};
use url::Url;

use super::{
    backend::{
        LifecycleSignal, Notifier, SignalReceiver, SignalSender, StreamSource, VoiceError,
        VoiceGateway,
    },
    queue::{AdvanceCause, LoopMode, MusicQueue, PlaybackState, QueueError, QueueSnapshot},
    track::Track,
};
use crate::{
    config::PlayerConfig,
    sources::{is_youtube_url, ResolveError, ResolvedItem, TrackResolver},
};

pub type SharedQueue = Arc<Mutex<MusicQueue>>;

/// Resultado de un `play` exitoso
#[derive(Debug, Clone, PartialEq)]
pub struct PlayOutcome {
    pub track: Track,
    /// Posición 1-based en la cola de pendientes
    pub position: usize,
    /// La cola estaba inactiva y se empezó a reproducir de inmediato
    pub started: bool,
}

#[derive(Debug, Error)]
pub enum PlayError {
    #[error("no se encontraron resultados")]
    NotFound,
    #[error("el resultado no trae una URL reproducible")]
    MissingLocator,
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error("la búsqueda tardó demasiado")]
    TimedOut,
    #[error(transparent)]
    Queue(#[from] QueueError),
    #[error(transparent)]
    Voice(#[from] VoiceError),
    #[error("la cola se detuvo mientras se resolvía la canción")]
    Cancelled,
}

/// Registro de colas por guild y operaciones que las cruzan.
pub struct MusicManager {
    queues: DashMap<GuildId, SharedQueue>,
    // Serializa las uniones a voz de cada guild; guilds distintas no se esperan
    creation_locks: DashMap<GuildId, Arc<Mutex<()>>>,
    resolver: Arc<dyn TrackResolver>,
    streams: Arc<dyn StreamSource>,
    gateway: Arc<dyn VoiceGateway>,
    notifier: Arc<dyn Notifier>,
    signals: SignalSender,
    config: PlayerConfig,
}

impl MusicManager {
    /// Crea el manager y el receptor de señales que debe consumir
    /// [`MusicManager::run_signals`].
    pub fn new(
        resolver: Arc<dyn TrackResolver>,
        streams: Arc<dyn StreamSource>,
        gateway: Arc<dyn VoiceGateway>,
        notifier: Arc<dyn Notifier>,
        config: PlayerConfig,
    ) -> (Self, SignalReceiver) {
        let (signals, receiver) = mpsc::unbounded_channel();

        let manager = Self {
            queues: DashMap::new(),
            creation_locks: DashMap::new(),
            resolver,
            streams,
            gateway,
            notifier,
            signals,
            config,
        };

        (manager, receiver)
    }

    pub fn get_queue(&self, guild_id: GuildId) -> Option<SharedQueue> {
        self.queues.get(&guild_id).map(|entry| entry.value().clone())
    }

    pub fn queue_count(&self) -> usize {
        self.queues.len()
    }

    /// Devuelve la cola existente o se une al canal y crea una nueva
    pub async fn create_queue(
        &self,
        guild_id: GuildId,
        text_channel_id: ChannelId,
        voice_channel_id: ChannelId,
    ) -> Result<SharedQueue, VoiceError> {
        if let Some(queue) = self.get_queue(guild_id) {
            return Ok(queue);
        }

        let creation_lock = self.creation_locks.entry(guild_id).or_default().clone();
        let _creation = creation_lock.lock().await;
        if let Some(queue) = self.get_queue(guild_id) {
            return Ok(queue);
        }

        let link = self
            .gateway
            .join(guild_id, voice_channel_id, self.signals.clone())
            .await?;

        let queue = Arc::new(Mutex::new(MusicQueue::new(
            guild_id,
            text_channel_id,
            voice_channel_id,
            link,
            self.streams.clone(),
            self.notifier.clone(),
            self.config.clone(),
        )));
        self.queues.insert(guild_id, queue.clone());

        info!("🎶 Cola creada para guild {} en canal {}", guild_id, voice_channel_id);
        Ok(queue)
    }

    pub async fn play(
        &self,
        guild_id: GuildId,
        text_channel_id: ChannelId,
        voice_channel_id: ChannelId,
        query: &str,
        requested_by: UserId,
    ) -> Result<PlayOutcome, PlayError> {
        let queue = self
            .create_queue(guild_id, text_channel_id, voice_channel_id)
            .await?;
        let generation = {
            let queue = queue.lock().await;
            if queue.voice_channel_id() != voice_channel_id {
                debug!(
                    "🔊 Guild {} ya reproduce en el canal {}, se usa esa cola",
                    guild_id,
                    queue.voice_channel_id()
                );
            }
            queue.generation()
        };

        let track = self.resolve(query, requested_by).await?;

        let still_registered = self
            .get_queue(guild_id)
            .is_some_and(|registered| Arc::ptr_eq(&registered, &queue));
        if !still_registered {
            info!("🚫 Play cancelado en guild {}: la cola ya no existe", guild_id);
            return Err(PlayError::Cancelled);
        }

        let mut queue = queue.lock().await;
        if queue.generation() != generation || queue.state() == PlaybackState::Destroyed {
            info!("🚫 Play cancelado en guild {}: la cola se detuvo", guild_id);
            return Err(PlayError::Cancelled);
        }

        let position = queue.add_track(track.clone())?;
        let started = queue.is_idle();
        if started {
            queue.advance(AdvanceCause::Enqueued).await;
        }

        Ok(PlayOutcome {
            track,
            position,
            started,
        })
    }

    /// URL exacta de YouTube → lookup; cualquier otra cosa → primer resultado de búsqueda
    async fn resolve(&self, query: &str, requested_by: UserId) -> Result<Track, PlayError> {
        let query = query.trim();

        let request = async {
            if is_youtube_url(query) {
                debug!("🔗 Resolviendo URL directa: {}", query);
                self.resolver.lookup(query).await
            } else {
                self.resolver.search(query).await
            }
        };

        let items = timeout(self.config.search_timeout, request)
            .await
            .map_err(|_| PlayError::TimedOut)??;

        let item = items.into_iter().next().ok_or(PlayError::NotFound)?;
        build_track(item, requested_by)
    }

    /// Detiene la canción actual y responde enseguida; obtener el stream de
    /// la siguiente ocurre en otra tarea.
    pub async fn skip(&self, guild_id: GuildId) -> bool {
        let Some(queue) = self.get_queue(guild_id) else {
            return false;
        };

        let Some(skip_id) = queue.lock().await.skip() else {
            return false;
        };

        tokio::spawn(async move {
            queue.lock().await.complete_skip(skip_id).await;
        });
        true
    }

    pub async fn stop(&self, guild_id: GuildId) -> bool {
        let Some(queue) = self.get_queue(guild_id) else {
            return false;
        };
        let mut queue = queue.lock().await;
        queue.stop()
    }

    pub async fn pause(&self, guild_id: GuildId) -> bool {
        let Some(queue) = self.get_queue(guild_id) else {
            return false;
        };
        let mut queue = queue.lock().await;
        queue.pause()
    }

    pub async fn resume(&self, guild_id: GuildId) -> bool {
        let Some(queue) = self.get_queue(guild_id) else {
            return false;
        };
        let mut queue = queue.lock().await;
        queue.resume()
    }

    /// Devuelve el volumen aplicado (ya limitado) o `None` sin cola
    pub async fn set_volume(&self, guild_id: GuildId, percent: i64) -> Option<u8> {
        let queue = self.get_queue(guild_id)?;
        let mut queue = queue.lock().await;
        Some(queue.set_volume(percent))
    }

    pub async fn set_loop_mode(&self, guild_id: GuildId, mode: LoopMode) -> bool {
        let Some(queue) = self.get_queue(guild_id) else {
            return false;
        };
        queue.lock().await.set_loop_mode(mode);
        true
    }

    pub async fn shuffle(&self, guild_id: GuildId) -> bool {
        let Some(queue) = self.get_queue(guild_id) else {
            return false;
        };
        let mut queue = queue.lock().await;
        queue.shuffle()
    }

    pub async fn remove_track(&self, guild_id: GuildId, index: usize) -> Option<Track> {
        let queue = self.get_queue(guild_id)?;
        let mut queue = queue.lock().await;
        queue.remove_track(index)
    }

    pub async fn get_queue_info(&self, guild_id: GuildId) -> Option<QueueSnapshot> {
        let queue = self.get_queue(guild_id)?;
        let queue = queue.lock().await;
        Some(queue.snapshot())
    }

    /// Detiene, sale del canal y quita la cola del registro
    pub async fn destroy_queue(&self, guild_id: GuildId) -> bool {
        let Some((_, queue)) = self.queues.remove(&guild_id) else {
            return false;
        };

        queue.lock().await.destroy().await;
        info!("👋 Cola destruida para guild {}", guild_id);
        true
    }

    pub async fn cleanup(&self) {
        let guilds: Vec<GuildId> = self.queues.iter().map(|entry| *entry.key()).collect();
        info!("🧹 Limpiando {} colas", guilds.len());

        for guild_id in guilds {
            self.destroy_queue(guild_id).await;
        }
    }

    pub async fn handle_signal(&self, guild_id: GuildId, signal: LifecycleSignal) {
        match signal {
            LifecycleSignal::Ended { playback_id } => {
                if let Some(queue) = self.get_queue(guild_id) {
                    queue.lock().await.handle_playback_end(playback_id).await;
                }
            }
            LifecycleSignal::Errored {
                playback_id,
                reason,
            } => {
                if let Some(queue) = self.get_queue(guild_id) {
                    queue
                        .lock()
                        .await
                        .handle_playback_error(playback_id, &reason)
                        .await;
                }
            }
            LifecycleSignal::Disconnected => self.handle_disconnect(guild_id).await,
        }
    }

    /// Espera `disconnect_grace` y revisa una sola vez si el transporte volvió;
    /// si no, la cola se destruye.
    pub async fn handle_disconnect(&self, guild_id: GuildId) {
        let Some(queue) = self.get_queue(guild_id) else {
            return;
        };

        warn!(
            "🔌 Desconectado de voz en guild {}, esperando {:?} por reconexión",
            guild_id, self.config.disconnect_grace
        );
        sleep(self.config.disconnect_grace).await;

        let reconnected = queue.lock().await.transport_connected().await;
        if reconnected {
            info!("🔄 Reconectado a voz en guild {}", guild_id);
            return;
        }

        if self
            .queues
            .remove_if(&guild_id, |_, registered| Arc::ptr_eq(registered, &queue))
            .is_some()
        {
            queue.lock().await.destroy().await;
            error!("❌ Conexión de voz perdida en guild {}, cola destruida", guild_id);
        }
    }

    /// Despacha las señales de ciclo de vida; una tarea por señal
    pub async fn run_signals(self: Arc<Self>, mut receiver: SignalReceiver) {
        while let Some((guild_id, signal)) = receiver.recv().await {
            debug!("📡 Señal {:?} para guild {}", signal, guild_id);

            let manager = self.clone();
            tokio::spawn(async move {
                manager.handle_signal(guild_id, signal).await;
            });
        }
    }
}

fn build_track(item: ResolvedItem, requested_by: UserId) -> Result<Track, PlayError> {
    let url = item
        .url
        .filter(|raw| {
            Url::parse(raw)
                .map(|url| matches!(url.scheme(), "http" | "https"))
                .unwrap_or(false)
        })
        .ok_or(PlayError::MissingLocator)?;

    let duration_ms = item
        .duration_secs
        .filter(|secs| secs.is_finite() && *secs > 0.0)
        .map(|secs| (secs * 1000.0) as u64)
        .unwrap_or(0);

    let title = item
        .title
        .filter(|title| !title.trim().is_empty())
        .unwrap_or_else(|| "Unknown Title".to_string());

    Ok(Track::new(title, url, duration_ms, requested_by, item.thumbnail))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::testing::{
        failing_streams, item, track_url, working_streams, FakeGateway, GatedResolver,
        GatedStreams, RecordingNotifier, StaticResolver,
    };
    use crate::sources::MockTrackResolver;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    const GUILD: GuildId = GuildId::new(1);
    const TEXT: ChannelId = ChannelId::new(10);
    const VOICE: ChannelId = ChannelId::new(20);
    const USER: UserId = UserId::new(7);

    struct Fixture {
        manager: Arc<MusicManager>,
        gateway: Arc<FakeGateway>,
        notifier: Arc<RecordingNotifier>,
        receiver: SignalReceiver,
    }

    fn fixture(resolver: Arc<dyn TrackResolver>) -> Fixture {
        fixture_with(resolver, working_streams())
    }

    fn fixture_with(resolver: Arc<dyn TrackResolver>, streams: Arc<dyn StreamSource>) -> Fixture {
        let gateway = Arc::new(FakeGateway::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let (manager, receiver) = MusicManager::new(
            resolver,
            streams,
            gateway.clone(),
            notifier.clone(),
            PlayerConfig::default(),
        );

        Fixture {
            manager: Arc::new(manager),
            gateway,
            notifier,
            receiver,
        }
    }

    #[tokio::test]
    async fn test_play_on_empty_queue_starts_immediately() {
        let f = fixture(Arc::new(StaticResolver::new(vec![item("Song A")])));

        let outcome = f
            .manager
            .play(GUILD, TEXT, VOICE, "Song A", USER)
            .await
            .unwrap();

        assert!(outcome.started);
        assert_eq!(outcome.track.title(), "Song A");
        assert_eq!(outcome.track.duration_ms(), 180_000);

        let info = f.manager.get_queue_info(GUILD).await.unwrap();
        assert_eq!(info.current.map(|t| t.title().to_string()), Some("Song A".to_string()));
        assert!(info.tracks.is_empty());
        assert!(info.is_playing);
        assert_eq!(f.notifier.now_playing_titles(), vec!["Song A"]);
    }

    #[tokio::test]
    async fn test_second_play_is_enqueued() {
        let f = fixture(Arc::new(StaticResolver::new(vec![item("Song A")])));

        f.manager.play(GUILD, TEXT, VOICE, "a", USER).await.unwrap();
        let outcome = f.manager.play(GUILD, TEXT, VOICE, "a", USER).await.unwrap();

        assert!(!outcome.started);
        assert_eq!(outcome.position, 1);
        assert_eq!(f.gateway.join_count(), 1);
        assert_eq!(f.manager.queue_count(), 1);
    }

    #[tokio::test]
    async fn test_youtube_url_uses_lookup() {
        let resolver = Arc::new(StaticResolver::new(vec![item("Song A")]));
        let f = fixture(resolver.clone());

        f.manager
            .play(GUILD, TEXT, VOICE, "https://youtu.be/dQw4w9WgXcQ", USER)
            .await
            .unwrap();
        f.manager.play(GUILD, TEXT, VOICE, "song a", USER).await.unwrap();

        assert_eq!(resolver.lookup_count(), 1);
        assert_eq!(resolver.search_count(), 1);
    }

    #[tokio::test]
    async fn test_play_without_results() {
        let f = fixture(Arc::new(StaticResolver::new(vec![])));

        let result = f.manager.play(GUILD, TEXT, VOICE, "nothing", USER).await;

        assert!(matches!(result, Err(PlayError::NotFound)));
        let info = f.manager.get_queue_info(GUILD).await.unwrap();
        assert!(info.current.is_none());
    }

    #[tokio::test]
    async fn test_play_rejects_result_without_locator() {
        let bad = ResolvedItem {
            title: Some("Broken".into()),
            url: Some("not a url".into()),
            ..ResolvedItem::default()
        };
        let f = fixture(Arc::new(StaticResolver::new(vec![bad])));

        let result = f.manager.play(GUILD, TEXT, VOICE, "broken", USER).await;

        assert!(matches!(result, Err(PlayError::MissingLocator)));
        assert!(f.manager.get_queue_info(GUILD).await.unwrap().tracks.is_empty());
    }

    #[tokio::test]
    async fn test_play_with_join_failure() {
        let f = fixture(Arc::new(StaticResolver::new(vec![item("Song A")])));
        f.gateway.fail_joins();

        let result = f.manager.play(GUILD, TEXT, VOICE, "a", USER).await;

        assert!(matches!(result, Err(PlayError::Voice(_))));
        assert!(f.manager.get_queue(GUILD).is_none());
    }

    #[tokio::test]
    async fn test_stop_cancels_in_flight_play() {
        let resolver = Arc::new(GatedResolver::new(item("Song A")));
        let f = fixture(resolver.clone());

        let manager = f.manager.clone();
        let play = tokio::spawn(async move { manager.play(GUILD, TEXT, VOICE, "a", USER).await });

        resolver.wait_entered().await;
        assert!(f.manager.stop(GUILD).await);
        resolver.release();

        let result = play.await.unwrap();
        assert!(matches!(result, Err(PlayError::Cancelled)));
        let info = f.manager.get_queue_info(GUILD).await.unwrap();
        assert!(info.current.is_none());
        assert!(info.tracks.is_empty());
    }

    #[tokio::test]
    async fn test_leave_cancels_in_flight_play() {
        let resolver = Arc::new(GatedResolver::new(item("Song A")));
        let f = fixture(resolver.clone());

        let manager = f.manager.clone();
        let play = tokio::spawn(async move { manager.play(GUILD, TEXT, VOICE, "a", USER).await });

        resolver.wait_entered().await;
        assert!(f.manager.destroy_queue(GUILD).await);
        resolver.release();

        assert!(matches!(play.await.unwrap(), Err(PlayError::Cancelled)));
        assert!(f.manager.get_queue(GUILD).is_none());
    }

    #[tokio::test]
    async fn test_operations_without_queue_are_total() {
        let f = fixture(Arc::new(StaticResolver::new(vec![])));

        assert!(!f.manager.skip(GUILD).await);
        assert!(!f.manager.stop(GUILD).await);
        assert!(!f.manager.pause(GUILD).await);
        assert!(!f.manager.resume(GUILD).await);
        assert!(!f.manager.shuffle(GUILD).await);
        assert!(!f.manager.set_loop_mode(GUILD, LoopMode::Queue).await);
        assert_eq!(f.manager.set_volume(GUILD, 50).await, None);
        assert_eq!(f.manager.remove_track(GUILD, 0).await, None);
        assert_eq!(f.manager.get_queue_info(GUILD).await, None);
        assert!(!f.manager.destroy_queue(GUILD).await);
    }

    #[tokio::test]
    async fn test_destroy_queue_is_idempotent() {
        let f = fixture(Arc::new(StaticResolver::new(vec![item("Song A")])));
        f.manager.play(GUILD, TEXT, VOICE, "a", USER).await.unwrap();

        assert!(f.manager.destroy_queue(GUILD).await);
        assert!(f.manager.get_queue(GUILD).is_none());
        assert!(!f.manager.destroy_queue(GUILD).await);
        assert_eq!(f.gateway.transport.leave_count(), 1);
    }

    #[tokio::test]
    async fn test_cleanup_destroys_everything() {
        let f = fixture(Arc::new(StaticResolver::new(vec![item("Song A")])));
        f.manager.play(GUILD, TEXT, VOICE, "a", USER).await.unwrap();
        f.manager
            .play(GuildId::new(2), TEXT, VOICE, "a", USER)
            .await
            .unwrap();

        f.manager.cleanup().await;

        assert_eq!(f.manager.queue_count(), 0);
        assert_eq!(f.gateway.transport.leave_count(), 2);
    }

    #[tokio::test]
    async fn test_end_signal_advances_queue() {
        let f = fixture(Arc::new(StaticResolver::new(vec![item("Song A")])));
        f.manager.play(GUILD, TEXT, VOICE, "a", USER).await.unwrap();
        f.manager.play(GUILD, TEXT, VOICE, "a", USER).await.unwrap();

        f.manager
            .handle_signal(GUILD, LifecycleSignal::Ended { playback_id: 1 })
            .await;

        let info = f.manager.get_queue_info(GUILD).await.unwrap();
        assert!(info.current.is_some());
        assert!(info.tracks.is_empty());
        assert_eq!(f.gateway.session_log.lock().played.len(), 2);
    }

    #[tokio::test]
    async fn test_error_signal_notifies_and_moves_on() {
        let f = fixture(Arc::new(StaticResolver::new(vec![item("Song A")])));
        f.manager.play(GUILD, TEXT, VOICE, "a", USER).await.unwrap();

        f.manager
            .handle_signal(
                GUILD,
                LifecycleSignal::Errored {
                    playback_id: 1,
                    reason: "io".into(),
                },
            )
            .await;

        let info = f.manager.get_queue_info(GUILD).await.unwrap();
        assert!(info.current.is_none());
        assert_eq!(f.notifier.failure_count(), 1);
    }

    #[tokio::test]
    async fn test_stream_failure_reports_through_notifier() {
        let f = fixture_with(
            Arc::new(StaticResolver::new(vec![item("Song A")])),
            failing_streams(&["Song A"]),
        );

        let outcome = f.manager.play(GUILD, TEXT, VOICE, "a", USER).await.unwrap();

        assert!(outcome.started);
        assert_eq!(f.notifier.failure_count(), 1);
        assert!(f.manager.get_queue_info(GUILD).await.unwrap().current.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_destroys_after_grace() {
        let f = fixture(Arc::new(StaticResolver::new(vec![item("Song A")])));
        f.manager.play(GUILD, TEXT, VOICE, "a", USER).await.unwrap();
        f.gateway.transport.set_connected(false);

        f.manager
            .handle_signal(GUILD, LifecycleSignal::Disconnected)
            .await;

        assert!(f.manager.get_queue(GUILD).is_none());
        assert_eq!(f.gateway.transport.leave_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_survives_reconnection() {
        let f = fixture(Arc::new(StaticResolver::new(vec![item("Song A")])));
        f.manager.play(GUILD, TEXT, VOICE, "a", USER).await.unwrap();
        f.gateway.transport.set_connected(false);

        let manager = f.manager.clone();
        let handler = tokio::spawn(async move {
            manager.handle_disconnect(GUILD).await;
        });

        tokio::time::sleep(Duration::from_secs(2)).await;
        f.gateway.transport.set_connected(true);
        handler.await.unwrap();

        assert!(f.manager.get_queue(GUILD).is_some());
        assert_eq!(f.gateway.transport.leave_count(), 0);
    }

    #[tokio::test]
    async fn test_signals_flow_through_channel() {
        let f = fixture(Arc::new(StaticResolver::new(vec![item("Song A")])));
        f.manager.play(GUILD, TEXT, VOICE, "a", USER).await.unwrap();
        f.manager.play(GUILD, TEXT, VOICE, "a", USER).await.unwrap();

        let signals = f.gateway.signals().unwrap();
        tokio::spawn(f.manager.clone().run_signals(f.receiver));
        signals
            .send((GUILD, LifecycleSignal::Ended { playback_id: 1 }))
            .unwrap();

        for _ in 0..100 {
            if f.gateway.session_log.lock().played.len() == 2 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(f.gateway.session_log.lock().played.len(), 2);
    }

    #[tokio::test]
    async fn test_resolver_failure_is_reported() {
        let mut resolver = MockTrackResolver::new();
        resolver.expect_lookup().never();
        resolver
            .expect_search()
            .withf(|query| query == "lofi beats")
            .times(1)
            .returning(|_| Err(ResolveError::Process("yt-dlp: command not found".into())));
        let f = fixture(Arc::new(resolver));

        let result = f.manager.play(GUILD, TEXT, VOICE, "  lofi beats ", USER).await;

        assert!(matches!(result, Err(PlayError::Resolve(ResolveError::Process(_)))));
        assert!(f.manager.get_queue_info(GUILD).await.unwrap().current.is_none());
    }

    #[tokio::test]
    async fn test_skip_replies_before_next_stream_loads() {
        let streams = Arc::new(GatedStreams::new(&track_url("Song B")));
        let resolver = Arc::new(StaticResolver::new(vec![item("Song A")]));
        let f = fixture_with(resolver, streams.clone());
        f.manager.play(GUILD, TEXT, VOICE, "a", USER).await.unwrap();
        f.manager
            .get_queue(GUILD)
            .unwrap()
            .lock()
            .await
            .add_track(crate::audio::testing::track("Song B"))
            .unwrap();

        let skipped = timeout(Duration::from_secs(1), f.manager.skip(GUILD)).await;
        assert_eq!(skipped.ok(), Some(true));

        streams.wait_entered().await;
        streams.release();

        let info = loop {
            let info = f.manager.get_queue_info(GUILD).await.unwrap();
            if info.is_playing {
                break info;
            }
            tokio::task::yield_now().await;
        };
        assert_eq!(info.current.map(|t| t.title().to_string()), Some("Song B".to_string()));
        assert_eq!(f.gateway.session_log.lock().stops, 1);
    }

    #[tokio::test]
    async fn test_slow_join_does_not_block_other_guilds() {
        let f = fixture(Arc::new(StaticResolver::new(vec![item("Song A")])));
        f.gateway.hold_joins_for(GUILD);

        let manager = f.manager.clone();
        let slow = tokio::spawn(async move { manager.create_queue(GUILD, TEXT, VOICE).await.is_ok() });
        f.gateway.wait_held().await;

        let other = timeout(
            Duration::from_secs(1),
            f.manager.create_queue(GuildId::new(2), TEXT, VOICE),
        )
        .await;
        assert!(matches!(other, Ok(Ok(_))));

        f.gateway.release_joins();
        assert!(slow.await.unwrap());
        assert_eq!(f.manager.queue_count(), 2);
    }

    #[test]
    fn test_build_track_defaults() {
        let track = build_track(
            ResolvedItem {
                url: Some("https://www.youtube.com/watch?v=x".into()),
                duration_secs: Some(61.5),
                ..ResolvedItem::default()
            },
            USER,
        )
        .unwrap();

        assert_eq!(track.title(), "Unknown Title");
        assert_eq!(track.duration_ms(), 61_500);
        assert_eq!(track.requested_by(), USER);
    }

    #[test]
    fn test_build_track_requires_http_url() {
        let ftp = ResolvedItem {
            url: Some("ftp://example.com/song.mp3".into()),
            ..ResolvedItem::default()
        };

        assert!(matches!(build_track(ftp, USER), Err(PlayError::MissingLocator)));
        assert!(matches!(
            build_track(ResolvedItem::default(), USER),
            Err(PlayError::MissingLocator)
        ));
    }
}
