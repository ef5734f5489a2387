//! Dobles de prueba para el núcleo de audio.

use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId, UserId};
use songbird::input::{File, Input};
use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
};
use tokio::sync::Notify;

use super::{
    backend::{
        AudioStream, MockStreamSource, Notice, Notifier, PlaybackError, PlaybackSession,
        SignalSender, StreamError, StreamKind, StreamQuality, StreamSource, VoiceError,
        VoiceGateway, VoiceLink, VoiceTransport,
    },
    queue::MusicQueue,
    track::Track,
};
use crate::{
    config::PlayerConfig,
    sources::{ResolveError, ResolvedItem, TrackResolver},
};

pub fn track_url(title: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", title)
}

pub fn track(title: &str) -> Track {
    Track::new(title, track_url(title), 180_000, UserId::new(7), None)
}

pub fn item(title: &str) -> ResolvedItem {
    ResolvedItem {
        title: Some(title.to_string()),
        url: Some(track_url(title)),
        duration_secs: Some(180.0),
        thumbnail: None,
    }
}

/// Input perezoso: no toca el disco hasta que alguien lo decodifica
pub fn silent_stream() -> AudioStream {
    let input: Input = File::new("silence.ogg").into();
    AudioStream {
        input,
        kind: StreamKind::OggOpus,
    }
}

pub fn working_streams() -> Arc<dyn StreamSource> {
    failing_streams(&[])
}

/// Fuente que falla para los títulos dados y funciona para el resto
pub fn failing_streams(titles: &[&str]) -> Arc<dyn StreamSource> {
    let failing: Vec<String> = titles.iter().map(|title| track_url(title)).collect();

    let mut streams = MockStreamSource::new();
    streams.expect_acquire().returning(move |url, _| {
        if failing.iter().any(|f| f == url) {
            Err(StreamError::Unavailable("video no disponible".to_string()))
        } else {
            Ok(silent_stream())
        }
    });

    Arc::new(streams)
}

/// Fuente cuyo stream para `url` no llega hasta que se llama a `release`
pub struct GatedStreams {
    url: String,
    entered: Notify,
    gate: Notify,
}

impl GatedStreams {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            entered: Notify::new(),
            gate: Notify::new(),
        }
    }

    pub async fn wait_entered(&self) {
        self.entered.notified().await;
    }

    pub fn release(&self) {
        self.gate.notify_one();
    }
}

#[async_trait]
impl StreamSource for GatedStreams {
    async fn acquire(&self, url: &str, _quality: StreamQuality) -> Result<AudioStream, StreamError> {
        if url == self.url {
            self.entered.notify_one();
            self.gate.notified().await;
        }

        Ok(silent_stream())
    }
}

#[derive(Debug, Default, Clone)]
pub struct SessionLog {
    /// (playback_id, volumen) de cada `play`
    pub played: Vec<(u64, f32)>,
    pub stops: usize,
    pub volumes: Vec<f32>,
}

pub struct FakeSession {
    log: Arc<Mutex<SessionLog>>,
}

#[async_trait]
impl PlaybackSession for FakeSession {
    async fn play(
        &mut self,
        _stream: AudioStream,
        volume: f32,
        playback_id: u64,
    ) -> Result<(), PlaybackError> {
        self.log.lock().played.push((playback_id, volume));
        Ok(())
    }

    fn stop(&mut self) {
        self.log.lock().stops += 1;
    }

    fn pause(&mut self) -> bool {
        true
    }

    fn resume(&mut self) -> bool {
        true
    }

    fn set_volume(&mut self, volume: f32) {
        self.log.lock().volumes.push(volume);
    }
}

#[derive(Debug)]
pub struct TransportState {
    connected: AtomicBool,
    leaves: AtomicUsize,
}

impl Default for TransportState {
    fn default() -> Self {
        Self {
            connected: AtomicBool::new(true),
            leaves: AtomicUsize::new(0),
        }
    }
}

impl TransportState {
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    pub fn leave_count(&self) -> usize {
        self.leaves.load(Ordering::SeqCst)
    }
}

pub struct FakeTransport {
    state: Arc<TransportState>,
    left: bool,
}

#[async_trait]
impl VoiceTransport for FakeTransport {
    async fn is_connected(&self) -> bool {
        !self.left && self.state.connected.load(Ordering::SeqCst)
    }

    async fn leave(&mut self) {
        if !self.left {
            self.left = true;
            self.state.leaves.fetch_add(1, Ordering::SeqCst);
        }
    }
}

fn fake_link(state: &Arc<TransportState>, log: &Arc<Mutex<SessionLog>>) -> VoiceLink {
    VoiceLink {
        transport: Box::new(FakeTransport {
            state: state.clone(),
            left: false,
        }),
        session: Box::new(FakeSession { log: log.clone() }),
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<(ChannelId, Notice)>>,
}

impl RecordingNotifier {
    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().iter().map(|(_, n)| n.clone()).collect()
    }

    pub fn now_playing_titles(&self) -> Vec<String> {
        self.notices()
            .into_iter()
            .filter_map(|notice| match notice {
                Notice::NowPlaying { track, .. } => Some(track.title().to_string()),
                _ => None,
            })
            .collect()
    }

    pub fn failure_count(&self) -> usize {
        self.notices()
            .iter()
            .filter(|notice| matches!(notice, Notice::PlaybackFailed { .. }))
            .count()
    }

    pub fn gave_up(&self) -> bool {
        self.notices()
            .iter()
            .any(|notice| matches!(notice, Notice::GaveUp { .. }))
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, channel_id: ChannelId, notice: Notice) {
        self.notices.lock().push((channel_id, notice));
    }
}

/// Arma colas sueltas con fakes compartidos para inspeccionarlos después
pub struct QueueHarness {
    pub notifier: Arc<RecordingNotifier>,
    pub transport: Arc<TransportState>,
    session_log: Arc<Mutex<SessionLog>>,
    streams: Arc<dyn StreamSource>,
    config: PlayerConfig,
}

impl QueueHarness {
    pub fn new(streams: Arc<dyn StreamSource>) -> Self {
        Self::with_config(streams, PlayerConfig::default())
    }

    pub fn with_config(streams: Arc<dyn StreamSource>, config: PlayerConfig) -> Self {
        Self {
            notifier: Arc::default(),
            transport: Arc::default(),
            session_log: Arc::default(),
            streams,
            config,
        }
    }

    pub fn queue(&self) -> MusicQueue {
        MusicQueue::new(
            GuildId::new(1),
            ChannelId::new(10),
            ChannelId::new(20),
            fake_link(&self.transport, &self.session_log),
            self.streams.clone(),
            self.notifier.clone(),
            self.config.clone(),
        )
    }

    pub fn session(&self) -> SessionLog {
        self.session_log.lock().clone()
    }
}

/// Gateway de voz falso; guarda el emisor de señales de la última unión
#[derive(Default)]
pub struct FakeGateway {
    pub transport: Arc<TransportState>,
    pub session_log: Arc<Mutex<SessionLog>>,
    joins: AtomicUsize,
    fail: AtomicBool,
    signals: Mutex<Option<SignalSender>>,
    held: Mutex<Option<GuildId>>,
    held_entered: Notify,
    held_gate: Notify,
}

impl FakeGateway {
    pub fn fail_joins(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    pub fn join_count(&self) -> usize {
        self.joins.load(Ordering::SeqCst)
    }

    pub fn signals(&self) -> Option<SignalSender> {
        self.signals.lock().clone()
    }

    /// Las uniones a `guild_id` quedan colgadas hasta `release_joins`
    pub fn hold_joins_for(&self, guild_id: GuildId) {
        *self.held.lock() = Some(guild_id);
    }

    pub async fn wait_held(&self) {
        self.held_entered.notified().await;
    }

    pub fn release_joins(&self) {
        self.held_gate.notify_one();
    }
}

#[async_trait]
impl VoiceGateway for FakeGateway {
    async fn join(
        &self,
        guild_id: GuildId,
        _channel_id: ChannelId,
        signals: SignalSender,
    ) -> Result<VoiceLink, VoiceError> {
        self.joins.fetch_add(1, Ordering::SeqCst);

        let held = *self.held.lock() == Some(guild_id);
        if held {
            self.held_entered.notify_one();
            self.held_gate.notified().await;
        }

        if self.fail.load(Ordering::SeqCst) {
            return Err(VoiceError::Join("sin permisos".to_string()));
        }

        *self.signals.lock() = Some(signals);
        Ok(fake_link(&self.transport, &self.session_log))
    }
}

/// Resolvedor que responde con resultados fijos
pub struct StaticResolver {
    items: Vec<ResolvedItem>,
    lookups: AtomicUsize,
    searches: AtomicUsize,
}

impl StaticResolver {
    pub fn new(items: Vec<ResolvedItem>) -> Self {
        Self {
            items,
            lookups: AtomicUsize::new(0),
            searches: AtomicUsize::new(0),
        }
    }

    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    pub fn search_count(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TrackResolver for StaticResolver {
    async fn lookup(&self, _url: &str) -> Result<Vec<ResolvedItem>, ResolveError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.items.clone())
    }

    async fn search(&self, _query: &str) -> Result<Vec<ResolvedItem>, ResolveError> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        Ok(self.items.clone())
    }
}

/// Resolvedor que no responde hasta que se llama a `release`
pub struct GatedResolver {
    item: ResolvedItem,
    entered: Notify,
    gate: Notify,
}

impl GatedResolver {
    pub fn new(item: ResolvedItem) -> Self {
        Self {
            item,
            entered: Notify::new(),
            gate: Notify::new(),
        }
    }

    /// Espera a que una búsqueda esté bloqueada en la compuerta
    pub async fn wait_entered(&self) {
        self.entered.notified().await;
    }

    pub fn release(&self) {
        self.gate.notify_one();
    }

    async fn respond(&self) -> Result<Vec<ResolvedItem>, ResolveError> {
        self.entered.notify_one();
        self.gate.notified().await;
        Ok(vec![self.item.clone()])
    }
}

#[async_trait]
impl TrackResolver for GatedResolver {
    async fn lookup(&self, _url: &str) -> Result<Vec<ResolvedItem>, ResolveError> {
        self.respond().await
    }

    async fn search(&self, _query: &str) -> Result<Vec<ResolvedItem>, ResolveError> {
        self.respond().await
    }
}
