use async_trait::async_trait;
use serenity::{builder::CreateMessage, http::Http, model::id::ChannelId};
use std::sync::Arc;
use tracing::warn;

use crate::{
    audio::backend::{Notice, Notifier},
    logging::{LogRecord, LogSink},
    ui::embeds,
};

/// Publica los avisos de la cola en el canal de texto de la guild
pub struct ChannelNotifier {
    http: Arc<Http>,
}

impl ChannelNotifier {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

pub fn notice_message(notice: Notice) -> CreateMessage {
    match notice {
        Notice::NowPlaying { track, remaining } => {
            CreateMessage::new().embed(embeds::create_now_playing_embed(&track, remaining))
        }
        Notice::PlaybackFailed { title: Some(title) } => CreateMessage::new().content(format!(
            "❌ Error playing **{}**. Skipping to next track...",
            title
        )),
        Notice::PlaybackFailed { title: None } => CreateMessage::new()
            .content("❌ An error occurred while playing music. Skipping to next track..."),
        Notice::GaveUp { failures } => CreateMessage::new().embed(embeds::create_warning_embed(
            "⚠️ Playback stopped",
            &format!(
                "{} tracks in a row could not be played. Use `/play` or `/skip` to try again.",
                failures
            ),
        )),
    }
}

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn notify(&self, channel_id: ChannelId, notice: Notice) {
        if let Err(e) = channel_id
            .send_message(&self.http, notice_message(notice))
            .await
        {
            warn!("⚠️ No se pudo enviar aviso al canal {}: {:?}", channel_id, e);
        }
    }
}

/// Canal de logs de Discord
pub struct ChannelLogSink {
    http: Arc<Http>,
    channel_id: ChannelId,
}

impl ChannelLogSink {
    pub fn new(http: Arc<Http>, channel_id: ChannelId) -> Self {
        Self { http, channel_id }
    }
}

#[async_trait]
impl LogSink for ChannelLogSink {
    async fn send(&self, record: &LogRecord) -> anyhow::Result<()> {
        self.channel_id
            .say(&self.http, record.to_discord_message())
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::Track;
    use serenity::model::id::UserId;

    fn json(notice: Notice) -> serde_json::Value {
        serde_json::to_value(notice_message(notice)).unwrap()
    }

    #[test]
    fn test_failure_notice_names_track() {
        let message = json(Notice::PlaybackFailed {
            title: Some("Song A".into()),
        });

        assert_eq!(
            message["content"],
            "❌ Error playing **Song A**. Skipping to next track..."
        );
    }

    #[test]
    fn test_now_playing_notice_is_embed() {
        let track = Track::new("Song A", "https://youtu.be/a", 0, UserId::new(1), None);
        let message = json(Notice::NowPlaying { track, remaining: 2 });

        assert_eq!(message["embeds"][0]["title"], "🎵 Now Playing");
        assert_eq!(message["embeds"][0]["fields"][0]["value"], "Unknown");
        assert_eq!(message["embeds"][0]["fields"][2]["value"], "2 track(s) remaining");
    }

    #[test]
    fn test_gave_up_notice() {
        let message = json(Notice::GaveUp { failures: 5 });

        assert!(message["embeds"][0]["description"]
            .as_str()
            .unwrap()
            .starts_with("5 tracks in a row"));
    }
}
