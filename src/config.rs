use anyhow::{Context, Result};
use std::time::Duration;
use tracing::Level;

use crate::audio::backend::StreamQuality;

/// Configuración del bot, cargada desde variables de entorno (y `.env`).
#[derive(Debug, Clone)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub guild_id: Option<u64>, // Para registrar comandos en desarrollo

    // Canal de logs
    pub log_channel_id: Option<u64>,
    pub log_channel_level: Level,

    // Audio
    pub default_volume: f32,
    pub max_queue_size: usize,
    pub max_consecutive_failures: u32,
    pub stream_quality: StreamQuality,

    // Tiempos
    pub disconnect_grace: Duration,
    pub search_timeout: Duration,
    pub stream_timeout: Duration,
}

/// Parte de la configuración que necesita el núcleo de audio.
#[derive(Debug, Clone)]
pub struct PlayerConfig {
    pub default_volume: f32,
    pub max_queue_size: usize,
    pub max_consecutive_failures: u32,
    pub stream_quality: StreamQuality,
    pub disconnect_grace: Duration,
    pub search_timeout: Duration,
    pub stream_timeout: Duration,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            default_volume: 0.5,
            max_queue_size: 500,
            max_consecutive_failures: 5,
            stream_quality: StreamQuality::High,
            disconnect_grace: Duration::from_secs(5),
            search_timeout: Duration::from_secs(20),
            stream_timeout: Duration::from_secs(20),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Construye la configuración a partir de una función de búsqueda de
    /// variables; las vacías cuentan como ausentes.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let get_or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let config = Self {
            // Discord
            discord_token: get("DISCORD_TOKEN").context("DISCORD_TOKEN no está definido")?,
            guild_id: get("GUILD_ID")
                .map(|value| value.parse())
                .transpose()
                .context("GUILD_ID inválido")?,

            // Canal de logs
            log_channel_id: get("LOG_CHANNEL_ID")
                .map(|value| value.parse())
                .transpose()
                .context("LOG_CHANNEL_ID inválido")?,
            log_channel_level: get_or("LOG_CHANNEL_LEVEL", "warn")
                .parse()
                .context("LOG_CHANNEL_LEVEL inválido")?,

            // Audio
            default_volume: get_or("DEFAULT_VOLUME", "0.5")
                .parse()
                .context("DEFAULT_VOLUME inválido")?,
            max_queue_size: get_or("MAX_QUEUE_SIZE", "500")
                .parse()
                .context("MAX_QUEUE_SIZE inválido")?,
            max_consecutive_failures: get_or("MAX_CONSECUTIVE_FAILURES", "5")
                .parse()
                .context("MAX_CONSECUTIVE_FAILURES inválido")?,
            stream_quality: get_or("STREAM_QUALITY", "high")
                .parse()
                .context("STREAM_QUALITY inválido")?,

            // Tiempos
            disconnect_grace: humantime::parse_duration(&get_or("DISCONNECT_GRACE", "5s"))
                .context("DISCONNECT_GRACE inválido")?,
            search_timeout: humantime::parse_duration(&get_or("SEARCH_TIMEOUT", "20s"))
                .context("SEARCH_TIMEOUT inválido")?,
            stream_timeout: humantime::parse_duration(&get_or("STREAM_TIMEOUT", "20s"))
                .context("STREAM_TIMEOUT inválido")?,
        };

        config.validate()?;

        Ok(config)
    }

    /// Comprueba que los valores tengan sentido antes de arrancar.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.default_volume) {
            anyhow::bail!(
                "Default volume must be between 0.0 and 1.0, got: {}",
                self.default_volume
            );
        }

        if self.max_queue_size == 0 {
            anyhow::bail!("Max queue size must be greater than 0");
        }

        if self.max_consecutive_failures == 0 {
            anyhow::bail!("Max consecutive failures must be greater than 0");
        }

        if self.search_timeout.is_zero() || self.stream_timeout.is_zero() {
            anyhow::bail!("Search and stream timeouts must be greater than 0");
        }

        if self.guild_id == Some(0) || self.log_channel_id == Some(0) {
            anyhow::bail!("GUILD_ID and LOG_CHANNEL_ID must be valid Discord IDs");
        }

        Ok(())
    }

    pub fn player(&self) -> PlayerConfig {
        PlayerConfig {
            default_volume: self.default_volume,
            max_queue_size: self.max_queue_size,
            max_consecutive_failures: self.max_consecutive_failures,
            stream_quality: self.stream_quality,
            disconnect_grace: self.disconnect_grace,
            search_timeout: self.search_timeout,
            stream_timeout: self.stream_timeout,
        }
    }

    /// Resumen sin el token, apto para el log de arranque
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Commands: {}\n  \
            Log channel: {} (level {})\n  \
            Audio: {}% vol, {:?} quality, {} max queue, {} failures before giving up\n  \
            Timeouts: grace {}, search {}, stream {}",
            self.guild_id
                .map_or("global".to_string(), |id| format!("guild {}", id)),
            self.log_channel_id
                .map_or("disabled".to_string(), |id| id.to_string()),
            self.log_channel_level,
            (self.default_volume * 100.0).round() as u32,
            self.stream_quality,
            self.max_queue_size,
            self.max_consecutive_failures,
            humantime::format_duration(self.disconnect_grace),
            humantime::format_duration(self.search_timeout),
            humantime::format_duration(self.stream_timeout),
        )
    }
}
