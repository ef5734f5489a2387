use anyhow::Result;
use serenity::{http::Http, model::gateway::GatewayIntents, model::id::ChannelId, Client};
use songbird::{SerenityInit, Songbird};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod audio;
mod bot;
mod config;
mod logging;
mod sources;
mod ui;

use crate::audio::{voice::SongbirdGateway, MusicManager};
use crate::bot::{
    notifier::{ChannelLogSink, ChannelNotifier},
    RoommatesBot,
};
use crate::config::Config;
use crate::sources::YtDlpClient;

const DEFAULT_LOG_FILTER: &str = "roommates_music=debug,serenity=info,songbird=info";

#[tokio::main]
async fn main() -> Result<()> {
    // Manejar health check si es necesario
    if std::env::args().any(|arg| arg == "--health-check") {
        return health_check().await;
    }

    let config = Config::load()?;

    // Inicializar logging
    let (channel_layer, log_forwarder) = match config.log_channel_id {
        Some(_) => {
            let (layer, forwarder) = logging::channel_log(config.log_channel_level);
            (Some(layer), Some(forwarder))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)))
        .with(tracing_subscriber::fmt::layer())
        .with(channel_layer)
        .init();

    info!("🎵 Iniciando Roommates Music v{}", env!("CARGO_PKG_VERSION"));
    info!("{}", config.summary());

    let http = Arc::new(Http::new(&config.discord_token));

    if let (Some(forwarder), Some(channel_id)) = (log_forwarder, config.log_channel_id) {
        let sink = Arc::new(ChannelLogSink::new(http.clone(), ChannelId::new(channel_id)));
        tokio::spawn(forwarder.run(sink));
        info!("📋 Reenviando logs al canal {}", channel_id);
    }

    // Núcleo de audio
    let ytdlp = Arc::new(YtDlpClient::new(reqwest::Client::new()));
    let songbird = Songbird::serenity();

    let (manager, signals) = MusicManager::new(
        ytdlp.clone(),
        ytdlp,
        Arc::new(SongbirdGateway::new(songbird.clone())),
        Arc::new(ChannelNotifier::new(http)),
        config.player(),
    );
    let manager = Arc::new(manager);
    tokio::spawn(manager.clone().run_signals(signals));

    // Configurar intents mínimos necesarios
    let intents = GatewayIntents::GUILDS | GatewayIntents::GUILD_VOICE_STATES;

    let handler = RoommatesBot::new(manager.clone(), config.guild_id);

    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .register_songbird_with(songbird)
        .await?;

    // Manejar shutdown graceful
    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!(
            "⚠️ Señal de shutdown recibida, cerrando {} colas...",
            manager.queue_count()
        );

        manager.cleanup().await;
        shard_manager.shutdown_all().await;
    });

    // Iniciar bot
    info!("🚀 Bot iniciado exitosamente");
    if let Err(why) = client.start().await {
        error!("Error al ejecutar cliente: {:?}", why);
    }

    info!("👋 Bot detenido");
    Ok(())
}

/// Espera Ctrl+C o SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Error al registrar Ctrl+C: {:?}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Error al registrar SIGTERM: {:?}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

async fn health_check() -> Result<()> {
    // Verificar dependencias críticas
    let yt_dlp = async_process::Command::new("yt-dlp")
        .arg("--version")
        .output()
        .await?;

    let ffmpeg = async_process::Command::new("ffmpeg")
        .arg("-version")
        .output()
        .await?;

    if yt_dlp.status.success() && ffmpeg.status.success() {
        println!("OK");
        Ok(())
    } else {
        anyhow::bail!("Dependencias faltantes");
    }
}
