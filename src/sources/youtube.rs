use async_process::Command;
use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::Deserialize;
use songbird::input::HttpRequest;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use super::{ResolveError, ResolvedItem, TrackResolver};
use crate::audio::backend::{AudioStream, StreamError, StreamKind, StreamQuality, StreamSource};

/// Cliente de yt-dlp: búsqueda, metadata y URLs de stream.
pub struct YtDlpClient {
    program: String,
    http: HttpClient,
    // Limitar procesos concurrentes para evitar rate limiting
    rate_limiter: Semaphore,
}

/// Información extraída de yt-dlp (`--dump-json`)
#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    title: Option<String>,
    duration: Option<f64>,
    thumbnail: Option<String>,
    webpage_url: Option<String>,
    // En búsquedas planas sólo viene `url`
    url: Option<String>,
    ext: Option<String>,
    acodec: Option<String>,
}

impl YtDlpClient {
    pub fn new(http: HttpClient) -> Self {
        Self::with_program("yt-dlp", http)
    }

    pub fn with_program(program: impl Into<String>, http: HttpClient) -> Self {
        Self {
            program: program.into(),
            http,
            rate_limiter: Semaphore::new(3),
        }
    }

    async fn run(&self, args: &[&str]) -> Result<String, ResolveError> {
        let _permit = self
            .rate_limiter
            .acquire()
            .await
            .map_err(|e| ResolveError::Process(e.to_string()))?;

        let output = Command::new(&self.program)
            .args(args)
            .output()
            .await
            .map_err(|e| ResolveError::Process(format!("no se pudo ejecutar {}: {}", self.program, e)))?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            return Err(ResolveError::Process(error.trim().to_string()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl TrackResolver for YtDlpClient {
    async fn lookup(&self, url: &str) -> Result<Vec<ResolvedItem>, ResolveError> {
        debug!("📊 Obteniendo info de: {}", url);

        let stdout = self
            .run(&["--no-playlist", "--dump-json", "--skip-download", "--no-warnings", url])
            .await?;

        parse_items(&stdout)
    }

    async fn search(&self, query: &str) -> Result<Vec<ResolvedItem>, ResolveError> {
        info!("🔍 Buscando en YouTube: {}", query);

        let search_query = format!("ytsearch1:{}", query);
        let stdout = self
            .run(&[
                "--no-playlist",
                "--dump-json",
                "--skip-download",
                "--no-warnings",
                &search_query,
            ])
            .await?;

        parse_items(&stdout)
    }
}

#[async_trait]
impl StreamSource for YtDlpClient {
    async fn acquire(&self, url: &str, quality: StreamQuality) -> Result<AudioStream, StreamError> {
        debug!("🎵 Obteniendo URL de stream para: {}", url);

        let stdout = self
            .run(&[
                "--no-playlist",
                "-f",
                quality.format_selector(),
                "--dump-json",
                "--skip-download",
                "--no-warnings",
                url,
            ])
            .await
            .map_err(|e| StreamError::Unavailable(e.to_string()))?;

        let (stream_url, kind) = parse_stream(&stdout)?;
        let input = HttpRequest::new(self.http.clone(), stream_url).into();

        Ok(AudioStream { input, kind })
    }
}

/// Una línea JSON por resultado; las líneas que no parsean se descartan
fn parse_items(stdout: &str) -> Result<Vec<ResolvedItem>, ResolveError> {
    let mut items = Vec::new();
    let mut last_error = None;

    for line in stdout.lines().filter(|line| !line.trim().is_empty()) {
        match serde_json::from_str::<YtDlpInfo>(line) {
            Ok(info) => items.push(ResolvedItem {
                title: info.title,
                url: info.webpage_url.or(info.url),
                duration_secs: info.duration,
                thumbnail: info.thumbnail,
            }),
            Err(e) => {
                warn!("⚠️ Línea de yt-dlp inválida: {}", e);
                last_error = Some(e);
            }
        }
    }

    match (items.is_empty(), last_error) {
        (true, Some(e)) => Err(ResolveError::Parse(e.to_string())),
        _ => Ok(items),
    }
}

fn parse_stream(stdout: &str) -> Result<(String, StreamKind), StreamError> {
    let line = stdout
        .lines()
        .find(|line| !line.trim().is_empty())
        .ok_or_else(|| StreamError::Unavailable("yt-dlp no devolvió datos".to_string()))?;

    let info: YtDlpInfo = serde_json::from_str(line)
        .map_err(|e| StreamError::Unavailable(format!("respuesta inválida: {}", e)))?;

    let stream_url = info
        .url
        .filter(|url| !url.is_empty())
        .ok_or_else(|| StreamError::Unavailable("no se pudo obtener URL de stream".to_string()))?;

    Ok((
        stream_url,
        StreamKind::detect(info.ext.as_deref(), info.acodec.as_deref()),
    ))
}
