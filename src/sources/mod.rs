pub mod youtube;

use async_trait::async_trait;
use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

pub use youtube::YtDlpClient;

static YOUTUBE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(https?://)?(www\.|m\.)?(youtube\.com/(watch\?v=|embed/|v/|shorts/)|youtu\.be/|music\.youtube\.com/watch\?v=)[\w-]+",
    )
    .expect("regex de YouTube válida")
});

/// Verifica si el texto es una URL de YouTube reproducible directamente
pub fn is_youtube_url(query: &str) -> bool {
    YOUTUBE_URL.is_match(query.trim())
}

/// Resultado de búsqueda tal como lo entrega la fuente; todo es opcional.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedItem {
    pub title: Option<String>,
    pub url: Option<String>,
    pub duration_secs: Option<f64>,
    pub thumbnail: Option<String>,
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("fallo al ejecutar el resolvedor: {0}")]
    Process(String),
    #[error("respuesta inválida del resolvedor: {0}")]
    Parse(String),
}

/// Traduce URLs o búsquedas por palabras clave a resultados reproducibles.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TrackResolver: Send + Sync {
    /// Metadata de una URL concreta
    async fn lookup(&self, url: &str) -> Result<Vec<ResolvedItem>, ResolveError>;

    /// Búsqueda por texto; el primer elemento es el más relevante
    async fn search(&self, query: &str) -> Result<Vec<ResolvedItem>, ResolveError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_youtube_urls() {
        assert!(is_youtube_url("https://www.youtube.com/watch?v=dQw4w9WgXcQ"));
        assert!(is_youtube_url("https://youtu.be/dQw4w9WgXcQ"));
        assert!(is_youtube_url("youtube.com/shorts/abc_123"));
        assert!(is_youtube_url("https://music.youtube.com/watch?v=dQw4w9WgXcQ"));
        assert!(is_youtube_url("  https://m.youtube.com/watch?v=xyz  "));
    }

    #[test]
    fn test_non_youtube_queries() {
        assert!(!is_youtube_url("never gonna give you up"));
        assert!(!is_youtube_url("https://soundcloud.com/artist/track"));
        assert!(!is_youtube_url("https://www.youtube.com/"));
    }
}
