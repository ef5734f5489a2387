use serenity::model::id::UserId;

/// Una canción resuelta y lista para reproducirse.
///
/// Inmutable una vez construida: los campos son privados y sólo se exponen
/// getters. Una duración de `0` significa "desconocida", no longitud cero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    title: String,
    url: String,
    duration_ms: u64,
    requested_by: UserId,
    thumbnail: Option<String>,
}

impl Track {
    pub fn new(
        title: impl Into<String>,
        url: impl Into<String>,
        duration_ms: u64,
        requested_by: UserId,
        thumbnail: Option<String>,
    ) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            duration_ms,
            requested_by,
            thumbnail,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    pub fn requested_by(&self) -> UserId {
        self.requested_by
    }

    pub fn thumbnail(&self) -> Option<&str> {
        self.thumbnail.as_deref()
    }

    /// Duración como `H:MM:SS` o `M:SS`, o `Unknown` si no se conoce
    pub fn formatted_duration(&self) -> String {
        format_duration_ms(self.duration_ms)
    }
}

pub fn format_duration_ms(duration_ms: u64) -> String {
    if duration_ms == 0 {
        return "Unknown".to_string();
    }

    let seconds = duration_ms / 1000;
    let minutes = seconds / 60;
    let hours = minutes / 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes % 60, seconds % 60)
    } else {
        format!("{}:{:02}", minutes, seconds % 60)
    }
}
