//! # Audio Module
//!
//! Núcleo de reproducción por guild.
//!
//! ## Arquitectura
//!
//! ### [`queue`] - Máquina de estados
//! - Pendientes FIFO, canción actual, modos de repetición y volumen
//! - `advance` con límite de fallos consecutivos
//! - `playback_id` para descartar señales de tracks anteriores
//!
//! ### [`manager`] - Registro de colas
//! - Una cola por guild, creada al unirse al canal de voz
//! - Resolución de búsquedas y URLs a [`Track`]
//! - Despacho de señales de ciclo de vida (fin, error, desconexión)
//!
//! ### [`backend`] - Colaboradores
//! - Traits de fuentes, sesión de reproducción, transporte y avisos
//! - [`voice`] los implementa sobre songbird
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! let (manager, signals) = MusicManager::new(resolver, streams, gateway, notifier, config);
//! let manager = Arc::new(manager);
//! tokio::spawn(manager.clone().run_signals(signals));
//!
//! manager.play(guild_id, text_channel, voice_channel, "lofi beats", user_id).await?;
//! ```

pub mod backend;
pub mod manager;
pub mod queue;
pub mod track;
pub mod voice;

#[cfg(test)]
pub(crate) mod testing;

pub use manager::{MusicManager, PlayError, PlayOutcome};
pub use queue::{LoopMode, QueueSnapshot};
pub use track::Track;
