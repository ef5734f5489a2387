//! # Bot Module
//!
//! Capa de Discord del bot de música.
//!
//! - Registro de comandos slash ([`commands`])
//! - Traducción de interacciones a operaciones del manager ([`executor`], [`handlers`])
//! - Avisos y logs hacia canales de texto ([`notifier`])
//!
//! [`RoommatesBot`] implementa el [`EventHandler`] de serenity y recibe el
//! [`MusicManager`] ya construido; no guarda estado propio de reproducción.

use anyhow::Result;
use serenity::{
    all::{Context, EventHandler, GuildId, Interaction, Ready, VoiceState},
    async_trait,
};
use std::sync::Arc;
use tracing::{error, info, warn};

pub mod commands;
pub mod executor;
pub mod handlers;
pub mod notifier;

use crate::audio::MusicManager;

pub struct RoommatesBot {
    manager: Arc<MusicManager>,
    /// Guild de desarrollo; sin ella los comandos se registran globalmente
    guild_id: Option<GuildId>,
}

impl RoommatesBot {
    pub fn new(manager: Arc<MusicManager>, guild_id: Option<u64>) -> Self {
        Self {
            manager,
            guild_id: guild_id.map(GuildId::new),
        }
    }

    /// Registra los comandos slash en la guild de desarrollo o globalmente
    async fn register_commands(&self, ctx: &Context) -> Result<()> {
        info!("📝 Registrando comandos slash...");

        match self.guild_id {
            Some(guild_id) => {
                info!("🏠 Registrando comandos para guild específica: {}", guild_id);

                if !ctx.cache.guilds().contains(&guild_id) {
                    warn!("⚠️ El bot no está en la guild especificada: {}", guild_id);
                    return Ok(());
                }

                commands::register_guild_commands(ctx, guild_id).await.map_err(|e| {
                    error!("❌ Error registrando comandos de guild: {:?}", e);
                    anyhow::anyhow!("No se pudieron registrar comandos de guild. Verifica que el bot tenga permisos de 'applications.commands' en la guild.")
                })?;
                info!("✅ Comandos de guild registrados para: {}", guild_id);
            }
            None => {
                info!("🌐 Registrando comandos globalmente");
                commands::register_global_commands(ctx).await.map_err(|e| {
                    error!("❌ Error registrando comandos globales: {:?}", e);
                    anyhow::anyhow!("No se pudieron registrar comandos globales. Verifica que el bot tenga permisos de 'applications.commands'.")
                })?;
                info!("✅ Comandos globales registrados");
            }
        }

        Ok(())
    }
}

#[async_trait]
impl EventHandler for RoommatesBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} está en línea!", ready.user.name);
        info!("📊 Conectado a {} servidores", ready.guilds.len());

        if let Err(e) = self.register_commands(&ctx).await {
            error!("Error al registrar comandos: {:?}", e);
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        match interaction {
            Interaction::Command(command_interaction) => {
                if let Err(e) =
                    handlers::handle_command(&ctx, command_interaction, &self.manager).await
                {
                    error!("Error manejando comando: {:?}", e);
                }
            }
            Interaction::Component(component_interaction) => {
                if let Err(e) =
                    handlers::handle_component(&ctx, component_interaction, &self.manager).await
                {
                    error!("Error manejando componente: {:?}", e);
                }
            }
            _ => {}
        }
    }

    /// Si alguien desconecta al bot a mano, la cola se destruye sin esperar
    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let current_user_id = ctx.cache.current_user().id;
        if new.user_id != current_user_id || old.is_none() || new.channel_id.is_some() {
            return;
        }

        if let Some(guild_id) = new.guild_id {
            info!("🔌 Bot desconectado en guild {}", guild_id);
            self.manager.destroy_queue(guild_id).await;
        }
    }
}
