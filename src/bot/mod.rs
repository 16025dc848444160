//! # Bot Module
//!
//! Discord surface of Coda Music: command registration, interaction
//! dispatch and voice-state bookkeeping. All playback decisions live
//! in [`crate::playback`]; this layer only translates Discord events
//! into service calls.

use anyhow::Result;
use serenity::{
    all::{ChannelId, Context, EventHandler, GuildId, Interaction, Ready, VoiceState},
    async_trait,
    builder::CreateMessage,
    http::Http,
};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{error, info, warn};

pub mod commands;
pub mod handlers;

use crate::{
    config::Config,
    playback::{
        notify::{Notice, Notifier},
        MusicService, SongbirdConnector,
    },
    ui::embeds,
};

/// Handler principal de eventos de Discord.
///
/// El servicio de música se construye en el primer evento que lo
/// necesita, cuando el manager de voz ya está disponible en el
/// contexto.
pub struct CodaBot {
    config: Arc<Config>,
    service: OnceCell<Arc<MusicService>>,
}

impl CodaBot {
    pub fn new(config: Config) -> Self {
        Self {
            config: Arc::new(config),
            service: OnceCell::new(),
        }
    }

    pub async fn service(&self, ctx: &Context) -> Result<Arc<MusicService>> {
        self.service
            .get_or_try_init(|| async {
                let manager = songbird::get(ctx)
                    .await
                    .ok_or_else(|| anyhow::anyhow!("Songbird no inicializado"))?;
                let connector = Arc::new(SongbirdConnector::new(manager));
                let notifier = Arc::new(ChannelNotifier::new(ctx.http.clone()));
                Ok(MusicService::new(self.config.clone(), connector, notifier))
            })
            .await
            .map(Arc::clone)
    }

    /// Registra comandos globales o por guild según configuración
    async fn register_commands(&self, ctx: &Context) -> Result<()> {
        info!("📝 Registrando comandos slash...");

        match self.config.guild_id {
            Some(guild_id) => {
                let guild_id = GuildId::from(guild_id);
                if !ctx.cache.guilds().contains(&guild_id) {
                    warn!("⚠️ El bot no está en la guild especificada: {}", guild_id);
                    return Ok(());
                }
                commands::register_guild_commands(ctx, guild_id).await?;
                info!("✅ Comandos de guild registrados para: {}", guild_id);
            }
            None => {
                commands::register_global_commands(ctx).await?;
                info!("✅ Comandos globales registrados");
            }
        }

        Ok(())
    }
}

#[async_trait]
impl EventHandler for CodaBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} está en línea!", ready.user.name);
        info!("📊 Conectado a {} servidores", ready.guilds.len());

        if let Err(e) = self.register_commands(&ctx).await {
            error!("Error al registrar comandos: {:?}", e);
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Command(command_interaction) = interaction {
            if let Err(e) = handlers::handle_command(&ctx, command_interaction, self).await {
                error!("Error manejando comando: {:?}", e);
            }
        }
    }

    /// Dos responsabilidades: limpiar cuando echan al bot del canal, y
    /// cerrar la sesión cuando el bot queda solo
    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let Some(service) = self.service.get() else {
            return;
        };
        let Some(guild_id) = new
            .guild_id
            .or_else(|| old.as_ref().and_then(|o| o.guild_id))
        else {
            return;
        };

        let current_user_id = ctx.cache.current_user().id;

        // Bot desconectado a la fuerza: la sesión ya no tiene canal
        if new.user_id == current_user_id && old.is_some() && new.channel_id.is_none() {
            info!("🔌 Bot desconectado en guild {}", guild_id);
            service.destroy_session(guild_id).await;
            return;
        }

        let Some(session_channel) = service.session_voice_channel(guild_id).await else {
            return;
        };

        // El guard del caché no cruza awaits
        let listeners = {
            ctx.cache
                .guild(guild_id)
                .map(|guild| {
                    guild
                        .voice_states
                        .values()
                        .filter(|state| {
                            state.channel_id == Some(session_channel)
                                && state.user_id != current_user_id
                        })
                        .count()
                })
                .unwrap_or(0)
        };

        if listeners == 0 {
            service.handle_abandonment(guild_id).await;
        }
    }
}

/// Publica avisos del motor como embeds en el canal de texto de la
/// sesión; un fallo de envío se loguea y nada más
pub struct ChannelNotifier {
    http: Arc<Http>,
}

impl ChannelNotifier {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn notify(&self, channel: ChannelId, notice: Notice) {
        let embed = embeds::notice_embed(&notice);
        let message = CreateMessage::new().embed(embed);
        if let Err(e) = channel.send_message(&self.http, message).await {
            warn!("📨 No se pudo publicar el aviso en {}: {}", channel, e);
        }
    }
}
