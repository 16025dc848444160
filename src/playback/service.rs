use std::sync::{Arc, Weak};

use async_trait::async_trait;
use dashmap::DashMap;
use serenity::model::id::{ChannelId, GuildId};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{
    config::Config,
    playback::{
        node::{NodeError, PlaybackEventSink, PlaybackTicket, VoiceConnector},
        notify::{Notice, Notifier},
        queueable::SongListing,
        session::MusicSession,
    },
};

/// Rechazo de un gate de comandos; siempre un valor, nunca un panic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GateRefusal {
    #[error("no hay una sesión de música activa")]
    NoSession,
    #[error("la sesión está desconectada, reintentá en un momento")]
    Disconnected,
    #[error("tenés que estar en el canal de voz del bot")]
    OutsideChannel,
    #[error("tenés que estar en un canal de voz")]
    NotInVoice,
    #[error("la cola está llena")]
    QueueFull,
}

/// Dueño de las sesiones por guild.
///
/// Registro explícito (nada de singletons ambientales): cada sesión
/// vive detrás de su propio `Mutex`, que serializa comandos y
/// callbacks del nodo — el invariante de un solo escritor por guild.
pub struct MusicService {
    config: Arc<Config>,
    connector: Arc<dyn VoiceConnector>,
    notifier: Arc<dyn Notifier>,
    sessions: DashMap<GuildId, Arc<Mutex<MusicSession>>>,
    self_ref: Weak<MusicService>,
}

impl MusicService {
    pub fn new(
        config: Arc<Config>,
        connector: Arc<dyn VoiceConnector>,
        notifier: Arc<dyn Notifier>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            config,
            connector,
            notifier,
            sessions: DashMap::new(),
            self_ref: weak.clone(),
        })
    }

    pub fn session(&self, guild_id: GuildId) -> Option<Arc<Mutex<MusicSession>>> {
        self.sessions.get(&guild_id).map(|s| s.clone())
    }

    /// Canal de voz de la sesión activa, para el chequeo de abandono
    pub async fn session_voice_channel(&self, guild_id: GuildId) -> Option<ChannelId> {
        let session = self.session(guild_id)?;
        let channel = session.lock().await.voice_channel();
        Some(channel)
    }

    fn sink(&self) -> Option<Arc<dyn PlaybackEventSink>> {
        self.self_ref
            .upgrade()
            .map(|service| service as Arc<dyn PlaybackEventSink>)
    }

    /// Crea (o devuelve) la sesión del guild; entrar al canal de voz
    /// es idempotente. El volumen implícito de la config se aplica al
    /// crear.
    pub async fn create_session(
        &self,
        guild_id: GuildId,
        voice_channel: ChannelId,
        text_channel: ChannelId,
    ) -> Result<Arc<Mutex<MusicSession>>, NodeError> {
        if let Some(existing) = self.session(guild_id) {
            return Ok(existing);
        }

        let sink = self
            .sink()
            .ok_or_else(|| NodeError::Join("servicio en cierre".to_string()))?;
        let node = self.connector.join(guild_id, voice_channel, sink).await?;

        if let Err(e) = node.set_volume(self.config.default_volume).await {
            warn!("⚠️ No se pudo aplicar el volumen inicial: {}", e);
        }

        let session = Arc::new(Mutex::new(MusicSession::new(
            guild_id,
            voice_channel,
            text_channel,
            node,
            self.notifier.clone(),
            self.config.max_queue_size,
            self.config.max_history_size,
        )));
        self.sessions.insert(guild_id, session.clone());
        info!("🎧 Sesión de música creada en guild {}", guild_id);
        Ok(session)
    }

    /// Cierra la sesión si existe; salir del canal es legal aunque no
    /// haya sesión
    pub async fn destroy_session(&self, guild_id: GuildId) {
        if let Some((_, session)) = self.sessions.remove(&guild_id) {
            session.lock().await.stop().await;
            info!("🗑️ Sesión destruida en guild {}", guild_id);
        }
        if let Err(e) = self.connector.leave(guild_id).await {
            warn!("⚠️ Error al salir del canal de voz: {}", e);
        }
    }

    /// Acepta un pedido de reproducción, creando la sesión si hace
    /// falta; `Ok(false)` cuando la cola lo rechaza por capacidad
    pub async fn receive_listing(
        &self,
        guild_id: GuildId,
        voice_channel: ChannelId,
        text_channel: ChannelId,
        listing: SongListing,
    ) -> Result<bool, NodeError> {
        let session = match self.session(guild_id) {
            Some(session) => session,
            None => {
                self.create_session(guild_id, voice_channel, text_channel)
                    .await?
            }
        };
        let accepted = session.lock().await.receive_listing(listing).await;
        Ok(accepted)
    }

    /// El bot quedó solo en su canal: cerrar con aviso de "detenido"
    pub async fn handle_abandonment(&self, guild_id: GuildId) {
        let Some(session) = self.session(guild_id) else {
            return;
        };
        let text_channel = session.lock().await.text_channel();
        info!("🚪 Canal de voz abandonado en guild {}", guild_id);
        self.destroy_session(guild_id).await;
        self.notifier.notify(text_channel, Notice::Stopped).await;
    }

    // Gates de comandos: única entrada legal desde la capa de
    // presentación hacia la mutación de sesiones.

    pub async fn can_check_playback(
        &self,
        guild_id: GuildId,
        user_channel: Option<ChannelId>,
    ) -> Result<(), GateRefusal> {
        self.gate_common(guild_id, user_channel).await
    }

    pub async fn can_manage_playback(
        &self,
        guild_id: GuildId,
        user_channel: Option<ChannelId>,
    ) -> Result<(), GateRefusal> {
        self.gate_common(guild_id, user_channel).await
    }

    pub async fn can_request_playback(
        &self,
        guild_id: GuildId,
        user_channel: Option<ChannelId>,
    ) -> Result<(), GateRefusal> {
        let Some(session) = self.session(guild_id) else {
            // Sin sesión el pedido la va a crear: alcanza con que el
            // usuario esté en un canal de voz
            return match user_channel {
                Some(_) => Ok(()),
                None => Err(GateRefusal::NotInVoice),
            };
        };
        let session = session.lock().await;
        if session.is_disconnected() {
            return Err(GateRefusal::Disconnected);
        }
        if user_channel != Some(session.voice_channel()) {
            return Err(GateRefusal::OutsideChannel);
        }
        if session.manager().pending().is_full() {
            return Err(GateRefusal::QueueFull);
        }
        Ok(())
    }

    async fn gate_common(
        &self,
        guild_id: GuildId,
        user_channel: Option<ChannelId>,
    ) -> Result<(), GateRefusal> {
        let Some(session) = self.session(guild_id) else {
            return Err(GateRefusal::NoSession);
        };
        let session = session.lock().await;
        if session.is_disconnected() {
            return Err(GateRefusal::Disconnected);
        }
        if user_channel != Some(session.voice_channel()) {
            return Err(GateRefusal::OutsideChannel);
        }
        Ok(())
    }
}

/// Callbacks serializados del nodo y del conector
#[async_trait]
impl PlaybackEventSink for MusicService {
    async fn track_ended(&self, ticket: PlaybackTicket) {
        let Some(session) = self.session(ticket.guild_id) else {
            debug!("🔇 Fin de track para sesión inexistente en guild {}", ticket.guild_id);
            return;
        };
        session.lock().await.handle_track_end(ticket.generation).await;
    }

    async fn track_errored(&self, ticket: PlaybackTicket, message: String) {
        let Some(session) = self.session(ticket.guild_id) else {
            return;
        };
        session
            .lock()
            .await
            .handle_track_exception(ticket.generation, &message)
            .await;
    }

    async fn connection_lost(&self, guild_id: GuildId) {
        let Some(session) = self.session(guild_id) else {
            return;
        };
        let mut session = session.lock().await;
        if session.is_disconnected() {
            return;
        }
        warn!("🔌 Conexión de voz perdida en guild {}; sesión congelada", guild_id);
        session.freeze();
        self.notifier
            .notify(session.text_channel(), Notice::Halted)
            .await;
    }

    async fn connection_restored(&self, guild_id: GuildId) {
        let Some(session) = self.session(guild_id) else {
            return;
        };
        let Some(sink) = self.sink() else {
            return;
        };
        let node = self.connector.current(guild_id, sink).await;

        let mut session = session.lock().await;
        if !session.is_disconnected() {
            return;
        }
        // La sesión conserva su identidad: solo se reata el handle
        if let Some(node) = node {
            session.rebind(node);
        }
        info!("🔄 Conexión de voz restaurada en guild {}", guild_id);
        session.restore().await;
        self.notifier
            .notify(session.text_channel(), Notice::Restored)
            .await;
    }
}
