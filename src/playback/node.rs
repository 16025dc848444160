use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use parking_lot::Mutex as SyncMutex;
use serenity::model::id::{ChannelId, GuildId};
use songbird::{
    input::{Compose, YoutubeDl},
    tracks::TrackHandle,
    Call, CoreEvent, Event, EventContext, EventHandler as VoiceEventHandler, Songbird, TrackEvent,
};
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Fallos del lado del nodo de audio / transporte de voz
#[derive(Debug, Error)]
pub enum NodeError {
    #[error("no se pudo conectar al canal de voz: {0}")]
    Join(String),
    #[error("fallo del transporte de voz: {0}")]
    Transport(String),
}

/// Track resuelto por el nodo, listo para reproducir
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub url: String,
    pub title: Option<String>,
    pub duration: Option<Duration>,
}

/// Identifica una reproducción concreta. Los callbacks del nodo viajan
/// con el ticket; un ticket con generación vieja es un callback
/// rezagado y se descarta.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackTicket {
    pub guild_id: GuildId,
    pub generation: u64,
}

/// Capacidad externa de audio: resolución y control de reproducción.
///
/// Contrato: por cada track reproducido llega exactamente un evento
/// terminal (`track_ended`, posiblemente precedido por
/// `track_errored`) al sink, con el ticket de esa reproducción.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AudioNode: Send + Sync {
    /// Resuelve una consulta a un track; `None` cuando no hay resultado
    async fn resolve(&self, query: &str) -> Result<Option<Track>, NodeError>;

    /// Carga y reproduce el track, registrando un único par de
    /// listeners fin/excepción etiquetado con el ticket
    async fn play_track(&self, track: &Track, ticket: PlaybackTicket) -> Result<(), NodeError>;

    /// Detiene el track activo; dispara su evento terminal
    async fn stop_track(&self) -> Result<(), NodeError>;

    async fn seek_to(&self, position: Duration) -> Result<(), NodeError>;

    async fn set_paused(&self, paused: bool) -> Result<(), NodeError>;

    async fn set_volume(&self, volume: f32) -> Result<(), NodeError>;
}

/// Superficie de callbacks serializados del motor: el runtime
/// anfitrión entrega estos eventos de a uno por guild.
#[async_trait]
pub trait PlaybackEventSink: Send + Sync {
    async fn track_ended(&self, ticket: PlaybackTicket);
    async fn track_errored(&self, ticket: PlaybackTicket, message: String);
    async fn connection_lost(&self, guild_id: GuildId);
    async fn connection_restored(&self, guild_id: GuildId);
}

/// Conector de voz externo: entrar/salir de canales y re-obtener el
/// handle del nodo tras una reconexión
#[async_trait]
pub trait VoiceConnector: Send + Sync {
    async fn join(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        sink: Arc<dyn PlaybackEventSink>,
    ) -> Result<Arc<dyn AudioNode>, NodeError>;

    /// Handle del nodo para una conexión ya establecida, si existe
    async fn current(
        &self,
        guild_id: GuildId,
        sink: Arc<dyn PlaybackEventSink>,
    ) -> Option<Arc<dyn AudioNode>>;

    /// Salir es legal aunque no haya conexión activa
    async fn leave(&self, guild_id: GuildId) -> Result<(), NodeError>;
}

/// Nodo de audio respaldado por songbird
pub struct SongbirdNode {
    guild_id: GuildId,
    call: Arc<tokio::sync::Mutex<Call>>,
    http: reqwest::Client,
    sink: Arc<dyn PlaybackEventSink>,
    current: SyncMutex<Option<TrackHandle>>,
    volume: SyncMutex<f32>,
}

impl SongbirdNode {
    pub fn new(
        guild_id: GuildId,
        call: Arc<tokio::sync::Mutex<Call>>,
        http: reqwest::Client,
        sink: Arc<dyn PlaybackEventSink>,
    ) -> Self {
        Self {
            guild_id,
            call,
            http,
            sink,
            current: SyncMutex::new(None),
            volume: SyncMutex::new(1.0),
        }
    }
}

#[async_trait]
impl AudioNode for SongbirdNode {
    async fn resolve(&self, query: &str) -> Result<Option<Track>, NodeError> {
        let mut source = if query.starts_with("http") {
            YoutubeDl::new(self.http.clone(), query.to_string())
        } else {
            YoutubeDl::new_search(self.http.clone(), query.to_string())
        };

        match source.aux_metadata().await {
            Ok(metadata) => Ok(Some(Track {
                url: metadata.source_url.unwrap_or_else(|| query.to_string()),
                title: metadata.title,
                duration: metadata.duration,
            })),
            Err(e) => {
                warn!("🔍 Sin resultados para '{}': {}", query, e);
                Ok(None)
            }
        }
    }

    async fn play_track(&self, track: &Track, ticket: PlaybackTicket) -> Result<(), NodeError> {
        let input = YoutubeDl::new(self.http.clone(), track.url.clone());

        let mut call = self.call.lock().await;

        // El track anterior se detiene primero; su evento de fin llega
        // con generación vieja y el motor lo descarta
        if let Some(previous) = self.current.lock().take() {
            let _ = previous.stop();
        }

        let handle = call.play_input(input.into());
        let _ = handle.set_volume(*self.volume.lock());

        handle
            .add_event(
                Event::Track(TrackEvent::End),
                TrackEndRelay {
                    sink: self.sink.clone(),
                    ticket,
                },
            )
            .map_err(|e| NodeError::Transport(e.to_string()))?;
        handle
            .add_event(
                Event::Track(TrackEvent::Error),
                TrackErrorRelay {
                    sink: self.sink.clone(),
                    ticket,
                },
            )
            .map_err(|e| NodeError::Transport(e.to_string()))?;

        *self.current.lock() = Some(handle);
        debug!("▶️ Track cargado en guild {} (gen {})", self.guild_id, ticket.generation);
        Ok(())
    }

    async fn stop_track(&self) -> Result<(), NodeError> {
        if let Some(handle) = self.current.lock().take() {
            handle
                .stop()
                .map_err(|e| NodeError::Transport(e.to_string()))?;
        }
        Ok(())
    }

    async fn seek_to(&self, position: Duration) -> Result<(), NodeError> {
        if let Some(handle) = self.current.lock().as_ref() {
            let _ = handle.seek(position);
        }
        Ok(())
    }

    async fn set_paused(&self, paused: bool) -> Result<(), NodeError> {
        if let Some(handle) = self.current.lock().as_ref() {
            let result = if paused { handle.pause() } else { handle.play() };
            result.map_err(|e| NodeError::Transport(e.to_string()))?;
        }
        Ok(())
    }

    async fn set_volume(&self, volume: f32) -> Result<(), NodeError> {
        let clamped = volume.clamp(0.0, 2.0);
        *self.volume.lock() = clamped;
        if let Some(handle) = self.current.lock().as_ref() {
            handle
                .set_volume(clamped)
                .map_err(|e| NodeError::Transport(e.to_string()))?;
        }
        Ok(())
    }
}

/// Conector respaldado por el manager de songbird
pub struct SongbirdConnector {
    songbird: Arc<Songbird>,
    http: reqwest::Client,
}

impl SongbirdConnector {
    pub fn new(songbird: Arc<Songbird>) -> Self {
        Self {
            songbird,
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl VoiceConnector for SongbirdConnector {
    async fn join(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        sink: Arc<dyn PlaybackEventSink>,
    ) -> Result<Arc<dyn AudioNode>, NodeError> {
        let call = self
            .songbird
            .join(guild_id, channel_id)
            .await
            .map_err(|e| NodeError::Join(e.to_string()))?;

        {
            let mut handler = call.lock().await;
            handler.add_global_event(
                Event::Core(CoreEvent::DriverDisconnect),
                ConnectionRelay {
                    sink: sink.clone(),
                    guild_id,
                    lost: true,
                },
            );
            handler.add_global_event(
                Event::Core(CoreEvent::DriverReconnect),
                ConnectionRelay {
                    sink: sink.clone(),
                    guild_id,
                    lost: false,
                },
            );
        }

        info!("🔊 Conectado al canal de voz {} en guild {}", channel_id, guild_id);
        Ok(Arc::new(SongbirdNode::new(
            guild_id,
            call,
            self.http.clone(),
            sink,
        )))
    }

    async fn current(
        &self,
        guild_id: GuildId,
        sink: Arc<dyn PlaybackEventSink>,
    ) -> Option<Arc<dyn AudioNode>> {
        self.songbird.get(guild_id).map(|call| {
            Arc::new(SongbirdNode::new(guild_id, call, self.http.clone(), sink))
                as Arc<dyn AudioNode>
        })
    }

    async fn leave(&self, guild_id: GuildId) -> Result<(), NodeError> {
        if self.songbird.get(guild_id).is_some() {
            self.songbird
                .remove(guild_id)
                .await
                .map_err(|e| NodeError::Transport(e.to_string()))?;
            info!("👋 Desconectado del canal de voz en guild {}", guild_id);
        }
        Ok(())
    }
}

/// Relay de fin de track hacia el motor
struct TrackEndRelay {
    sink: Arc<dyn PlaybackEventSink>,
    ticket: PlaybackTicket,
}

#[async_trait]
impl VoiceEventHandler for TrackEndRelay {
    async fn act(&self, _ctx: &EventContext<'_>) -> Option<Event> {
        self.sink.track_ended(self.ticket).await;
        None
    }
}

/// Relay de excepciones de track hacia el motor
struct TrackErrorRelay {
    sink: Arc<dyn PlaybackEventSink>,
    ticket: PlaybackTicket,
}

#[async_trait]
impl VoiceEventHandler for TrackErrorRelay {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        let message = match ctx {
            EventContext::Track(track_list) => track_list
                .iter()
                .map(|(state, _)| format!("{:?}", state.playing))
                .collect::<Vec<_>>()
                .join(", "),
            _ => "error desconocido".to_string(),
        };
        error!(
            "❌ Error de track en guild {}: {}",
            self.ticket.guild_id, message
        );
        self.sink.track_errored(self.ticket, message).await;
        None
    }
}

/// Relay de pérdida/restauración de la conexión del driver
struct ConnectionRelay {
    sink: Arc<dyn PlaybackEventSink>,
    guild_id: GuildId,
    lost: bool,
}

#[async_trait]
impl VoiceEventHandler for ConnectionRelay {
    async fn act(&self, _ctx: &EventContext<'_>) -> Option<Event> {
        if self.lost {
            self.sink.connection_lost(self.guild_id).await;
        } else {
            self.sink.connection_restored(self.guild_id).await;
        }
        None
    }
}
