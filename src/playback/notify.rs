use async_trait::async_trait;
use serenity::model::id::{ChannelId, UserId};

/// Avisos que el motor publica en el canal de texto de la sesión
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    NowPlaying {
        title: String,
        url: String,
        emoji: &'static str,
        requested_by: UserId,
    },
    Queued {
        title: String,
        position: usize,
    },
    ResolutionFailed {
        title: String,
    },
    PlaybackFailed {
        title: String,
    },
    /// Conexión perdida; la cola queda intacta
    Halted,
    Restored,
    Stopped,
}

/// Sink de notificaciones: publicar y olvidar; los fallos solo se
/// loguean, nunca afectan al motor
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, channel: ChannelId, notice: Notice);
}
