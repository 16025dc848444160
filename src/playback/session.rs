use std::{sync::Arc, time::Duration};

use serenity::model::id::{ChannelId, GuildId};
use tracing::{debug, info, warn};

use crate::playback::{
    manager::ListingManager,
    node::{AudioNode, NodeError, PlaybackTicket},
    notify::{Notice, Notifier},
    queueable::{LoopScope, Queueable, SongListing},
};

/// Alcance de un skip/unskip/replay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipMode {
    /// El track actual
    Track,
    /// La colección completa
    Collection,
}

/// Controles de posición: `by` es relativo al track actual (sin
/// contarlo); `to` es 1-based
#[derive(Debug, Clone, Copy, Default)]
pub struct PositionControls {
    pub by: Option<usize>,
    pub to: Option<usize>,
}

enum PlaybackStart {
    Started,
    Failed,
}

enum SkipAction {
    /// Cursor reposicionado dentro de la colección
    Jumped,
    /// La colección entera pasa al historial
    ArchiveCollection,
    /// Playable simple al historial más `extra` pendientes
    Archive { extra: usize },
    None,
}

enum UnskipAction {
    Jumped,
    /// Reencolar el actual y traer `pull` entradas del historial
    Requeue { pull: usize },
    None,
}

/// Máquina de estados de reproducción de una conexión de voz.
///
/// Toda mutación llega serializada (comandos del gate o callbacks del
/// nodo); la sesión no toma locks propios. La `generation` marca la
/// reproducción vigente: un callback con generación vieja es un
/// duplicado rezagado y se descarta.
pub struct MusicSession {
    guild_id: GuildId,
    voice_channel: ChannelId,
    text_channel: ChannelId,
    manager: ListingManager,
    node: Arc<dyn AudioNode>,
    notifier: Arc<dyn Notifier>,
    is_disconnected: bool,
    track_loaded: bool,
    /// Consumido atómicamente por `advance_queue`: el próximo fin de
    /// track repite el playable actual en vez de avanzar
    replay_on_end: bool,
    generation: u64,
}

impl MusicSession {
    pub fn new(
        guild_id: GuildId,
        voice_channel: ChannelId,
        text_channel: ChannelId,
        node: Arc<dyn AudioNode>,
        notifier: Arc<dyn Notifier>,
        max_queue: usize,
        max_history: usize,
    ) -> Self {
        Self {
            guild_id,
            voice_channel,
            text_channel,
            manager: ListingManager::new(max_queue, max_history),
            node,
            notifier,
            is_disconnected: false,
            track_loaded: false,
            replay_on_end: false,
            generation: 0,
        }
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    pub fn voice_channel(&self) -> ChannelId {
        self.voice_channel
    }

    pub fn text_channel(&self) -> ChannelId {
        self.text_channel
    }

    pub fn manager(&self) -> &ListingManager {
        &self.manager
    }

    pub fn is_disconnected(&self) -> bool {
        self.is_disconnected
    }

    /// Acepta un listing: encola, y si no hay nada sonando arranca la
    /// reproducción. `false` cuando la cola pendiente está llena.
    pub async fn receive_listing(&mut self, listing: SongListing) -> bool {
        let title = listing.title().to_string();
        if !self.manager.enqueue(listing) {
            return false;
        }

        if self.manager.current().is_some() {
            // Solo encolado: la reproducción en curso no se toca
            let position = self.manager.pending().len();
            info!("➕ Encolado en guild {}: {} (#{position})", self.guild_id, title);
            self.notify(Notice::Queued { title, position }).await;
        } else {
            self.play_next().await;
        }
        true
    }

    /// Promueve la siguiente pendiente y la reproduce; no hace nada
    /// con la cola vacía
    pub async fn play_next(&mut self) {
        self.advance_queue(false).await;
    }

    /// Único camino de avance: decide el próximo playable y lo
    /// arranca. Una falla de resolución limpia el loop del item roto,
    /// avisa, y sigue con el siguiente: la reproducción nunca se
    /// estanca.
    pub async fn advance_queue(&mut self, replay: bool) {
        let mut replay = replay || std::mem::take(&mut self.replay_on_end);
        let mut failures = 0usize;
        loop {
            if !self.select_next(replay, &mut failures) {
                debug!("📭 Nada para reproducir en guild {}", self.guild_id);
                return;
            }
            match self.start_playback().await {
                PlaybackStart::Started => return,
                PlaybackStart::Failed => {
                    replay = false;
                    failures += 1;
                    self.cap_collection_retries(failures);
                }
            }
        }
    }

    /// Una colección en loop cuyas pistas fallaron todas en la pasada
    /// se queda sin loop; la selección la archiva en vez de
    /// rebobinarla sin fin
    fn cap_collection_retries(&mut self, failures: usize) {
        let Some(listing) = self.manager.current_mut() else {
            return;
        };
        if let Queueable::Collection(collection) = listing.queueable_mut() {
            if failures >= collection.len() && collection.is_looping() {
                warn!(
                    "🛑 Colección '{}' sin pistas reproducibles en guild {}; loop apagado",
                    collection.title(),
                    self.guild_id
                );
                collection.set_looping(false);
            }
        }
    }

    /// Decide qué suena a continuación; `true` si quedó un actual.
    /// `failures` cuenta arranques fallidos del mismo actual y se
    /// reinicia cuando el actual cambia.
    fn select_next(&mut self, replay: bool, failures: &mut usize) -> bool {
        let Some(listing) = self.manager.current_mut() else {
            *failures = 0;
            return self.manager.take_current_from_queue();
        };

        if replay || listing.queueable().playable_is_looping() {
            return true;
        }

        if let Queueable::Collection(collection) = listing.queueable_mut() {
            if collection.advance_track() {
                return true;
            }
            if collection.is_looping() {
                collection.rewind();
                return true;
            }
        }

        // Playable simple terminado, o colección caída del final
        *failures = 0;
        self.manager.move_current_to_history();
        self.manager.take_current_from_queue()
    }

    async fn start_playback(&mut self) -> PlaybackStart {
        let Some(listing) = self.manager.current() else {
            return PlaybackStart::Failed;
        };
        let query = listing.queueable().playable().url().to_string();
        let requested_by = listing.requested_by();
        let emoji = listing.queueable().emoji();

        let track = match self.node.resolve(&query).await {
            Ok(Some(track)) => track,
            Ok(None) => {
                self.fail_current("sin resultados").await;
                return PlaybackStart::Failed;
            }
            Err(e) => {
                self.fail_current(&e.to_string()).await;
                return PlaybackStart::Failed;
            }
        };

        // Título perezoso: streams y pedidos por búsqueda lo toman
        // del track cargado
        if let (Some(listing), Some(resolved)) =
            (self.manager.current_mut(), track.title.as_deref())
        {
            match listing.queueable_mut() {
                Queueable::Song(song) => song.resolve_title(resolved),
                Queueable::Stream(stream) => stream.resolve_title(resolved),
                Queueable::Collection(collection) => {
                    collection.current_song_mut().resolve_title(resolved)
                }
            }
        }

        // La generación nueva deja obsoleto el par de listeners del
        // track anterior antes de reproducir el siguiente
        self.generation += 1;
        let ticket = PlaybackTicket {
            guild_id: self.guild_id,
            generation: self.generation,
        };

        if let Err(e) = self.node.play_track(&track, ticket).await {
            self.fail_current(&e.to_string()).await;
            return PlaybackStart::Failed;
        }
        self.track_loaded = true;

        let (title, url) = match self.manager.current() {
            Some(listing) => {
                let playable = listing.queueable().playable();
                (playable.title().to_string(), playable.url().to_string())
            }
            None => (query.clone(), query),
        };
        info!("🎵 Reproduciendo en guild {}: {}", self.guild_id, title);
        self.notify(Notice::NowPlaying {
            title,
            url,
            emoji,
            requested_by,
        })
        .await;
        PlaybackStart::Started
    }

    /// Marca el item actual como roto: loop limpio + aviso
    async fn fail_current(&mut self, reason: &str) {
        let Some(listing) = self.manager.current_mut() else {
            return;
        };
        listing.queueable_mut().clear_playable_loop();
        let title = listing.queueable().playable().title().to_string();
        warn!(
            "❌ No se pudo reproducir '{}' en guild {}: {}",
            title, self.guild_id, reason
        );
        self.notify(Notice::ResolutionFailed { title }).await;
    }

    /// Callback terminal del nodo; conduce el avance automático
    pub async fn handle_track_end(&mut self, generation: u64) {
        if generation != self.generation {
            debug!(
                "🔁 Fin de track rezagado en guild {} (gen {} != {}), ignorado",
                self.guild_id, generation, self.generation
            );
            return;
        }
        if self.is_disconnected {
            return;
        }
        self.track_loaded = false;
        self.advance_queue(false).await;
    }

    /// Excepción no terminal: loop limpio, aviso, la sesión sigue;
    /// el evento de fin del mismo track hará avanzar
    pub async fn handle_track_exception(&mut self, generation: u64, message: &str) {
        if generation != self.generation {
            return;
        }
        if self.is_disconnected {
            return;
        }
        warn!(
            "⚠️ Excepción de reproducción en guild {}: {}",
            self.guild_id, message
        );
        let Some(listing) = self.manager.current_mut() else {
            return;
        };
        listing.queueable_mut().clear_playable_loop();
        let title = listing.queueable().playable().title().to_string();
        self.notify(Notice::PlaybackFailed { title }).await;
    }

    /// Salta hacia adelante. Nunca avanza directo: detiene el track
    /// activo y deja que el callback de fin reentre `advance_queue`,
    /// manteniendo un único camino de avance.
    pub async fn skip(&mut self, mode: SkipMode, controls: PositionControls) {
        let action = {
            let Some(listing) = self.manager.current_mut() else {
                return;
            };
            match listing.queueable_mut() {
                Queueable::Collection(collection) => {
                    let target = match (controls.to, controls.by) {
                        (Some(to), _) => to.saturating_sub(1),
                        (None, Some(by)) => collection.index() + by,
                        (None, None) => collection.index() + 1,
                    };
                    if mode == SkipMode::Collection
                        || collection.is_last_track()
                        || target >= collection.len()
                    {
                        SkipAction::ArchiveCollection
                    } else if collection.jump_to(target) {
                        SkipAction::Jumped
                    } else {
                        SkipAction::None
                    }
                }
                _ => SkipAction::Archive {
                    extra: controls.by.or(controls.to).unwrap_or(0),
                },
            }
        };

        match action {
            SkipAction::Jumped => self.replay_on_end = true,
            SkipAction::ArchiveCollection => {
                info!("⏭️ Colección saltada al historial en guild {}", self.guild_id);
                self.manager.move_current_to_history();
            }
            SkipAction::Archive { extra } => {
                self.manager.move_current_to_history();
                let moved = self.manager.move_from_queue_to_history(extra);
                info!(
                    "⏭️ Saltado en guild {} ({} pendientes migradas)",
                    self.guild_id, moved
                );
            }
            SkipAction::None => return,
        }

        self.stop_or_advance().await;
    }

    /// Inverso temporal de `skip`
    pub async fn unskip(&mut self, mode: SkipMode, controls: PositionControls) {
        let action = {
            let Some(listing) = self.manager.current_mut() else {
                return;
            };
            match listing.queueable_mut() {
                Queueable::Collection(collection) => {
                    let target = match controls.to {
                        Some(to) => {
                            Some(to.saturating_sub(1)).filter(|t| *t < collection.len())
                        }
                        None => collection.index().checked_sub(controls.by.unwrap_or(1)),
                    };
                    match target {
                        Some(t) if mode != SkipMode::Collection && collection.jump_to(t) => {
                            UnskipAction::Jumped
                        }
                        // Primera pista (o colección completa):
                        // reencolar y traer la anterior del historial
                        _ => UnskipAction::Requeue { pull: 1 },
                    }
                }
                _ => UnskipAction::Requeue {
                    // El +1 deshace la reubicación del actual, así un
                    // unskip con el mismo `by` revierte al skip exacto
                    pull: controls.by.or(controls.to).unwrap_or(0) + 1,
                },
            }
        };

        match action {
            UnskipAction::Jumped => self.replay_on_end = true,
            UnskipAction::Requeue { pull } => {
                self.manager.move_current_to_queue();
                let moved = self.manager.move_from_history_to_queue(pull);
                info!(
                    "⏮️ Revertido en guild {} ({} del historial)",
                    self.guild_id, moved
                );
            }
            UnskipAction::None => return,
        }

        self.stop_or_advance().await;
    }

    /// Reinicia el playable actual desde cero, ignorando loops; con
    /// alcance de colección, primero rebobina el cursor
    pub async fn replay(&mut self, mode: SkipMode) {
        if mode == SkipMode::Collection {
            if let Some(listing) = self.manager.current_mut() {
                if let Queueable::Collection(collection) = listing.queueable_mut() {
                    collection.rewind();
                }
            }
        }
        self.advance_queue(true).await;
    }

    /// Con un track cargado, detenerlo dispara el callback que reentra
    /// el avance; sin track no habrá callback, así que se avanza
    /// directo
    async fn stop_or_advance(&mut self) {
        if self.track_loaded {
            if let Err(e) = self.node.stop_track().await {
                warn!("⚠️ No se pudo detener el track activo: {}", e);
            }
        } else {
            self.advance_queue(false).await;
        }
    }

    pub async fn set_paused(&mut self, paused: bool) -> Result<(), NodeError> {
        self.node.set_paused(paused).await
    }

    pub async fn set_volume(&mut self, volume: f32) -> Result<(), NodeError> {
        self.node.set_volume(volume).await
    }

    pub async fn seek_to(&mut self, position: Duration) -> Result<(), NodeError> {
        self.node.seek_to(position).await
    }

    /// Cambia el loop del actual; `false` si no hay nada sonando
    pub fn set_loop(&mut self, scope: LoopScope, looping: bool) -> bool {
        match self.manager.current_mut() {
            Some(listing) => {
                listing.queueable_mut().set_looping(scope, looping);
                true
            }
            None => false,
        }
    }

    /// Congela la sesión ante una pérdida de conexión: ninguna
    /// mutación hasta la restauración; cola/historial/actual intactos
    pub fn freeze(&mut self) {
        self.is_disconnected = true;
        self.track_loaded = false;
    }

    /// Reemplaza el handle del nodo tras una reconexión; los listeners
    /// son del handle, la sesión conserva su identidad
    pub fn rebind(&mut self, node: Arc<dyn AudioNode>) {
        self.node = node;
    }

    /// Descongela y retoma exactamente el playable actual
    pub async fn restore(&mut self) {
        self.is_disconnected = false;
        self.advance_queue(true).await;
    }

    /// Teardown: el salto de generación deja obsoleto cualquier
    /// callback pendiente antes de descartar el estado
    pub async fn stop(&mut self) {
        self.generation += 1;
        if self.track_loaded {
            self.track_loaded = false;
            if let Err(e) = self.node.stop_track().await {
                warn!("⚠️ Error deteniendo al cerrar la sesión: {}", e);
            }
        }
    }

    async fn notify(&self, notice: Notice) {
        self.notifier.notify(self.text_channel, notice).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::{
        node::MockAudioNode,
        queueable::{AudioStream, Song, SongCollection},
        test_support::{collection_listing, song_listing, FakeNode, RecordingNotifier},
    };
    use pretty_assertions::assert_eq;
    use serenity::model::id::UserId;

    fn session_with(node: Arc<dyn AudioNode>, notifier: Arc<dyn Notifier>) -> MusicSession {
        MusicSession::new(
            GuildId::new(10),
            ChannelId::new(20),
            ChannelId::new(30),
            node,
            notifier,
            10,
            10,
        )
    }

    fn fixture() -> (MusicSession, Arc<FakeNode>, Arc<RecordingNotifier>) {
        let node = Arc::new(FakeNode::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let session = session_with(node.clone(), notifier.clone());
        (session, node, notifier)
    }

    /// Simula el callback de fin del track vigente
    async fn finish_track(session: &mut MusicSession, node: &FakeNode) {
        let generation = node
            .last_ticket()
            .map(|t| t.generation)
            .unwrap_or_default();
        session.handle_track_end(generation).await;
    }

    fn pending_titles(session: &MusicSession) -> Vec<String> {
        session
            .manager()
            .pending()
            .iter()
            .map(|l| l.title().to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_first_listing_starts_playback() {
        let (mut session, node, notifier) = fixture();

        assert!(session.receive_listing(song_listing("A")).await);

        assert_eq!(node.played(), vec!["https://example.com/A"]);
        assert!(matches!(
            notifier.notices().as_slice(),
            [Notice::NowPlaying { .. }]
        ));
    }

    #[tokio::test]
    async fn test_listing_with_current_is_queue_only() {
        let (mut session, node, notifier) = fixture();
        session.receive_listing(song_listing("A")).await;

        session.receive_listing(song_listing("B")).await;

        assert_eq!(node.played().len(), 1);
        assert_eq!(
            notifier.notices().last(),
            Some(&Notice::Queued {
                title: "B".to_string(),
                position: 1
            })
        );
    }

    #[tokio::test]
    async fn test_receive_refuses_when_pending_full() {
        let node = Arc::new(FakeNode::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let mut session = MusicSession::new(
            GuildId::new(10),
            ChannelId::new(20),
            ChannelId::new(30),
            node.clone(),
            notifier,
            2,
            10,
        );
        session.receive_listing(song_listing("A")).await;
        session.receive_listing(song_listing("B")).await;
        session.receive_listing(song_listing("C")).await;

        assert!(!session.receive_listing(song_listing("D")).await);
        assert!(session.manager().pending().is_full());
        assert_eq!(pending_titles(&session), vec!["B", "C"]);
    }

    #[tokio::test]
    async fn test_advance_with_empty_queue_leaves_no_current() {
        let (mut session, node, _) = fixture();
        session.receive_listing(song_listing("A")).await;

        finish_track(&mut session, &node).await;

        assert!(session.manager().current().is_none());
        assert_eq!(session.manager().history().len(), 1);
        assert_eq!(node.played().len(), 1);
    }

    #[tokio::test]
    async fn test_looping_track_replays_itself() {
        let (mut session, node, _) = fixture();
        session.receive_listing(song_listing("A")).await;
        assert!(session.set_loop(LoopScope::Playable, true));

        finish_track(&mut session, &node).await;

        assert_eq!(
            node.played(),
            vec!["https://example.com/A", "https://example.com/A"]
        );
        assert!(session.manager().current().is_some());
    }

    #[tokio::test]
    async fn test_collection_advances_cursor_mid_list() {
        let (mut session, node, _) = fixture();
        session
            .receive_listing(collection_listing("Album", &["S1", "S2", "S3"]))
            .await;
        finish_track(&mut session, &node).await; // S1 -> S2

        finish_track(&mut session, &node).await; // S2 -> S3

        let current = session.manager().current().unwrap();
        match current.queueable() {
            Queueable::Collection(c) => assert_eq!(c.index(), 2),
            _ => unreachable!(),
        }
        assert_eq!(node.played().last().unwrap(), "https://example.com/S3");
    }

    #[tokio::test]
    async fn test_collection_at_last_track_yields_to_pending() {
        let (mut session, node, _) = fixture();
        session
            .receive_listing(collection_listing("Album", &["S1", "S2", "S3"]))
            .await;
        session.receive_listing(song_listing("Z")).await;
        finish_track(&mut session, &node).await; // -> S2
        finish_track(&mut session, &node).await; // -> S3 (última)

        finish_track(&mut session, &node).await; // colección al historial

        assert_eq!(session.manager().history().len(), 1);
        let current = session.manager().current().unwrap();
        assert_eq!(current.title(), "Z");
        assert_eq!(node.played().last().unwrap(), "https://example.com/Z");
    }

    #[tokio::test]
    async fn test_looping_collection_rewinds_after_last() {
        let (mut session, node, _) = fixture();
        session
            .receive_listing(collection_listing("Album", &["S1", "S2"]))
            .await;
        assert!(session.set_loop(LoopScope::Collection, true));
        finish_track(&mut session, &node).await; // -> S2

        finish_track(&mut session, &node).await; // rebobina

        let current = session.manager().current().unwrap();
        match current.queueable() {
            Queueable::Collection(c) => assert_eq!(c.index(), 0),
            _ => unreachable!(),
        }
        assert_eq!(node.played().last().unwrap(), "https://example.com/S1");
    }

    #[tokio::test]
    async fn test_skip_whole_collection_regardless_of_cursor() {
        let (mut session, node, _) = fixture();
        session
            .receive_listing(collection_listing("Album", &["S1", "S2", "S3"]))
            .await;
        finish_track(&mut session, &node).await; // cursor en 1

        session
            .skip(SkipMode::Collection, PositionControls::default())
            .await;
        finish_track(&mut session, &node).await;

        assert!(session.manager().current().is_none());
        assert_eq!(session.manager().history().len(), 1);
        assert_eq!(node.stops(), 1);
    }

    #[tokio::test]
    async fn test_skip_repositions_collection_cursor() {
        let (mut session, node, _) = fixture();
        session
            .receive_listing(collection_listing("Album", &["S1", "S2", "S3", "S4"]))
            .await;

        session
            .skip(
                SkipMode::Track,
                PositionControls {
                    by: None,
                    to: Some(3),
                },
            )
            .await;
        finish_track(&mut session, &node).await;

        let current = session.manager().current().unwrap();
        match current.queueable() {
            Queueable::Collection(c) => assert_eq!(c.index(), 2),
            _ => unreachable!(),
        }
        assert_eq!(node.played().last().unwrap(), "https://example.com/S3");
    }

    #[tokio::test]
    async fn test_skip_past_collection_end_archives_it() {
        let (mut session, node, _) = fixture();
        session
            .receive_listing(collection_listing("Album", &["S1", "S2", "S3"]))
            .await;

        session
            .skip(
                SkipMode::Track,
                PositionControls {
                    by: Some(5),
                    to: None,
                },
            )
            .await;
        finish_track(&mut session, &node).await;

        assert!(session.manager().current().is_none());
        assert_eq!(session.manager().history().len(), 1);
    }

    #[tokio::test]
    async fn test_skip_then_unskip_round_trip() {
        let (mut session, node, _) = fixture();
        for name in ["A", "B", "C", "D"] {
            session.receive_listing(song_listing(name)).await;
        }
        assert_eq!(session.manager().current().unwrap().title(), "A");

        session
            .skip(
                SkipMode::Track,
                PositionControls {
                    by: Some(1),
                    to: None,
                },
            )
            .await;
        finish_track(&mut session, &node).await;
        assert_eq!(session.manager().current().unwrap().title(), "C");
        assert_eq!(pending_titles(&session), vec!["D"]);

        session
            .unskip(
                SkipMode::Track,
                PositionControls {
                    by: Some(1),
                    to: None,
                },
            )
            .await;
        finish_track(&mut session, &node).await;

        assert_eq!(session.manager().current().unwrap().title(), "A");
        assert_eq!(pending_titles(&session), vec!["B", "C", "D"]);
    }

    #[tokio::test]
    async fn test_default_unskip_restores_previous_track() {
        let (mut session, node, _) = fixture();
        session.receive_listing(song_listing("A")).await;
        session.receive_listing(song_listing("B")).await;
        finish_track(&mut session, &node).await; // A al historial, suena B

        session
            .unskip(SkipMode::Track, PositionControls::default())
            .await;
        finish_track(&mut session, &node).await;

        assert_eq!(session.manager().current().unwrap().title(), "A");
        assert_eq!(pending_titles(&session), vec!["B"]);
    }

    #[tokio::test]
    async fn test_unskip_collection_at_first_track_pulls_history() {
        let (mut session, node, _) = fixture();
        session.receive_listing(song_listing("Previa")).await;
        session
            .receive_listing(collection_listing("Album", &["S1", "S2"]))
            .await;
        finish_track(&mut session, &node).await; // Previa al historial, suena S1

        session
            .unskip(SkipMode::Track, PositionControls::default())
            .await;
        finish_track(&mut session, &node).await;

        assert_eq!(session.manager().current().unwrap().title(), "Previa");
        assert_eq!(pending_titles(&session), vec!["Album"]);
    }

    #[tokio::test]
    async fn test_unskip_decrements_collection_cursor() {
        let (mut session, node, _) = fixture();
        session
            .receive_listing(collection_listing("Album", &["S1", "S2", "S3"]))
            .await;
        finish_track(&mut session, &node).await; // -> S2

        session
            .unskip(SkipMode::Track, PositionControls::default())
            .await;
        finish_track(&mut session, &node).await;

        let current = session.manager().current().unwrap();
        match current.queueable() {
            Queueable::Collection(c) => assert_eq!(c.index(), 0),
            _ => unreachable!(),
        }
        assert_eq!(node.played().last().unwrap(), "https://example.com/S1");
    }

    #[tokio::test]
    async fn test_replay_collection_restarts_from_first_track() {
        let (mut session, node, _) = fixture();
        session
            .receive_listing(collection_listing("Album", &["S1", "S2", "S3"]))
            .await;
        finish_track(&mut session, &node).await; // -> S2

        session.replay(SkipMode::Collection).await;

        let current = session.manager().current().unwrap();
        match current.queueable() {
            Queueable::Collection(c) => assert_eq!(c.index(), 0),
            _ => unreachable!(),
        }
        assert_eq!(node.played().last().unwrap(), "https://example.com/S1");
    }

    #[tokio::test]
    async fn test_resolution_failure_auto_advances() {
        let (mut session, node, notifier) = fixture();
        node.fail_url("https://example.com/Rota");
        session.receive_listing(song_listing("A")).await;
        session.receive_listing(song_listing("Rota")).await;
        session.receive_listing(song_listing("C")).await;

        finish_track(&mut session, &node).await;

        // La rota se salta sin estancar la reproducción
        assert_eq!(session.manager().current().unwrap().title(), "C");
        assert!(notifier
            .notices()
            .iter()
            .any(|n| matches!(n, Notice::ResolutionFailed { title } if title == "Rota")));
        assert_eq!(
            node.played().last().unwrap(),
            "https://example.com/C"
        );
    }

    #[tokio::test]
    async fn test_stale_end_callback_is_ignored() {
        let (mut session, node, _) = fixture();
        session.receive_listing(song_listing("A")).await;
        session.receive_listing(song_listing("B")).await;

        session.handle_track_end(0).await; // generación vieja

        assert_eq!(session.manager().current().unwrap().title(), "A");
        assert_eq!(node.played().len(), 1);
    }

    #[tokio::test]
    async fn test_exception_clears_loop_and_notifies() {
        let (mut session, node, notifier) = fixture();
        session.receive_listing(song_listing("A")).await;
        session.set_loop(LoopScope::Playable, true);
        let generation = node.last_ticket().unwrap().generation;

        session.handle_track_exception(generation, "buffer agotado").await;

        let current = session.manager().current().unwrap();
        assert!(!current.queueable().playable_is_looping());
        assert!(notifier
            .notices()
            .iter()
            .any(|n| matches!(n, Notice::PlaybackFailed { .. })));

        // El fin del mismo track avanza en vez de repetir
        finish_track(&mut session, &node).await;
        assert!(session.manager().current().is_none());
    }

    #[tokio::test]
    async fn test_looping_collection_with_all_tracks_broken_terminates() {
        let (mut session, node, notifier) = fixture();
        node.fail_url("https://example.com/R1");
        node.fail_url("https://example.com/R2");
        let mut listing = collection_listing("Bloqueada", &["R1", "R2"]);
        listing
            .queueable_mut()
            .set_looping(LoopScope::Collection, true);

        session.receive_listing(listing).await;

        // Cada pista falló una vez y la colección terminó archivada
        assert!(session.manager().current().is_none());
        assert_eq!(session.manager().history().len(), 1);
        assert!(node.played().is_empty());
        assert!(notifier
            .notices()
            .iter()
            .any(|n| matches!(n, Notice::ResolutionFailed { .. })));
    }

    #[tokio::test]
    async fn test_frozen_session_ignores_exception_callback() {
        let (mut session, node, notifier) = fixture();
        session.receive_listing(song_listing("A")).await;
        session.set_loop(LoopScope::Playable, true);
        let generation = node.last_ticket().unwrap().generation;

        session.freeze();
        session
            .handle_track_exception(generation, "conexión caída")
            .await;

        let current = session.manager().current().unwrap();
        assert!(current.queueable().playable_is_looping());
        assert!(!notifier
            .notices()
            .iter()
            .any(|n| matches!(n, Notice::PlaybackFailed { .. })));
    }

    #[tokio::test]
    async fn test_freeze_preserves_state_and_restore_resumes() {
        let (mut session, node, _) = fixture();
        session.receive_listing(song_listing("A")).await;
        session.receive_listing(song_listing("B")).await;

        session.freeze();
        let generation = node.last_ticket().unwrap().generation;
        session.handle_track_end(generation).await; // congelada: no muta

        assert!(session.is_disconnected());
        assert_eq!(session.manager().current().unwrap().title(), "A");
        assert_eq!(pending_titles(&session), vec!["B"]);

        session.restore().await;

        assert!(!session.is_disconnected());
        assert_eq!(session.manager().current().unwrap().title(), "A");
        assert_eq!(
            node.played(),
            vec!["https://example.com/A", "https://example.com/A"]
        );
    }

    #[tokio::test]
    async fn test_stream_title_backfills_on_load() {
        let (mut session, _, _) = fixture();
        let listing = SongListing::new(
            Queueable::Stream(AudioStream::new("https://radio.example.com/live")),
            UserId::new(1),
        );

        session.receive_listing(listing).await;

        let current = session.manager().current().unwrap();
        assert_eq!(
            current.queueable().playable().title(),
            "t:https://radio.example.com/live"
        );
    }

    #[tokio::test]
    async fn test_search_song_title_backfills_on_load() {
        let (mut session, _, _) = fixture();
        let listing = SongListing::new(
            Queueable::Song(Song::new("lofi beats", "lofi beats")),
            UserId::new(1),
        );

        session.receive_listing(listing).await;

        let current = session.manager().current().unwrap();
        assert_eq!(current.queueable().playable().title(), "t:lofi beats");
    }

    #[tokio::test]
    async fn test_set_paused_forwards_to_node() {
        let mut mock = MockAudioNode::new();
        mock.expect_set_paused()
            .withf(|paused| *paused)
            .times(1)
            .returning(|_| Ok(()));
        let notifier = Arc::new(RecordingNotifier::default());
        let mut session = session_with(Arc::new(mock), notifier);

        session.set_paused(true).await.unwrap();
    }

    #[tokio::test]
    async fn test_seek_forwards_to_node() {
        let mut mock = MockAudioNode::new();
        mock.expect_seek_to()
            .withf(|position| *position == Duration::from_secs(42))
            .times(1)
            .returning(|_| Ok(()));
        let notifier = Arc::new(RecordingNotifier::default());
        let mut session = session_with(Arc::new(mock), notifier);

        session.seek_to(Duration::from_secs(42)).await.unwrap();
    }

    #[tokio::test]
    async fn test_set_loop_without_current_is_refused() {
        let (mut session, _, _) = fixture();
        assert!(!session.set_loop(LoopScope::Playable, true));
    }

    #[test]
    fn test_collection_helper_builds_valid_cursor() {
        let collection = SongCollection::new(
            "Album",
            "https://example.com/Album",
            vec![Song::new("S1", "u1")],
        )
        .unwrap();
        assert_eq!(collection.index(), 0);
        assert!(collection.is_last_track());
    }
}
