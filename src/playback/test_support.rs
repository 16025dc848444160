//! Fakes compartidos por los tests de sesión y servicio.

use std::{collections::HashSet, sync::Arc, time::Duration};

use async_trait::async_trait;
use parking_lot::Mutex as SyncMutex;
use serenity::model::id::{ChannelId, GuildId, UserId};

use crate::playback::{
    node::{AudioNode, NodeError, PlaybackEventSink, PlaybackTicket, Track, VoiceConnector},
    notify::{Notice, Notifier},
    queueable::{Queueable, Song, SongCollection, SongListing},
};

pub fn song_listing(name: &str) -> SongListing {
    SongListing::new(
        Queueable::Song(Song::new(name, format!("https://example.com/{name}"))),
        UserId::new(1),
    )
}

pub fn collection_listing(title: &str, names: &[&str]) -> SongListing {
    let songs = names
        .iter()
        .map(|name| Song::new(*name, format!("https://example.com/{name}")))
        .collect();
    let collection = SongCollection::new(title, format!("https://example.com/{title}"), songs)
        .expect("colección de test no vacía");
    SongListing::new(Queueable::Collection(collection), UserId::new(1))
}

/// Nodo que resuelve todo al instante y registra cada orden recibida
#[derive(Default)]
pub struct FakeNode {
    failing: SyncMutex<HashSet<String>>,
    played: SyncMutex<Vec<String>>,
    stops: SyncMutex<usize>,
    volumes: SyncMutex<Vec<f32>>,
    last_ticket: SyncMutex<Option<PlaybackTicket>>,
}

impl FakeNode {
    /// Marca una URL como irresoluble
    pub fn fail_url(&self, url: &str) {
        self.failing.lock().insert(url.to_string());
    }

    pub fn played(&self) -> Vec<String> {
        self.played.lock().clone()
    }

    pub fn stops(&self) -> usize {
        *self.stops.lock()
    }

    pub fn volumes(&self) -> Vec<f32> {
        self.volumes.lock().clone()
    }

    pub fn last_ticket(&self) -> Option<PlaybackTicket> {
        *self.last_ticket.lock()
    }
}

#[async_trait]
impl AudioNode for FakeNode {
    async fn resolve(&self, query: &str) -> Result<Option<Track>, NodeError> {
        if self.failing.lock().contains(query) {
            return Ok(None);
        }
        Ok(Some(Track {
            url: query.to_string(),
            title: Some(format!("t:{query}")),
            duration: None,
        }))
    }

    async fn play_track(&self, track: &Track, ticket: PlaybackTicket) -> Result<(), NodeError> {
        self.played.lock().push(track.url.clone());
        *self.last_ticket.lock() = Some(ticket);
        Ok(())
    }

    async fn stop_track(&self) -> Result<(), NodeError> {
        *self.stops.lock() += 1;
        Ok(())
    }

    async fn seek_to(&self, _position: Duration) -> Result<(), NodeError> {
        Ok(())
    }

    async fn set_paused(&self, _paused: bool) -> Result<(), NodeError> {
        Ok(())
    }

    async fn set_volume(&self, volume: f32) -> Result<(), NodeError> {
        self.volumes.lock().push(volume);
        Ok(())
    }
}

/// Conector que entrega siempre el mismo nodo fake
pub struct FakeConnector {
    pub node: Arc<FakeNode>,
    joins: SyncMutex<Vec<(GuildId, ChannelId)>>,
    leaves: SyncMutex<Vec<GuildId>>,
}

impl FakeConnector {
    pub fn new(node: Arc<FakeNode>) -> Self {
        Self {
            node,
            joins: SyncMutex::new(Vec::new()),
            leaves: SyncMutex::new(Vec::new()),
        }
    }

    pub fn joins(&self) -> Vec<(GuildId, ChannelId)> {
        self.joins.lock().clone()
    }

    pub fn leaves(&self) -> Vec<GuildId> {
        self.leaves.lock().clone()
    }
}

#[async_trait]
impl VoiceConnector for FakeConnector {
    async fn join(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        _sink: Arc<dyn PlaybackEventSink>,
    ) -> Result<Arc<dyn AudioNode>, NodeError> {
        self.joins.lock().push((guild_id, channel_id));
        Ok(self.node.clone())
    }

    async fn current(
        &self,
        _guild_id: GuildId,
        _sink: Arc<dyn PlaybackEventSink>,
    ) -> Option<Arc<dyn AudioNode>> {
        Some(self.node.clone())
    }

    async fn leave(&self, guild_id: GuildId) -> Result<(), NodeError> {
        self.leaves.lock().push(guild_id);
        Ok(())
    }
}

/// Notifier que acumula los avisos para inspección
#[derive(Default)]
pub struct RecordingNotifier {
    notices: SyncMutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, _channel: ChannelId, notice: Notice) {
        self.notices.lock().push(notice);
    }
}
