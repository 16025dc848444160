use chrono::{DateTime, Utc};
use serenity::model::id::UserId;

/// Canción individual con título y URL conocidos
#[derive(Debug, Clone, PartialEq)]
pub struct Song {
    title: String,
    url: String,
    looping: bool,
}

impl Song {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            looping: false,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Completa el título cuando todavía es la consulta cruda del
    /// pedido (título == URL); un título real nunca se pisa
    pub fn resolve_title(&mut self, title: impl Into<String>) {
        if self.title == self.url {
            self.title = title.into();
        }
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    pub fn reset(&mut self) {
        self.looping = false;
    }
}

/// Transmisión en vivo; el título se resuelve cuando el track carga
#[derive(Debug, Clone, PartialEq)]
pub struct AudioStream {
    url: String,
    title: Option<String>,
    looping: bool,
}

impl AudioStream {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: None,
            looping: false,
        }
    }

    /// Título resuelto, o la URL mientras no se conozca
    pub fn title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.url)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Fija el título la primera vez que el nodo carga el track
    pub fn resolve_title(&mut self, title: impl Into<String>) {
        if self.title.is_none() {
            self.title = Some(title.into());
        }
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    pub fn reset(&mut self) {
        self.looping = false;
    }
}

/// Lista ordenada de canciones con un cursor a la que está sonando.
///
/// Invariante: `0 <= index < songs.len()` siempre; las colecciones
/// vacías no son construibles.
#[derive(Debug, Clone, PartialEq)]
pub struct SongCollection {
    title: String,
    url: String,
    songs: Vec<Song>,
    index: usize,
    looping: bool,
}

impl SongCollection {
    pub fn new(
        title: impl Into<String>,
        url: impl Into<String>,
        songs: Vec<Song>,
    ) -> Option<Self> {
        if songs.is_empty() {
            return None;
        }
        Some(Self {
            title: title.into(),
            url: url.into(),
            songs,
            index: 0,
            looping: false,
        })
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.songs.len()
    }

    /// Canción bajo el cursor
    pub fn current_song(&self) -> &Song {
        &self.songs[self.index]
    }

    pub fn current_song_mut(&mut self) -> &mut Song {
        &mut self.songs[self.index]
    }

    pub fn is_last_track(&self) -> bool {
        self.index + 1 == self.songs.len()
    }

    /// Avanza el cursor; devuelve `false` si ya estaba en la última
    pub fn advance_track(&mut self) -> bool {
        if self.is_last_track() {
            return false;
        }
        self.index += 1;
        true
    }

    /// Mueve el cursor a una posición concreta; rechaza fuera de rango
    pub fn jump_to(&mut self, index: usize) -> bool {
        if index >= self.songs.len() {
            return false;
        }
        self.index = index;
        true
    }

    pub fn rewind(&mut self) {
        self.index = 0;
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    /// Vuelve al inicio y limpia el loop de la colección y de cada canción
    pub fn reset(&mut self) {
        self.index = 0;
        self.looping = false;
        for song in &mut self.songs {
            song.reset();
        }
    }
}

/// Ámbito de un cambio de loop pedido por el usuario
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopScope {
    /// El playable actual (canción o stream)
    Playable,
    /// La colección completa
    Collection,
}

/// Unidad reproducible: canción suelta, stream o colección.
///
/// Unión cerrada: cada punto de decisión del motor hace `match`
/// exhaustivo, así que agregar una variante es un cambio verificado
/// por el compilador.
#[derive(Debug, Clone, PartialEq)]
pub enum Queueable {
    Song(Song),
    Stream(AudioStream),
    Collection(SongCollection),
}

impl Queueable {
    pub fn title(&self) -> &str {
        match self {
            Queueable::Song(song) => song.title(),
            Queueable::Stream(stream) => stream.title(),
            Queueable::Collection(collection) => collection.title(),
        }
    }

    pub fn url(&self) -> &str {
        match self {
            Queueable::Song(song) => song.url(),
            Queueable::Stream(stream) => stream.url(),
            Queueable::Collection(collection) => collection.url(),
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            Queueable::Song(_) => "🎵",
            Queueable::Stream(_) => "📻",
            Queueable::Collection(_) => "🎶",
        }
    }

    /// Vista del playable efectivo: la hoja misma, o `songs[index]`
    pub fn playable(&self) -> Playable<'_> {
        match self {
            Queueable::Song(song) => Playable::Song(song),
            Queueable::Stream(stream) => Playable::Stream(stream),
            Queueable::Collection(collection) => Playable::Song(collection.current_song()),
        }
    }

    /// Loop del playable efectivo (nivel canción, no colección)
    pub fn playable_is_looping(&self) -> bool {
        match self {
            Queueable::Song(song) => song.is_looping(),
            Queueable::Stream(stream) => stream.is_looping(),
            Queueable::Collection(collection) => collection.current_song().is_looping(),
        }
    }

    /// Limpia el loop del playable efectivo
    pub fn clear_playable_loop(&mut self) {
        match self {
            Queueable::Song(song) => song.set_looping(false),
            Queueable::Stream(stream) => stream.set_looping(false),
            Queueable::Collection(collection) => collection.current_song_mut().set_looping(false),
        }
    }

    /// Cambia el loop en el ámbito pedido; colecciones sin el ámbito
    /// de colección caen al playable efectivo
    pub fn set_looping(&mut self, scope: LoopScope, looping: bool) {
        match (self, scope) {
            (Queueable::Collection(collection), LoopScope::Collection) => {
                collection.set_looping(looping)
            }
            (Queueable::Collection(collection), LoopScope::Playable) => {
                collection.current_song_mut().set_looping(looping)
            }
            (Queueable::Song(song), _) => song.set_looping(looping),
            (Queueable::Stream(stream), _) => stream.set_looping(looping),
        }
    }

    pub fn reset(&mut self) {
        match self {
            Queueable::Song(song) => song.reset(),
            Queueable::Stream(stream) => stream.reset(),
            Queueable::Collection(collection) => collection.reset(),
        }
    }
}

/// Referencia al track concreto que el nodo debe reproducir
#[derive(Debug, Clone, Copy)]
pub enum Playable<'a> {
    Song(&'a Song),
    Stream(&'a AudioStream),
}

impl Playable<'_> {
    pub fn title(&self) -> &str {
        match self {
            Playable::Song(song) => song.title(),
            Playable::Stream(stream) => stream.title(),
        }
    }

    pub fn url(&self) -> &str {
        match self {
            Playable::Song(song) => song.url(),
            Playable::Stream(stream) => stream.url(),
        }
    }

    pub fn is_looping(&self) -> bool {
        match self {
            Playable::Song(song) => song.is_looping(),
            Playable::Stream(stream) => stream.is_looping(),
        }
    }
}

/// Un Queueable ligado a la identidad de quien lo pidió
#[derive(Debug, Clone, PartialEq)]
pub struct SongListing {
    queueable: Queueable,
    requested_by: UserId,
    source: Option<String>,
    added_at: DateTime<Utc>,
}

impl SongListing {
    pub fn new(queueable: Queueable, requested_by: UserId) -> Self {
        Self {
            queueable,
            requested_by,
            source: None,
            added_at: Utc::now(),
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn queueable(&self) -> &Queueable {
        &self.queueable
    }

    pub fn queueable_mut(&mut self) -> &mut Queueable {
        &mut self.queueable
    }

    pub fn requested_by(&self) -> UserId {
        self.requested_by
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn added_at(&self) -> DateTime<Utc> {
        self.added_at
    }

    pub fn title(&self) -> &str {
        self.queueable.title()
    }
}
