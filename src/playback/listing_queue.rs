use std::collections::VecDeque;

use tracing::debug;

use crate::playback::queueable::SongListing;

/// Política cuando el buffer está lleno
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverflowMode {
    /// La inserción se rechaza (devuelve `false`, nunca un error)
    Reject,
    /// Se desaloja el extremo opuesto para hacer lugar
    EvictOldest,
}

/// Buffer acotado de listings que preserva el orden de inserción.
///
/// Invariante: `len() <= capacity` siempre.
#[derive(Debug)]
pub struct ListingQueue {
    items: VecDeque<SongListing>,
    capacity: usize,
    overflow: OverflowMode,
}

impl ListingQueue {
    pub fn new(capacity: usize, overflow: OverflowMode) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity.min(64)),
            capacity,
            overflow,
        }
    }

    /// Agrega al final (lo más nuevo); en modo `EvictOldest` un buffer
    /// lleno desaloja el frente
    pub fn add_new(&mut self, listing: SongListing) -> bool {
        if self.is_full() {
            match self.overflow {
                OverflowMode::Reject => {
                    debug!("📦 Cola llena ({}), inserción rechazada", self.capacity);
                    return false;
                }
                OverflowMode::EvictOldest => {
                    self.items.pop_front();
                }
            }
        }
        self.items.push_back(listing);
        true
    }

    /// Agrega al frente (lo más viejo); en modo `EvictOldest` un buffer
    /// lleno desaloja el final
    pub fn add_old(&mut self, listing: SongListing) -> bool {
        if self.is_full() {
            match self.overflow {
                OverflowMode::Reject => {
                    debug!("📦 Cola llena ({}), inserción rechazada", self.capacity);
                    return false;
                }
                OverflowMode::EvictOldest => {
                    self.items.pop_back();
                }
            }
        }
        self.items.push_front(listing);
        true
    }

    /// Saca la entrada más vieja; el llamador debe chequear `is_empty`
    pub fn remove_oldest(&mut self) -> Option<SongListing> {
        self.items.pop_front()
    }

    /// Saca la entrada más nueva; el llamador debe chequear `is_empty`
    pub fn remove_newest(&mut self) -> Option<SongListing> {
        self.items.pop_back()
    }

    /// Saca una entrada puntual, o `None` fuera de rango
    pub fn remove_at(&mut self, index: usize) -> Option<SongListing> {
        self.items.remove(index)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.items.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &SongListing> {
        self.items.iter()
    }

    pub fn front(&self) -> Option<&SongListing> {
        self.items.front()
    }
}
