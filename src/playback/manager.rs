use tracing::debug;

use crate::playback::{
    listing_queue::{ListingQueue, OverflowMode},
    queueable::SongListing,
};

/// Compone la cola pendiente, el historial y el slot "actual".
///
/// Invariante: un listing vive en exactamente uno de
/// {pendiente, historial, actual} a la vez; los movimientos toman el
/// valor por propiedad, nunca lo copian.
#[derive(Debug)]
pub struct ListingManager {
    pending: ListingQueue,
    history: ListingQueue,
    current: Option<SongListing>,
}

impl ListingManager {
    pub fn new(max_queue: usize, max_history: usize) -> Self {
        Self {
            pending: ListingQueue::new(max_queue, OverflowMode::Reject),
            history: ListingQueue::new(max_history, OverflowMode::EvictOldest),
            current: None,
        }
    }

    pub fn current(&self) -> Option<&SongListing> {
        self.current.as_ref()
    }

    pub fn current_mut(&mut self) -> Option<&mut SongListing> {
        self.current.as_mut()
    }

    pub fn pending(&self) -> &ListingQueue {
        &self.pending
    }

    pub fn history(&self) -> &ListingQueue {
        &self.history
    }

    /// Encola un listing nuevo al final de pendientes; `false` si la
    /// cola está llena (modo reject)
    pub fn enqueue(&mut self, listing: SongListing) -> bool {
        self.pending.add_new(listing)
    }

    /// Archiva el actual en el historial, limpiando su estado de loop
    pub fn move_current_to_history(&mut self) {
        if let Some(mut listing) = self.current.take() {
            listing.queueable_mut().reset();
            debug!("📜 Archivando en historial: {}", listing.title());
            self.history.add_new(listing);
        }
    }

    /// Devuelve el actual al frente de pendientes ("suena de nuevo
    /// después"), limpiando su estado de loop
    pub fn move_current_to_queue(&mut self) {
        if let Some(mut listing) = self.current.take() {
            listing.queueable_mut().reset();
            debug!("↩️ Reencolando al frente: {}", listing.title());
            self.pending.add_old(listing);
        }
    }

    /// Promueve la entrada pendiente más vieja al slot actual;
    /// `false` si no había nada pendiente
    pub fn take_current_from_queue(&mut self) -> bool {
        debug_assert!(self.current.is_none(), "slot actual ya ocupado");
        match self.pending.remove_oldest() {
            Some(listing) => {
                self.current = Some(listing);
                true
            }
            None => false,
        }
    }

    /// Migra hasta `count` pendientes al historial, de a una para
    /// preservar el orden relativo; devuelve cuántas movió
    pub fn move_from_queue_to_history(&mut self, count: usize) -> usize {
        let moving = count.min(self.pending.len());
        for _ in 0..moving {
            if let Some(listing) = self.pending.remove_oldest() {
                self.history.add_new(listing);
            }
        }
        moving
    }

    /// Trae hasta `count` entradas del historial al frente de
    /// pendientes preservando su orden relativo. Corta antes si
    /// pendientes se llena: un listing nunca se descarta en silencio.
    pub fn move_from_history_to_queue(&mut self, count: usize) -> usize {
        let mut moved = 0;
        for _ in 0..count.min(self.history.len()) {
            if self.pending.is_full() {
                break;
            }
            if let Some(listing) = self.history.remove_newest() {
                self.pending.add_old(listing);
                moved += 1;
            }
        }
        moved
    }
}
