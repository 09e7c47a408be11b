//! Subscriber registry
//!
//! The set of subscribers eligible for future broadcasts. Owned and mutated
//! only by the router task, so it needs no lock of its own.

use std::collections::HashMap;

use super::entry::Subscriber;
use super::error::DeliveryError;
use super::frame::{BroadcastFrame, SubscriberId};

/// Map of live subscribers keyed by identity
#[derive(Debug, Default)]
pub struct Registry {
    subscribers: HashMap<SubscriberId, Subscriber>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a subscriber
    ///
    /// Returns the previous entry with the same identity, if any. The caller
    /// decides what to do with the replaced subscriber.
    pub fn insert(&mut self, subscriber: Subscriber) -> Option<Subscriber> {
        self.subscribers.insert(subscriber.id(), subscriber)
    }

    /// Remove a subscriber, marking it dead
    ///
    /// Removing an absent identity is a no-op and returns `None`.
    pub fn remove(&mut self, id: SubscriberId) -> Option<Subscriber> {
        let subscriber = self.subscribers.remove(&id)?;
        subscriber.close();
        Some(subscriber)
    }

    /// Offer a frame to every subscriber without blocking
    ///
    /// Returns the subscribers that could not accept it, in no particular
    /// order. Nothing is removed here.
    pub fn offer_all(&self, frame: &BroadcastFrame) -> (usize, Vec<(SubscriberId, DeliveryError)>) {
        let mut delivered = 0;
        let mut failed = Vec::new();

        for (id, subscriber) in &self.subscribers {
            match subscriber.offer(frame.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => failed.push((*id, e)),
            }
        }

        (delivered, failed)
    }

    /// Remove and close every subscriber
    pub fn drain(&mut self) -> Vec<Subscriber> {
        let drained: Vec<Subscriber> = self.subscribers.drain().map(|(_, s)| s).collect();
        for subscriber in &drained {
            subscriber.close();
        }
        drained
    }

    pub fn contains(&self, id: SubscriberId) -> bool {
        self.subscribers.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Identities currently registered, sorted
    pub fn ids(&self) -> Vec<SubscriberId> {
        let mut ids: Vec<SubscriberId> = self.subscribers.keys().copied().collect();
        ids.sort();
        ids
    }
}
