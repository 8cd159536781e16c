//! Publish/subscribe message channel with self-healing membership.
//!
//! Broadcast holds the subscriber lock for the whole loop, so subscription
//! changes cannot interleave with a fan-out. Subscribers whose transport is
//! no longer active (or whose send fails) are collected during the loop and
//! unsubscribed after it, with the `SubscriberTransportHasBeenStopped`
//! reason; failures never propagate to the publisher.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::message::{Message, SessionId};
use crate::session::Session;
use crate::util::run_callback;

/// Why a subscriber left the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReasonForLeaving {
    Unknown,
    SubscriberTransportHasBeenStopped,
    SubscriberLeftChannelOnHisOwn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscribeResult {
    Done,
    AlreadySubscribed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnsubscribeResult {
    Done,
    NotFound,
}

type UnsubscribeHandler = Box<dyn Fn(&Arc<Session>, ReasonForLeaving) + Send + Sync>;

/// Fan-out broadcast primitive over sessions.
///
/// Subscribers are unique by [`SessionId`].
#[derive(Default)]
pub struct PubSubChannel {
    subscribers: Mutex<HashMap<SessionId, Arc<Session>>>,
    on_unsubscribed: Mutex<Option<UnsubscribeHandler>>,
}

impl PubSubChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, subscriber: &Arc<Session>) -> SubscribeResult {
        let mut subscribers = self.subscribers.lock();
        match subscribers.entry(subscriber.id()) {
            std::collections::hash_map::Entry::Occupied(_) => SubscribeResult::AlreadySubscribed,
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(subscriber.clone());
                SubscribeResult::Done
            }
        }
    }

    pub fn unsubscribe(&self, subscriber: &Arc<Session>) -> UnsubscribeResult {
        let mut subscribers = self.subscribers.lock();
        self.remove_locked(
            &mut subscribers,
            subscriber.id(),
            ReasonForLeaving::SubscriberLeftChannelOnHisOwn,
        )
    }

    /// Broadcasts a clone of `msg` (with a fresh message id) to every
    /// active subscriber.
    pub fn send(&self, msg: &Message) {
        self.fan_out(|_| msg.clone());
    }

    /// Broadcasts a per-subscriber message obtained from `producer`.
    pub fn publish_with_producer(&self, mut producer: impl FnMut(&Arc<Session>) -> Message) {
        self.fan_out(&mut producer);
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    pub fn is_subscribed(&self, id: SessionId) -> bool {
        self.subscribers.lock().contains_key(&id)
    }

    /// Invoked whenever a subscriber leaves, on every removal path.
    pub fn set_on_unsubscribed(
        &self,
        handler: impl Fn(&Arc<Session>, ReasonForLeaving) + Send + Sync + 'static,
    ) {
        *self.on_unsubscribed.lock() = Some(Box::new(handler));
    }

    fn fan_out(&self, mut producer: impl FnMut(&Arc<Session>) -> Message) {
        let mut subscribers = self.subscribers.lock();

        let mut broken: Vec<SessionId> = Vec::new();
        for (id, subscriber) in subscribers.iter() {
            if !subscriber.active() {
                broken.push(*id);
                continue;
            }
            if let Err(e) = subscriber.send(producer(subscriber)) {
                debug!("send to subscriber {id} failed: {e}");
                broken.push(*id);
            }
        }

        for id in broken {
            self.remove_locked(
                &mut subscribers,
                id,
                ReasonForLeaving::SubscriberTransportHasBeenStopped,
            );
        }
    }

    fn remove_locked(
        &self,
        subscribers: &mut HashMap<SessionId, Arc<Session>>,
        id: SessionId,
        reason: ReasonForLeaving,
    ) -> UnsubscribeResult {
        match subscribers.remove(&id) {
            Some(subscriber) => {
                debug!("subscriber {id} left: {reason:?}");
                if let Some(handler) = self.on_unsubscribed.lock().as_ref() {
                    run_callback("on_unsubscribed", || handler(&subscriber, reason));
                }
                UnsubscribeResult::Done
            }
            None => UnsubscribeResult::NotFound,
        }
    }
}

impl std::fmt::Debug for PubSubChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PubSubChannel")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
