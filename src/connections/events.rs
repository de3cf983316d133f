//! Event handlers notified of every mutation of a [`Connections`] store.

use super::Connections;
use crate::error::{DendriteError, Result};
use crate::types::{Permanence, Segment, Synapse};

use std::fmt;
use tracing::debug;

/// Receives notifications about changes to a [`Connections`] store.
///
/// Every hook has an empty default body, so a handler only implements the
/// events it cares about. Hooks run synchronously, in subscription order,
/// after the mutation has been applied. When a segment is destroyed, the
/// destroy notification of each of its synapses arrives before the segment's.
pub trait ConnectionsEventHandler: Send {
    /// Called after a segment is created.
    fn on_create_segment(&mut self, _segment: Segment) {}

    /// Called after a segment is destroyed.
    fn on_destroy_segment(&mut self, _segment: Segment) {}

    /// Called after a synapse is created.
    fn on_create_synapse(&mut self, _synapse: Synapse) {}

    /// Called after a synapse is destroyed.
    fn on_destroy_synapse(&mut self, _synapse: Synapse) {}

    /// Called after a synapse permanence is written, with the stored value.
    fn on_update_synapse_permanence(&mut self, _synapse: Synapse, _permanence: Permanence) {}
}

/// Identifies a subscribed handler. Returned by [`Connections::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionToken(u32);

impl fmt::Display for SubscriptionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Owned handlers in subscription order.
#[derive(Default)]
pub(super) struct EventBroadcaster {
    handlers: Vec<(SubscriptionToken, Box<dyn ConnectionsEventHandler>)>,
    next_token: u32,
}

impl EventBroadcaster {
    fn subscribe(&mut self, handler: Box<dyn ConnectionsEventHandler>) -> SubscriptionToken {
        let token = SubscriptionToken(self.next_token);
        self.next_token += 1;
        self.handlers.push((token, handler));
        token
    }

    fn unsubscribe(
        &mut self,
        token: SubscriptionToken,
    ) -> Option<Box<dyn ConnectionsEventHandler>> {
        let pos = self.handlers.iter().position(|(t, _)| *t == token)?;
        Some(self.handlers.remove(pos).1)
    }

    /// Invokes `f` on every handler, in subscription order.
    #[inline]
    pub fn notify<F>(&mut self, mut f: F)
    where
        F: FnMut(&mut dyn ConnectionsEventHandler),
    {
        for (_, handler) in &mut self.handlers {
            f(handler.as_mut());
        }
    }
}

impl fmt::Debug for EventBroadcaster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBroadcaster")
            .field("handlers", &self.handlers.len())
            .field("next_token", &self.next_token)
            .finish()
    }
}

impl Connections {
    /// Subscribes an event handler. The store takes ownership of it.
    pub fn subscribe(&mut self, handler: Box<dyn ConnectionsEventHandler>) -> SubscriptionToken {
        let token = self.events.subscribe(handler);
        debug!(%token, "subscribed connections event handler");
        token
    }

    /// Unsubscribes and drops the handler registered under `token`.
    ///
    /// # Errors
    ///
    /// Returns `DendriteError::UnknownSubscription` if no handler is
    /// registered under `token`.
    pub fn unsubscribe(&mut self, token: SubscriptionToken) -> Result<()> {
        let handler = self
            .events
            .unsubscribe(token)
            .ok_or(DendriteError::UnknownSubscription(token))?;
        drop(handler);

        debug!(%token, "unsubscribed connections event handler");
        Ok(())
    }

    /// Returns the number of subscribed handlers.
    pub fn num_subscribers(&self) -> usize {
        self.events.handlers.len()
    }
}
