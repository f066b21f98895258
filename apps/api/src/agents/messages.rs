// Inter-agent message bus
//
// Deliveries are serialized: while one delivery is in flight, further sends
// are queued and the nested caller gets `Delivery::Queued` instead of a reply.
// Per-recipient order is FIFO. A drain reports the reply to the sender's own
// message, never one addressed to somebody else further down the queue.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, RwLock};
use tracing::debug;

use super::errors::AgentResult;
use super::events::{AgentEvent, EventSink};
use crate::domain::message::MessageTarget;
use crate::domain::role::AgentRole;

/// Something that can receive a message addressed to a role
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, from: AgentRole, text: &str) -> AgentResult<String>;
}

/// Outcome of `MessageBus::send`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// The queue was drained; this is the recipient's reply to this message
    /// (empty if the recipient was not registered)
    Replied(String),
    /// Another delivery was in flight; the message will be delivered by it
    /// and its reply is not reported back
    Queued,
}

impl Delivery {
    pub fn reply(&self) -> Option<&str> {
        match self {
            Delivery::Replied(reply) => Some(reply),
            Delivery::Queued => None,
        }
    }
}

#[derive(Debug, Clone)]
struct Envelope {
    seq: u64,
    from: AgentRole,
    to: AgentRole,
    text: String,
}

#[derive(Default)]
struct Mailbox {
    queue: VecDeque<Envelope>,
    in_flight: bool,
    next_seq: u64,
}

pub struct MessageBus {
    handlers: RwLock<HashMap<AgentRole, Arc<dyn MessageHandler>>>,
    mailbox: Mutex<Mailbox>,
    events: EventSink,
}

/// Clears the in-flight flag if a drain is abandoned early
struct InFlightGuard<'a> {
    bus: &'a MessageBus,
    armed: bool,
}

impl InFlightGuard<'_> {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Ok(mut mailbox) = self.bus.mailbox.lock() {
            mailbox.in_flight = false;
        }
    }
}

impl MessageBus {
    pub fn new(events: EventSink) -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
            mailbox: Mutex::new(Mailbox::default()),
            events,
        }
    }

    /// Bind a role to its handler, replacing any previous binding
    pub fn register(&self, role: AgentRole, handler: Arc<dyn MessageHandler>) {
        if let Ok(mut handlers) = self.handlers.write() {
            handlers.insert(role, handler);
        }
    }

    fn handler(&self, role: AgentRole) -> Option<Arc<dyn MessageHandler>> {
        self.handlers
            .read()
            .ok()
            .and_then(|handlers| handlers.get(&role).cloned())
    }

    fn registered_roles(&self) -> Vec<AgentRole> {
        let mut roles: Vec<AgentRole> = self
            .handlers
            .read()
            .map(|handlers| handlers.keys().copied().collect())
            .unwrap_or_default();
        roles.sort();
        roles
    }

    /// Number of messages waiting for delivery
    pub fn pending(&self) -> usize {
        self.mailbox.lock().map(|m| m.queue.len()).unwrap_or(0)
    }

    /// Send `text` from one role to another
    ///
    /// Emits the message event immediately. If nothing is in flight the call
    /// drains the whole queue in arrival order and returns the recipient's
    /// reply to this message.
    /// A handler error stops the drain; entries still queued are delivered by
    /// the next drain.
    pub async fn send(&self, from: AgentRole, to: AgentRole, text: &str) -> AgentResult<Delivery> {
        self.events.emit(AgentEvent::Message {
            from,
            to: MessageTarget::Agent(to),
            text: text.to_string(),
        });

        let (seq, start_drain) = {
            let mut mailbox = self
                .mailbox
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            let seq = mailbox.next_seq;
            mailbox.next_seq += 1;
            mailbox.queue.push_back(Envelope {
                seq,
                from,
                to,
                text: text.to_string(),
            });
            let start = !mailbox.in_flight;
            mailbox.in_flight = true;
            (seq, start)
        };

        if !start_drain {
            debug!(%from, %to, "Delivery in flight, message queued");
            return Ok(Delivery::Queued);
        }

        self.drain(seq).await.map(Delivery::Replied)
    }

    /// Pops the next envelope, or clears the in-flight flag when the queue is
    /// empty. Both happen under one lock so no send can slip in between.
    fn next_envelope(&self) -> Option<Envelope> {
        let mut mailbox = self
            .mailbox
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let next = mailbox.queue.pop_front();
        if next.is_none() {
            mailbox.in_flight = false;
        }
        next
    }

    /// Delivers until the queue is empty and returns the reply to envelope `own`
    async fn drain(&self, own: u64) -> AgentResult<String> {
        let mut guard = InFlightGuard {
            bus: self,
            armed: true,
        };
        let mut own_reply = String::new();

        while let Some(envelope) = self.next_envelope() {
            match self.handler(envelope.to) {
                Some(handler) => {
                    debug!(from = %envelope.from, to = %envelope.to, "Delivering message");
                    let reply = handler.handle(envelope.from, &envelope.text).await?;
                    if envelope.seq == own {
                        own_reply = reply;
                    }
                }
                None => {
                    debug!(to = %envelope.to, "No handler registered, message dropped");
                }
            }
        }

        // The queue is empty and the flag already cleared
        guard.disarm();
        Ok(own_reply)
    }

    /// Deliver `text` to every registered role except the sender, one after
    /// the other, and collect the replies
    pub async fn broadcast(&self, from: AgentRole, text: &str) -> AgentResult<Vec<(AgentRole, String)>> {
        self.events.emit(AgentEvent::Message {
            from,
            to: MessageTarget::All,
            text: text.to_string(),
        });

        let mut replies = Vec::new();
        for role in self.registered_roles() {
            if role == from {
                continue;
            }
            if let Some(handler) = self.handler(role) {
                let reply = handler.handle(from, text).await?;
                replies.push((role, reply));
            }
        }
        Ok(replies)
    }
}
