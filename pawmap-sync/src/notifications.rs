//! Client-local notification list
//!
//! Most recent first, bounded, with read flags and a single auto-dismissing
//! toast. Nothing here is persisted.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use pawmap_api::{EntityStatus, Position};
use serde::Serialize;

/// Where a push came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PushSource {
    /// `/topic/posts` broadcast
    Broadcast,
    /// `/user/queue/notifications`
    Personal,
}

/// A received push, stamped on receipt
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationEvent {
    pub id: String,
    pub content: String,
    pub status: Option<EntityStatus>,
    pub position: Option<Position>,
    pub source: PushSource,
    pub received_at: DateTime<Utc>,
    pub read: bool,
}

/// Post ids and personal notification ids are separate namespaces
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NotificationKey {
    pub source: PushSource,
    pub id: String,
}

impl NotificationKey {
    pub fn new(source: PushSource, id: impl Into<String>) -> Self {
        Self {
            source,
            id: id.into(),
        }
    }
}

impl NotificationEvent {
    pub fn key(&self) -> NotificationKey {
        NotificationKey::new(self.source, self.id.clone())
    }

    fn has_key(&self, key: &NotificationKey) -> bool {
        self.source == key.source && self.id == key.id
    }
}

/// Identifies the toast raised by one push
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToastTicket(u64);

#[derive(Debug)]
pub struct NotificationCenter {
    items: VecDeque<NotificationEvent>,
    capacity: usize,
    toast: Option<(ToastTicket, NotificationKey)>,
    toast_seq: u64,
}

impl NotificationCenter {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::new(),
            capacity: capacity.max(1),
            toast: None,
            toast_seq: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Most recent first
    pub fn iter(&self) -> impl Iterator<Item = &NotificationEvent> {
        self.items.iter()
    }

    pub fn unread_count(&self) -> usize {
        self.items.iter().filter(|n| !n.read).count()
    }

    /// Prepend a notification and raise its toast
    pub fn push(&mut self, event: NotificationEvent) -> ToastTicket {
        self.toast_seq += 1;
        let ticket = ToastTicket(self.toast_seq);
        self.toast = Some((ticket, event.key()));

        self.items.push_front(event);
        while self.items.len() > self.capacity {
            self.items.pop_back();
        }
        ticket
    }

    pub fn mark_read(&mut self, key: &NotificationKey) -> bool {
        match self.items.iter_mut().find(|n| n.has_key(key)) {
            Some(n) if !n.read => {
                n.read = true;
                true
            }
            _ => false,
        }
    }

    /// Returns how many were newly marked
    pub fn mark_all_read(&mut self) -> usize {
        let mut marked = 0;
        for n in self.items.iter_mut().filter(|n| !n.read) {
            n.read = true;
            marked += 1;
        }
        marked
    }

    pub fn dismiss(&mut self, key: &NotificationKey) -> bool {
        let before = self.items.len();
        self.items.retain(|n| !n.has_key(key));
        if matches!(&self.toast, Some((_, toast_key)) if toast_key == key) {
            self.toast = None;
        }
        self.items.len() != before
    }

    /// The notification whose toast is showing
    pub fn active_toast(&self) -> Option<&NotificationKey> {
        self.toast.as_ref().map(|(_, key)| key)
    }

    /// Hide the toast if `ticket` still owns it
    pub fn expire_toast(&mut self, ticket: ToastTicket) -> bool {
        if matches!(&self.toast, Some((current, _)) if *current == ticket) {
            self.toast = None;
            return true;
        }
        false
    }

    pub fn clear_toast(&mut self) {
        self.toast = None;
    }
}
