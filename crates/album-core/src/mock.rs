//! In-process transport double that records every call.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::TransportError;
use crate::transport::Transport;
use crate::types::MediaItem;

/// A grouped post captured by [`MockTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentPost {
    pub destination: i64,
    pub items: Vec<MediaItem>,
    pub caption: Option<String>,
    pub message_ids: Vec<i32>,
}

#[derive(Debug, Default)]
struct Recorded {
    posts: Vec<SentPost>,
    deleted: Vec<(i64, i32)>,
    archived: Vec<(i64, i32)>,
    members: HashSet<(i64, String)>,
}

/// Transport double: assigns increasing message ids and records calls.
///
/// Failures can be injected per call kind.
#[derive(Debug, Default)]
pub struct MockTransport {
    next_id: AtomicI32,
    recorded: Mutex<Recorded>,
    /// Fail the Nth and later sends (0-based) while set.
    fail_sends_from: Mutex<Option<usize>>,
    /// Fail exactly these send indices.
    fail_send_indices: Mutex<HashSet<usize>>,
    /// Send index to number of items delivered before that send breaks off.
    partial_sends: Mutex<HashMap<usize, usize>>,
    send_calls: AtomicUsize,
    membership_error: Mutex<bool>,
    archive_error: Mutex<bool>,
    delete_error: Mutex<bool>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            next_id: AtomicI32::new(1),
            ..Default::default()
        }
    }

    /// Every send fails.
    pub fn fail_all_sends(&self) {
        *lock(&self.fail_sends_from) = Some(0);
    }

    /// Fail the send with this 0-based call index.
    pub fn fail_send_at(&self, index: usize) {
        lock(&self.fail_send_indices).insert(index);
    }

    /// Let the send with this 0-based call index post only its first
    /// `delivered` items before failing.
    pub fn fail_send_partway(&self, index: usize, delivered: usize) {
        lock(&self.partial_sends).insert(index, delivered);
    }

    /// Membership checks return an error.
    pub fn fail_membership(&self) {
        *lock(&self.membership_error) = true;
    }

    pub fn fail_archive(&self) {
        *lock(&self.archive_error) = true;
    }

    pub fn fail_deletes(&self) {
        *lock(&self.delete_error) = true;
    }

    /// Register `user` as a member of `channel`.
    pub fn add_member(&self, user: i64, channel: &str) {
        lock(&self.recorded)
            .members
            .insert((user, channel.to_string()));
    }

    pub fn posts(&self) -> Vec<SentPost> {
        lock(&self.recorded).posts.clone()
    }

    pub fn deleted(&self) -> Vec<(i64, i32)> {
        lock(&self.recorded).deleted.clone()
    }

    pub fn archived(&self) -> Vec<(i64, i32)> {
        lock(&self.recorded).archived.clone()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl Transport for MockTransport {
    async fn send_grouped_post(
        &self,
        destination: i64,
        items: &[MediaItem],
        caption: Option<&str>,
    ) -> Result<Vec<i32>, TransportError> {
        let call = self.send_calls.fetch_add(1, Ordering::SeqCst);
        let failing_from = *lock(&self.fail_sends_from);
        if failing_from.is_some_and(|from| call >= from)
            || lock(&self.fail_send_indices).contains(&call)
        {
            return Err(TransportError::Unavailable(format!("send #{call} failed")));
        }
        if items.is_empty() {
            return Err(TransportError::Rejected("empty post".to_string()));
        }

        let cut = lock(&self.partial_sends).get(&call).copied();
        let delivered = &items[..cut.unwrap_or(items.len()).min(items.len())];

        let message_ids: Vec<i32> = delivered
            .iter()
            .map(|_| self.next_id.fetch_add(1, Ordering::SeqCst))
            .collect();
        if !delivered.is_empty() {
            lock(&self.recorded).posts.push(SentPost {
                destination,
                items: delivered.to_vec(),
                caption: caption.map(str::to_string),
                message_ids: message_ids.clone(),
            });
        }

        match cut {
            Some(_) if message_ids.is_empty() => Err(TransportError::Unavailable(format!(
                "send #{call} failed"
            ))),
            Some(_) => Err(TransportError::Partial {
                message_ids,
                reason: format!("send #{call} broke off"),
            }),
            None => Ok(message_ids),
        }
    }

    async fn delete_message(
        &self,
        destination: i64,
        message_id: i32,
    ) -> Result<(), TransportError> {
        if *lock(&self.delete_error) {
            return Err(TransportError::Rejected("message can't be deleted".to_string()));
        }
        lock(&self.recorded).deleted.push((destination, message_id));
        Ok(())
    }

    async fn verify_membership(&self, user: i64, channel: &str) -> Result<bool, TransportError> {
        if *lock(&self.membership_error) {
            return Err(TransportError::Unavailable("chat not found".to_string()));
        }
        Ok(lock(&self.recorded)
            .members
            .contains(&(user, channel.to_string())))
    }

    async fn archive(&self, from_chat: i64, message_id: i32) -> Result<(), TransportError> {
        if *lock(&self.archive_error) {
            return Err(TransportError::Unavailable("archive chat unreachable".to_string()));
        }
        lock(&self.recorded).archived.push((from_chat, message_id));
        Ok(())
    }
}
