//! Typing tracker: transient "who is typing where" state with expiry.
//!
//! Pure state machine in the action style: methods take the current time as a
//! parameter and report which transitions happened; the driver turns those
//! into `user_typing`/`user_stop_typing` broadcasts. No I/O, no timers of its
//! own - a periodic tick drives expiry, which keeps the machine deterministic
//! under virtual time.
//!
//! # State machine
//!
//! Per (conversation, user) pair:
//!
//! ```text
//!           start              expiry / stop
//! ┌──────┐ ───────> ┌────────┐ ─────────────> ┌──────┐
//! │ idle │          │ typing │                │ idle │
//! └──────┘          └────────┘ <─┐            └──────┘
//!                        │       │ start (renewal, resets timer,
//!                        └───────┘  no re-emission)
//! ```
//!
//! A start is emitted at most once per contiguous burst; the expiry timer
//! fires exactly once per burst if never renewed. Typing state never survives
//! its owning connections: the driver calls [`TypingTracker::clear_user`]
//! when a user's last connection closes.

use std::{collections::HashMap, ops::Sub, time::Duration};

use parley_proto::{ConversationId, UserId};

/// Time a typing entry survives without renewal.
pub const TYPING_EXPIRY: Duration = Duration::from_millis(1000);

/// Tracks active typing bursts per (conversation, user) pair.
///
/// Generic over `I` (Instant type) to support virtual time in tests.
#[derive(Debug)]
pub struct TypingTracker<I = std::time::Instant> {
    /// (conversation, user) → last renewal time.
    entries: HashMap<(ConversationId, UserId), I>,
    /// Expiry window after the last renewal.
    expiry: Duration,
}

impl<I> TypingTracker<I>
where
    I: Copy + Ord + Send + Sync + Sub<Output = Duration>,
{
    /// Create a tracker with the default 1000ms expiry.
    #[must_use]
    pub fn new() -> Self {
        Self::with_expiry(TYPING_EXPIRY)
    }

    /// Create a tracker with a custom expiry window.
    #[must_use]
    pub fn with_expiry(expiry: Duration) -> Self {
        Self { entries: HashMap::new(), expiry }
    }

    /// Record a typing signal.
    ///
    /// Returns `true` on the `idle → typing` transition (the driver emits
    /// `user_typing`); a renewal within an active burst resets the expiry
    /// timer and returns `false` (debounced, no re-emission).
    pub fn start(&mut self, conversation_id: ConversationId, user_id: UserId, now: I) -> bool {
        self.entries.insert((conversation_id, user_id), now).is_none()
    }

    /// Record an explicit stop signal (message sent or client-side idle).
    ///
    /// Returns `true` if a burst was active (the driver emits
    /// `user_stop_typing`); stopping while idle is a no-op.
    pub fn stop(&mut self, conversation_id: &ConversationId, user_id: &UserId) -> bool {
        self.entries.remove(&(conversation_id.clone(), user_id.clone())).is_some()
    }

    /// Expire bursts whose timer has elapsed without renewal.
    ///
    /// Returns the pairs that transitioned to idle, each exactly once; the
    /// driver emits `user_stop_typing` for every one.
    pub fn expire(&mut self, now: I) -> Vec<(ConversationId, UserId)> {
        let expiry = self.expiry;
        let expired: Vec<_> = self
            .entries
            .iter()
            .filter(|&(_, &last)| now >= last && now - last >= expiry)
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            self.entries.remove(key);
        }
        expired
    }

    /// Drop every burst owned by a user, in any conversation.
    ///
    /// Called when the user's last connection closes; returns the
    /// conversations that need a `user_stop_typing` broadcast.
    pub fn clear_user(&mut self, user_id: &UserId) -> Vec<ConversationId> {
        let cleared: Vec<_> = self
            .entries
            .keys()
            .filter(|(_, user)| user == user_id)
            .map(|(conversation, _)| conversation.clone())
            .collect();

        for conversation in &cleared {
            self.entries.remove(&(conversation.clone(), user_id.clone()));
        }
        cleared
    }

    /// Whether a burst is active for this pair.
    #[must_use]
    pub fn is_typing(&self, conversation_id: &ConversationId, user_id: &UserId) -> bool {
        self.entries.contains_key(&(conversation_id.clone(), user_id.clone()))
    }

    /// Number of active bursts across all conversations.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.entries.len()
    }
}

impl<I> Default for TypingTracker<I>
where
    I: Copy + Ord + Send + Sync + Sub<Output = Duration>,
{
    fn default() -> Self {
        Self::new()
    }
}
