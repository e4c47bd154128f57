//! Group registry: one broadcast channel per relay group.
//!
//! A group exists while at least one [`GroupSubscription`] for it is alive.
//! Delivery is best-effort: a receiver that falls more than
//! `channel_capacity` messages behind skips what it missed.

use dashmap::DashMap;
use edge_types::{GroupId, Payload};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Identifies the subscription a channel message came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionTag(u64);

/// A message on a group channel.
#[derive(Debug, Clone)]
pub struct ChannelMessage {
    /// Subscription that published the message.
    pub origin: ConnectionTag,
    /// Frame exactly as received from the publishing socket.
    pub payload: Payload,
}

/// Process-wide map of live groups.
#[derive(Debug)]
pub struct GroupRegistry {
    groups: DashMap<GroupId, broadcast::Sender<ChannelMessage>>,
    capacity: usize,
    next_tag: AtomicU64,
    connections: AtomicUsize,
}

impl GroupRegistry {
    /// Create an empty registry whose channels buffer `capacity` messages.
    pub fn new(capacity: usize) -> Self {
        Self {
            groups: DashMap::new(),
            capacity: capacity.max(1),
            next_tag: AtomicU64::new(0),
            connections: AtomicUsize::new(0),
        }
    }

    /// Subscribe to a group, creating it if this is the first member.
    pub fn join(self: &Arc<Self>, group: &GroupId) -> GroupSubscription {
        let tag = ConnectionTag(self.next_tag.fetch_add(1, Ordering::Relaxed));

        // Subscribe while holding the entry so a concurrent leave cannot
        // remove the group between lookup and subscribe.
        let (sender, receiver) = {
            let entry = self
                .groups
                .entry(group.clone())
                .or_insert_with(|| broadcast::channel(self.capacity).0);
            (entry.value().clone(), entry.value().subscribe())
        };

        let connections = self.connections.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::debug!(
            "Joined group={} tag={:?} (members: {}, connections: {})",
            group,
            tag,
            sender.receiver_count(),
            connections
        );

        GroupSubscription {
            registry: Arc::clone(self),
            group: group.clone(),
            tag,
            sender,
            receiver: Some(receiver),
        }
    }

    /// Number of groups with at least one member.
    pub fn total_groups(&self) -> usize {
        self.groups.len()
    }

    /// Number of live subscriptions across all groups.
    pub fn total_connections(&self) -> usize {
        self.connections.load(Ordering::Relaxed)
    }

    /// Number of members in one group.
    pub fn member_count(&self, group: &GroupId) -> usize {
        self.groups
            .get(group)
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }

    fn leave(&self, group: &GroupId) {
        self.connections.fetch_sub(1, Ordering::Relaxed);
        // Callers drop their receiver first, so an empty group has none left.
        let removed = self
            .groups
            .remove_if(group, |_, sender| sender.receiver_count() == 0)
            .is_some();
        if removed {
            tracing::debug!("Group {} is empty, removed", group);
        }
    }
}

/// Membership of one connection in one group.
///
/// Dropping the subscription leaves the group.
#[derive(Debug)]
pub struct GroupSubscription {
    registry: Arc<GroupRegistry>,
    group: GroupId,
    tag: ConnectionTag,
    sender: broadcast::Sender<ChannelMessage>,
    // Always `Some` until drop.
    receiver: Option<broadcast::Receiver<ChannelMessage>>,
}

impl GroupSubscription {
    /// The group this subscription belongs to.
    pub fn group(&self) -> &GroupId {
        &self.group
    }

    /// This subscription's tag.
    pub fn tag(&self) -> ConnectionTag {
        self.tag
    }

    /// Publish a payload to every other member of the group.
    ///
    /// Returns the number of other members at the time of sending.
    pub fn publish(&self, payload: Payload) -> usize {
        let message = ChannelMessage {
            origin: self.tag,
            payload,
        };
        // Our own receiver keeps the channel open, so send only fails if the
        // registry is being torn down.
        self.sender
            .send(message)
            .map(|receivers| receivers.saturating_sub(1))
            .unwrap_or(0)
    }

    /// Wait for the next message published by another member.
    ///
    /// Messages published through this subscription are skipped. Returns
    /// `None` only if the channel closed.
    pub async fn recv(&mut self) -> Option<Payload> {
        let receiver = self.receiver.as_mut()?;
        loop {
            match receiver.recv().await {
                Ok(message) if message.origin == self.tag => continue,
                Ok(message) => return Some(message.payload),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(
                        "Subscriber {:?} in group {} lagged, skipped {} messages",
                        self.tag,
                        self.group,
                        skipped
                    );
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

impl Drop for GroupSubscription {
    fn drop(&mut self) {
        drop(self.receiver.take());
        self.registry.leave(&self.group);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn registry() -> Arc<GroupRegistry> {
        Arc::new(GroupRegistry::new(16))
    }

    fn group(id: &str) -> GroupId {
        GroupId::new(id).unwrap()
    }

    #[tokio::test]
    async fn message_reaches_other_members() {
        let registry = registry();
        let a = registry.join(&group("g"));
        let mut b = registry.join(&group("g"));

        assert_eq!(a.publish(Payload::Text("hi".into())), 1);
        assert_eq!(b.recv().await, Some(Payload::Text("hi".into())));
    }

    #[tokio::test]
    async fn publisher_never_receives_own_message() {
        let registry = registry();
        let mut a = registry.join(&group("g"));
        let b = registry.join(&group("g"));

        a.publish(Payload::Text("mine".into()));
        b.publish(Payload::Text("theirs".into()));

        assert_eq!(a.recv().await, Some(Payload::Text("theirs".into())));
    }

    #[tokio::test]
    async fn groups_are_isolated() {
        let registry = registry();
        let a = registry.join(&group("one"));
        let mut b = registry.join(&group("two"));

        assert_eq!(a.publish(Payload::Binary(vec![1, 2, 3])), 0);
        let got = tokio::time::timeout(Duration::from_millis(50), b.recv()).await;
        assert!(got.is_err(), "message leaked across groups");
    }

    #[tokio::test]
    async fn per_publisher_order_is_preserved() {
        let registry = registry();
        let a = registry.join(&group("g"));
        let mut b = registry.join(&group("g"));

        for i in 0..5u8 {
            a.publish(Payload::Binary(vec![i]));
        }
        for i in 0..5u8 {
            assert_eq!(b.recv().await, Some(Payload::Binary(vec![i])));
        }
    }

    #[test]
    fn group_removed_when_last_member_leaves() {
        let registry = registry();
        let a = registry.join(&group("g"));
        let b = registry.join(&group("g"));
        assert_eq!(registry.total_groups(), 1);
        assert_eq!(registry.member_count(&group("g")), 2);
        assert_eq!(registry.total_connections(), 2);

        drop(a);
        assert_eq!(registry.total_groups(), 1);
        assert_eq!(registry.member_count(&group("g")), 1);

        drop(b);
        assert_eq!(registry.total_groups(), 0);
        assert_eq!(registry.total_connections(), 0);
    }

    #[test]
    fn concurrent_last_leaves_remove_group() {
        use std::sync::Barrier;

        let registry = registry();
        for _ in 0..500 {
            let a = registry.join(&group("g"));
            let b = registry.join(&group("g"));
            let barrier = Barrier::new(2);

            std::thread::scope(|scope| {
                scope.spawn(|| {
                    barrier.wait();
                    drop(a);
                });
                scope.spawn(|| {
                    barrier.wait();
                    drop(b);
                });
            });

            assert_eq!(registry.total_groups(), 0);
            assert_eq!(registry.total_connections(), 0);
        }
    }

    #[tokio::test]
    async fn lagged_receiver_skips_ahead() {
        let registry = Arc::new(GroupRegistry::new(2));
        let a = registry.join(&group("g"));
        let mut b = registry.join(&group("g"));

        for i in 0..5u8 {
            a.publish(Payload::Binary(vec![i]));
        }

        // Only the newest messages survive in a channel of capacity 2.
        assert_eq!(b.recv().await, Some(Payload::Binary(vec![3])));
        assert_eq!(b.recv().await, Some(Payload::Binary(vec![4])));
    }

    #[test]
    fn tags_are_unique() {
        let registry = registry();
        let a = registry.join(&group("g"));
        let b = registry.join(&group("g"));
        assert_ne!(a.tag(), b.tag());
        assert_eq!(a.group(), &group("g"));
    }
}
