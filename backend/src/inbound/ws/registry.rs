//! In-process presence topic registry.
//!
//! Maps each order to the set of live connections subscribed to its topic.
//! Delivery is at-most-once and best-effort: a frame is forwarded to the
//! subscribers present at publish time, closed channels are pruned, and
//! nothing is replayed to late joiners.

use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

use crate::domain::order::OrderId;
use crate::domain::ports::PositionUpdate;
use crate::inbound::ws::messages::ServerMessage;

/// Registry of order topics and their subscriber channels.
#[derive(Default)]
pub struct TopicRegistry {
    topics: Mutex<HashMap<OrderId, HashMap<Uuid, UnboundedSender<ServerMessage>>>>,
}

impl TopicRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(
        &self,
    ) -> std::sync::MutexGuard<'_, HashMap<OrderId, HashMap<Uuid, UnboundedSender<ServerMessage>>>>
    {
        self.topics
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Join a connection to an order topic, replacing any previous channel
    /// for the same connection.
    pub fn subscribe(
        &self,
        order_id: OrderId,
        connection_id: Uuid,
        sender: UnboundedSender<ServerMessage>,
    ) {
        self.lock()
            .entry(order_id)
            .or_default()
            .insert(connection_id, sender);
    }

    /// Remove a connection from one topic.
    pub fn unsubscribe(&self, order_id: &OrderId, connection_id: &Uuid) {
        let mut topics = self.lock();
        if let Some(subscribers) = topics.get_mut(order_id) {
            subscribers.remove(connection_id);
            if subscribers.is_empty() {
                topics.remove(order_id);
            }
        }
    }

    /// Remove a connection from every topic it joined. Called on disconnect.
    pub fn drop_connection(&self, connection_id: &Uuid) {
        let mut topics = self.lock();
        topics.retain(|_, subscribers| {
            subscribers.remove(connection_id);
            !subscribers.is_empty()
        });
    }

    /// Fan a position update out to the order's current subscribers,
    /// pruning closed channels. Returns the number of deliveries attempted
    /// successfully.
    pub fn publish(&self, update: PositionUpdate) -> usize {
        let message = ServerMessage::from(update);
        let mut topics = self.lock();
        let Some(subscribers) = topics.get_mut(&update.order_id) else {
            return 0;
        };

        let mut delivered = 0;
        subscribers.retain(|_, sender| match sender.send(message.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(_) => false,
        });
        if subscribers.is_empty() {
            topics.remove(&update.order_id);
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};
    use tokio::sync::mpsc;

    fn update(order_id: OrderId) -> PositionUpdate {
        PositionUpdate {
            order_id,
            latitude: 55.7,
            longitude: 37.6,
        }
    }

    #[fixture]
    fn registry() -> TopicRegistry {
        TopicRegistry::new()
    }

    #[rstest]
    fn publish_reaches_current_subscribers_only(registry: TopicRegistry) {
        let order = OrderId::random();
        let other = OrderId::random();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        registry.subscribe(order, Uuid::new_v4(), tx_a);
        registry.subscribe(other, Uuid::new_v4(), tx_b);

        let delivered = registry.publish(update(order));
        assert_eq!(delivered, 1);
        assert!(matches!(
            rx_a.try_recv(),
            Ok(ServerMessage::LocationUpdate { .. })
        ));
        assert!(rx_b.try_recv().is_err());
    }

    #[rstest]
    fn closed_channels_are_pruned_on_publish(registry: TopicRegistry) {
        let order = OrderId::random();
        let (tx, rx) = mpsc::unbounded_channel();
        registry.subscribe(order, Uuid::new_v4(), tx);
        drop(rx);

        assert_eq!(registry.publish(update(order)), 0);
        // Topic was emptied by pruning; a second publish finds nothing.
        assert_eq!(registry.publish(update(order)), 0);
    }

    #[rstest]
    fn unsubscribe_stops_delivery(registry: TopicRegistry) {
        let order = OrderId::random();
        let connection = Uuid::new_v4();
        let (tx, mut rx) = mpsc::unbounded_channel();
        registry.subscribe(order, connection, tx);
        registry.unsubscribe(&order, &connection);

        assert_eq!(registry.publish(update(order)), 0);
        assert!(rx.try_recv().is_err());
    }

    #[rstest]
    fn drop_connection_clears_every_topic(registry: TopicRegistry) {
        let connection = Uuid::new_v4();
        let first = OrderId::random();
        let second = OrderId::random();
        let (tx, _rx) = mpsc::unbounded_channel();
        registry.subscribe(first, connection, tx.clone());
        registry.subscribe(second, connection, tx);

        registry.drop_connection(&connection);
        assert_eq!(registry.publish(update(first)), 0);
        assert_eq!(registry.publish(update(second)), 0);
    }
}
