//! Per-order room registry for the messaging gateway.
//!
//! Process-wide, in-memory, and ephemeral: connections register a
//! sender on join, are pruned on disconnect or on the first failed
//! send, and the whole table simply starts empty after a restart.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

use crate::ws::ServerEvent;

#[derive(Clone, Default)]
pub struct Rooms {
    inner: Arc<DashMap<Uuid, HashMap<Uuid, UnboundedSender<ServerEvent>>>>,
}

impl Rooms {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn join(&self, order_id: Uuid, conn_id: Uuid, tx: UnboundedSender<ServerEvent>) {
        self.inner.entry(order_id).or_default().insert(conn_id, tx);
    }

    /// Drops the connection from every room it joined; rooms left empty
    /// are removed.
    pub fn leave_all(&self, conn_id: Uuid) {
        self.inner.retain(|_, members| {
            members.remove(&conn_id);
            !members.is_empty()
        });
    }

    /// Fans an event out to every live member of the room, pruning any
    /// whose channel has closed. Best-effort, at-most-once per member.
    pub fn broadcast(&self, order_id: Uuid, event: &ServerEvent) -> usize {
        match self.inner.get_mut(&order_id) {
            Some(mut members) => {
                members.retain(|_, tx| tx.send(event.clone()).is_ok());
                members.len()
            }
            None => 0,
        }
    }

    #[cfg(test)]
    pub fn member_count(&self, order_id: Uuid) -> usize {
        self.inner.get(&order_id).map(|m| m.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;

    use super::*;

    #[tokio::test]
    async fn broadcast_reaches_every_member_of_the_room_only() {
        let rooms = Rooms::new();
        let order = Uuid::new_v4();
        let other_order = Uuid::new_v4();

        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        let (tx_c, mut rx_c) = mpsc::unbounded_channel();
        rooms.join(order, Uuid::new_v4(), tx_a);
        rooms.join(order, Uuid::new_v4(), tx_b);
        rooms.join(other_order, Uuid::new_v4(), tx_c);

        let event = ServerEvent::Joined { order_id: order };
        assert_eq!(rooms.broadcast(order, &event), 2);

        assert!(rx_a.recv().await.is_some());
        assert!(rx_b.recv().await.is_some());
        assert!(rx_c.try_recv().is_err());
    }

    #[tokio::test]
    async fn disconnect_prunes_membership() {
        let rooms = Rooms::new();
        let order = Uuid::new_v4();
        let conn = Uuid::new_v4();

        let (tx, _rx) = mpsc::unbounded_channel();
        rooms.join(order, conn, tx);
        assert_eq!(rooms.member_count(order), 1);

        rooms.leave_all(conn);
        assert_eq!(rooms.member_count(order), 0);
    }

    #[tokio::test]
    async fn dead_senders_are_pruned_on_broadcast() {
        let rooms = Rooms::new();
        let order = Uuid::new_v4();

        let (tx_live, mut rx_live) = mpsc::unbounded_channel();
        let (tx_dead, rx_dead) = mpsc::unbounded_channel();
        drop(rx_dead);
        rooms.join(order, Uuid::new_v4(), tx_live);
        rooms.join(order, Uuid::new_v4(), tx_dead);

        let event = ServerEvent::Joined { order_id: order };
        assert_eq!(rooms.broadcast(order, &event), 1);
        assert_eq!(rooms.member_count(order), 1);
        assert!(rx_live.recv().await.is_some());
    }

    #[tokio::test]
    async fn one_connection_may_sit_in_several_rooms() {
        let rooms = Rooms::new();
        let conn = Uuid::new_v4();
        let (order_a, order_b) = (Uuid::new_v4(), Uuid::new_v4());

        let (tx, mut rx) = mpsc::unbounded_channel();
        rooms.join(order_a, conn, tx.clone());
        rooms.join(order_b, conn, tx);

        rooms.broadcast(order_a, &ServerEvent::Joined { order_id: order_a });
        rooms.broadcast(order_b, &ServerEvent::Joined { order_id: order_b });
        assert!(rx.recv().await.is_some());
        assert!(rx.recv().await.is_some());

        rooms.leave_all(conn);
        assert_eq!(rooms.member_count(order_a), 0);
        assert_eq!(rooms.member_count(order_b), 0);
    }
}
