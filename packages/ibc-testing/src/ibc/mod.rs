//! The IBC core every simulated chain runs: light clients, the connection and
//! channel handshakes, and the packet lifecycle.

mod channel;
mod client;
mod connection;
mod handshake;
pub mod keys;
mod packet;
mod proof;
mod store;

pub use channel::{Channel, ChannelCounterparty, ChannelEnd, Order};
pub use client::{ClientState, ConsensusState, Header, LightClient};
pub use connection::{ConnectionCounterparty, ConnectionEnd};
pub use handshake::{check_counterparty, transition, Layer, State, Step};
pub use packet::{ack_commitment, Packet, PacketTimeout, RecvOutcome, StdAck};
pub use proof::{compute_root, CommitmentProof, ProvableEntries};
pub use store::IbcStore;

pub(crate) use packet::Delivery;

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use cosmwasm_std::{Binary, Timestamp};

    use super::*;
    use crate::height::Height;
    use crate::ident::{ChainId, ChannelId, ClientId, ConnectionId, PortId};

    struct Side {
        chain_id: ChainId,
        store: IbcStore,
        height: u64,
    }

    impl Side {
        fn new(chain_id: &str) -> Self {
            Side {
                chain_id: ChainId::new(chain_id),
                store: IbcStore::new(),
                height: 1,
            }
        }

        fn time(&self) -> Timestamp {
            Timestamp::from_seconds(1_000 + self.height * 5)
        }

        /// Commits the current block and returns its header and a proof of its store.
        fn commit(&mut self) -> (Header, CommitmentProof) {
            let entries = self.store.provable_entries().unwrap();
            let header = Header {
                chain_id: self.chain_id.clone(),
                height: Height::new(0, self.height),
                time: self.time(),
                root: compute_root(&entries),
                validators_hash: Binary::from(b"validators".to_vec()),
            };
            let proof = CommitmentProof::new(header.height, Arc::new(entries));
            self.height += 1;
            (header, proof)
        }
    }

    /// Commits `from` and teaches `to`'s client about the new header.
    fn prove(from: &mut Side, to: &mut Side, client: &ClientId) -> CommitmentProof {
        let (header, proof) = from.commit();
        to.store.update_client(client, &header).unwrap();
        proof
    }

    struct Open {
        a: Side,
        b: Side,
        client_a: ClientId,
        client_b: ClientId,
        conn_a: ConnectionId,
        conn_b: ConnectionId,
    }

    fn open_connection() -> Open {
        let mut a = Side::new("testchain1");
        let mut b = Side::new("testchain2");
        let (header_a, _) = a.commit();
        let (header_b, _) = b.commit();
        let client_a = a.store.create_client(&header_b);
        let client_b = b.store.create_client(&header_a);

        let conn_a = a.store.conn_open_init(&client_a, &client_b, "1", 0).unwrap();
        let proof = prove(&mut a, &mut b, &client_b);
        let conn_b = b
            .store
            .conn_open_try(&client_b, &client_a, &conn_a, &proof)
            .unwrap();
        let proof = prove(&mut b, &mut a, &client_a);
        a.store.conn_open_ack(&conn_a, &conn_b, &proof).unwrap();
        let proof = prove(&mut a, &mut b, &client_b);
        b.store.conn_open_confirm(&conn_b, &proof).unwrap();
        Open {
            a,
            b,
            client_a,
            client_b,
            conn_a,
            conn_b,
        }
    }

    fn open_channel(open: &mut Open, ordering: Order) -> (ChannelId, ChannelId) {
        let port = PortId::from("mock");
        let proof = prove(&mut open.b, &mut open.a, &open.client_a);
        let chan_a = open
            .a
            .store
            .chan_open_init(&port, &open.conn_a, ordering, &port, "mock-version", &proof)
            .unwrap();
        let proof = prove(&mut open.a, &mut open.b, &open.client_b);
        let (chan_b, version) = open
            .b
            .store
            .chan_open_try(&port, &open.conn_b, ordering, &port, &chan_a, &proof)
            .unwrap();
        assert_eq!(version, "mock-version");
        let proof = prove(&mut open.b, &mut open.a, &open.client_a);
        open.a
            .store
            .chan_open_ack(&port, &chan_a, &chan_b, &proof)
            .unwrap();
        let proof = prove(&mut open.a, &mut open.b, &open.client_b);
        open.b
            .store
            .chan_open_confirm(&port, &chan_b, &proof)
            .unwrap();
        (chan_a, chan_b)
    }

    fn far_timeout() -> PacketTimeout {
        PacketTimeout::with_height(Height::new(0, 1_000))
    }

    #[test]
    fn connection_handshake_works() {
        let open = open_connection();
        assert!(open.a.store.connection(&open.conn_a).unwrap().is_open());
        assert!(open.b.store.connection(&open.conn_b).unwrap().is_open());
        assert_eq!(
            open.a
                .store
                .connection(&open.conn_a)
                .unwrap()
                .counterparty
                .connection_id,
            Some(open.conn_b.clone())
        );
    }

    #[test]
    fn conn_open_try_requires_counterparty_init() {
        let mut a = Side::new("testchain1");
        let mut b = Side::new("testchain2");
        let (header_a, _) = a.commit();
        let (header_b, _) = b.commit();
        let client_a = a.store.create_client(&header_b);
        let client_b = b.store.create_client(&header_a);

        // Try against a connection that A never initialized
        let proof = prove(&mut a, &mut b, &client_b);
        let err = b
            .store
            .conn_open_try(&client_b, &client_a, &ConnectionId::new(0), &proof)
            .unwrap_err();
        assert!(err.is_protocol_violation());
    }

    #[test]
    fn conn_open_ack_before_try_fails() {
        let mut a = Side::new("testchain1");
        let mut b = Side::new("testchain2");
        let (header_a, _) = a.commit();
        let (header_b, _) = b.commit();
        let client_a = a.store.create_client(&header_b);
        let client_b = b.store.create_client(&header_a);

        let conn_a = a.store.conn_open_init(&client_a, &client_b, "1", 0).unwrap();
        let proof = prove(&mut b, &mut a, &client_a);
        let err = a
            .store
            .conn_open_ack(&conn_a, &ConnectionId::new(0), &proof)
            .unwrap_err();
        assert!(err.is_protocol_violation());
        // the failed step left the connection untouched
        assert_eq!(a.store.connection(&conn_a).unwrap().state, State::Init);
    }

    #[test]
    fn stale_proof_is_rejected() {
        let mut a = Side::new("testchain1");
        let mut b = Side::new("testchain2");
        let (header_a, _) = a.commit();
        let (header_b, _) = b.commit();
        let client_a = a.store.create_client(&header_b);
        let client_b = b.store.create_client(&header_a);

        let conn_a = a.store.conn_open_init(&client_a, &client_b, "1", 0).unwrap();
        // committed, but B's client never learns the header
        let (_, proof) = a.commit();
        let err = b
            .store
            .conn_open_try(&client_b, &client_a, &conn_a, &proof)
            .unwrap_err();
        assert!(err.to_string().contains("no consensus state"));
    }

    #[test]
    fn channels_need_an_open_connection() {
        let mut a = Side::new("testchain1");
        let mut b = Side::new("testchain2");
        let (header_a, _) = a.commit();
        let (header_b, _) = b.commit();
        let client_a = a.store.create_client(&header_b);
        let client_b = b.store.create_client(&header_a);
        let conn_a = a.store.conn_open_init(&client_a, &client_b, "1", 0).unwrap();

        let port = PortId::from("mock");
        let proof = prove(&mut b, &mut a, &client_a);
        let err = a
            .store
            .chan_open_init(&port, &conn_a, Order::Unordered, &port, "v1", &proof)
            .unwrap_err();
        assert!(err.is_protocol_violation());
        assert_eq!(a.store.channels().count(), 0);
    }

    #[test]
    fn chan_open_init_requires_counterparty_connection_open() {
        let mut a = Side::new("testchain1");
        let mut b = Side::new("testchain2");
        let (header_a, _) = a.commit();
        let (header_b, _) = b.commit();
        let client_a = a.store.create_client(&header_b);
        let client_b = b.store.create_client(&header_a);

        let conn_a = a.store.conn_open_init(&client_a, &client_b, "1", 0).unwrap();
        let proof = prove(&mut a, &mut b, &client_b);
        let conn_b = b
            .store
            .conn_open_try(&client_b, &client_a, &conn_a, &proof)
            .unwrap();
        let proof = prove(&mut b, &mut a, &client_a);
        a.store.conn_open_ack(&conn_a, &conn_b, &proof).unwrap();
        // A is OPEN, B still TRYOPEN
        assert!(a.store.connection(&conn_a).unwrap().is_open());

        let port = PortId::from("mock");
        let proof = prove(&mut b, &mut a, &client_a);
        let err = a
            .store
            .chan_open_init(&port, &conn_a, Order::Unordered, &port, "v1", &proof)
            .unwrap_err();
        assert!(err.is_protocol_violation());
        assert!(err.to_string().contains("is TRYOPEN"));
        assert_eq!(a.store.channels().count(), 0);

        let proof = prove(&mut a, &mut b, &client_b);
        b.store.conn_open_confirm(&conn_b, &proof).unwrap();
        let proof = prove(&mut b, &mut a, &client_a);
        a.store
            .chan_open_init(&port, &conn_a, Order::Unordered, &port, "v1", &proof)
            .unwrap();
    }

    #[test]
    fn channel_handshake_works() {
        let mut open = open_connection();
        let (chan_a, chan_b) = open_channel(&mut open, Order::Ordered);
        let port = PortId::from("mock");
        let a = open.a.store.channel(&port, &chan_a).unwrap();
        let b = open.b.store.channel(&port, &chan_b).unwrap();
        assert!(a.is_open() && b.is_open());
        assert_eq!(a.end.counterparty.channel_id, Some(chan_b));
        assert_eq!(b.end.counterparty.channel_id, Some(chan_a));
        assert_eq!(a.end.ordering, Order::Ordered);
    }

    #[test]
    fn chan_open_try_rejects_ordering_mismatch() {
        let mut open = open_connection();
        let port = PortId::from("mock");
        let proof = prove(&mut open.b, &mut open.a, &open.client_a);
        let chan_a = open
            .a
            .store
            .chan_open_init(&port, &open.conn_a, Order::Ordered, &port, "v1", &proof)
            .unwrap();
        let proof = prove(&mut open.a, &mut open.b, &open.client_b);
        let err = open
            .b
            .store
            .chan_open_try(&port, &open.conn_b, Order::Unordered, &port, &chan_a, &proof)
            .unwrap_err();
        assert!(matches!(err, crate::HarnessError::Validation { .. }));
    }

    #[test]
    fn packet_lifecycle_works() {
        let mut open = open_connection();
        let (chan_a, chan_b) = open_channel(&mut open, Order::Unordered);
        let port = PortId::from("mock");

        let packet = open
            .a
            .store
            .send_packet(&port, &chan_a, Binary::from(b"ping".to_vec()), far_timeout())
            .unwrap();
        assert_eq!(packet.sequence, 1);
        assert_eq!(packet.destination_channel, chan_b);
        assert_eq!(open.a.store.pending_packets(&port, &chan_a), vec![packet.clone()]);

        let proof = prove(&mut open.a, &mut open.b, &open.client_b);
        let time = open.b.time();
        let height = Height::new(0, open.b.height);
        let delivery = open
            .b
            .store
            .recv_packet(&packet, &proof, height, time)
            .unwrap();
        assert_eq!(delivery, Delivery::Deliver);
        let ack = StdAck::success(b"pong".to_vec()).to_binary();
        open.b.store.write_acknowledgement(&packet, &ack).unwrap();

        // a second delivery of the same packet is rejected
        let err = open
            .b
            .store
            .recv_packet(&packet, &proof, height, time)
            .unwrap_err();
        assert!(err.is_protocol_violation());

        let proof = prove(&mut open.b, &mut open.a, &open.client_a);
        open.a.store.acknowledge_packet(&packet, &ack, &proof).unwrap();
        assert!(open.a.store.pending_packets(&port, &chan_a).is_empty());
        assert_eq!(open.a.store.acknowledgement(&port, &chan_a, 1), Some(&ack));
        assert_eq!(open.a.store.packet_commitment(&port, &chan_a, 1), None);

        // acknowledging twice is a violation
        let err = open
            .a
            .store
            .acknowledge_packet(&packet, &ack, &proof)
            .unwrap_err();
        assert!(err.is_protocol_violation());
    }

    #[test]
    fn send_packet_requires_timeout_and_open_channel() {
        let mut open = open_connection();
        let (chan_a, _) = open_channel(&mut open, Order::Unordered);
        let port = PortId::from("mock");

        let err = open
            .a
            .store
            .send_packet(&port, &chan_a, Binary::default(), PacketTimeout::default())
            .unwrap_err();
        assert!(matches!(err, crate::HarnessError::Validation { .. }));

        open.a.store.chan_close_init(&port, &chan_a).unwrap();
        let err = open
            .a
            .store
            .send_packet(&port, &chan_a, Binary::default(), far_timeout())
            .unwrap_err();
        assert!(err.is_protocol_violation());
    }

    #[test]
    fn ordered_receive_rejects_gaps() {
        let mut open = open_connection();
        let (chan_a, _) = open_channel(&mut open, Order::Ordered);
        let port = PortId::from("mock");

        let first = open
            .a
            .store
            .send_packet(&port, &chan_a, Binary::from(b"1".to_vec()), far_timeout())
            .unwrap();
        let second = open
            .a
            .store
            .send_packet(&port, &chan_a, Binary::from(b"2".to_vec()), far_timeout())
            .unwrap();
        assert!(first.sequence < second.sequence);

        let proof = prove(&mut open.a, &mut open.b, &open.client_b);
        let height = Height::new(0, open.b.height);
        let time = open.b.time();
        let err = open
            .b
            .store
            .recv_packet(&second, &proof, height, time)
            .unwrap_err();
        assert!(err.is_protocol_violation());
        assert_eq!(
            open.b
                .store
                .recv_packet(&first, &proof, height, time)
                .unwrap(),
            Delivery::Deliver
        );
        assert_eq!(
            open.b
                .store
                .recv_packet(&second, &proof, height, time)
                .unwrap(),
            Delivery::Deliver
        );
    }

    #[test]
    fn expired_packet_times_out_and_closes_ordered_channel() {
        let mut open = open_connection();
        let (chan_a, chan_b) = open_channel(&mut open, Order::Ordered);
        let port = PortId::from("mock");

        let packet = open
            .a
            .store
            .send_packet(
                &port,
                &chan_a,
                Binary::from(b"late".to_vec()),
                PacketTimeout::with_height(Height::new(0, 1)),
            )
            .unwrap();
        let proof = prove(&mut open.a, &mut open.b, &open.client_b);
        let height = Height::new(0, open.b.height);
        let delivery = open
            .b
            .store
            .recv_packet(&packet, &proof, height, open.b.time())
            .unwrap();
        assert_eq!(delivery, Delivery::TimedOut);
        assert_eq!(
            open.b
                .store
                .channel(&port, &chan_b)
                .unwrap()
                .next_sequence_recv,
            1
        );

        let proof = prove(&mut open.b, &mut open.a, &open.client_a);
        open.a.store.timeout_packet(&packet, &proof).unwrap();
        assert!(open.a.store.is_timed_out(&port, &chan_a, 1));
        assert!(open.a.store.pending_packets(&port, &chan_a).is_empty());
        assert_eq!(
            open.a.store.channel(&port, &chan_a).unwrap().state(),
            State::Closed
        );

        let proof = prove(&mut open.a, &mut open.b, &open.client_b);
        open.b.store.chan_close_confirm(&port, &chan_b, &proof).unwrap();
        assert_eq!(
            open.b.store.channel(&port, &chan_b).unwrap().state(),
            State::Closed
        );
    }

    #[test]
    fn ordered_timeout_on_closed_channel_is_rejected() {
        let mut open = open_connection();
        let (chan_a, _) = open_channel(&mut open, Order::Ordered);
        let port = PortId::from("mock");
        let packet = open
            .a
            .store
            .send_packet(
                &port,
                &chan_a,
                Binary::from(b"late".to_vec()),
                PacketTimeout::with_height(Height::new(0, 1)),
            )
            .unwrap();
        open.a.store.chan_close_init(&port, &chan_a).unwrap();

        let proof = prove(&mut open.b, &mut open.a, &open.client_a);
        let err = open.a.store.timeout_packet(&packet, &proof).unwrap_err();
        assert!(err.is_protocol_violation());
        assert!(err.to_string().contains("CloseInit is not allowed in state CLOSED"));
        // nothing was written
        assert!(!open.a.store.is_timed_out(&port, &chan_a, packet.sequence));
        assert_eq!(open.a.store.pending_packets(&port, &chan_a), vec![packet]);
    }

    #[test]
    fn timeout_before_expiry_is_rejected() {
        let mut open = open_connection();
        let (chan_a, _) = open_channel(&mut open, Order::Unordered);
        let port = PortId::from("mock");
        let packet = open
            .a
            .store
            .send_packet(&port, &chan_a, Binary::from(b"x".to_vec()), far_timeout())
            .unwrap();
        let proof = prove(&mut open.b, &mut open.a, &open.client_a);
        let err = open.a.store.timeout_packet(&packet, &proof).unwrap_err();
        assert!(err.to_string().contains("has not timed out"));
        assert_eq!(open.a.store.pending_packets(&port, &chan_a).len(), 1);
    }

    #[test]
    fn timeout_on_close_works() {
        let mut open = open_connection();
        let (chan_a, chan_b) = open_channel(&mut open, Order::Unordered);
        let port = PortId::from("mock");
        let packet = open
            .a
            .store
            .send_packet(&port, &chan_a, Binary::from(b"x".to_vec()), far_timeout())
            .unwrap();

        // the counterparty must be closed first
        let proof = prove(&mut open.b, &mut open.a, &open.client_a);
        let err = open.a.store.timeout_on_close(&packet, &proof).unwrap_err();
        assert!(err.is_protocol_violation());

        open.b.store.chan_close_init(&port, &chan_b).unwrap();
        let proof = prove(&mut open.b, &mut open.a, &open.client_a);
        open.a.store.timeout_on_close(&packet, &proof).unwrap();
        assert!(open.a.store.is_timed_out(&port, &chan_a, packet.sequence));
    }
}
