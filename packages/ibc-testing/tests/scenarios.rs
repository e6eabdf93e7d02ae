//! Governance, contract bootstrap and relay flows driven end to end through
//! the public API.

use cosmwasm_std::{coins, from_json, to_json_binary, Addr, Binary, Timestamp, Uint128};

use cw_ibc_testing::testing::{
    mock_chain, mock_coordinator, CounterInstantiateMsg, MockLedger, PacketCountsResponse,
    ReflectExecuteMsg, ReflectInstantiateMsg, ReflectQueryMsg, ACKNOWLEDGED_KEY, COUNTER_WASM,
    ECHO_FAIL, RECEIVED_KEY, REFLECT_WASM, TIMED_OUT_KEY,
};
use cw_ibc_testing::workflows::{
    advance_past_voting, instantiate, query_proposal, store_code, submit_proposal,
    vote_and_advance,
};
use cw_ibc_testing::{
    AppResponse, BankMsg, BlockInfo, Chain, ChainConfig, ChainId, Coordinator, HarnessError,
    Height, IbcMsg, Ledger, LedgerQuery, LedgerResult, Msg, Order, Packet, PacketTimeout, Path,
    PortId, ProposalStatus, RelayOutcome, StdAck, VoteOption, WasmMsg,
};

fn far_future() -> PacketTimeout {
    PacketTimeout::with_height(Height::new(0, 10_000))
}

fn in_the_past() -> PacketTimeout {
    PacketTimeout::with_timestamp(Timestamp::from_seconds(1))
}

fn open_path(coordinator: &mut Coordinator<MockLedger>, order: Order) -> Path {
    let (a, b) = (coordinator.chain_id(1), coordinator.chain_id(2));
    let mut path = coordinator.new_path(&a, &b).unwrap();
    path.endpoint_a.channel_config.order = order;
    path.endpoint_b.channel_config.order = order;
    coordinator.setup(&mut path).unwrap();
    path
}

/// Sends a packet from the `mock` port of side A and commits.
fn send_from_a(
    coordinator: &mut Coordinator<MockLedger>,
    path: &Path,
    data: &[u8],
    timeout: PacketTimeout,
) -> Packet {
    let endpoint = &path.endpoint_a;
    let msg: Msg = IbcMsg::SendPacket {
        source_port: endpoint.port_id().clone(),
        source_channel: endpoint.channel_id().unwrap().clone(),
        data: Binary::from(data),
        timeout,
    }
    .into();
    let chain = coordinator.chain_mut(&endpoint.chain_id).unwrap();
    let mut response = chain.send_msgs(vec![msg]).unwrap();
    assert_eq!(response.packets.len(), 1);
    response.packets.remove(0)
}

fn module_count(chain: &Chain<MockLedger>, key: &[u8]) -> Option<u64> {
    chain
        .ledger()
        .module_storage(&PortId::from("mock"))
        .unwrap()
        .may_load(key)
        .unwrap()
}

// governance

#[test]
fn proposal_without_votes_fails_on_quorum() {
    let mut chain = mock_chain("testchain1");
    let proposer = chain.sender().clone();
    let recipient = chain.accounts()[1].address.clone();
    let before = chain.balance(&recipient, "stake").unwrap();
    let messages: Vec<Msg> = (1..=3)
        .map(|amount| {
            BankMsg::Send {
                to_address: recipient.to_string(),
                amount: coins(amount, "stake"),
            }
            .into()
        })
        .collect();

    let id = submit_proposal(&mut chain, messages, &proposer).unwrap();
    let status = advance_past_voting(&mut chain, id).unwrap();
    assert_eq!(status, ProposalStatus::Failed);

    let proposal = query_proposal(&chain, id).unwrap();
    assert_eq!(proposal.messages.len(), 3);
    assert_eq!(proposal.final_tally.unwrap().total(), Uint128::zero());
    assert_eq!(chain.balance(&recipient, "stake").unwrap(), before);
    // no quorum burns the deposit
    let gov_module = chain.ledger().gov_module().clone();
    assert_eq!(chain.balance(&gov_module, "stake").unwrap(), Uint128::zero());
}

#[test]
fn proposal_with_yes_vote_passes_and_executes() {
    let mut chain = mock_chain("testchain1");
    let proposer = chain.sender().clone();
    let recipient = chain.accounts()[1].address.clone();
    let gov_module = chain.ledger().gov_module().clone();
    chain
        .send_msgs(vec![BankMsg::Send {
            to_address: gov_module.to_string(),
            amount: coins(500, "stake"),
        }
        .into()])
        .unwrap();
    let before = chain.balance(&recipient, "stake").unwrap();

    let payout: Msg = BankMsg::Send {
        to_address: recipient.to_string(),
        amount: coins(500, "stake"),
    }
    .into();
    let id = submit_proposal(&mut chain, vec![payout], &proposer).unwrap();
    let status = vote_and_advance(&mut chain, id, VoteOption::Yes).unwrap();
    assert_eq!(status, ProposalStatus::Passed);
    assert_eq!(
        chain.balance(&recipient, "stake").unwrap(),
        before + Uint128::new(500)
    );
    // the deposit went back to the proposer
    assert_eq!(chain.balance(&gov_module, "stake").unwrap(), Uint128::zero());
}

#[test]
fn passed_proposal_with_failing_message_is_failed() {
    let mut chain = mock_chain("testchain1");
    let proposer = chain.sender().clone();
    let recipient = chain.accounts()[1].address.clone();
    // the gov module holds nothing but the escrowed deposit
    let payout: Msg = BankMsg::Send {
        to_address: recipient.to_string(),
        amount: coins(u128::MAX, "stake"),
    }
    .into();
    let id = submit_proposal(&mut chain, vec![payout], &proposer).unwrap();
    let status = vote_and_advance(&mut chain, id, VoteOption::Yes).unwrap();
    assert_eq!(status, ProposalStatus::Failed);
    let proposal = query_proposal(&chain, id).unwrap();
    assert!(proposal.failed_reason.unwrap().contains("Insufficient funds"));
}

#[test]
fn veto_fails_the_proposal() {
    let mut chain = mock_chain("testchain1");
    let proposer = chain.sender().clone();
    let id = submit_proposal(&mut chain, vec![], &proposer).unwrap();
    let status = vote_and_advance(&mut chain, id, VoteOption::NoWithVeto).unwrap();
    assert_eq!(status, ProposalStatus::Failed);
}

// contract bootstrap

#[test]
fn instantiate_returns_one_address() {
    let mut chain = mock_chain("testchain1");
    let sender = chain.sender().clone();
    let code_id = store_code(&mut chain, &sender, COUNTER_WASM).unwrap();
    let first = instantiate(
        &mut chain,
        &sender,
        code_id,
        &CounterInstantiateMsg { count: 1 },
        vec![],
        "first",
    )
    .unwrap();
    let second = instantiate(
        &mut chain,
        &sender,
        code_id,
        &CounterInstantiateMsg { count: 2 },
        vec![],
        "second",
    )
    .unwrap();
    assert_ne!(first, second);
    assert!(first.as_str().starts_with("cosmos1"));
}

/// Answers every instantiation twice.
#[derive(Clone)]
struct DoubleInstantiate(MockLedger);

impl Ledger for DoubleInstantiate {
    fn apply_messages(
        &mut self,
        block: &BlockInfo,
        sender: &Addr,
        msgs: &[Msg],
    ) -> LedgerResult<AppResponse> {
        let mut response = self.0.apply_messages(block, sender, msgs)?;
        if msgs
            .iter()
            .any(|msg| matches!(msg, Msg::Wasm(WasmMsg::Instantiate { .. })))
        {
            let copies = response.msg_responses.clone();
            response.msg_responses.extend(copies);
        }
        Ok(response)
    }

    fn query_state(&self, block: &BlockInfo, request: &LedgerQuery) -> LedgerResult<Binary> {
        self.0.query_state(block, request)
    }

    fn commit_block(&mut self, block: &BlockInfo) -> LedgerResult<AppResponse> {
        self.0.commit_block(block)
    }
}

#[test]
fn instantiate_with_two_responses_is_an_inconsistency() {
    let mut chain = Chain::new(ChainId::new("testchain1"), ChainConfig::default(), |genesis| {
        DoubleInstantiate(MockLedger::new(genesis))
    })
    .unwrap();
    let sender = chain.sender().clone();
    let code_id = store_code(&mut chain, &sender, COUNTER_WASM).unwrap();
    let err = instantiate(
        &mut chain,
        &sender,
        code_id,
        &CounterInstantiateMsg { count: 1 },
        vec![],
        "twice",
    )
    .unwrap_err();
    assert!(err.is_inconsistency());
}

// relay

#[test]
fn expired_packet_times_out_without_delivery() {
    let mut coordinator = mock_coordinator(2);
    let path = open_path(&mut coordinator, Order::Unordered);
    let packet = send_from_a(&mut coordinator, &path, b"too late", in_the_past());

    let report = coordinator.relay_and_ack_pending_packets(&path).unwrap();
    assert_eq!(report.timed_out, vec![packet.clone()]);
    assert!(report.acknowledged.is_empty());

    let a = coordinator.chain(&path.endpoint_a.chain_id).unwrap();
    let b = coordinator.chain(&path.endpoint_b.chain_id).unwrap();
    let channel_b = b
        .channel(path.endpoint_b.port_id(), path.endpoint_b.channel_id().unwrap())
        .unwrap();
    assert_eq!(channel_b.next_sequence_recv, 1);
    assert_eq!(module_count(b, RECEIVED_KEY), None);
    assert_eq!(module_count(a, TIMED_OUT_KEY), Some(1));
    assert!(a.is_timed_out(&packet.source_port, &packet.source_channel, packet.sequence));
    assert!(a
        .acknowledgement(&packet.source_port, &packet.source_channel, packet.sequence)
        .is_none());
    assert!(coordinator.pending_on(&path.endpoint_a).unwrap().is_empty());
}

#[test]
fn unordered_packets_are_acknowledged() {
    let mut coordinator = mock_coordinator(2);
    let path = open_path(&mut coordinator, Order::Unordered);
    let first = send_from_a(&mut coordinator, &path, b"one", far_future());
    let second = send_from_a(&mut coordinator, &path, b"two", far_future());
    assert!(first.sequence < second.sequence);

    let report = coordinator.relay_and_ack_pending_packets(&path).unwrap();
    assert_eq!(report.len(), 2);
    assert!(report.timed_out.is_empty());
    for (packet, acknowledgement) in &report.acknowledged {
        assert_eq!(
            StdAck::parse(acknowledgement).unwrap(),
            StdAck::success(packet.data.clone())
        );
    }

    let a = coordinator.chain(&path.endpoint_a.chain_id).unwrap();
    let b = coordinator.chain(&path.endpoint_b.chain_id).unwrap();
    assert_eq!(module_count(b, RECEIVED_KEY), Some(2));
    assert_eq!(module_count(a, ACKNOWLEDGED_KEY), Some(2));
    assert!(a
        .acknowledgement(&first.source_port, &first.source_channel, first.sequence)
        .is_some());

    let err = coordinator.relay_and_ack_pending_packets(&path).unwrap_err();
    assert!(matches!(err, HarnessError::NothingToRelay { .. }));
}

#[test]
fn relay_moves_both_directions() {
    let mut coordinator = mock_coordinator(2);
    let path = open_path(&mut coordinator, Order::Unordered);
    send_from_a(&mut coordinator, &path, b"a to b", far_future());
    send_from_a(&mut coordinator, &path.reversed(), b"b to a", far_future());

    let report = coordinator.relay_and_ack_pending_packets(&path).unwrap();
    let data: Vec<&[u8]> = report
        .acknowledged
        .iter()
        .map(|(packet, _)| packet.data.as_slice())
        .collect();
    assert_eq!(data, vec![b"a to b".as_slice(), b"b to a".as_slice()]);
}

#[test]
fn application_error_becomes_error_acknowledgement() {
    let mut coordinator = mock_coordinator(2);
    let path = open_path(&mut coordinator, Order::Unordered);
    let packet = send_from_a(&mut coordinator, &path, ECHO_FAIL, far_future());

    let outcome = coordinator.relay_packet(&path, &packet).unwrap();
    let acknowledgement = match outcome {
        RelayOutcome::Acknowledged { acknowledgement } => acknowledgement,
        RelayOutcome::TimedOut => panic!("Unexpected timeout"),
    };
    let ack = StdAck::parse(&acknowledgement).unwrap();
    assert!(ack.is_error());

    // the failed receive left no trace in the module
    let b = coordinator.chain(&path.endpoint_b.chain_id).unwrap();
    assert_eq!(module_count(b, RECEIVED_KEY), None);
    let a = coordinator.chain(&path.endpoint_a.chain_id).unwrap();
    assert_eq!(module_count(a, ACKNOWLEDGED_KEY), Some(1));
}

#[test]
fn ordered_timeout_closes_both_ends() {
    let mut coordinator = mock_coordinator(2);
    let path = open_path(&mut coordinator, Order::Ordered);
    let late = send_from_a(&mut coordinator, &path, b"late", in_the_past());
    let queued = send_from_a(&mut coordinator, &path, b"queued", far_future());

    let report = coordinator.relay_pending_packets(&path).unwrap();
    assert_eq!(report.timed_out, vec![late, queued]);

    for endpoint in [&path.endpoint_a, &path.endpoint_b] {
        let chain = coordinator.chain(&endpoint.chain_id).unwrap();
        let channel = chain
            .channel(endpoint.port_id(), endpoint.channel_id().unwrap())
            .unwrap();
        assert!(!channel.is_open());
    }
    let b = coordinator.chain(&path.endpoint_b.chain_id).unwrap();
    assert_eq!(module_count(b, RECEIVED_KEY), None);
}

#[test]
fn ordered_packets_arrive_in_send_order() {
    let mut coordinator = mock_coordinator(2);
    let path = open_path(&mut coordinator, Order::Ordered);
    let sent: Vec<Packet> = (0..4u8)
        .map(|i| send_from_a(&mut coordinator, &path, &[i], far_future()))
        .collect();

    // delivering the second packet first is rejected
    let err = coordinator.relay_packet(&path, &sent[1]).unwrap_err();
    assert!(err.is_protocol_violation());

    let report = coordinator.relay_pending_packets(&path).unwrap();
    let relayed: Vec<Packet> = report.acknowledged.into_iter().map(|(p, _)| p).collect();
    assert_eq!(relayed, sent);
}

#[test]
fn pending_packets_time_out_when_channel_closes() {
    let mut coordinator = mock_coordinator(2);
    let mut path = open_path(&mut coordinator, Order::Unordered);
    let packet = send_from_a(&mut coordinator, &path, b"orphan", far_future());
    coordinator.close_channel(&mut path).unwrap();

    let outcome = coordinator.relay_packet(&path, &packet).unwrap();
    assert_eq!(outcome, RelayOutcome::TimedOut);
    let a = coordinator.chain(&path.endpoint_a.chain_id).unwrap();
    assert_eq!(module_count(a, TIMED_OUT_KEY), Some(1));

    // fresh channels work again on the same connection
    let old_channel = path.endpoint_a.channel_id().unwrap().clone();
    coordinator.create_channels(&mut path).unwrap();
    assert_ne!(*path.endpoint_a.channel_id().unwrap(), old_channel);
    send_from_a(&mut coordinator, &path, b"again", far_future());
    let report = coordinator.relay_and_ack_pending_packets(&path).unwrap();
    assert_eq!(report.acknowledged.len(), 1);
}

#[test]
fn contract_port_sends_and_gets_acknowledged() {
    let mut coordinator = mock_coordinator(2);
    let (a, b) = (coordinator.chain_id(1), coordinator.chain_id(2));
    let reflect = {
        let chain = coordinator.chain_mut(&a).unwrap();
        let sender = chain.sender().clone();
        let code_id = store_code(chain, &sender, REFLECT_WASM).unwrap();
        instantiate(chain, &sender, code_id, &ReflectInstantiateMsg {}, vec![], "reflect")
            .unwrap()
    };

    let mut path = coordinator.new_path(&a, &b).unwrap();
    path.endpoint_a.channel_config.port_id = PortId::for_contract(&reflect);
    coordinator.setup(&mut path).unwrap();

    let send: Msg = IbcMsg::SendPacket {
        source_port: PortId::for_contract(&reflect),
        source_channel: path.endpoint_a.channel_id().unwrap().clone(),
        data: Binary::from(b"from a contract".as_slice()),
        timeout: far_future(),
    }
    .into();
    let chain = coordinator.chain_mut(&a).unwrap();
    let response = chain
        .send_msgs(vec![WasmMsg::Execute {
            contract_addr: reflect.to_string(),
            msg: to_json_binary(&ReflectExecuteMsg::ReflectMsgs { msgs: vec![send] }).unwrap(),
            funds: vec![],
        }
        .into()])
        .unwrap();
    assert_eq!(response.packets.len(), 1);

    let report = coordinator.relay_and_ack_pending_packets(&path).unwrap();
    assert_eq!(report.acknowledged.len(), 1);

    let chain = coordinator.chain(&a).unwrap();
    let counts: PacketCountsResponse = from_json(
        chain
            .query(&LedgerQuery::ContractSmart {
                contract_addr: reflect.to_string(),
                msg: to_json_binary(&ReflectQueryMsg::PacketCounts {}).unwrap(),
            })
            .unwrap(),
    )
    .unwrap();
    assert_eq!(counts.acknowledged, 1);
}

#[test]
fn handshake_steps_need_prior_steps() {
    let mut coordinator = mock_coordinator(2);
    let (a, b) = (coordinator.chain_id(1), coordinator.chain_id(2));
    let mut path = coordinator.new_path(&a, &b).unwrap();

    // channels before any connection
    let err = coordinator.create_channels(&mut path).unwrap_err();
    assert!(err.is_protocol_violation());

    coordinator.setup_connections(&mut path).unwrap();
    let (chain_a, chain_b) = coordinator.chain_pair_mut(&a, &b).unwrap();
    // confirming a channel that was never tried
    let err = path.endpoint_b.chan_open_confirm(chain_b, chain_a).unwrap_err();
    assert!(err.is_protocol_violation());
}

#[test]
fn channel_handshake_needs_connection_open_on_both_chains() {
    let mut coordinator = mock_coordinator(2);
    let (a, b) = (coordinator.chain_id(1), coordinator.chain_id(2));
    let mut path = coordinator.new_path(&a, &b).unwrap();
    coordinator.setup_clients(&mut path).unwrap();
    let (chain_a, chain_b) = coordinator.chain_pair_mut(&a, &b).unwrap();

    path.endpoint_a.conn_open_init(chain_a, &path.endpoint_b).unwrap();
    // connection only INIT on A
    let err = path
        .endpoint_a
        .chan_open_init(chain_a, &path.endpoint_b, chain_b)
        .unwrap_err();
    assert!(err.is_protocol_violation());

    path.endpoint_b.conn_open_try(chain_b, &path.endpoint_a, chain_a).unwrap();
    path.endpoint_a.conn_open_ack(chain_a, &path.endpoint_b, chain_b).unwrap();
    // OPEN on A, TRYOPEN on B: neither side may start a channel
    let err = path
        .endpoint_a
        .chan_open_init(chain_a, &path.endpoint_b, chain_b)
        .unwrap_err();
    assert!(err.is_protocol_violation());
    assert!(err.to_string().contains("is TRYOPEN"));
    let err = path
        .endpoint_b
        .chan_open_init(chain_b, &path.endpoint_a, chain_a)
        .unwrap_err();
    assert!(err.is_protocol_violation());
    assert!(path.endpoint_a.channel_id.is_none());
    assert!(path.endpoint_b.channel_id.is_none());
    assert_eq!(chain_a.ibc().channels().count(), 0);

    path.endpoint_b.conn_open_confirm(chain_b, chain_a).unwrap();
    coordinator.create_channels(&mut path).unwrap();
    let chain_a = coordinator.chain(&a).unwrap();
    assert!(chain_a
        .channel(path.endpoint_a.port_id(), path.endpoint_a.channel_id().unwrap())
        .unwrap()
        .is_open());
}

#[test]
fn relay_needs_both_channel_ends_open() {
    let mut coordinator = mock_coordinator(2);
    let (a, b) = (coordinator.chain_id(1), coordinator.chain_id(2));
    let mut path = coordinator.new_path(&a, &b).unwrap();
    coordinator.setup_connections(&mut path).unwrap();
    let (chain_a, chain_b) = coordinator.chain_pair_mut(&a, &b).unwrap();
    path.endpoint_a
        .chan_open_init(chain_a, &path.endpoint_b, chain_b)
        .unwrap();
    path.endpoint_b
        .chan_open_try(chain_b, &path.endpoint_a, chain_a)
        .unwrap();
    path.endpoint_a
        .chan_open_ack(chain_a, &path.endpoint_b, chain_b)
        .unwrap();

    // A is OPEN and may send while B is still TRYOPEN
    let packet = send_from_a(&mut coordinator, &path, b"early", far_future());
    let err = coordinator.relay_and_ack_pending_packets(&path).unwrap_err();
    assert!(err.is_protocol_violation());
    assert!(err.to_string().contains("in state TRYOPEN"));
    assert_eq!(
        coordinator.pending_on(&path.endpoint_a).unwrap(),
        vec![packet.clone()]
    );
    assert_eq!(module_count(coordinator.chain(&b).unwrap(), RECEIVED_KEY), None);

    let (chain_a, chain_b) = coordinator.chain_pair_mut(&a, &b).unwrap();
    path.endpoint_b.chan_open_confirm(chain_b, chain_a).unwrap();
    let report = coordinator.relay_and_ack_pending_packets(&path).unwrap();
    assert_eq!(report.acknowledged.len(), 1);
    assert_eq!(report.acknowledged[0].0, packet);
}

#[test]
fn failed_create_channels_keeps_previous_channel_ids() {
    let mut coordinator = mock_coordinator(2);
    let path = open_path(&mut coordinator, Order::Unordered);
    let mut broken = path.clone();
    broken.endpoint_b.channel_config.port_id = PortId::from("no-such-port");

    let err = coordinator.create_channels(&mut broken).unwrap_err();
    assert!(err.to_string().contains("no-such-port"));
    assert_eq!(broken.endpoint_a.channel_id, path.endpoint_a.channel_id);
    assert_eq!(broken.endpoint_b.channel_id, path.endpoint_b.channel_id);
}
