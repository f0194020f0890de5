use manet::{FlowStatus, LossModel, NodeId, Scenario, ScenarioConfig, ScenarioError, SimTime};
use std::time::Duration;

#[test]
fn report_lines() {
    let outcome = Scenario::run(ScenarioConfig::default()).unwrap();
    let report = outcome.to_string();
    let mut lines = report.lines();

    for seconds in (5..=40).step_by(5) {
        assert_eq!(lines.next(), Some(format!("{seconds} 0 0 0").as_str()));
    }
    // final flush, at the end of the run
    assert_eq!(lines.next(), Some("40 0 0 0"));
    assert_eq!(lines.next(), Some(""));
    assert_eq!(lines.next(), Some("Flow ID: 1"));
    assert_eq!(lines.next(), Some("Src Addr: 10.1.1.25"));
    assert_eq!(lines.next(), Some("Dst Addr: 10.1.1.1"));
    assert_eq!(lines.next(), Some("Tx Packets: 1"));
    assert_eq!(lines.next(), Some("Rx Packets: 1"));
}

#[test]
fn drop_records_are_monotonic() {
    let config = ScenarioConfig {
        num_packets: 200,
        interval: Duration::from_millis(2),
        mac_queue_limit: 10,
        loss: "10%".parse().unwrap(),
        seed: 42,
        ..ScenarioConfig::default()
    };
    let outcome = Scenario::run(config).unwrap();

    assert_eq!(outcome.drops.len(), 9);
    for pair in outcome.drops.windows(2) {
        assert!(pair[1].time >= pair[0].time);
        assert!(pair[1].drops.dominates(&pair[0].drops));
    }

    let last = outcome.drops.last().unwrap().drops;
    assert!(last.mac_tx > 0);
    assert!(last.phy_rx > 0);
    assert_eq!(last.phy_tx, 0);

    let flow = &outcome.flows[0];
    assert_eq!(flow.tx_packets, 200);
    assert_eq!(flow.rx_packets, outcome.received);
    assert!(flow.rx_packets < 200);
}

#[test]
fn same_seed_same_outcome() {
    let config = ScenarioConfig {
        num_packets: 50,
        loss: LossModel::rate(0.2).unwrap(),
        seed: 7,
        ..ScenarioConfig::default()
    };

    let first = Scenario::run(config.clone()).unwrap();
    let second = Scenario::run(config).unwrap();

    assert_eq!(first.received, second.received);
    assert_eq!(first.drops, second.drops);
}

#[test]
fn sources_stop_after_their_budget() {
    let config = ScenarioConfig {
        sources: vec![NodeId::new(24), NodeId::new(12)],
        num_packets: 3,
        ..ScenarioConfig::default()
    };
    let scenario = Scenario::new(config).unwrap();
    let sources = scenario.sources().to_vec();
    let outcome = scenario.execute().unwrap();

    assert!(sources.iter().all(|source| source.remaining() == 0));
    assert!(sources.iter().all(|source| source.sent() == 3));
    assert_eq!(outcome.received, 6);
    assert!(outcome.flows.iter().all(|flow| flow.status == FlowStatus::Measured));
}

#[test]
fn run_shorter_than_the_start() {
    let config = ScenarioConfig {
        duration: Duration::from_secs(12),
        ..ScenarioConfig::default()
    };
    let outcome = Scenario::run(config).unwrap();

    assert_eq!(outcome.ended_at, SimTime::from_secs(12));
    assert_eq!(outcome.drops.len(), 3);
    // nothing was sent: the flow was never seen
    assert!(outcome.flows.is_empty());
}

#[test]
fn flow_monitor_file() {
    let path = std::env::temp_dir().join(format!("manet-scenario-{}.json", std::process::id()));
    let config = ScenarioConfig {
        flow_monitor_file: Some(path.clone()),
        ..ScenarioConfig::default()
    };
    Scenario::run(config).unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    std::fs::remove_file(&path).unwrap();
    assert!(content.contains("\"source\": \"10.1.1.25:49153\""));
    assert!(content.contains("\"destination\": \"10.1.1.1:80\""));
}

#[test]
fn invalid_configuration_is_rejected_before_the_run() {
    let config = ScenarioConfig {
        sink: NodeId::new(99),
        ..ScenarioConfig::default()
    };
    assert!(matches!(
        Scenario::run(config),
        Err(ScenarioError::UnknownNode { node, .. }) if node == NodeId::new(99)
    ));

    let config = ScenarioConfig {
        num_nodes: 300,
        sources: vec![NodeId::new(299)],
        ..ScenarioConfig::default()
    };
    assert!(matches!(Scenario::run(config), Err(ScenarioError::Channel(_))));
}
