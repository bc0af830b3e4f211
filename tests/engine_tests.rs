mod common;

use chrono::{TimeZone, Utc};
use hickory_resolver::config::{NameServerConfigGroup, ResolverConfig};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, UdpSocket};

use common::{host, CountingStore, FakeProber};
use lan_monitor::config::MonitorConfig;
use lan_monitor::models::{HostProbeResult, PortError};
use lan_monitor::probe::AddressResolver;
use lan_monitor::Monitor;

fn monitor(prober: FakeProber, store: Arc<CountingStore>) -> Arc<Monitor> {
    Arc::new(Monitor::new(&MonitorConfig::default(), Arc::new(prober), store))
}

async fn open_port() -> (TcpListener, u16) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, port)
}

async fn closed_port() -> u16 {
    let (listener, port) = open_port().await;
    drop(listener);
    port
}

/// Waits for detached last-seen writes to land, then gives stragglers a moment.
async fn settle(store: &CountingStore, expected: usize) {
    for _ in 0..100 {
        if store.total_calls() >= expected {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    tokio::time::sleep(Duration::from_millis(50)).await;
}

#[tokio::test]
async fn empty_host_list_gives_empty_batch() {
    let store = Arc::new(CountingStore::new(vec![]));
    let batch = monitor(FakeProber::new(), store).run_configured_cycle().await.unwrap();
    assert!(batch.is_empty());
}

#[tokio::test(start_paused = true)]
async fn batch_keeps_input_order_when_completion_order_differs() {
    let prober = FakeProber::new()
        .delayed("10.0.0.1", HostProbeResult::from_replies(2, &[5.0]), Duration::from_millis(900))
        .delayed("10.0.0.2", HostProbeResult::from_replies(2, &[5.0]), Duration::from_millis(500))
        .delayed("10.0.0.3", HostProbeResult::unreachable(), Duration::from_millis(100));
    let hosts = vec![host(1, "10.0.0.1", vec![]), host(2, "10.0.0.2", vec![]), host(3, "10.0.0.3", vec![])];
    let store = Arc::new(CountingStore::new(hosts.clone()));

    let batch = monitor(prober, store).run_cycle(hosts).await;

    let ids: Vec<i64> = batch.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![1, 2, 3]);
    assert!(batch[0].is_alive);
    assert!(batch[1].is_alive);
    assert!(!batch[2].is_alive);
}

#[tokio::test(start_paused = true)]
async fn hanging_hosts_do_not_stack_up() {
    let mut prober = FakeProber::new().reply("10.0.1.100", 1.0);
    let mut hosts = Vec::new();
    for i in 1..=5 {
        let ip = format!("10.0.1.{i}");
        prober = prober.delayed(&ip, HostProbeResult::unreachable(), Duration::from_secs(2));
        hosts.push(host(i, &ip, vec![]));
    }
    hosts.push(host(100, "10.0.1.100", vec![]));
    let store = Arc::new(CountingStore::new(hosts.clone()));

    let start = tokio::time::Instant::now();
    let batch = monitor(prober, store).run_cycle(hosts).await;
    let elapsed = start.elapsed();

    assert_eq!(batch.len(), 6);
    assert!(elapsed >= Duration::from_secs(2));
    assert!(elapsed < Duration::from_secs(3), "cycle took {elapsed:?}");
    assert!(batch[5].is_alive);
    assert!(batch[..5].iter().all(|r| !r.is_alive));
}

#[tokio::test]
async fn open_port_rescues_host_that_ignores_icmp() {
    let (_listener, open) = open_port().await;
    let closed = closed_port().await;
    let hosts = vec![host(1, "127.0.0.1", vec![closed, open])];
    let store = Arc::new(CountingStore::new(hosts.clone()));

    let batch = monitor(FakeProber::new(), store).run_cycle(hosts).await;
    let result = &batch[0];

    assert!(result.is_alive);
    assert_eq!(result.packet_loss_percent, Some(100.0));
    assert_eq!(result.ports[0].port, closed);
    assert_eq!(result.ports[0].error, Some(PortError::Closed));
    assert_eq!(result.ports[1].port, open);
    assert!(result.ports[1].is_open);
    assert_eq!(result.effective_latency_ms, result.ports[1].connect_time_ms);
}

#[tokio::test]
async fn icmp_rtt_is_reported_even_with_open_ports() {
    let (_listener, open) = open_port().await;
    let hosts = vec![host(1, "127.0.0.1", vec![open])];
    let store = Arc::new(CountingStore::new(hosts.clone()));

    let batch = monitor(FakeProber::new().reply("127.0.0.1", 42.0), store).run_cycle(hosts).await;
    assert_eq!(batch[0].effective_latency_ms, Some(42.0));
    assert_eq!(batch[0].packet_loss_percent, Some(0.0));
}

#[tokio::test]
async fn dead_host_still_yields_a_result() {
    let closed = closed_port().await;
    let hosts = vec![host(1, "127.0.0.1", vec![closed])];
    let store = Arc::new(CountingStore::new(hosts.clone()));

    let batch = monitor(FakeProber::new(), Arc::clone(&store)).run_cycle(hosts).await;
    assert_eq!(batch.len(), 1);
    assert!(!batch[0].is_alive);
    assert_eq!(batch[0].effective_latency_ms, None);

    settle(&store, 0).await;
    assert_eq!(store.total_calls(), 0);
}

#[tokio::test]
async fn last_seen_written_once_per_alive_host() {
    let (_listener, open) = open_port().await;
    let before = Utc.timestamp_millis_opt(1_600_000_000_000).unwrap();
    let mut pinged = host(1, "10.0.0.1", vec![]);
    pinged.last_seen = Some(before);
    let hosts = vec![pinged, host(2, "127.0.0.1", vec![open]), host(3, "10.0.0.3", vec![])];
    let store = Arc::new(CountingStore::new(hosts.clone()));

    let batch = monitor(FakeProber::new().reply("10.0.0.1", 3.0), Arc::clone(&store)).run_cycle(hosts).await;

    // Returned value is the one known before the cycle.
    assert_eq!(batch[0].last_seen, Some(before));

    settle(&store, 2).await;
    assert_eq!(store.calls_for(1), 1);
    assert_eq!(store.calls_for(2), 1);
    assert_eq!(store.calls_for(3), 0);
}

#[tokio::test]
async fn persistence_failure_does_not_fail_the_cycle() {
    let hosts = vec![host(1, "10.0.0.1", vec![])];
    let store = Arc::new(CountingStore::failing(hosts.clone()));

    let batch = monitor(FakeProber::new().reply("10.0.0.1", 2.0), Arc::clone(&store))
        .run_configured_cycle()
        .await
        .unwrap();
    assert!(batch[0].is_alive);

    settle(&store, 1).await;
    assert_eq!(store.calls_for(1), 1);
}

#[tokio::test]
async fn panicking_check_degrades_only_that_host() {
    let prober = FakeProber::new().reply("10.0.0.2", 4.0).panic_on("10.0.0.1");
    let hosts = vec![host(1, "10.0.0.1", vec![8080]), host(2, "10.0.0.2", vec![])];
    let store = Arc::new(CountingStore::new(hosts.clone()));

    let batch = monitor(prober, store).run_cycle(hosts).await;

    assert_eq!(batch.len(), 2);
    assert_eq!(batch[0].id, 1);
    assert!(!batch[0].is_alive);
    assert_eq!(batch[0].packet_loss_percent, None);
    assert_eq!(batch[0].ports.len(), 1);
    assert!(batch[1].is_alive);
}

#[tokio::test]
async fn stalled_name_lookup_is_bounded() {
    // Nameserver socket that is never read.
    let silent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let servers = NameServerConfigGroup::from_ips_clear(
        &[IpAddr::V4(Ipv4Addr::LOCALHOST)],
        silent.local_addr().unwrap().port(),
        true,
    );
    let resolver =
        AddressResolver::with_config(ResolverConfig::from_parts(None, vec![], servers), Duration::from_millis(200));

    let hosts = vec![host(1, "nas.office.lan", vec![22]), host(2, "10.0.0.2", vec![])];
    let store = Arc::new(CountingStore::new(hosts.clone()));
    let prober = FakeProber::new().reply("10.0.0.2", 1.0);
    let monitor = Arc::new(Monitor::new(&MonitorConfig::default(), Arc::new(prober), store).with_resolver(resolver));

    let start = std::time::Instant::now();
    let batch = monitor.run_cycle(hosts).await;
    let elapsed = start.elapsed();

    assert!(elapsed < Duration::from_secs(2), "cycle took {elapsed:?}");
    assert!(!batch[0].is_alive);
    assert_eq!(batch[0].packet_loss_percent, Some(100.0));
    assert_eq!(batch[0].ports[0].error, Some(PortError::Closed));
    assert!(batch[1].is_alive);
}
