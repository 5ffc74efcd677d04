//! Server selection and dispatch benchmarks.
//!
//! Measures the cost of picking a server and of a full in-memory
//! request/response round trip at different pool sizes:
//! - Pool sizes: 1, 4, 16
//!
//! Run with: cargo bench --bench server_selection
//! Results saved to: target/criterion/

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use ledger_remote::transport::LinkCommand;
use ledger_remote::{Remote, Server};
use serde_json::{Value, json};
use tokio::runtime::Runtime;
use tokio::sync::mpsc::UnboundedReceiver;

// ============================================================================
// Benchmark Parameters
// ============================================================================

const POOL_SIZES: &[usize] = &[1, 4, 16];

// ============================================================================
// Setup
// ============================================================================

/// Remote whose servers are attached to in-memory links.
fn connected_remote(size: usize) -> (Remote, Vec<UnboundedReceiver<LinkCommand>>) {
    let remote = Remote::new();
    let links = (0..size)
        .map(|port| {
            remote
                .add_server(&format!("wss://localhost:{}", 5006 + port))
                .expect("add server")
                .attach()
        })
        .collect();
    (remote, links)
}

/// Answers every outstanding frame on every link.
fn answer_all(servers: &[Server], links: &mut [UnboundedReceiver<LinkCommand>]) {
    for (server, link) in servers.iter().zip(links.iter_mut()) {
        while let Ok(LinkCommand::Frame(text)) = link.try_recv() {
            let frame: Value = serde_json::from_str(&text).expect("json frame");
            let reply = json!({
                "id": frame["id"],
                "status": "success",
                "type": "response",
                "result": { "info": { "server_state": "full" } }
            });
            server.handle_message(&reply.to_string());
        }
    }
}

// ============================================================================
// Benchmark: Server Selection
// ============================================================================

fn bench_get_server(c: &mut Criterion) {
    let mut group = c.benchmark_group("get_server");

    for &size in POOL_SIZES {
        let (remote, _links) = connected_remote(size);
        group.bench_with_input(BenchmarkId::new("pool", size), &remote, |b, remote| {
            b.iter(|| black_box(remote.get_server()));
        });
    }

    group.finish();
}

// ============================================================================
// Benchmark: Dispatch Round Trip
// ============================================================================

fn bench_round_trip(c: &mut Criterion) {
    let mut group = c.benchmark_group("round_trip");

    for &size in POOL_SIZES {
        let (remote, mut links) = connected_remote(size);
        let servers = remote.servers();

        group.bench_function(BenchmarkId::new("request", size), |b| {
            b.iter(|| {
                let mut request = remote.request("server_info");
                request.callback(|outcome| {
                    black_box(outcome.is_ok());
                });
                request.request().expect("dispatch");
                answer_all(&servers, &mut links);
            });
        });

        group.bench_function(BenchmarkId::new("broadcast", size), |b| {
            b.iter(|| {
                let request = remote.request("server_info");
                request.broadcast().expect("broadcast");
                answer_all(&servers, &mut links);
            });
        });
    }

    group.finish();
}

fn bench_send(c: &mut Criterion) {
    let rt = Runtime::new().expect("runtime");
    let mut group = c.benchmark_group("send");

    let (remote, mut links) = connected_remote(1);
    let server = remote.servers().remove(0);
    let mut link = links.remove(0);

    rt.spawn(async move {
        while let Some(LinkCommand::Frame(text)) = link.recv().await {
            let frame: Value = serde_json::from_str(&text).expect("json frame");
            let reply = json!({
                "id": frame["id"],
                "status": "success",
                "type": "response",
                "result": {}
            });
            server.handle_message(&reply.to_string());
        }
    });

    group.bench_function("server_info", |b| {
        b.to_async(&rt)
            .iter(|| async { black_box(remote.request("server_info").send().await) });
    });

    group.finish();
}

criterion_group!(benches, bench_get_server, bench_round_trip, bench_send);
criterion_main!(benches);
