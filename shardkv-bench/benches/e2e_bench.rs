//! End-to-end client-server benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use shardkv_client::Client;
use shardkv_core::Engine;
use shardkv_server::{server, ConnectionSemaphore};
use shardkv_storage::{Role, Storage};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::runtime::Runtime;
use tokio::sync::watch;

struct TestSetup {
    _server_handle: tokio::task::JoinHandle<()>,
    _shutdown_tx: watch::Sender<bool>,
    client: Client,
}

fn setup_server_and_client(rt: &Runtime) -> TestSetup {
    let storage = Storage::new(Arc::new(Engine::new(64)), None, Role::Standalone);
    let semaphore = Arc::new(ConnectionSemaphore::new(0));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let (listener, addr) = rt.block_on(async {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        (listener, addr)
    });

    let server_handle = rt.spawn(async move {
        let _ = server::run(
            listener,
            storage,
            semaphore,
            8192,
            Duration::from_secs(30),
            shutdown_rx,
        )
        .await;
    });

    let client = rt.block_on(async {
        // Give the accept loop a moment to start listening.
        tokio::time::sleep(Duration::from_millis(20)).await;
        Client::connect(addr).await.unwrap()
    });

    TestSetup {
        _server_handle: server_handle,
        _shutdown_tx: shutdown_tx,
        client,
    }
}

fn bench_set_roundtrip(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut setup = setup_server_and_client(&rt);

    let mut group = c.benchmark_group("e2e_set");
    group.throughput(Throughput::Elements(1));
    group.bench_function("roundtrip", |b| {
        let mut i = 0u64;
        b.to_async(&rt).iter(|| {
            i += 1;
            let line = format!("SET key-{i} value-{i}");
            async { black_box(setup.client.send_line(&line).await.unwrap()) }
        });
    });
    group.finish();
}

fn bench_get_roundtrip(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut setup = setup_server_and_client(&rt);

    rt.block_on(async {
        for i in 0..1000 {
            setup
                .client
                .send_line(&format!("SET key-{i} value-{i}"))
                .await
                .unwrap();
        }
    });

    let mut group = c.benchmark_group("e2e_get");
    group.throughput(Throughput::Elements(1));
    group.bench_function("roundtrip", |b| {
        let mut i = 0u64;
        b.to_async(&rt).iter(|| {
            i = (i + 1) % 1000;
            let line = format!("GET key-{i}");
            async { black_box(setup.client.send_line(&line).await.unwrap()) }
        });
    });
    group.finish();
}

fn bench_concurrent_clients(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    let mut group = c.benchmark_group("e2e_concurrent");
    group.sample_size(20);

    for clients in [1, 4, 16] {
        let storage = Storage::new(Arc::new(Engine::new(64)), None, Role::Standalone);
        let semaphore = Arc::new(ConnectionSemaphore::new(0));
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        let (listener, addr) = rt.block_on(async {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            (listener, addr)
        });

        let _server_handle = rt.spawn(async move {
            let _ = server::run(
                listener,
                storage,
                semaphore,
                8192,
                Duration::from_secs(30),
                shutdown_rx,
            )
            .await;
        });

        rt.block_on(async { tokio::time::sleep(Duration::from_millis(20)).await });

        group.throughput(Throughput::Elements(clients as u64 * 100));
        group.bench_with_input(
            BenchmarkId::new("clients", clients),
            &clients,
            |b, &clients| {
                b.to_async(&rt).iter(|| async move {
                    let mut handles = Vec::with_capacity(clients);
                    for c in 0..clients {
                        handles.push(tokio::spawn(async move {
                            let mut client = Client::connect(addr).await.unwrap();
                            for i in 0..100 {
                                client
                                    .send_line(&format!("SET c{c}-k{i} v"))
                                    .await
                                    .unwrap();
                            }
                        }));
                    }
                    for h in handles {
                        h.await.unwrap();
                    }
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_set_roundtrip,
    bench_get_roundtrip,
    bench_concurrent_clients
);
criterion_main!(benches);
