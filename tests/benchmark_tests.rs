//! Performance benchmarks for registry and broadcast paths

use server::network::Server;
use server::registry::SessionRegistry;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;

/// Benchmarks identity assignment under contention
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn benchmark_concurrent_registration() {
    let registry = Arc::new(SessionRegistry::new());
    let tasks = 8;
    let per_task = 1_000;
    let start = Instant::now();

    let handles: Vec<_> = (0..tasks)
        .map(|_| {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move {
                let mut inboxes = Vec::with_capacity(per_task);
                for _ in 0..per_task {
                    let (outbox, inbox) = mpsc::channel(1);
                    registry.register(outbox).await;
                    inboxes.push(inbox);
                }
                inboxes
            })
        })
        .collect();

    let mut inboxes = Vec::new();
    for handle in handles {
        inboxes.extend(handle.await.unwrap());
    }

    let duration = start.elapsed();
    println!(
        "Registration: {} sessions in {:?} ({:.2} μs/session)",
        tasks * per_task,
        duration,
        duration.as_micros() as f64 / (tasks * per_task) as f64
    );

    assert_eq!(registry.len().await, tasks * per_task);
    // Should complete in under 2 seconds
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks in-process fan-out to many recipients
#[tokio::test]
async fn benchmark_broadcast_fan_out() {
    let registry = SessionRegistry::new();
    let recipients = 100;
    let messages = 1_000;

    let (sender_outbox, _sender_inbox) = mpsc::channel(1);
    let sender = registry.register(sender_outbox).await;

    let mut inboxes = Vec::new();
    for _ in 0..recipients {
        // Deep enough to hold the whole run, since nothing drains until the end
        let (outbox, inbox) = mpsc::channel(messages);
        registry.register(outbox).await;
        inboxes.push(inbox);
    }

    let start = Instant::now();
    for i in 0..messages {
        let delivered = registry
            .broadcast(&format!("Client {}: {}", sender, i), Some(sender))
            .await;
        assert_eq!(delivered, recipients);
    }
    let duration = start.elapsed();

    println!(
        "Fan-out: {} messages x {} recipients in {:?} ({:.2} μs/message)",
        messages,
        recipients,
        duration,
        duration.as_micros() as f64 / messages as f64
    );

    for inbox in &mut inboxes {
        let mut received = 0;
        while inbox.try_recv().is_ok() {
            received += 1;
        }
        assert_eq!(received, messages);
    }

    // Should complete in under 2 seconds
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks end-to-end relay latency over loopback TCP
#[tokio::test]
async fn benchmark_tcp_relay() {
    let server = Server::bind("127.0.0.1:0").await.unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.run());

    let mut sender = TcpStream::connect(addr).await.unwrap();
    let mut greeting = String::new();
    {
        let mut reader = BufReader::new(&mut sender);
        reader.read_line(&mut greeting).await.unwrap();
    }
    assert_eq!(greeting, "Your user ID is: 0\n");

    let receiver = TcpStream::connect(addr).await.unwrap();
    let mut receiver = BufReader::new(receiver).lines();
    assert_eq!(
        receiver.next_line().await.unwrap().unwrap(),
        "Your user ID is: 1"
    );

    let messages = 1_000;
    let start = Instant::now();

    for i in 0..messages {
        sender
            .write_all(format!("line {}\n", i).as_bytes())
            .await
            .unwrap();
    }

    for i in 0..messages {
        let line = timeout(Duration::from_secs(5), receiver.next_line())
            .await
            .expect("relay stalled")
            .unwrap()
            .unwrap();
        assert_eq!(line, format!("Client 0: line {}", i));
    }

    let duration = start.elapsed();
    println!(
        "TCP relay: {} lines in {:?} ({:.2} μs/line)",
        messages,
        duration,
        duration.as_micros() as f64 / messages as f64
    );

    // Should complete in under 5 seconds
    assert!(duration.as_millis() < 5000);
}
