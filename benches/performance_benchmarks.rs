use std::time::Duration;

use base64::{engine::general_purpose, Engine as _};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tokio::runtime::Runtime;
use tokio::sync::mpsc::unbounded_channel;

use realtime_chat::auth::{hash_password, issue_token, token_from_cookies, verify_password, verify_token};
use realtime_chat::models::{Delivery, Identity};
use realtime_chat::presence::Hub;
use realtime_chat::uploads::{decode_data_url, extension_of};

// Presence snapshot + fan-out to every socket
fn benchmark_presence_broadcast(c: &mut Criterion) {
    let mut group = c.benchmark_group("presence_broadcast");
    let rt = Runtime::new().unwrap();

    for sockets in [2usize, 50, 500] {
        let hub = Hub::new();
        rt.block_on(async {
            for i in 0..sockets {
                let (tx, mut rx) = unbounded_channel();
                let identity = Identity {
                    user_id: format!("user-{}", i % (sockets / 2).max(1)),
                    username: format!("user{i}"),
                };
                hub.register(&format!("conn-{i}"), Some(identity), tx).await;
                // Stand-in for the per-socket writer.
                tokio::spawn(async move { while rx.recv().await.is_some() {} });
            }
        });

        group.bench_with_input(BenchmarkId::new("broadcast_online", sockets), &hub, |b, hub| {
            b.to_async(&rt).iter(|| async move {
                hub.broadcast_online().await;
            });
        });

        group.bench_with_input(BenchmarkId::new("send_to_user", sockets), &hub, |b, hub| {
            b.to_async(&rt)
                .iter(|| async move { black_box(hub.send_to_user("user-0", "{\"text\":\"hi\"}").await) });
        });
    }

    group.finish();
}

fn benchmark_delivery_serialization(c: &mut Criterion) {
    let delivery = Delivery {
        text: Some("Hello, how are you today?".to_string()),
        recipient: "0b4c5a0e-4f0e-4c1a-9d1f-5a2f0d8f7e11".to_string(),
        sender: "6f1d3b2a-8c7e-4e55-a3a0-2b9c1d0e4f33".to_string(),
        file: None,
        id: "a1b2c3d4-e5f6-4a7b-8c9d-0e1f2a3b4c5d".to_string(),
    };

    c.bench_function("serialize_delivery", |b| {
        b.iter(|| black_box(serde_json::to_string(&delivery).unwrap()))
    });
}

fn benchmark_attachment_decoding(c: &mut Criterion) {
    let mut group = c.benchmark_group("attachments");

    for size in [1024usize, 64 * 1024, 1024 * 1024] {
        let data = format!(
            "data:application/octet-stream;base64,{}",
            general_purpose::STANDARD.encode(vec![42u8; size])
        );
        group.bench_with_input(BenchmarkId::new("decode_data_url", size), &data, |b, data| {
            b.iter(|| black_box(decode_data_url(data).unwrap()))
        });
    }

    group.bench_function("extension_of", |b| {
        b.iter(|| black_box(extension_of("holiday.photos.final.JPEG")))
    });

    group.finish();
}

fn benchmark_password_hashing(c: &mut Criterion) {
    let mut group = c.benchmark_group("password_hashing");
    group.measurement_time(Duration::from_secs(10));

    group.bench_function("hash_password_cost_10", |b| {
        b.iter(|| black_box(hash_password("test_password_123", 10).unwrap()))
    });

    let hashed = hash_password("test_password_123", 10).unwrap();
    group.bench_function("verify_password", |b| {
        b.iter(|| black_box(verify_password("test_password_123", &hashed).unwrap()))
    });

    group.finish();
}

fn benchmark_session_tokens(c: &mut Criterion) {
    let mut group = c.benchmark_group("session_tokens");
    let secret = "test_secret_key_for_benchmarking";
    let ttl = Duration::from_secs(3600);

    group.bench_function("issue_token", |b| {
        b.iter(|| black_box(issue_token("user-1", "alice", secret, ttl).unwrap()))
    });

    let token = issue_token("user-1", "alice", secret, ttl).unwrap();
    group.bench_function("verify_token", |b| {
        b.iter(|| black_box(verify_token(&token, secret).unwrap()))
    });

    let header = format!("theme=dark; lang=en; token={token}; tracking=off");
    group.bench_function("token_from_cookies", |b| {
        b.iter(|| black_box(token_from_cookies(&header)))
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_presence_broadcast,
    benchmark_delivery_serialization,
    benchmark_attachment_decoding,
    benchmark_password_hashing,
    benchmark_session_tokens
);
criterion_main!(benches);
