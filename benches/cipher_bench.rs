use criterion::{criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use gamewire::crypto::endpoint::{client_crypto, server_crypto};
use gamewire::crypto::CustomCrypto;
use gamewire::config::NetworkConfig;

#[allow(clippy::unwrap_used)]
fn bench_rolling_cipher(c: &mut Criterion) {
    let mut group = c.benchmark_group("rolling_cipher");
    let payload_sizes = [16usize, 256, 4096, 65535];
    let factory = NetworkConfig::default().crypto.factory();

    for &size in &payload_sizes {
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_function(format!("encrypt_{size}b"), |b| {
            let mut client = client_crypto(&factory, &[1, 2, 3, 4], &[5, 6, 7, 8]).unwrap();
            let mut buffer = vec![0x5Au8; size];
            b.iter(|| client.encrypt(&mut buffer).unwrap())
        });
        group.bench_function(format!("roundtrip_{size}b"), |b| {
            let mut client = client_crypto(&factory, &[1, 2, 3, 4], &[5, 6, 7, 8]).unwrap();
            let mut server = server_crypto(&factory, &[1, 2, 3, 4], &[5, 6, 7, 8]).unwrap();
            b.iter_batched(
                || vec![0x5Au8; size],
                |mut buffer| {
                    client.encrypt(&mut buffer).unwrap();
                    server.decrypt(&mut buffer).unwrap();
                },
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

fn bench_custom_crypto(c: &mut Criterion) {
    let mut group = c.benchmark_group("custom_crypto");
    for &size in &[16usize, 256, 4096] {
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_function(format!("encrypt_decrypt_{size}b"), |b| {
            let mut buffer = vec![0xA5u8; size];
            b.iter(|| {
                CustomCrypto::encrypt(&mut buffer);
                CustomCrypto::decrypt(&mut buffer);
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_rolling_cipher, bench_custom_crypto);
criterion_main!(benches);
