use criterion::{black_box, criterion_group, criterion_main, Criterion};
use windex_crypto::XpubDeriver;
use windex_types::Network;

const XPUB: &str = "xpub661MyMwAqRbcFtXgS5sYJABqqG9YLmC4Q1Rdap9gSE8NqtwybGhePY2gZ29ESFjqJoCu1Rupje8YtGqsefD265TMg7usUDFdp6W1EGMcet8";

fn address_at_bench(c: &mut Criterion) {
    let deriver = XpubDeriver::new(XPUB, Network::Mainnet).unwrap();

    c.bench_function("address_at", |b| {
        b.iter(|| deriver.address_at(black_box(42)))
    });
}

fn address_range_bench(c: &mut Criterion) {
    let deriver = XpubDeriver::new(XPUB, Network::Mainnet).unwrap();

    c.bench_function("addresses_in_range_20", |b| {
        b.iter(|| deriver.addresses_in_range(black_box(0..20)))
    });
}

fn wallet_id_bench(c: &mut Criterion) {
    c.bench_function("wallet_id", |b| {
        b.iter(|| windex_crypto::wallet_id(black_box(XPUB)))
    });
}

criterion_group!(benches, address_at_bench, address_range_bench, wallet_id_bench);
criterion_main!(benches);
