// Handshake benchmarks for the SDV authentication protocol.
//
// Covers the per-handshake costs: point decompression, Schnorr proving and
// verification, the issuer's hello (verify + ECDH + KDF + seal), ticket
// redemption, and a full prover round trip.

use criterion::{criterion_group, criterion_main, Criterion};

use sdv_auth::config::IssuerConfig;
use sdv_auth::crypto::keys::KeyPair;
use sdv_auth::crypto::point::decode_point;
use sdv_auth::crypto::schnorr::{prove, verify_proof};
use sdv_auth::handshake::{run_handshake_prover, Issuer, ProverHandshake, RedeemRequest};

fn bench_decode_point(c: &mut Criterion) {
    let point = KeyPair::generate().public_bytes();

    c.bench_function("p256/decode_point", |b| {
        b.iter(|| decode_point(point.as_bytes()).unwrap());
    });
}

fn bench_schnorr_prove(c: &mut Criterion) {
    let kp = KeyPair::generate();
    let scalar = kp.scalar();
    let nonce = [0u8; 16];

    c.bench_function("schnorr/prove", |b| {
        b.iter(|| prove(&scalar, &nonce));
    });
}

fn bench_schnorr_verify(c: &mut Criterion) {
    let kp = KeyPair::generate();
    let nonce = [0u8; 16];
    let (x, proof) = prove(&kp.scalar(), &nonce);

    c.bench_function("schnorr/verify", |b| {
        b.iter(|| verify_proof(x.as_bytes(), &proof, &nonce));
    });
}

fn bench_issuer_hello(c: &mut Criterion) {
    let issuer = Issuer::new(IssuerConfig::generate());
    let (_, request) = ProverHandshake::begin();

    c.bench_function("handshake/issuer_hello", |b| {
        b.iter(|| issuer.hello(&request).unwrap());
    });
}

fn bench_issuer_redeem(c: &mut Criterion) {
    let issuer = Issuer::new(IssuerConfig::generate());
    let session = run_handshake_prover(&issuer).unwrap();
    let request = RedeemRequest {
        ticket: session.ticket().to_vec(),
        transcript: session.transcript().to_vec(),
    };

    c.bench_function("handshake/issuer_redeem", |b| {
        b.iter(|| issuer.redeem(&request).unwrap());
    });
}

fn bench_full_handshake(c: &mut Criterion) {
    let issuer = Issuer::new(IssuerConfig::generate());

    c.bench_function("handshake/full_round_trip", |b| {
        b.iter(|| run_handshake_prover(&issuer).unwrap());
    });
}

criterion_group!(
    benches,
    bench_decode_point,
    bench_schnorr_prove,
    bench_schnorr_verify,
    bench_issuer_hello,
    bench_issuer_redeem,
    bench_full_handshake,
);
criterion_main!(benches);
