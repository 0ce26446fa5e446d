//! Throughput benchmarks for the byte-level tokenizer and the full
//! request parser, measured over representative UPnP wire traffic.

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use std::hint::black_box;
use std::io::Cursor;
use upnpkit::parser::parse_request;
use upnpkit::tokenizer::{TokenKind, Tokenizer};

fn subscribe_request() -> Vec<u8> {
    b"SUBSCRIBE /upnp/event/rendering HTTP/1.1\r\n\
      HOST: 192.168.0.4:49152\r\n\
      USER-AGENT: linux/5.10 UPnP/1.1 bench/1.0\r\n\
      CALLBACK: <http://192.168.0.9:3333/eventSink>\r\n\
      NT: upnp:event\r\n\
      TIMEOUT: Second-1800\r\n\r\n"
        .to_vec()
}

fn soap_post_request(body_len: usize) -> Vec<u8> {
    let body: Vec<u8> = std::iter::repeat_with(|| b"<arg>v</arg>".iter().copied())
        .flatten()
        .take(body_len)
        .collect();
    let mut wire = format!(
        "POST /upnp/control/power HTTP/1.1\r\n\
         HOST: 192.168.0.4:49152\r\n\
         CONTENT-TYPE: text/xml\r\n\
         CONTENT-LENGTH: {}\r\n\
         SOAPACTION: \"urn:schemas-upnp-org:service:Power:1#SetTarget\"\r\n\r\n",
        body.len()
    )
    .into_bytes();
    wire.extend_from_slice(&body);
    wire
}

fn bench_tokenize(c: &mut Criterion) {
    let wire = subscribe_request();
    let mut group = c.benchmark_group("tokenize");
    group.throughput(Throughput::Bytes(wire.len() as u64));
    group.bench_function("subscribe_head", |b| {
        b.iter(|| {
            let mut tok = Tokenizer::new(Cursor::new(wire.clone()));
            let mut count = 0u32;
            while tok.next_token().unwrap().kind != TokenKind::Eof {
                count += 1;
            }
            black_box(count)
        })
    });
    group.finish();
}

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_request");
    for (name, wire) in [
        ("subscribe", subscribe_request()),
        ("soap_post_1k", soap_post_request(1024)),
        ("soap_post_16k", soap_post_request(16 * 1024)),
    ] {
        group.throughput(Throughput::Bytes(wire.len() as u64));
        group.bench_function(name, |b| {
            b.iter(|| {
                let mut tok = Tokenizer::new(Cursor::new(wire.clone()));
                black_box(parse_request(&mut tok).unwrap())
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_tokenize, bench_parse);
criterion_main!(benches);
