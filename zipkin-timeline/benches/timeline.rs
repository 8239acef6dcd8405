use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::collections::HashSet;
use std::net::Ipv4Addr;
use zipkin_timeline::{AdjustedTrace, Endpoint, Kind, Span, TimelineConfigBuilder};

/*
Each service calls the next one, and each server span has a few local
children. Every other host runs 1ms behind its caller.
*/
fn rpc_chain(services: usize, locals: usize) -> Vec<Span> {
    let mut spans = Vec::new();
    let mut parent_id: Option<String> = None;
    for service in 0..services {
        let endpoint = Endpoint::builder()
            .service_name(format!("service-{service}"))
            .ipv4(Ipv4Addr::new(10, 0, (service / 250) as u8, (service % 250) as u8 + 1))
            .build();
        let id = format!("{:x}", service + 1);
        let start = (service as i64) * 100;
        let skew = if service % 2 == 1 { 1_000 } else { 0 };

        let mut client = Span::builder()
            .trace_id("463ac35c9f6413ad48485a3953bb6124")
            .id(id.clone())
            .kind(Kind::Client)
            .timestamp(start)
            .duration(10_000 - start)
            .build();
        client.parent_id.clone_from(&parent_id);
        client.local_endpoint = (service > 0).then(|| endpoint.clone());
        spans.push(client);

        spans.push(
            Span::builder()
                .trace_id("463ac35c9f6413ad48485a3953bb6124")
                .id(id.clone())
                .kind(Kind::Server)
                .shared(true)
                .timestamp(start + 10 - skew)
                .duration(9_000 - start)
                .local_endpoint(endpoint.clone())
                .build(),
        );
        for local in 0..locals {
            spans.push(
                Span::builder()
                    .trace_id("463ac35c9f6413ad48485a3953bb6124")
                    .parent_id(id.clone())
                    .id(format!("{:x}", (service + 1) * 1_000 + local))
                    .timestamp(start + 20 + local as i64 - skew)
                    .duration(5)
                    .local_endpoint(endpoint.clone())
                    .build(),
            );
        }
        parent_id = Some(id);
    }
    spans
}

fn criterion_benchmark(c: &mut Criterion) {
    let config = TimelineConfigBuilder::default().build();

    let mut group = c.benchmark_group("adjusted_trace");
    for services in [10, 100] {
        let spans = rpc_chain(services, 8);
        group.bench_with_input(
            BenchmarkId::new("new", spans.len()),
            &spans,
            |b, spans| b.iter(|| AdjustedTrace::new(spans.clone(), &config)),
        );

        let Ok(trace) = AdjustedTrace::new(spans.clone(), &config) else {
            continue;
        };
        let closed: HashSet<String> = trace
            .spans()
            .iter()
            .step_by(10)
            .map(|span| span.id.clone())
            .collect();
        group.bench_with_input(
            BenchmarkId::new("rows", spans.len()),
            &trace,
            |b, trace| b.iter(|| trace.rows(&HashSet::new(), None)),
        );
        group.bench_with_input(
            BenchmarkId::new("rows_collapsed", spans.len()),
            &trace,
            |b, trace| b.iter(|| trace.rows(&closed, None)),
        );
    }
    group.finish();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
