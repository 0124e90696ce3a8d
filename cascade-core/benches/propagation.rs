use criterion::{black_box, criterion_group, criterion_main, Criterion};

use cascade_core::reactive::{Context, Flow};

fn chain(c: &mut Criterion) {
    let ctx = Context::new();
    let input = ctx.create_state(0_u64);
    let mut tail: Flow<u64> = input.flow().clone();
    for _ in 0..100 {
        tail = tail.map(|v| v + 1);
    }
    let consumer = tail.consume(|v| {
        black_box(*v);
    });
    consumer.turn_on();
    ctx.run_until_stalled();

    let mut next = 0;
    c.bench_function("chain_100", |b| {
        b.iter(|| {
            next += 1;
            input.set(next);
            ctx.run_until_stalled();
        })
    });
}

fn fan_out(c: &mut Criterion) {
    let ctx = Context::new();
    let input = ctx.create_state(0_u64);
    let consumers: Vec<_> = (0..100)
        .map(|i| {
            input.map(move |v| v * i).consume(|v| {
                black_box(*v);
            })
        })
        .collect();
    for consumer in &consumers {
        consumer.turn_on();
    }
    ctx.run_until_stalled();

    let mut next = 0;
    c.bench_function("fan_out_100", |b| {
        b.iter(|| {
            next += 1;
            input.set(next);
            ctx.run_until_stalled();
        })
    });
}

criterion_group!(benches, chain, fan_out);
criterion_main!(benches);
