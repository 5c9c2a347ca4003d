// Copyright 2026 the Bracken Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};

use bracken_graph::{Graph, Input, Rule};

/// A chain of rules: `rule[i]` adds one to `rule[i - 1]`, rooted at one input.
struct Chain {
    graph: Graph,
    root: Input<i64>,
    tip: Rule<i64>,
}

fn build_chain(depth: usize) -> Chain {
    let graph = Graph::new();
    let root = graph.input("root", 0_i64);
    let mut readers: Vec<Box<dyn Fn() -> i64>> = Vec::with_capacity(depth + 1);
    readers.push({
        let root = root.clone();
        Box::new(move || root.get())
    });
    let mut tip = None;
    for i in 0..depth {
        let read = readers.pop().expect("chain always has a tail");
        let rule = graph.rule(format!("link{i}"), move || read() + 1);
        readers.push({
            let rule = rule.clone();
            Box::new(move || rule.get())
        });
        tip = Some(rule);
    }
    Chain {
        graph,
        root,
        tip: tip.expect("depth is nonzero"),
    }
}

/// One input fanned out to `width` independent rules, joined by one sum rule.
struct Fan {
    graph: Graph,
    root: Input<i64>,
    join: Rule<i64>,
}

fn build_fan(width: usize) -> Fan {
    let graph = Graph::new();
    let root = graph.input("root", 1_i64);
    let arms: Vec<Rule<i64>> = (0..width)
        .map(|i| {
            graph.rule(format!("arm{i}"), {
                let root = root.clone();
                move || root.get() + i as i64
            })
        })
        .collect();
    let join = graph.rule("join", {
        let arms = arms.clone();
        move || arms.iter().map(Rule::get).sum::<i64>()
    });
    Fan { graph, root, join }
}

fn bench_graph(c: &mut Criterion) {
    let mut group = c.benchmark_group("bracken_graph");
    group.sample_size(50);

    for &depth in &[16_usize, 256] {
        group.bench_function(format!("chain_initial_read(depth={depth})"), |b| {
            b.iter_batched(
                || build_chain(depth),
                |chain| {
                    black_box(chain.tip.get());
                },
                BatchSize::LargeInput,
            );
        });

        group.bench_function(format!("chain_write_and_reread(depth={depth})"), |b| {
            b.iter_batched(
                || {
                    let chain = build_chain(depth);
                    let _ = chain.tip.get();
                    chain
                },
                |chain| {
                    chain.root.set(7);
                    black_box(chain.tip.get());
                },
                BatchSize::LargeInput,
            );
        });

        // The cost of a write alone: flag flipping over the dirty closure,
        // no rule runs.
        group.bench_function(format!("chain_write_only(depth={depth})"), |b| {
            b.iter_batched(
                || {
                    let chain = build_chain(depth);
                    let _ = chain.tip.get();
                    chain
                },
                |chain| {
                    chain.root.set(7);
                    black_box(&chain.graph);
                },
                BatchSize::LargeInput,
            );
        });

        group.bench_function(format!("chain_clean_reread(depth={depth})"), |b| {
            b.iter_batched(
                || {
                    let chain = build_chain(depth);
                    let _ = chain.tip.get();
                    chain
                },
                |chain| {
                    black_box(chain.tip.get());
                },
                BatchSize::LargeInput,
            );
        });
    }

    for &width in &[16_usize, 256] {
        group.bench_function(format!("fan_write_and_reread(width={width})"), |b| {
            b.iter_batched(
                || {
                    let fan = build_fan(width);
                    let _ = fan.join.get();
                    fan
                },
                |fan| {
                    fan.root.set(3);
                    black_box(fan.join.get());
                },
                BatchSize::LargeInput,
            );
        });
    }

    group.bench_function("snapshot(nodes=256)", |b| {
        b.iter_batched(
            || {
                let chain = build_chain(255);
                let _ = chain.tip.get();
                chain
            },
            |chain| {
                black_box(chain.graph.snapshot());
            },
            BatchSize::LargeInput,
        );
    });

    group.finish();
}

criterion_group!(benches, bench_graph);
criterion_main!(benches);
