//! Battle benchmarks for hexclash_core.
//!
//! Run with: `cargo bench -p hexclash_core`

// Benchmark binaries don't need docs on macro-generated functions
#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use hexclash_core::battle::{Battle, BattlePhase};
use hexclash_core::hex::{distance, find_path, HexCoord};
use hexclash_core::replay::drive_to_end;
use hexclash_test_utils::fixtures::{archer, front_line, instant_config, knight, mixed_battle};
use std::collections::HashSet;

fn run_to_end(mut battle: Battle) -> u32 {
    let step = battle.config().tick_length();
    let mut events = Vec::new();
    drive_to_end(&mut battle, step, &mut events).unwrap();
    battle.tick()
}

/// Full mixed battles from start to finish.
pub fn battle_benchmark(c: &mut Criterion) {
    c.bench_function("mixed_battle_to_end", |b| {
        b.iter_with_setup(|| mixed_battle(black_box(42)), run_to_end);
    });

    let mut group = c.benchmark_group("front_line_to_end");
    for count in [1, 4, 7] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter_with_setup(
                || {
                    let mut battle = Battle::new(instant_config(), 7);
                    battle
                        .start_combat(
                            &front_line(&knight(), count),
                            &front_line(&archer(), count),
                            &[],
                            &[],
                        )
                        .unwrap();
                    battle
                },
                run_to_end,
            );
        });
    }
    group.finish();
}

/// A single tick in the middle of a busy battle.
pub fn tick_benchmark(c: &mut Criterion) {
    let mut battle = mixed_battle(3);
    let step = battle.config().tick_length();
    for _ in 0..40 {
        battle.advance(step);
    }
    assert_eq!(battle.phase(), BattlePhase::Running);

    c.bench_function("single_tick", |b| {
        b.iter_with_setup(
            || battle.clone(),
            |mut battle| black_box(battle.advance(step)),
        );
    });

    c.bench_function("state_hash", |b| b.iter(|| black_box(battle.state_hash())));
}

/// Hex pathfinding across the full board with a wall of blockers.
pub fn pathfinding_benchmark(c: &mut Criterion) {
    let blocked: HashSet<HexCoord> = (0..6).map(|col| HexCoord::new(col, 4)).collect();
    let start = HexCoord::new(0, 0);
    let goal = HexCoord::new(0, 7);

    c.bench_function("find_path_around_wall", |b| {
        b.iter(|| find_path(black_box(start), black_box(goal), &blocked, 7, 8));
    });
    c.bench_function("hex_distance", |b| {
        b.iter(|| distance(black_box(start), black_box(goal)));
    });
}

criterion_group!(
    benches,
    battle_benchmark,
    tick_benchmark,
    pathfinding_benchmark
);
criterion_main!(benches);
