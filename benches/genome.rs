//! Benchmarks for genome decoding and hold-schedule lookup.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use walking_sim::{
    compute::{
        Creature, HoldSchedule,
        evolution::{DEFAULT_FORCE_BOUND, GenomeRng, decode, genome_intervals},
    },
    schema::CreatureKind,
};

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("genome_decode");

    for duration in [1.0, 5.0, 20.0] {
        let joints = 8;
        let intervals = genome_intervals(duration, 0.01);
        let genome = GenomeRng::new(0).random_genome(joints * intervals, DEFAULT_FORCE_BOUND);

        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}x{}", joints, intervals)),
            &genome,
            |b, genome| {
                b.iter(|| decode(black_box(genome), joints, intervals));
            },
        );
    }

    group.finish();
}

fn bench_hold_schedule(c: &mut Criterion) {
    let mut group = c.benchmark_group("hold_schedule");

    for intervals in [50, 500, 5000] {
        let row = GenomeRng::new(1).random_genome(intervals, DEFAULT_FORCE_BOUND);
        let Some(schedule) = HoldSchedule::new(row, 0.01) else {
            continue;
        };

        group.bench_with_input(
            BenchmarkId::from_parameter(intervals),
            &schedule,
            |b, schedule| {
                // One control tick of substep queries.
                b.iter(|| {
                    let mut sum = 0.0;
                    for i in 0..1000 {
                        sum += schedule.force_at(black_box(i as f64 * 0.0025));
                    }
                    sum
                });
            },
        );
    }

    group.finish();
}

fn bench_build_creature(c: &mut Criterion) {
    let mut group = c.benchmark_group("build_creature");

    for kind in [CreatureKind::Quadrupede, CreatureKind::Bipede] {
        group.bench_with_input(BenchmarkId::from_parameter(kind), &kind, |b, &kind| {
            b.iter(|| Creature::spawn(black_box(kind)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_decode, bench_hold_schedule, bench_build_creature);
criterion_main!(benches);
