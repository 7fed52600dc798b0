//! Scalability benchmarks for the arena scheduler
//!
//! Measures how many arenas one server can tick inside the 1 second budget.
//!
//! Run with: cargo bench --bench scalability

use std::sync::Arc;

use bedwars_arena_server::config::{ArenaTemplate, GameplayConfig};
use bedwars_arena_server::game::generator::{GeneratorKind, Location};
use bedwars_arena_server::game::scheduler::{self, EventScheduler};
use bedwars_arena_server::game::state::{Arena, Phase};
use bedwars_arena_server::game::team::TeamColor;
use bedwars_arena_server::game::timers::SessionTimers;
use bedwars_arena_server::lobby::player::ArenaPlayer;
use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput};
use rand::Rng;
use uuid::Uuid;

struct BenchArena {
    arena: Arena,
    timers: SessionTimers,
    scheduler: EventScheduler,
}

/// A four-team arena with a full roster, already playing
fn create_playing_arena(index: usize, config: Arc<GameplayConfig>) -> BenchArena {
    let mut template = ArenaTemplate::new("Lighthouse");
    template.teams = vec![TeamColor::Red, TeamColor::Blue, TeamColor::Green, TeamColor::Yellow];
    template.max_in_team = 4;

    let world = format!("bw_lighthouse_{}", index);
    let mut arena = Arena::new(&template, world.clone(), config);
    let mut rng = rand::thread_rng();

    for (i, kind) in [GeneratorKind::Diamond, GeneratorKind::Emerald].into_iter().enumerate() {
        for j in 0..4 {
            let location = Location::new(&world, (i * 40 + j * 10) as f64, 64.0, 0.0);
            arena.add_generator(kind, location, None);
        }
    }

    for i in 0..template.max_players() {
        let location = Location::new(&world, rng.gen_range(-100.0..100.0), 64.0, rng.gen_range(-100.0..100.0));
        let player = ArenaPlayer::new(Uuid::new_v4(), format!("Player{}", i), location);
        // Roster is sized to max_players, so this cannot fail
        let _ = arena.add_player(player);
    }
    let _ = arena.change_status(Phase::Starting);
    let _ = arena.change_status(Phase::Playing);

    let mut timers = SessionTimers::new();
    // A few players mid-respawn so the session timers have work
    for player in arena.player_ids().into_iter().take(3) {
        timers.start_respawn(player, 5);
    }

    BenchArena {
        arena,
        timers,
        scheduler: EventScheduler::new(),
    }
}

/// Benchmark one scheduler tick across many arenas
fn bench_arena_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("arena_tick");
    group.sample_size(50);
    let config = Arc::new(GameplayConfig::default());

    for count in [10, 50, 100, 250, 500] {
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("scheduler", count), &count, |b, &count| {
            b.iter_batched(
                || (0..count).map(|i| create_playing_arena(i, config.clone())).collect::<Vec<_>>(),
                |mut arenas| {
                    for bench in &mut arenas {
                        black_box(bench.scheduler.tick(&mut bench.arena, &mut bench.timers).ok());
                    }
                    arenas
                },
                BatchSize::LargeInput,
            )
        });
    }
    group.finish();
}

/// Benchmark the generator ticker across many arenas
fn bench_generator_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("generator_tick");
    group.sample_size(50);
    let config = Arc::new(GameplayConfig::default());

    for count in [10, 100, 500] {
        let mut arenas: Vec<BenchArena> = (0..count).map(|i| create_playing_arena(i, config.clone())).collect();

        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("drops", count), &count, |b, _| {
            b.iter(|| {
                for bench in &mut arenas {
                    black_box(scheduler::tick_generators(&mut bench.arena));
                }
            })
        });
    }
    group.finish();
}

/// Benchmark a whole match from Playing to Restarting with short timings
fn bench_full_match(c: &mut Criterion) {
    let mut group = c.benchmark_group("full_match");
    group.sample_size(30);

    let config = Arc::new(GameplayConfig {
        beds_destroy_countdown: 30,
        dragon_spawn_countdown: 30,
        game_end_countdown: 30,
        diamond_tier_ii_start: 10,
        diamond_tier_iii_start: 10,
        emerald_tier_ii_start: 15,
        emerald_tier_iii_start: 15,
        ..GameplayConfig::default()
    });

    group.bench_function("playing_to_restarting", |b| {
        b.iter_batched(
            || create_playing_arena(0, config.clone()),
            |mut bench| {
                while bench.arena.phase() == Phase::Playing {
                    if bench.scheduler.tick(&mut bench.arena, &mut bench.timers).is_err() {
                        break;
                    }
                }
                black_box(bench.scheduler.ticks())
            },
            BatchSize::SmallInput,
        )
    });
    group.finish();
}

criterion_group!(benches, bench_arena_tick, bench_generator_tick, bench_full_match);
criterion_main!(benches);
