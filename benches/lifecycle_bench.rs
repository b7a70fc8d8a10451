use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use cabinet::catalog::GameCatalog;
use cabinet::lifecycle::registry::CodeRegistrySnapshot;
use cabinet::lifecycle::LifecycleManager;
use cabinet::script::lua::{HostContext, LuaLoader};
use std::rc::Rc;

/// Benchmark the registry diff that every teardown performs
fn bench_registry_diff(c: &mut Criterion) {
    let mut group = c.benchmark_group("registry_diff");

    for module_count in &[10usize, 100, 1000] {
        group.bench_with_input(
            BenchmarkId::from_parameter(module_count),
            module_count,
            |b, &module_count| {
                let baseline: Vec<String> =
                    (0..module_count).map(|i| format!("module_{i}")).collect();
                let snapshot = CodeRegistrySnapshot::from_names(baseline.clone());

                let mut live = baseline;
                for i in 0..10 {
                    live.push(format!("game_helper_{i}"));
                }
                let live: Vec<&str> = live.iter().map(String::as_str).collect();

                b.iter(|| snapshot.introduced(black_box(live.iter().copied())));
            },
        );
    }

    group.finish();
}

/// Benchmark a complete play cycle: load, a few frames, unload with full
/// teardown including module eviction and the collection pass
fn bench_play_cycle(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let game_dir = dir.path().join("bench");
    std::fs::create_dir_all(&game_dir).unwrap();
    std::fs::write(
        game_dir.join("bench.lua"),
        r#"
        local game = { t = 0 }
        function game.load() cabinet.circle(10, 10, 3) end
        function game.update() game.t = game.t + cabinet.frame_time() end
        function game.should_close() return false end
        function game.unload() end
        return game
    "#,
    )
    .unwrap();
    let icon = image::RgbImage::from_pixel(4, 4, image::Rgb([0, 128, 255]));
    icon.save(game_dir.join("icon.png")).unwrap();
    std::fs::write(game_dir.join("info.txt"), "Bench\n").unwrap();

    let catalog = GameCatalog::scan(dir.path());
    let game = catalog.get("bench").unwrap().clone();

    let ctx = HostContext::new();
    let loader = LuaLoader::new(ctx.clone()).unwrap();
    let mut manager = LifecycleManager::new(Box::new(loader), Rc::clone(&ctx.scene));

    c.bench_function("play_cycle", |b| {
        b.iter(|| {
            manager.load(black_box(&game));
            for _ in 0..5 {
                manager.update();
            }
            manager.unload();
        });
    });
}

criterion_group!(benches, bench_registry_diff, bench_play_cycle);
criterion_main!(benches);
