//! # HORIZON Terrain Demo
//!
//! Headless walk-through: a viewpoint moves east across the world while
//! the streamer keeps the rings around it filled. No window, no GPU; the
//! recording backend stands in for the engine.
//!
//! ```bash
//! # Defaults
//! ./terrain_demo
//!
//! # With a config file and visible logs
//! RUST_LOG=debug ./terrain_demo horizon.toml
//! ```

use std::thread;
use std::time::{Duration, Instant};

use horizon::{RecordingBackend, SharedViewpoint, StreamingConfig, TerrainStreamer};

/// Simulated frame time.
const FRAME: Duration = Duration::from_millis(16);

/// Viewpoint speed in world units per second.
const WALK_SPEED: f32 = 150.0;

/// Simulated walk length.
const WALK_TIME: Duration = Duration::from_secs(8);

fn main() {
    env_logger::init();

    println!("═══════════════════════════════════════════════════════════════════");
    println!("                    HORIZON TERRAIN DEMO");
    println!("                        HEADLESS MODE");
    println!("═══════════════════════════════════════════════════════════════════");
    println!();

    let config = match std::env::args().nth(1) {
        Some(path) => match StreamingConfig::load(&path) {
            Ok(config) => {
                println!("   ✓ Config loaded from {path}");
                config
            }
            Err(e) => {
                eprintln!("   ✗ FATAL: {e}");
                std::process::exit(1);
            }
        },
        None => StreamingConfig::default(),
    };

    println!(
        "   ✓ max_lod {} → {} render slots, re-plan every {:.1}s",
        config.max_lod,
        config.pool_capacity(),
        config.replan_interval_secs
    );

    let camera = SharedViewpoint::new([50.0, 0.0, 50.0]);
    let mut streamer = match TerrainStreamer::new(config, RecordingBackend::new(), camera.clone()) {
        Ok(streamer) => streamer,
        Err(e) => {
            eprintln!("   ✗ FATAL: {e}");
            std::process::exit(1);
        }
    };
    println!(
        "   ✓ {} worker threads ready",
        streamer.scheduler().workers().thread_count()
    );
    println!();

    // === WALK ===
    let frames = (WALK_TIME.as_secs_f32() / FRAME.as_secs_f32()) as u32;
    let mut x = 50.0_f32;
    let mut last_report = Instant::now();

    for _ in 0..frames {
        x += WALK_SPEED * FRAME.as_secs_f32();
        camera.set([x, 0.0, 50.0]);

        if streamer.tick(FRAME) {
            if let Some(center) = streamer.planner().center() {
                println!("   ↻ re-planned around {center}");
            }
        }

        if last_report.elapsed() >= Duration::from_secs(1) {
            let stats = streamer.scheduler_stats();
            println!(
                "   placed {:>4} | in flight {:>3} | slots {:>2}/{}",
                stats.placed,
                streamer.scheduler().pipelines_in_flight(),
                streamer.scheduler().pool().occupied_count(),
                streamer.scheduler().pool().capacity(),
            );
            last_report = Instant::now();
        }

        thread::sleep(FRAME);
    }

    // === SETTLE ===
    let settle_start = Instant::now();
    while !streamer.is_settled() && settle_start.elapsed() < Duration::from_secs(30) {
        streamer.tick(FRAME);
        thread::sleep(Duration::from_millis(1));
    }

    let stats = streamer.scheduler_stats();
    let timing = streamer.stats();

    println!();
    println!("═══════════════════════════════════════════════════════════════════");
    println!("   Plans:                  {}", streamer.planner().plan_count());
    println!("   Pipelines launched:     {}", stats.generated);
    println!("   Chunks placed:          {}", stats.placed);
    println!("   Regenerations skipped:  {}", stats.regenerations_skipped);
    println!("   Cancelled:              {}", stats.cancelled);
    println!("   Stale results dropped:  {}", stats.stale_results);
    println!("   Pool exhausted:         {}", stats.pool_exhausted);
    println!("   Nodes pruned:           {}", stats.nodes_pruned);
    println!("   Nodes cached:           {}", streamer.scheduler().store().len());
    println!(
        "   Tick time:              avg {:.3}ms, max {:.3}ms, {} slow",
        timing.avg_frame_ms(),
        timing.max_frame_us as f64 / 1000.0,
        timing.slow_frames
    );
    println!("═══════════════════════════════════════════════════════════════════");
}
