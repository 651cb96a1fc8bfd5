use std::env;
use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use arcanum_core::constants::TICK_MS;
use arcanum_server::store::SpellStore;
use arcanum_server::world::World;

fn main() {
    // Environment overrides come from .env when present
    dotenvy::dotenv().ok();

    let log_level = env::var("ARCANUM_LOG_LEVEL")
        .map(|s| arcanum_core::parse_log_level(&s))
        .unwrap_or(log::LevelFilter::Info);
    let log_file = env::var("ARCANUM_LOG_FILE").ok();

    arcanum_core::initialize_logger(log_level, log_file.as_deref()).unwrap_or_else(|e| {
        eprintln!("Failed to initialize logger: {}. Exiting.", e);
        process::exit(1);
    });

    log::info!("Starting Arcanum spell server v{}", env!("CARGO_PKG_VERSION"));

    let quit_flag = Arc::new(AtomicBool::new(false));
    let quit_flag_clone = quit_flag.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        if quit_flag_clone.swap(true, Ordering::SeqCst) {
            log::info!("Alright, alright, I'm already terminating!");
        } else {
            log::info!("Got signal to terminate. Shutdown initiated...");
        }
    }) {
        log::error!("Failed to install signal handler: {e}. Exiting.");
        process::exit(1);
    }

    let data_dir = env::var("ARCANUM_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(arcanum_core::constants::DATDIR));
    let store = match SpellStore::load(&data_dir) {
        Ok(store) => store,
        Err(e) => {
            log::error!(
                "Failed to load spell data from {}: {e}. Exiting.",
                data_dir.display()
            );
            process::exit(1);
        }
    };
    log::info!("Loaded {} spell templates", store.template_count());

    let seed = env::var("ARCANUM_WORLD_SEED")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or_else(|| {
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_millis() as u64)
                .unwrap_or(0)
        });
    let mut world = World::new(store, seed);

    log::info!("Entering game loop ({TICK_MS}ms tick)");
    let tick = Duration::from_millis(TICK_MS);
    let mut last = Instant::now();
    while !quit_flag.load(Ordering::SeqCst) {
        let start = Instant::now();
        let diff = start.duration_since(last).as_millis() as u64;
        last = start;

        world.update(diff.max(TICK_MS));
        // the session layer would ship these; headless, we drop them
        let dropped = world.drain_packets().len();
        if dropped > 0 {
            log::trace!("dropped {dropped} outbound packets (no sessions attached)");
        }

        let elapsed = start.elapsed();
        if elapsed >= tick {
            log::warn!("slow tick: {}ms", elapsed.as_millis());
        } else {
            std::thread::sleep(tick - elapsed);
        }
    }

    log::info!("Server shut down cleanly");
}
