use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info};

use slidecache::cli::Args;
use slidecache::config::{CONFIG_FILE, LoaderConfig};
use slidecache::core::{LoadResult, Loader, Preloader};
use slidecache::entities::{MediaItem, MediaKind};
use slidecache::paths::{self, PathConfig};

/// Generous upper bound for one slide; decode of huge files can be slow
const SLIDE_TIMEOUT: Duration = Duration::from_secs(60);

fn init_logger(args: &Args, path_config: &PathConfig) -> Result<()> {
    // 0 (default) = warn, 1 (-v) = info, 2 (-vv) = debug, 3+ (-vvv) = trace
    let log_level = match args.verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    if let Some(log_path_opt) = &args.log_file {
        let log_path = log_path_opt
            .clone()
            .unwrap_or_else(|| paths::data_file("slidecache.log", path_config));
        paths::ensure_parent(&log_path)?;

        let file = std::fs::File::create(&log_path)
            .with_context(|| format!("Failed to create log file: {}", log_path.display()))?;

        env_logger::Builder::new()
            .filter_level(log_level)
            .format_timestamp_millis()
            .target(env_logger::Target::Pipe(Box::new(file)))
            .init();

        info!("Logging to file: {} (level: {:?})", log_path.display(), log_level);
    } else {
        // Respects RUST_LOG if set
        let default_level = match args.verbosity {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        };

        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
            .format_timestamp_millis()
            .init();
    }
    Ok(())
}

/// Config file values with CLI overrides applied
fn effective_config(args: &Args, path_config: &PathConfig) -> Result<LoaderConfig> {
    let mut config = LoaderConfig::load_default(path_config)?;
    if let Some(n) = args.still_bound {
        config.still_capacity = n;
    }
    if let Some(n) = args.animated_bound {
        config.animated_capacity = n;
    }
    if args.workers.is_some() {
        config.workers = args.workers;
    }
    if args.no_preload {
        config.preload = false;
    }
    Ok(config.normalized())
}

fn show_slide(loader: &Loader, item: &MediaItem, args: &Args) {
    let started = Instant::now();
    let name = item.path.display();

    match item.kind {
        MediaKind::Still => {
            let mut ticket = loader.load_image(&item.path, args.width);
            match ticket.wait_timeout(SLIDE_TIMEOUT) {
                Some(LoadResult::Success { payload, orientation }) => {
                    let (w, h) = orientation.display_size(payload.width(), payload.height());
                    println!(
                        "{}: still {}x{} rotate {} -> {}x{} ({:.1} ms)",
                        name,
                        payload.width(),
                        payload.height(),
                        orientation.degrees(),
                        w,
                        h,
                        started.elapsed().as_secs_f64() * 1000.0
                    );
                }
                Some(LoadResult::Failure) => println!("{}: failed", name),
                None => println!("{}: timed out", name),
            }
        }
        MediaKind::Animated => {
            let mut ticket = loader.load_animated(&item.path, args.width);
            match ticket.wait_timeout(SLIDE_TIMEOUT) {
                Some(LoadResult::Success { payload: mut handle, .. }) => {
                    let mut shown = 0usize;
                    let mut total_delay = Duration::ZERO;
                    while shown < args.frames {
                        let Some(frame) = handle.next_frame() else {
                            break;
                        };
                        total_delay += frame.delay;
                        shown += 1;
                    }
                    println!(
                        "{}: animated {}x{}, {} frames pulled ({} ms of playback, {:.1} ms)",
                        name,
                        handle.width(),
                        handle.height(),
                        shown,
                        total_delay.as_millis(),
                        started.elapsed().as_secs_f64() * 1000.0
                    );
                }
                Some(LoadResult::Failure) => println!("{}: failed", name),
                None => println!("{}: timed out", name),
            }
        }
        MediaKind::Video => println!("{}: video, skipped", name),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let path_config = PathConfig::from_env_and_cli(args.config_dir.clone());

    init_logger(&args, &path_config)?;
    debug!("Command-line args: {:?}", args);
    info!("Config path: {}", paths::config_file(CONFIG_FILE, &path_config).display());

    let config = effective_config(&args, &path_config)?;
    info!("Loader config: {:?}", config);

    let loader = Arc::new(Loader::new(&config).context("Failed to start decode workers")?);
    let mut preloader = Preloader::new(Arc::clone(&loader));
    preloader.set_enabled(config.preload);

    let items: Vec<MediaItem> = args.files.iter().map(MediaItem::new).collect();

    for pass in 0..args.passes.max(1) {
        if args.passes > 1 {
            println!("-- pass {} --", pass + 1);
        }
        for (idx, item) in items.iter().enumerate() {
            preloader.warm_neighbors(&items, idx, args.width);
            show_slide(&loader, item, &args);
        }
    }

    let stats = loader.cache().stats();
    println!(
        "cache: {} hits, {} misses ({:.0}% hit rate), {} inserts, {} evictions, {} stills + {} animated resident ({:.1} MB)",
        stats.hits(),
        stats.misses(),
        stats.hit_rate() * 100.0,
        stats.inserts(),
        stats.evictions(),
        loader.cache().len(MediaKind::Still),
        loader.cache().len(MediaKind::Animated),
        loader.cache().resident_bytes() as f64 / 1024.0 / 1024.0
    );

    loader.shutdown();
    Ok(())
}
