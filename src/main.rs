use seqview::app::SeqViewApp;
use seqview::cli::Args;
use seqview::config::Settings;
use seqview::core::session::Session;
use seqview::paths::{LOG_FILE, PathConfig, SETTINGS_FILE};

use anyhow::{Context, Result};
use clap::Parser;
use eframe::egui;
use log::{debug, info};

fn init_logging(args: &Args, path_config: &PathConfig) -> Result<()> {
    let log_level = args.log_level();

    if let Some(log_path_opt) = &args.log_file {
        // File logging with the requested verbosity
        let log_path = log_path_opt
            .clone()
            .unwrap_or_else(|| path_config.data_file(LOG_FILE));
        let file = std::fs::File::create(&log_path)
            .with_context(|| format!("Failed to create log file: {}", log_path.display()))?;

        env_logger::Builder::new()
            .filter_level(log_level)
            .filter_module("egui", log::LevelFilter::Info) // Suppress egui DEBUG spam
            .format_timestamp_millis()
            .target(env_logger::Target::Pipe(Box::new(file)))
            .init();

        info!("Logging to file: {} (level: {:?})", log_path.display(), log_level);
    } else {
        // Console logging, RUST_LOG wins if set
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level.as_str()))
            .filter_module("egui", log::LevelFilter::Info)
            .format_timestamp_millis()
            .init();
    }
    Ok(())
}

/// `--list`: resolve every glob and print the collections.
fn list(args: &Args, mut settings: Settings) {
    settings.watch_files = false;
    let mut session = Session::new(settings);
    session.from_items(&args.items);

    for (idx, seq) in session.sequences().iter().enumerate() {
        println!(
            "#{} '{}': {} image(s) [view {}, player {}]",
            idx,
            seq.glob(),
            seq.len(),
            seq.view,
            seq.player
        );
        for (frame, name) in seq.collection().filenames().iter().enumerate() {
            println!("  {:>5} {}", frame + 1, name);
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let path_config = PathConfig::from_env_and_cli(args.config_dir.clone());
    if let Err(e) = path_config.ensure_dirs() {
        eprintln!("Warning: {:#}", e);
    }
    init_logging(&args, &path_config)?;

    info!("seqview {} starting...", env!("CARGO_PKG_VERSION"));
    debug!("Command-line args: {:?}", args);

    let settings_path = path_config.config_file(SETTINGS_FILE);
    let mut settings = Settings::load(&settings_path);
    args.apply(&mut settings);
    debug!("Settings: {:?}", settings);

    if args.list {
        list(&args, settings);
        return Ok(());
    }

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title(format!("seqview v{}", env!("CARGO_PKG_VERSION")))
            .with_inner_size([1280.0, 800.0])
            .with_resizable(true),
        renderer: eframe::Renderer::Glow,
        ..Default::default()
    };

    let items = args.items.clone();
    eframe::run_native(
        "seqview",
        native_options,
        Box::new(move |cc| {
            let mut session = Session::new(settings);
            session.from_items(&items);
            Ok(Box::new(SeqViewApp::new(cc, session, settings_path)))
        }),
    )
    .map_err(|e| anyhow::anyhow!("eframe error: {}", e))
}
