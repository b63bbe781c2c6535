use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Local};
use clap::{ArgAction, CommandFactory, Parser, Subcommand};
use inkpage::config::Config;
use inkpage::input::PlatformBatch;
use inkpage::render::Viewport;
use inkpage::session::{self, SaveOutcome, SessionOptions};
use inkpage::{DocumentStore, Engine};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "inkpage")]
#[command(
    version,
    long_version = concat!(
        env!("CARGO_PKG_VERSION"),
        " (",
        env!("INKPAGE_GIT_HASH"),
        ", ",
        env!("INKPAGE_BUILD_PROFILE"),
        " build)"
    ),
    about = "Stylus palm rejection and ink annotation engine for document readers"
)]
struct Cli {
    /// Write a commented default config file and exit
    #[arg(long, action = ArgAction::SetTrue)]
    init_config: bool,

    /// Use this config file instead of the default location
    #[arg(long, short = 'c', value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run recorded platform event batches through the pipeline and save the ink
    Replay {
        /// JSON file holding an array of event batches
        events: PathBuf,

        /// Document identity the annotations belong to (defaults to the file stem)
        #[arg(long, short = 'd', value_name = "ID")]
        document: Option<String>,

        /// Page shown in the single-page viewport
        #[arg(long, default_value_t = 0)]
        page: u32,

        /// Number of pages in the document, when known
        #[arg(long, value_name = "N")]
        page_count: Option<u32>,

        /// Viewport width in pixels
        #[arg(long, default_value_t = 1000)]
        width: u32,

        /// Viewport height in pixels
        #[arg(long, default_value_t = 1400)]
        height: u32,

        /// Ignore previously saved annotations
        #[arg(long, action = ArgAction::SetTrue)]
        fresh: bool,

        /// Do not write annotations back to disk
        #[arg(long, action = ArgAction::SetTrue)]
        no_save: bool,
    },
    /// Show what is stored for a document
    Inspect {
        #[arg(long, short = 'd', value_name = "ID", default_value = "default")]
        document: String,
    },
    /// Delete stored annotations for a document
    Clear {
        #[arg(long, short = 'd', value_name = "ID", default_value = "default")]
        document: String,
    },
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    if cli.init_config {
        let path = match &cli.config {
            Some(path) => {
                Config::create_default_file_at(path)?;
                path.clone()
            }
            None => Config::create_default_file()?,
        };
        println!("Wrote default configuration to {}", path.display());
        return Ok(());
    }

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    let (config, config_dir) = load_config(cli.config.as_deref())?;

    match command {
        Commands::Replay {
            events,
            document,
            page,
            page_count,
            width,
            height,
            fresh,
            no_save,
        } => {
            let document = document.unwrap_or_else(|| {
                events
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default()
            });
            let options = session::options_from_config(&config.session, &config_dir, &document)?;
            let viewport = Viewport::single_page(page, width, height);
            run_replay(&config, &options, &events, viewport, page_count, fresh, no_save)
        }
        Commands::Inspect { document } => {
            let options = session::options_from_config(&config.session, &config_dir, &document)?;
            print_inspection(&options)
        }
        Commands::Clear { document } => {
            let options = session::options_from_config(&config.session, &config_dir, &document)?;
            let outcome = session::clear_session(&options)?;
            if outcome.removed_session || outcome.removed_backup || outcome.removed_lock {
                println!("Cleared annotations for '{}'", options.document_id);
                println!("  Annotation file removed: {}", yes_no(outcome.removed_session));
                println!("  Backup removed:          {}", yes_no(outcome.removed_backup));
                println!("  Lock file removed:       {}", yes_no(outcome.removed_lock));
            } else {
                println!("No stored annotations for '{}'", options.document_id);
            }
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<(Config, PathBuf)> {
    let config_path = match path {
        Some(path) => path.to_path_buf(),
        None => Config::get_config_path()?,
    };
    let config = Config::load_from(&config_path)?;
    let config_dir = config_path
        .parent()
        .map(Path::to_path_buf)
        .ok_or_else(|| anyhow!("config path {} has no parent", config_path.display()))?;
    Ok((config, config_dir))
}

fn run_replay(
    config: &Config,
    options: &SessionOptions,
    events_path: &Path,
    viewport: Viewport,
    page_count: Option<u32>,
    fresh: bool,
    no_save: bool,
) -> Result<()> {
    let raw = fs::read_to_string(events_path)
        .with_context(|| format!("failed to read events file {}", events_path.display()))?;
    let batches: Vec<PlatformBatch> = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse events file {}", events_path.display()))?;

    let store = DocumentStore::new(&config.document);
    if !fresh {
        session::load_document(&store, options)?;
    }
    let mut engine = Engine::with_store(config, viewport, store);
    engine
        .set_page_count(page_count)
        .context("page count conflicts with the stored annotations")?;

    let mut autosave = session::Autosave::new(
        config.session.autosave_interval_ms,
        engine.store().revision(),
    );
    let mut clock = 0u64;
    let mut totals = inkpage::BatchReport::default();

    for batch in &batches {
        clock = batch
            .events
            .iter()
            .flat_map(|e| e.history.iter().map(|h| h.time_ms).chain([e.time_ms]))
            .fold(clock, u64::max);
        let report = engine.handle_batch(batch);
        let tick = engine.tick(clock);
        totals.merge(report);
        totals.merge(tick);

        if !no_save && autosave.poll(clock, engine.store().revision()) {
            match session::save_document(engine.store(), options) {
                Ok(_) => autosave.mark_saved(engine.store().revision()),
                Err(err) => {
                    log::warn!("Autosave failed: {err:#}");
                    autosave.mark_failed(clock);
                }
            }
        }
    }

    // Let every contact time out so nothing is left half drawn.
    let drained = engine.tick(clock.saturating_add(config.classifier.contact_timeout_ms));
    totals.merge(drained);
    engine.cancel_strokes();

    println!("Replayed {} batches ({} events)", batches.len(), totals.events);
    println!("  Strokes committed: {}", totals.committed.len());
    println!("  Palm events:       {}", totals.rejected);
    println!("  Dropped events:    {}", totals.dropped);
    println!("  Cancelled strokes: {}", totals.discarded);
    if engine.is_degraded() {
        println!("  Classifier ran without radius or pressure data");
    }
    println!("  Document strokes:  {}", engine.store().read(|doc| doc.stroke_count()));

    if no_save {
        return Ok(());
    }
    if !autosave.has_unsaved_changes(engine.store().revision()) {
        println!("Annotations already up to date");
        return Ok(());
    }
    match session::save_document(engine.store(), options)? {
        SaveOutcome::Written { path, bytes, compressed } => {
            println!(
                "Saved annotations to {} ({} bytes{})",
                path.display(),
                bytes,
                if compressed { ", gzip" } else { "" }
            );
        }
        SaveOutcome::RemovedEmpty { .. } => println!("Document is empty; nothing saved"),
        SaveOutcome::SkippedTooLarge { bytes } => {
            return Err(anyhow!(
                "annotations are {} bytes, above the configured size limit",
                bytes
            ));
        }
    }
    Ok(())
}

fn print_inspection(options: &SessionOptions) -> Result<()> {
    let inspection = session::inspect_session(options)?;
    println!("Document: {}", inspection.document_id);
    println!("Annotation file: {}", inspection.session_path.display());
    if !inspection.exists {
        println!("  (no annotations stored)");
        return Ok(());
    }
    if let Some(size) = inspection.size_bytes {
        println!("  Size: {} bytes{}", size, if inspection.compressed { " (gzip)" } else { "" });
    }
    if let Some(modified) = inspection.modified {
        let modified: DateTime<Local> = modified.into();
        println!("  Modified: {}", modified.format("%Y-%m-%d %H:%M:%S"));
    }
    match (&inspection.contents, &inspection.decode_error) {
        (Some(contents), _) => {
            println!("  Strokes: {}", contents.stroke_count);
            if let Some(page_count) = contents.page_count {
                println!("  Pages in document: {}", page_count);
            }
            for (page, strokes) in &contents.pages {
                println!("    page {}: {} strokes", page, strokes);
            }
        }
        (None, Some(err)) => println!("  Unreadable: {}", err),
        (None, None) => {}
    }
    if inspection.backup_exists {
        println!(
            "Backup: {} ({} bytes)",
            inspection.backup_path.display(),
            inspection.backup_size_bytes.unwrap_or(0)
        );
    }
    Ok(())
}

fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}
