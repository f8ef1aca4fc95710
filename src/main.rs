use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use simplelog::{Config, LevelFilter, WriteLogger};

use pdfstamp::event_source::ScriptEventSource;
use pdfstamp::panic_handler::initialize_panic_handler;
use pdfstamp::pdf::Rasterizer;
use pdfstamp::session::describe;
use pdfstamp::{EditorSession, LopdfMutator, run_with_event_source, settings};

/// Place text on a PDF page and commit it into the document.
///
/// Input events are read one per line from `--script` or stdin:
/// `click X Y`, `down X Y [text]`, `move X Y`, `up`, `text ID TEXT`,
/// `offset X Y`, `next`, `prev`, `commit`, `download [PATH]`, `quit`.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// PDF to edit
    file: PathBuf,

    /// Read events from this file instead of stdin
    #[arg(long)]
    script: Option<PathBuf>,

    /// Settings file to use instead of the one in the config directory
    #[arg(long)]
    config: Option<PathBuf>,

    /// Keep the displayed page written to this PNG
    #[arg(long)]
    preview: Option<PathBuf>,

    #[arg(long, default_value = "pdfstamp.log")]
    log_file: PathBuf,

    /// Where `download` without a path writes to
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,
}

fn main() -> Result<()> {
    let args = Args::parse();

    WriteLogger::init(
        LevelFilter::Debug,
        Config::default(),
        File::create(&args.log_file)
            .with_context(|| format!("Failed to create log file {}", args.log_file.display()))?,
    )?;
    initialize_panic_handler();
    info!("Starting pdfstamp");

    match &args.config {
        Some(path) => settings::load_settings_from_path(path),
        None => settings::load_settings(),
    }

    let mut session =
        EditorSession::new(settings::current(), rasterizer()?, LopdfMutator).with_export_dir(&args.out_dir);

    let opened = session.open_file(&args.file).map(|_| ());
    if let Err(e) = opened {
        print_notices(&mut session);
        anyhow::bail!("Failed to open {}: {}", args.file.display(), describe(&e));
    }
    session.wait_for_render();

    let preview = args.preview.clone();
    let mut after_event = |session: &mut EditorSession| -> Result<()> {
        print_notices(session);
        if let Some(path) = &preview {
            write_preview(session, path)?;
        }
        Ok(())
    };
    after_event(&mut session)?;

    match &args.script {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("Failed to open script {}", path.display()))?;
            let mut events = ScriptEventSource::new(BufReader::new(file));
            run_with_event_source(&mut session, &mut events, &mut after_event)?;
        }
        None => {
            let mut events = ScriptEventSource::new(io::stdin().lock());
            run_with_event_source(&mut session, &mut events, &mut after_event)?;
        }
    }

    info!("Exiting pdfstamp");
    Ok(())
}

#[cfg(feature = "pdf")]
fn rasterizer() -> Result<Arc<dyn Rasterizer>> {
    Ok(Arc::new(pdfstamp::pdf::MupdfRasterizer))
}

#[cfg(not(feature = "pdf"))]
fn rasterizer() -> Result<Arc<dyn Rasterizer>> {
    anyhow::bail!("pdfstamp was built without the `pdf` feature, pages cannot be rendered")
}

fn print_notices(session: &mut EditorSession) {
    let notifications = session.notifications_mut();
    for notice in notifications.take_unseen() {
        eprintln!("[{}] {}", notice.level, notice.message);
    }
    notifications.update();
}

fn write_preview(session: &EditorSession, path: &Path) -> Result<()> {
    if let Some(frame) = session.renderer().current_frame() {
        frame
            .save_png(path)
            .with_context(|| format!("Failed to write preview {}", path.display()))?;
    }
    Ok(())
}
