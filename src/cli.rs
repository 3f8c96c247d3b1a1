//! Command-line front end.
//!
//! Every command loads the saved session, applies one action and writes the
//! session back. Page and slot numbers are 1-based, as displayed.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;
use tracing::info;

use crate::config::AppConfig;
use crate::image_source;
use crate::localization::{LocalizationManager, Status};
use crate::ocr::TesseractEngine;
use crate::pipeline::{BatchError, Orchestrator, ProgressUpdate, Session};
use crate::slots::Page;
use crate::text_processing::MatchMode;

#[derive(Parser)]
#[command(name = "photo-ocr-keeper")]
#[command(about = "Photograph small documents and keep one line of text from each", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Directory holding the saved session (overrides KEEPER_DATA_DIR)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Queue image files for the next batch
    Add {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Run OCR over the queue and fill empty slots
    Process {
        /// prefix or suffix
        #[arg(short, long)]
        mode: Option<String>,

        /// Keep the first candidate that starts/ends with this text
        #[arg(short, long)]
        term: Option<String>,
    },

    /// List pages
    Pages,

    /// Print the slots of a page (default: current page)
    Show {
        #[arg(short, long)]
        page: Option<usize>,
    },

    /// Make a page current
    Select { page: usize },

    /// Unlock a slot, or replace its text with --text
    Edit {
        slot: usize,

        #[arg(short, long)]
        page: Option<usize>,

        #[arg(short, long)]
        text: Option<String>,
    },

    /// Print a slot's text and record the copy
    Copy {
        slot: usize,

        #[arg(short, long)]
        page: Option<usize>,
    },

    /// Delete the current page (the last page is cleared instead)
    DeletePage,

    /// Queue and grid summary
    Status,
}

/// Messages rendered in the configured language
struct Printer {
    messages: LocalizationManager,
    language: String,
}

impl Printer {
    fn text(&self, status: &Status) -> String {
        self.messages.render(status, &self.language)
    }

    fn message(&self, key: &str, args: &[(&str, String)]) -> String {
        self.messages
            .get_message_with_args_in_language(key, &self.language, args)
    }

    fn status(&self, status: &Status) {
        println!("{}", self.text(status));
    }

    fn page(&self, position: usize, page: &Page) {
        println!(
            "{}",
            self.message("page-label", &[("page", position.to_string())])
        );
        for (index, slot) in page.slots.iter().enumerate() {
            let mut flags = Vec::new();
            if slot.ocr_failed {
                flags.push(self.message("slot-failed", &[]));
            }
            if slot.was_copied() {
                flags.push(self.message("slot-copied", &[]));
            }
            if !slot.confirmed && !slot.is_empty() {
                flags.push("*".to_string());
            }

            println!(
                "  {:<8} {:>6}  {}{}",
                self.message("slot-label", &[("slot", (index + 1).to_string())]),
                self.message("slot-chars", &[("count", slot.char_count().to_string())]),
                slot.text,
                if flags.is_empty() {
                    String::new()
                } else {
                    format!("  [{}]", flags.join(", "))
                }
            );
        }
    }
}

/// Resolve a 1-based page position to a page id
fn page_id_at(session: &Session, position: Option<usize>) -> Result<Option<u32>> {
    match position {
        None => Ok(None),
        Some(position) => position
            .checked_sub(1)
            .and_then(|index| session.slots.pages().get(index))
            .map(|page| Some(page.id))
            .ok_or_else(|| anyhow::anyhow!("Page {} does not exist", position)),
    }
}

/// Convert a 1-based slot number
fn slot_index(slot: usize) -> Result<usize> {
    slot.checked_sub(1)
        .ok_or_else(|| anyhow::anyhow!("Slot numbers start at 1"))
}

/// Execute one command against the saved session
pub async fn run(cli: Cli, config: AppConfig) -> Result<()> {
    let printer = Printer {
        messages: LocalizationManager::new()?,
        language: config.language.clone(),
    };

    let engine = Arc::new(TesseractEngine::new(config.ocr.clone()));
    let orchestrator = Orchestrator::from_config(&config, engine);

    match cli.command {
        Commands::Add { files } => {
            let loaded = image_source::load_images(&files, &config.ocr);
            for failure in &loaded.failures {
                eprintln!("{}", failure);
            }
            if loaded.images.is_empty() {
                printer.status(&Status::AddFailed);
                return Ok(());
            }

            let (report, status) = orchestrator.enqueue(loaded.images).await?;
            info!(accepted = report.accepted, rejected = report.rejected, "Images queued");
            printer.status(&status);
            printer.status(&orchestrator.queue_status().await);
        }

        Commands::Process { mode, term } => {
            let mut settings = orchestrator.match_settings();
            if let Some(mode) = mode {
                settings.mode = MatchMode::parse(&mode);
            }
            if let Some(term) = term {
                settings.term = term;
            }
            orchestrator.set_match_settings(settings);
            process(&orchestrator, &printer).await?;
        }

        Commands::Pages => {
            let session = orchestrator.snapshot().await;
            let current = session.slots.current_page_id();
            for (index, page) in session.slots.pages().iter().enumerate() {
                let filled = page.slots.len() - page.empty_count();
                println!(
                    "{} {}  {}/{}",
                    if page.id == current { "*" } else { " " },
                    printer.message("page-label", &[("page", (index + 1).to_string())]),
                    filled,
                    page.slots.len()
                );
            }
        }

        Commands::Show { page } => {
            let session = orchestrator.snapshot().await;
            let page_id = page_id_at(&session, page)?.unwrap_or(session.slots.current_page_id());
            let position = session
                .slots
                .pages()
                .iter()
                .position(|p| p.id == page_id)
                .unwrap_or(0);
            printer.page(position + 1, session.slots.page(page_id)?);
        }

        Commands::Select { page } => {
            printer.status(&orchestrator.select_page(page).await?);
        }

        Commands::Edit { slot, page, text } => {
            let session = orchestrator.snapshot().await;
            let page_id = page_id_at(&session, page)?;
            let index = slot_index(slot)?;

            let status = orchestrator.begin_edit(page_id, index).await?;
            match text {
                Some(text) => {
                    printer.status(&orchestrator.confirm_edit(page_id, index, &text).await?)
                }
                None => printer.status(&status),
            }
        }

        Commands::Copy { slot, page } => {
            let session = orchestrator.snapshot().await;
            let page_id = page_id_at(&session, page)?;
            let outcome = orchestrator.record_copy(page_id, slot_index(slot)?).await?;
            if let Some(text) = &outcome.text {
                println!("{}", text);
            }
            eprintln!("{}", printer.text(&outcome.status));
        }

        Commands::DeletePage => {
            printer.status(&orchestrator.delete_current_page().await?);
        }

        Commands::Status => {
            let session = orchestrator.snapshot().await;
            let settings = orchestrator.match_settings();
            println!(
                "{}  {}/{}",
                printer.text(&Status::QueueWaiting {
                    count: session.queue.size()
                }),
                session.queue.size(),
                session.queue.capacity()
            );
            println!(
                "{} / {}  ({} / {})",
                session.slots.occupied_count(),
                session.slots.slot_count(),
                session.slots.pages().len(),
                session.slots.capacity().max_pages
            );
            println!("{} \"{}\"", settings.mode.as_str(), settings.term);
        }
    }

    Ok(())
}

/// Run a batch, rendering progress updates as they arrive
async fn process(orchestrator: &Orchestrator, printer: &Printer) -> Result<()> {
    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} [{bar:40.green/238}] {pos:>3}%  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  "),
    );
    bar.enable_steady_tick(Duration::from_millis(100));

    let render = |update: ProgressUpdate| {
        bar.set_position(update.percent as u64);
        bar.set_message(format!(
            "{}  {}/{}",
            printer.text(&update.label.status()),
            update.completed,
            update.total
        ));
    };

    let (tx, mut rx) = mpsc::unbounded_channel();
    let batch = orchestrator.process_batch(Some(tx));
    tokio::pin!(batch);

    let result = loop {
        tokio::select! {
            result = &mut batch => break result,
            Some(update) = rx.recv() => render(update),
        }
    };
    while let Ok(update) = rx.try_recv() {
        render(update);
    }
    bar.finish_and_clear();

    match result {
        Ok(report) => {
            printer.status(&report.status());
            printer.status(&orchestrator.queue_status().await);
            Ok(())
        }
        Err(BatchError::Persistence(e)) => {
            printer.status(&Status::PersistFailed);
            Err(anyhow::anyhow!(e))
        }
        Err(e) => {
            printer.status(&e.status());
            Ok(())
        }
    }
}
