use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};

use shelf_core::config::{
    config_path, ingest_options_from_config, load_config, load_config_from, save_config,
    set_config_key, AppConfig,
};
use shelf_core::error::ConfigError;
use shelf_core::progress::{IngestStage, ProgressEvent, ProgressHandler};
use shelf_core::stats::book_stats;
use shelf_core::{parse_epub_file, IngestOptions, ParsedBook};

type CliResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

#[derive(Parser)]
#[command(name = "shelf")]
#[command(about = "Ingest EPUB files into reader-ready books")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Log debug output (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse an EPUB and write book, chapter and TOC JSON files
    Ingest {
        /// Input file
        #[arg(required = true)]
        input: String,

        /// Folder to file the book under
        #[arg(long)]
        folder: Option<String>,

        /// Output directory (defaults to ./<book id>)
        #[arg(short, long)]
        out: Option<String>,
    },

    /// Show book metadata and counts
    Info {
        /// Input file
        #[arg(required = true)]
        input: String,
    },

    /// Show navigation groups and their spine ranges
    Toc {
        /// Input file
        #[arg(required = true)]
        input: String,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Initialize default config file
    Init,
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Key (section.key)
        key: String,
        /// Value
        value: String,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let result = match &cli.command {
        Commands::Ingest { input, folder, out } => {
            run_ingest(input, folder.as_deref(), out.as_deref(), cli.json)
        }
        Commands::Info { input } => run_info(input, cli.json),
        Commands::Toc { input } => run_toc(input, cli.json),
        Commands::Config { action } => run_config(action, cli.json),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Drives an indicatif bar from ingestion events.
struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    fn new() -> Self {
        let bar = ProgressBar::new(0);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            bar.set_style(style.progress_chars("#>-"));
        }
        Self { bar }
    }
}

impl ProgressHandler for BarProgress {
    fn on_progress(&self, event: ProgressEvent) {
        if event.stage == IngestStage::Done {
            self.bar.finish_and_clear();
            return;
        }
        if let Some(total) = event.total {
            self.bar.set_length(total);
        }
        self.bar.set_position(event.current);
        match event.message {
            Some(m) => self.bar.set_message(format!("{}: {}", event.stage, m)),
            None => self.bar.set_message(event.stage.to_string()),
        }
    }
}

fn ingest_options() -> IngestOptions {
    ingest_options_from_config(&load_config())
}

fn load_book(input: &str, folder: Option<&str>, show_progress: bool) -> Result<ParsedBook, Box<dyn std::error::Error + Send + Sync>> {
    let path = Path::new(input);
    if !path.exists() {
        return Err(format!("Input file not found: {}", path.display()).into());
    }
    let opts = ingest_options();
    let parsed = if show_progress {
        let progress = BarProgress::new();
        parse_epub_file(path, folder, &opts, Some(&progress))?
    } else {
        parse_epub_file(path, folder, &opts, None)?
    };
    Ok(parsed)
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> CliResult {
    std::fs::write(path, serde_json::to_string_pretty(value)?)?;
    Ok(())
}

fn run_ingest(input: &str, folder: Option<&str>, out: Option<&str>, json: bool) -> CliResult {
    let parsed = load_book(input, folder, !json)?;

    let out_dir = match out {
        Some(o) => PathBuf::from(o),
        None => PathBuf::from(".").join(&parsed.book.id),
    };
    std::fs::create_dir_all(&out_dir)?;
    write_json(&out_dir.join("book.json"), &parsed.book)?;
    write_json(&out_dir.join("chapters.json"), &parsed.chapters)?;
    write_json(&out_dir.join("toc.json"), &parsed.toc_chapters)?;

    if json {
        let summary = serde_json::json!({
            "book": parsed.book,
            "chapters": parsed.chapters.len(),
            "tocChapters": parsed.toc_chapters.len(),
            "output": out_dir.display().to_string(),
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("Ingested: {} ({})", parsed.book.title, parsed.book.id);
        println!(
            "Chapters: {} spine documents, {} shown",
            parsed.chapters.len(),
            parsed.book.total_chapters
        );
        println!("Wrote: {}", out_dir.display());
    }
    Ok(())
}

fn run_info(input: &str, json: bool) -> CliResult {
    let parsed = load_book(input, None, false)?;
    let book = &parsed.book;
    let stats = book_stats(&parsed.chapters);

    if json {
        let info = serde_json::json!({
            "id": book.id,
            "title": book.title,
            "author": book.author,
            "language": book.language,
            "publisher": book.publisher,
            "hasCover": book.cover.is_some(),
            "totalChapters": book.total_chapters,
            "tocChapters": parsed.toc_chapters.len(),
            "stats": stats,
        });
        println!("{}", serde_json::to_string_pretty(&info)?);
    } else {
        println!("Title: {}", book.title);
        println!("Author: {}", book.author);
        if let Some(l) = &book.language {
            println!("Language: {}", l);
        }
        if let Some(p) = &book.publisher {
            println!("Publisher: {}", p);
        }
        println!("Cover: {}", if book.cover.is_some() { "yes" } else { "no" });
        println!("Chapters: {}", book.total_chapters);
        println!("Spine documents: {}", parsed.chapters.len());
        println!("TOC entries: {}", parsed.toc_chapters.len());
        println!("Words: {}", stats.word_count);
        println!("Reading time: {} min", stats.reading_minutes);
    }
    Ok(())
}

fn run_toc(input: &str, json: bool) -> CliResult {
    let parsed = load_book(input, None, false)?;
    let groups = parsed.navigation();

    if json {
        println!("{}", serde_json::to_string_pretty(&groups)?);
    } else {
        for group in &groups {
            println!(
                "{:>4}-{:<4} {}",
                group.start_index, group.end_index, group.title
            );
        }
    }
    Ok(())
}

fn run_config(action: &ConfigAction, json: bool) -> CliResult {
    match action {
        ConfigAction::Init => {
            let path = config_path().ok_or(ConfigError::NoConfigDir)?;
            save_config(&AppConfig::default(), &path)?;
            println!("Wrote default config to {}", path.display());
        }
        ConfigAction::Show => {
            let cfg = load_config();
            if json {
                println!("{}", serde_json::to_string_pretty(&cfg)?);
            } else {
                println!("{}", toml::to_string_pretty(&cfg)?);
            }
        }
        ConfigAction::Set { key, value } => {
            let path = config_path().ok_or(ConfigError::NoConfigDir)?;
            let mut cfg = load_config_from(&path);
            set_config_key(&mut cfg, key, value)?;
            save_config(&cfg, &path)?;
            if !json {
                println!("Updated {}", key);
            }
        }
    }
    Ok(())
}
