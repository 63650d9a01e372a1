//! # Blockwise - A Block Document Editor Core
//!
//! Command line front end over the editing core: create documents, print
//! their outline, try the autoformatter, validate stored files and move
//! blocks around the way a drag gesture would.
//!
//! ## Quick Start
//!
//! ```bash
//! # Create a document in the storage directory
//! cargo run -- new "Meeting notes"
//!
//! # Print its outline
//! cargo run -- show <DOCUMENT_ID>
//!
//! # See what the autoformatter does with some text
//! cargo run -- format "**bold** and *it*alic"
//! ```

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use blockwise_core::{Config, DropOutcome, Editor, Gesture, JsonFileStore};
use blockwise_markup::plain_text;
use blockwise_model::{BlockId, BlockRepository, BlockType, DocumentId};

/// Blockwise - block document editing from the command line
#[derive(Parser, Debug)]
#[command(name = "blockwise")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config file (defaults to the user config directory)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Directory holding document files
    #[arg(short, long, value_name = "DIR")]
    dir: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Command {
    /// Create an empty document
    New {
        /// Document title
        title: String,
    },
    /// Print a document's block outline
    Show {
        document: DocumentId,
    },
    /// Run the inline autoformatter over some text
    Format {
        text: String,
    },
    /// Validate a stored document
    Check {
        document: DocumentId,
    },
    /// Move a block next to (or into) another block
    Move {
        document: DocumentId,
        /// Block being moved
        block: BlockId,
        /// Block it is dropped onto
        onto: BlockId,
        /// Drop above the target instead of below
        #[arg(long)]
        above: bool,
        /// Drop inside the target container
        #[arg(long)]
        inside: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    let log_level = match args.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_level(true),
        )
        .with(tracing_subscriber::filter::LevelFilter::from_level(
            log_level,
        ))
        .init();

    tracing::info!("Starting Blockwise v{}", env!("CARGO_PKG_VERSION"));

    let output = run(args).await?;
    print!("{output}");
    Ok(())
}

/// Executes a command and returns what it prints.
async fn run(args: Args) -> anyhow::Result<String> {
    let mut config = match &args.config {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => Config::load(),
    };
    if let Some(dir) = args.dir {
        config.storage.directory = Some(dir);
    }
    // Every command saves explicitly before exiting.
    config.autosave.enabled = false;

    let store = Arc::new(JsonFileStore::from_config(&config.storage)?);
    let reorder = config.reorder.clone();
    let mut editor = Editor::with_config(config).with_store(store.clone());

    match args.command {
        Command::New { title } => {
            let id = editor.new_document(title)?;
            editor.save().await?;
            Ok(format!("{id}\n{}\n", store.path_for(id).display()))
        }
        Command::Show { document } => {
            editor.open(document).await?;
            Ok(outline(editor.document()?))
        }
        Command::Format { text } => {
            let outcome = blockwise_markup::format(&text);
            Ok(format!("{}\n", outcome.converted))
        }
        Command::Check { document } => {
            editor
                .open(document)
                .await
                .with_context(|| format!("document {document} is invalid"))?;
            let repo = editor.document()?;
            Ok(format!(
                "ok: {} blocks, {} at the root\n",
                repo.block_count(),
                repo.root().len()
            ))
        }
        Command::Move {
            document,
            block,
            onto,
            above,
            inside,
        } => {
            editor.open(document).await?;
            let offset_x = if inside { reorder.nest_threshold } else { 0.0 };
            let offset_y = if above { 0.0 } else { 1.0 };
            let gesture = Gesture::new(block, onto).at(offset_x, offset_y, 1.0);

            match editor.drop_block(&gesture)? {
                DropOutcome::Moved(_) => {
                    editor.save().await?;
                    Ok(outline(editor.document()?))
                }
                DropOutcome::NoOp => Ok("nothing to move\n".to_string()),
                DropOutcome::Aborted => anyhow::bail!("block {block} or {onto} does not exist"),
            }
        }
    }
}

/// Renders the block tree as an indented outline.
fn outline(repo: &BlockRepository) -> String {
    let mut out = format!("# {}\n", repo.document().title());
    for id in repo.document_order() {
        let (Ok(block), Ok(depth)) = (repo.find_block(id), repo.depth(id)) else {
            continue;
        };
        let marker = if block.block_type() == BlockType::Task {
            if block.is_checked() { "[x] " } else { "[ ] " }
        } else {
            ""
        };
        out.push_str(&format!(
            "{}- ({}) {}{}  <{}>\n",
            "  ".repeat(depth),
            block.block_type(),
            marker,
            plain_text(block.content()).replace('\n', " / "),
            id
        ));
    }
    out
}
