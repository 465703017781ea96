//! Reader application entry points.
//!
//! Wires the engine to the terminal:
//! file → tokenize → frame loop → progress file

use crate::cli::ReadArgs;
use crate::conductor::{
    Conductor, EngineMode, GuardedProgressStore, PrepareOptions, StartPosition,
};
use crate::config::Config;
use crate::defaults;
use crate::output;
use crate::store::FileProgressStore;
use crate::tokenizer::Tokenizer;
use anyhow::{Context, Result, bail};
use std::io::{IsTerminal, Read};
use std::path::Path;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

/// Reads a text file, or stdin for `-`.
pub fn read_text(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read text from stdin")?;
        return Ok(text);
    }
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

/// Start position from explicit flags, else the saved offset.
fn start_position(args: &ReadArgs, saved_offset: Option<usize>) -> StartPosition {
    if let Some(index) = args.index {
        StartPosition::index(index)
    } else if let Some(offset) = args.offset {
        StartPosition::offset(offset)
    } else if let Some(progress) = args.progress {
        StartPosition::progress(progress)
    } else if let Some(offset) = saved_offset {
        StartPosition::offset(offset)
    } else {
        StartPosition::default()
    }
}

/// Run the read command: tokenize a file and play it on stderr until the end
/// or Ctrl-C.
pub async fn run_read_command(config: Config, args: ReadArgs, quiet: bool) -> Result<()> {
    config.validate()?;
    let text = read_text(&args.file)?;
    if text.trim().is_empty() {
        bail!("{} contains no words", args.file.display());
    }

    let resume = config.persistence.resume && !args.no_resume;
    let file_store = FileProgressStore::new(FileProgressStore::default_path(), &text);
    let saved = if resume {
        file_store.load_position().unwrap_or_else(|e| {
            warn!("Ignoring unreadable progress file: {e}");
            None
        })
    } else {
        None
    };
    if let Some(offset) = saved {
        debug!(offset, "resuming from saved position");
    }

    let mut conductor = Conductor::new(&config);
    if resume {
        let mut store = GuardedProgressStore::new(file_store, config.persistence.clone());
        if let Some(prior) = saved {
            store.book_loaded(prior);
        }
        conductor = conductor.with_progress_store(store);
    }

    let options = PrepareOptions {
        wpm: args.wpm,
        chunk_size: None,
        start: start_position(&args, saved),
    };
    let mut prepare = Some(conductor.begin_prepare(text, options));

    let color = std::io::stderr().is_terminal();
    let wpm = conductor.wpm();
    let _subscription = (!quiet).then(|| {
        conductor.subscribe(move |update| output::draw(update, wpm, color))
    });

    let mut frames = tokio::time::interval(Duration::from_millis(defaults::FRAME_INTERVAL_MS));
    frames.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut started = false;
    let mut interrupted = false;
    loop {
        tokio::select! {
            _ = frames.tick() => {
                let mode = conductor.pump();
                if let Some(ticket) = prepare.as_mut()
                    && let Some(outcome) = ticket.try_outcome()
                {
                    outcome.context("Failed to prepare text")?;
                    prepare = None;
                }
                if !started {
                    conductor.play();
                    started = conductor.is_playing();
                } else if mode == EngineMode::Finished {
                    break;
                }
            }
            _ = &mut ctrl_c => {
                conductor.pause(true);
                interrupted = true;
                break;
            }
        }
    }

    let (index, total) = (conductor.current_index(), conductor.tokens().len());
    if conductor.mode() == EngineMode::Finished {
        // Start over next time.
        conductor.seek(0);
        conductor.shutdown(false);
    } else {
        conductor.shutdown(true);
    }

    if !quiet {
        eprintln!();
        if interrupted {
            eprintln!("Stopped at word {}/{}", index + 1, total);
        }
    }
    Ok(())
}

/// Run the tokens command: print every token of a file.
pub fn run_tokens_command(config: &Config, path: &Path, json: bool) -> Result<()> {
    config.validate()?;
    let text = read_text(path)?;
    let tokenizer = Tokenizer::new(config.tokenizer.clone());
    for token in tokenizer.tokenize(&text) {
        if json {
            println!("{}", serde_json::to_string(&token)?);
        } else {
            println!("{}", output::format_token_row(&token));
        }
    }
    Ok(())
}
