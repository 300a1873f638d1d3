//! Knowledge-point extraction command.
//!
//! Extracts knowledge points from an answer text, prints them as JSON,
//! and optionally dispatches them to the chat-history store. The
//! dispatch is detached: the result is already emitted before the
//! hand-off runs, and a hand-off failure is logged, never propagated.

use std::path::Path;

use anyhow::{bail, Context, Result};

use lexindex_core::extract::extract;

use crate::chat_history;
use crate::config::Config;
use crate::taxonomy::load_taxonomy;

pub async fn run_extract(
    config: &Config,
    text: Option<String>,
    file: Option<&Path>,
    subject: &str,
    chat_id: Option<String>,
) -> Result<()> {
    let answer = match (text, file) {
        (Some(text), None) => text,
        (None, Some(file)) => std::fs::read_to_string(file)
            .with_context(|| format!("Failed to read answer file: {}", file.display()))?,
        _ => bail!("Provide the answer via exactly one of --text or --file."),
    };

    let taxonomy_dir = config
        .extraction
        .taxonomy_dir
        .as_deref()
        .context("extraction.taxonomy_dir must be set in config")?;
    let taxonomy = load_taxonomy(taxonomy_dir, subject)?;

    let points = extract(&answer, &taxonomy, config.extraction.max_points);
    println!("{}", serde_json::to_string_pretty(&points)?);

    // The result above is the command's output regardless of what the
    // hand-off does.
    if let (Some(chat_id), Some(base_url)) = (chat_id, config.chat_history.base_url.clone()) {
        let handle = tokio::spawn(chat_history::update(base_url, chat_id, points));
        match handle.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => eprintln!("Warning: {e}"),
            Err(e) => eprintln!("Warning: chat history hand-off aborted: {e}"),
        }
    }

    Ok(())
}
