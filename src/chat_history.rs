//! Best-effort hand-off of knowledge points to the chat-history store.
//!
//! The extraction result is already returned to the caller before this
//! runs; a failure here is a [`Error::Persistence`] that gets logged and
//! never retried or surfaced to the caller holding the valid result.

use std::time::Duration;

use lexindex_core::error::Error;
use lexindex_core::models::KnowledgePoint;

/// POST the extracted knowledge points for one chat.
pub async fn update(
    base_url: String,
    chat_id: String,
    points: Vec<KnowledgePoint>,
) -> lexindex_core::Result<()> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .map_err(|e| Error::Persistence(e.to_string()))?;

    let url = format!(
        "{}/chats/{}/knowledge-points",
        base_url.trim_end_matches('/'),
        chat_id
    );

    let response = client
        .post(&url)
        .json(&points)
        .send()
        .await
        .map_err(|e| Error::Persistence(format!("chat history store unreachable: {e}")))?;

    if !response.status().is_success() {
        return Err(Error::Persistence(format!(
            "chat history store returned {}",
            response.status()
        )));
    }
    Ok(())
}
