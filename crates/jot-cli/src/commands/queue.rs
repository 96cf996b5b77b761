use std::collections::HashSet;

use crate::commands::common::{
    format_queue_lines, open_repository, queue_to_item, AppPaths, QueueItem,
};
use crate::error::CliError;

pub async fn run_queue(as_json: bool, paths: &AppPaths) -> Result<(), CliError> {
    let repo = open_repository(paths)?;
    let entries = repo.pending_entries().await?;
    let exhausted = repo
        .needs_attention()
        .await?
        .into_iter()
        .map(|entry| entry.sequence)
        .collect::<HashSet<_>>();

    if as_json {
        let json_items = entries
            .iter()
            .map(|entry| queue_to_item(entry, &exhausted))
            .collect::<Vec<QueueItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("Nothing waiting to sync.");
        return Ok(());
    }

    for line in format_queue_lines(&entries, &exhausted) {
        println!("{line}");
    }
    Ok(())
}
