use jot_core::models::ConflictResolution;

use crate::commands::common::{open_repository, resolve_note, AppPaths};
use crate::error::CliError;

pub async fn run_resolve(
    id: &str,
    resolution: ConflictResolution,
    paths: &AppPaths,
) -> Result<(), CliError> {
    let repo = open_repository(paths)?;
    let note = resolve_note(id, &repo).await?;

    if repo.conflict(&note.id).await?.is_none() {
        return Err(CliError::NoConflict(note.id.to_string()));
    }

    repo.resolve_conflict(&note.id, resolution).await?;

    println!("{}", note.id);
    Ok(())
}
