use crate::commands::common::{open_repository, resolve_note, AppPaths};
use crate::error::CliError;

pub async fn run_archive(id: &str, archived: bool, paths: &AppPaths) -> Result<(), CliError> {
    let repo = open_repository(paths)?;
    let note = resolve_note(id, &repo).await?;

    if note.is_archived != archived {
        repo.set_archived(&note.id, archived).await?;
    }

    println!("{}", note.id);
    Ok(())
}
