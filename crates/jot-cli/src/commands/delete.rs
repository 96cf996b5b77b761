use crate::commands::common::{open_repository, resolve_note, AppPaths};
use crate::error::CliError;

pub async fn run_delete(id: &str, paths: &AppPaths) -> Result<(), CliError> {
    let repo = open_repository(paths)?;
    let note = resolve_note(id, &repo).await?;

    repo.delete(&note.id).await?;

    println!("{}", note.id);
    Ok(())
}
