use jot_core::models::NoteKind;

use crate::commands::common::{open_repository, resolve_note_content, AppPaths};
use crate::error::CliError;

pub async fn run_add(
    content_parts: &[String],
    kind: NoteKind,
    paths: &AppPaths,
) -> Result<(), CliError> {
    let content = resolve_note_content(content_parts)?;

    let repo = open_repository(paths)?;
    let id = repo.create(&content, kind).await?;

    println!("{id}");
    Ok(())
}
