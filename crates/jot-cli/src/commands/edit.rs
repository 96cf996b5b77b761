use crate::commands::common::{
    capture_editor_input_with_initial, normalize_content, open_repository, resolve_note, AppPaths,
};
use crate::error::CliError;

pub async fn run_edit(
    id: &str,
    content_parts: &[String],
    paths: &AppPaths,
) -> Result<(), CliError> {
    let repo = open_repository(paths)?;
    let note = resolve_note(id, &repo).await?;

    let edited_content = match normalize_content(&content_parts.join(" ")) {
        Some(content) => content,
        None => capture_editor_input_with_initial(&note.content)?
            .ok_or(CliError::EmptyEditedContent)?,
    };

    if edited_content != note.content {
        repo.update(&note.id, &edited_content).await?;
    }

    println!("{}", note.id);
    Ok(())
}
