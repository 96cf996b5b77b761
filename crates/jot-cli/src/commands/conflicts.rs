use crate::commands::common::{
    conflict_to_item, format_conflict_lines, open_repository, AppPaths, ConflictItem,
};
use crate::error::CliError;

pub async fn run_conflicts(as_json: bool, paths: &AppPaths) -> Result<(), CliError> {
    let repo = open_repository(paths)?;

    let mut conflicts = Vec::new();
    for conflict in repo.list_conflicts().await? {
        let local = repo.get(&conflict.note_id).await?;
        conflicts.push((conflict, local));
    }

    if as_json {
        let json_items = conflicts
            .iter()
            .map(|(conflict, local)| conflict_to_item(conflict, local.as_ref()))
            .collect::<Vec<ConflictItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
        return Ok(());
    }

    if conflicts.is_empty() {
        println!("No sync conflicts.");
        return Ok(());
    }

    for line in format_conflict_lines(&conflicts) {
        println!("{line}");
    }
    println!();
    println!("Resolve with `jot resolve <id> --keep-local | --accept-remote | --merge <text> | --discard`");
    Ok(())
}
