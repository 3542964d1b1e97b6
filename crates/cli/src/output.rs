use crate::error::CliError;
use engine_config::report::summary::LoadSummary;
use serde::Serialize;
use std::path::Path;

fn to_json<T: Serialize>(value: &T) -> Result<String, CliError> {
    serde_json::to_string_pretty(value).map_err(CliError::JsonSerialize)
}

pub async fn write_json<T: Serialize>(value: &T, path: &Path) -> Result<(), CliError> {
    tokio::fs::write(path, to_json(value)?).await?;
    Ok(())
}

pub fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    println!("{}", to_json(value)?);
    Ok(())
}

pub fn print_summary(summary: &LoadSummary) {
    println!(
        "Load of {} ({} partitions): {:?}",
        summary.target, summary.partitions, summary.outcome
    );
    println!("-----------------------------");
    println!("{:<16} {}", "Submitted", summary.submitted);
    println!("{:<16} {}", "Acknowledged", summary.acknowledged);
    println!("{:<16} {}", "Failed rows", summary.error_count);
    println!("{:<16} {}", "Retried rows", summary.retried);
    println!("{:<16} {} ms", "Elapsed", summary.elapsed_ms);

    if !summary.errors.is_empty() {
        println!();
        println!("First {} failed rows:", summary.errors.len());
        for error in &summary.errors {
            println!("  {error}");
        }
    }
}
