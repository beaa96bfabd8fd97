use anyhow::{bail, Context, Result};
use clap::{Subcommand, ValueEnum};
use scan_core::{HistoryRecord, HistoryStore};
use std::fs;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum HistoryAction {
    /// Newest first
    List {
        #[arg(long)]
        favorites: bool,
        #[arg(long)]
        json: bool,
    },
    /// Match content, notes and tags
    Search { query: String },
    Show { id: i64 },
    Favorite {
        id: i64,
        /// Remove the mark instead
        #[arg(long)]
        off: bool,
    },
    Note { id: i64, text: String },
    /// Replace the tags of a record
    Tag { id: i64, tags: Vec<String> },
    Delete { id: i64 },
    /// Delete every record
    Clear {
        #[arg(long)]
        yes: bool,
    },
    Export {
        #[arg(long, value_enum, default_value = "json")]
        format: ExportFormat,
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Restore a JSON export; existing content is kept
    Import { file: PathBuf },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ExportFormat {
    Json,
    Csv,
}

pub fn run(store: &HistoryStore, action: HistoryAction) -> Result<()> {
    match action {
        HistoryAction::List { favorites, json } => {
            let records = if favorites {
                store.favorites()?
            } else {
                store.query_all()?
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else {
                print_records(&records);
            }
        }
        HistoryAction::Search { query } => print_records(&store.search(&query)?),
        HistoryAction::Show { id } => {
            let record = store
                .get(id)?
                .with_context(|| format!("No history record {}", id))?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        HistoryAction::Favorite { id, off } => store.set_favorite(id, !off)?,
        HistoryAction::Note { id, text } => store.set_notes(id, &text)?,
        HistoryAction::Tag { id, tags } => store.set_tags(id, &tags)?,
        HistoryAction::Delete { id } => {
            if !store.delete(id)? {
                bail!("No history record {}", id);
            }
        }
        HistoryAction::Clear { yes } => {
            if !yes {
                bail!("Refusing to clear history without --yes");
            }
            println!("Deleted {} records", store.clear()?);
        }
        HistoryAction::Export { format, output } => {
            let data = match format {
                ExportFormat::Json => store.export_json()?,
                ExportFormat::Csv => store.export_csv()?,
            };
            match output {
                Some(path) => {
                    fs::write(&path, data)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    println!("Exported to {}", path.display());
                }
                None => print!("{}", data),
            }
        }
        HistoryAction::Import { file } => {
            let data = fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            println!("Imported {} new records", store.import_json(&data)?);
        }
    }
    Ok(())
}

fn print_records(records: &[HistoryRecord]) {
    if records.is_empty() {
        println!("No records");
        return;
    }
    for record in records {
        let star = if record.is_favorite { "*" } else { " " };
        let origin = if record.is_generated { "gen" } else { "scan" };
        println!(
            "{}{:>5}  {:<8} {:<4} {}",
            star,
            record.id,
            record.content_type.as_str(),
            origin,
            preview(&record.content)
        );
    }
}

fn preview(content: &str) -> String {
    let line = content.lines().next().unwrap_or_default();
    if line.chars().count() > 60 || content.lines().nth(1).is_some() {
        format!("{}...", line.chars().take(60).collect::<String>())
    } else {
        line.to_string()
    }
}
