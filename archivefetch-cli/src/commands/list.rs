//! List command - print a collection's file manifest without downloading.

use std::collections::HashSet;

use archivefetch::archive::{ArchiveCatalog, FileDescriptor};
use archivefetch::job::NameFilter;
use archivefetch::FetchError;
use console::style;

use super::common::{build_client, load_config, ClientArgs};
use crate::error::CliError;

/// Arguments for the list command.
pub struct ListArgs {
    pub identifier: String,
    pub glob: Option<String>,
    pub client: ClientArgs,
}

/// Run the list command.
pub fn run(args: ListArgs) -> Result<(), CliError> {
    let identifier = args.identifier.trim();
    if identifier.is_empty() {
        return Err(CliError::Config("identifier must not be empty".to_string()));
    }

    let config = load_config()?;
    let filter = args.glob.as_deref().map(NameFilter::new).transpose()?;
    let client = build_client(args.client.resolve(&config))?;

    let files = client
        .list_files(identifier, filter.as_ref())
        .map_err(|source| FetchError::ManifestUnavailable {
            identifier: identifier.to_string(),
            source,
        })?;
    let files = dedup_by_name(files);

    for file in &files {
        println!("{}", format_entry(file));
    }

    let total: u64 = files.iter().filter_map(|f| f.size).sum();
    println!();
    println!(
        "{} files, {}",
        style(files.len()).bold(),
        format_size(total)
    );
    Ok(())
}

/// Drop repeated names, keeping the first entry, as the download manifest does.
fn dedup_by_name(files: Vec<FileDescriptor>) -> Vec<FileDescriptor> {
    let mut seen = HashSet::new();
    files
        .into_iter()
        .filter(|f| seen.insert(f.name.clone()))
        .collect()
}

fn format_entry(file: &FileDescriptor) -> String {
    let size = file.size.map(format_size).unwrap_or_else(|| "-".to_string());
    format!("{:>10}  {}", size, file.name)
}

/// Format a byte count with binary units.
fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use archivefetch::manifest::FileManifest;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(1536), "1.5 KiB");
        assert_eq!(format_size(5 * 1024 * 1024 * 1024), "5.0 GiB");
    }

    #[test]
    fn test_dedup_matches_manifest() {
        let mut first = FileDescriptor::named("a.txt");
        first.size = Some(3);
        let files = vec![
            first,
            FileDescriptor::named("b.txt"),
            FileDescriptor::named("a.txt"),
        ];

        let files = dedup_by_name(files);

        let names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["a.txt", "b.txt"]);
        assert_eq!(files[0].size, Some(3));
        assert_eq!(
            FileManifest::new(["a.txt", "b.txt", "a.txt"]).names(),
            &["a.txt", "b.txt"]
        );
    }

    #[test]
    fn test_format_entry_without_size() {
        let entry = format_entry(&FileDescriptor::named("notes.txt"));
        assert!(entry.ends_with("notes.txt"));
        assert!(entry.trim_start().starts_with('-'));
    }
}
