// src/load.rs

use anyhow::{Context, Result};
use glob::{glob, Pattern};
use serde_json::Value;
use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
};
use tracing::{debug, info};

use crate::record::RawTable;

/// File-name pattern of line-delimited record files.
pub const NDJSON_PATTERN: &str = "*.ndjson";

/// List `*.ndjson` files directly inside `dir`, in path order.
/// A missing directory simply has no files. Glob metacharacters in `dir`
/// match literally.
pub fn list_ndjson_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let escaped = Pattern::escape(&dir.to_string_lossy());
    let pattern = Path::new(&escaped).join(NDJSON_PATTERN);
    let pattern = pattern.to_string_lossy();
    let mut files = Vec::new();
    for entry in glob(&pattern).with_context(|| format!("bad glob pattern {}", pattern))? {
        match entry {
            Ok(path) if path.is_file() => files.push(path),
            Ok(_) => {}
            Err(e) => debug!("skipping unreadable glob entry: {}", e),
        }
    }
    files.sort();
    Ok(files)
}

/// Read every NDJSON file in `dir` into one table.
///
/// Malformed lines (bad UTF-8, bad JSON, or JSON that is not an object) are
/// dropped. Only failing to open or read a file is an error.
#[tracing::instrument(level = "info", skip(dir), fields(dir = %dir.as_ref().display()))]
pub fn load_ndjson_dir<P: AsRef<Path>>(dir: P) -> Result<RawTable> {
    let mut table = RawTable::default();
    let files = list_ndjson_files(dir.as_ref())?;

    for path in &files {
        let skipped = read_ndjson_file(path, &mut table)?;
        debug!(file = %path.display(), skipped, rows = table.len(), "read file");
    }

    info!(files = files.len(), rows = table.len(), "loaded raw records");
    Ok(table)
}

/// Append the valid lines of one file to `table`; returns how many lines were skipped.
fn read_ndjson_file(path: &Path, table: &mut RawTable) -> Result<usize> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let reader = BufReader::new(file);
    let mut skipped = 0;

    for (idx, chunk) in reader.split(b'\n').enumerate() {
        let bytes = chunk.with_context(|| format!("reading {} at line {}", path.display(), idx))?;
        let Ok(line) = std::str::from_utf8(&bytes) else {
            skipped += 1;
            continue;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(line) {
            Ok(Value::Object(obj)) => table.push(obj),
            _ => skipped += 1,
        }
    }

    Ok(skipped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn garbage_lines_are_skipped() -> Result<()> {
        let dir = tempdir()?;
        fs::write(
            dir.path().join("a.ndjson"),
            "{\"post_id\": \"p1\", \"text\": \"hello\"}\nthis is not json\n",
        )?;

        let table = load_ndjson_dir(dir.path())?;
        assert_eq!(table.len(), 1);
        assert_eq!(table.records[0].post_id, Some(json!("p1")));
        Ok(())
    }

    #[test]
    fn blank_lines_non_objects_and_bad_utf8_are_ignored() -> Result<()> {
        let dir = tempdir()?;
        let mut content = b"\n   \n[1,2,3]\n\"just a string\"\n".to_vec();
        content.extend_from_slice(&[0xff, 0xfe, b'\n']);
        content.extend_from_slice(b"{\"text\": \"kept\"}");
        fs::write(dir.path().join("b.ndjson"), content)?;

        let table = load_ndjson_dir(dir.path())?;
        assert_eq!(table.len(), 1);
        assert_eq!(table.records[0].text, Some(json!("kept")));
        Ok(())
    }

    #[test]
    fn files_are_read_in_path_order_and_other_extensions_ignored() -> Result<()> {
        let dir = tempdir()?;
        fs::write(dir.path().join("b.ndjson"), "{\"text\": \"second\"}\n")?;
        fs::write(dir.path().join("a.ndjson"), "{\"text\": \"first\"}\n")?;
        fs::write(dir.path().join("c.json"), "{\"text\": \"ignored\"}\n")?;
        fs::create_dir(dir.path().join("nested"))?;
        fs::write(
            dir.path().join("nested").join("d.ndjson"),
            "{\"text\": \"nested\"}\n",
        )?;

        let table = load_ndjson_dir(dir.path())?;
        let texts: Vec<_> = table.records.iter().map(|r| r.text.clone()).collect();
        assert_eq!(texts, vec![Some(json!("first")), Some(json!("second"))]);
        Ok(())
    }

    #[test]
    fn empty_or_missing_directory_gives_empty_table() -> Result<()> {
        let dir = tempdir()?;
        assert!(load_ndjson_dir(dir.path())?.is_empty());
        assert!(load_ndjson_dir(dir.path().join("does-not-exist"))?.is_empty());
        Ok(())
    }

    #[test]
    fn directory_names_with_glob_characters_match_literally() -> Result<()> {
        let root = tempdir()?;
        let dir = root.path().join("in[1]");
        fs::create_dir(&dir)?;
        fs::write(dir.join("a.ndjson"), "{\"text\": \"bracketed\"}\n")?;
        fs::create_dir(root.path().join("in1"))?;
        fs::write(root.path().join("in1").join("b.ndjson"), "{\"text\": \"decoy\"}\n")?;

        let table = load_ndjson_dir(&dir)?;
        assert_eq!(table.len(), 1);
        assert_eq!(table.records[0].text, Some(json!("bracketed")));
        Ok(())
    }
}
