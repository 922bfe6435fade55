//! Small filesystem and string helpers shared by every pipeline.

use crate::utils::error::{EtlError, Result};
use regex::Regex;
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use url::Url;

/// File name without directory or extension.
pub fn get_basename(path: impl AsRef<Path>) -> String {
    path.as_ref()
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Expands a glob pattern into a sorted file list. A pattern without `*`
/// is returned as-is, whether or not the file exists.
pub fn get_filenames(pattern: &str) -> Result<Vec<PathBuf>> {
    if !pattern.contains('*') {
        return Ok(vec![PathBuf::from(pattern)]);
    }

    let entries = glob::glob(pattern).map_err(|e| EtlError::InvalidConfigValueError {
        field: "input".to_string(),
        value: pattern.to_string(),
        reason: e.to_string(),
    })?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| match entry {
            Ok(path) => Some(path),
            Err(e) => {
                tracing::warn!("Skipping unreadable path: {}", e);
                None
            }
        })
        .filter(|path| path.is_file())
        .collect();
    files.sort();

    tracing::debug!("Found {} files matching {}", files.len(), pattern);
    Ok(files)
}

/// Creates the parent directory of each path. A path ending in `/` is
/// treated as a directory itself.
pub fn make_directories<P: AsRef<Path>>(paths: &[P]) -> Result<()> {
    for path in paths {
        let path = path.as_ref();
        let dir = if path.to_string_lossy().ends_with('/') {
            Some(path)
        } else {
            path.parent()
        };
        if let Some(dir) = dir.filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
    }
    Ok(())
}

/// Removes every regular file directly inside `dir`; sub-directories are kept.
pub fn empty_directory(dir: impl AsRef<Path>) -> Result<usize> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Ok(0);
    }
    let files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file())
        .collect();
    remove_files(&files)
}

pub fn remove_files<P: AsRef<Path>>(files: &[P]) -> Result<usize> {
    tracing::info!("Removing {} files", files.len());
    let mut removed = 0;
    for file in files {
        let file = file.as_ref();
        if file.is_file() {
            fs::remove_file(file)?;
            removed += 1;
        }
    }
    Ok(removed)
}

pub fn read_lines(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let file = fs::File::open(path)?;
    let mut lines = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line?;
        let line = line.trim_end();
        if !line.is_empty() {
            lines.push(line.to_string());
        }
    }
    Ok(lines)
}

/// Documents of a line-delimited JSON file and the number of lines that
/// did not parse. Malformed lines are logged and skipped.
pub fn read_line_delimited_json(path: impl AsRef<Path>) -> Result<(Vec<serde_json::Value>, usize)> {
    let path = path.as_ref();
    let mut documents = Vec::new();
    let mut malformed = 0;
    for (i, line) in read_lines(path)?.iter().enumerate() {
        match serde_json::from_str(line) {
            Ok(document) => documents.push(document),
            Err(e) => {
                tracing::warn!("Skipping record {} of {}: {}", i + 1, path.display(), e);
                malformed += 1;
            }
        }
    }
    Ok((documents, malformed))
}

pub fn string_to_filename(s: &str) -> String {
    static NON_ALNUM: OnceLock<Regex> = OnceLock::new();
    let re = NON_ALNUM.get_or_init(|| Regex::new("[^0-9a-z]+").expect("static regex"));
    re.replace_all(&s.to_lowercase(), "_").into_owned()
}

pub fn string_to_ascii(s: &str) -> String {
    s.chars().filter(char::is_ascii).collect()
}

pub fn round_int(value: f64) -> i64 {
    value.round() as i64
}

/// Last path segment of a URL, ignoring query string and fragment.
pub fn url_basename(url: &str) -> String {
    match Url::parse(url) {
        Ok(parsed) => parsed
            .path_segments()
            .and_then(|mut segments| segments.next_back().map(str::to_string))
            .unwrap_or_default(),
        Err(_) => {
            let path = url.split(['?', '#']).next().unwrap_or_default();
            path.rsplit('/').next().unwrap_or_default().to_string()
        }
    }
}

/// Lowercase extension (without the dot) of a URL or file path.
pub fn url_extension(url: &str) -> String {
    extension_of(&url_basename(url))
}

pub fn extension_of(path: impl AsRef<Path>) -> String {
    path.as_ref()
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_get_basename() {
        assert_eq!(get_basename("output/met/10766.jpg"), "10766");
        assert_eq!(get_basename("poster.final.png"), "poster.final");
        assert_eq!(get_basename("noext"), "noext");
    }

    #[test]
    fn test_string_to_filename() {
        assert_eq!(string_to_filename("Object Name"), "object_name");
        assert_eq!(string_to_filename("Medium -- Oil, canvas"), "medium_oil_canvas");
        assert_eq!(string_to_filename("ÉCU"), "_cu");
    }

    #[test]
    fn test_string_to_ascii_and_round() {
        assert_eq!(string_to_ascii("Café noir"), "Caf noir");
        assert_eq!(round_int(2.5), 3);
        assert_eq!(round_int(1365.3), 1365);
    }

    #[test]
    fn test_url_basename_and_extension() {
        let url = "https://tile.loc.gov/storage/service/pnp/1234v.jpg#h=100";
        assert_eq!(url_basename(url), "1234v.jpg");
        assert_eq!(url_extension(url), "jpg");
        assert_eq!(
            url_extension("https://example.com/img/Big.TIF?download=1"),
            "tif"
        );
        assert_eq!(url_basename("cache/objects/part-01.txt"), "part-01.txt");
        assert_eq!(url_extension("https://example.com/iiif/full"), "");
    }

    #[test]
    fn test_read_lines_and_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.txt");
        let mut file = fs::File::create(&path).unwrap();
        writeln!(file, "{{\"id\": 1}}  ").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "{{\"id\": 2}}").unwrap();

        assert_eq!(read_lines(&path).unwrap().len(), 2);
        let (docs, malformed) = read_line_delimited_json(&path).unwrap();
        assert_eq!(docs[1]["id"], 2);
        assert_eq!(malformed, 0);
    }

    #[test]
    fn test_read_json_skips_malformed_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.txt");
        fs::write(&path, "{\"id\": 1}\n{\"title\": \"trunc\n{\"id\": 3}\n").unwrap();

        let (docs, malformed) = read_line_delimited_json(&path).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[1]["id"], 3);
        assert_eq!(malformed, 1);
    }

    #[test]
    fn test_glob_make_and_empty_directory() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a/b/c.jpg");
        make_directories(&[&nested]).unwrap();
        assert!(dir.path().join("a/b").is_dir());

        fs::write(dir.path().join("a/b/2.jpg"), b"x").unwrap();
        fs::write(dir.path().join("a/b/1.jpg"), b"x").unwrap();
        fs::write(dir.path().join("a/b/notes.txt"), b"x").unwrap();

        let pattern = format!("{}/a/b/*.jpg", dir.path().display());
        let files = get_filenames(&pattern).unwrap();
        assert_eq!(files.len(), 2);
        assert!(files[0].ends_with("1.jpg"));

        assert_eq!(empty_directory(dir.path().join("a/b")).unwrap(), 3);
        assert!(dir.path().join("a/b").is_dir());
        assert_eq!(empty_directory(dir.path().join("missing")).unwrap(), 0);
    }
}
