//! Reading and writing websites as plain directories.

use std::path::{Component, Path, PathBuf};

use anyhow::Context;
use sitesmith::artifacts::Artifact;
use walkdir::WalkDir;

/// Reads every file below `root`. The names are relative to `root` and use `/` as separator.
pub fn read_site(root: &Path) -> anyhow::Result<Vec<(String, Vec<u8>)>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(true).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry.path().strip_prefix(root)?;
        let name = relative
            .components()
            .map(|component| component.as_os_str().to_str())
            .collect::<Option<Vec<_>>>()
            .with_context(|| format!("{} is not valid UTF-8", relative.display()))?
            .join("/");
        files.push((name, fs_err::read(entry.path())?));
    }
    Ok(files)
}

/// Returns where the artifact with the given name is written below `root`, or `None` if the name
/// would escape `root`.
fn artifact_path(root: &Path, name: &str) -> Option<PathBuf> {
    let relative = Path::new(name);
    relative
        .components()
        .all(|component| matches!(component, Component::Normal(_)))
        .then(|| root.join(relative))
}

/// Writes `artifacts` below `root` and returns the written paths.
pub fn write_site(root: &Path, artifacts: &[Artifact]) -> anyhow::Result<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(artifacts.len());
    for artifact in artifacts {
        let path = artifact_path(root, &artifact.name)
            .with_context(|| format!("refusing to write {} outside of the site", artifact.name))?;
        if let Some(parent) = path.parent() {
            fs_err::create_dir_all(parent)?;
        }
        fs_err::write(&path, &artifact.content)?;
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact(name: &str, content: &str) -> Artifact {
        Artifact {
            name: name.to_string(),
            content: content.to_string(),
        }
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        write_site(
            dir.path(),
            &[
                artifact("style.css", "body{}\n"),
                artifact("index.html", "<html></html>\n"),
                artifact("css/print.css", "body{color:black}\n"),
            ],
        )
        .unwrap();

        let files = read_site(dir.path()).unwrap();
        let names: Vec<_> = files.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, vec!["css/print.css", "index.html", "style.css"]);
        assert_eq!(files[1].1, b"<html></html>\n");
    }

    #[test]
    fn test_refuses_to_escape() {
        let dir = tempfile::tempdir().unwrap();
        let site = dir.path().join("site");
        assert!(write_site(&site, &[artifact("../outside.html", "")]).is_err());
        assert!(write_site(&site, &[artifact("./index.html", "")]).is_err());
        assert!(!dir.path().join("outside.html").exists());
    }
}
