use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Creates the next free run directory under `root`: `exp`, then `exp2`,
/// `exp3`, ... Numbering continues after the highest existing suffix.
///
/// `create_dir` decides ownership, so two concurrent callers never end up
/// sharing a directory.
pub async fn create_run_dir(root: &Path, name: &str) -> io::Result<PathBuf> {
    fs::create_dir_all(root).await?;

    loop {
        let candidate = next_run_dir(root, name).await?;
        match fs::create_dir(&candidate).await {
            Ok(()) => return Ok(candidate),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e),
        }
    }
}

async fn next_run_dir(root: &Path, name: &str) -> io::Result<PathBuf> {
    let base = root.join(name);
    if !fs::try_exists(&base).await? {
        return Ok(base);
    }

    let mut highest: Option<u32> = None;
    let mut entries = fs::read_dir(root).await?;
    while let Some(entry) = entries.next_entry().await? {
        let file_name = entry.file_name();
        let Some(file_name) = file_name.to_str() else { continue };
        if let Some(n) = file_name.strip_prefix(name).and_then(run_number) {
            highest = Some(highest.map_or(n, |h| h.max(n)));
        }
    }

    let n = match highest {
        None => 2,
        Some(h) => h
            .checked_add(1)
            .ok_or_else(|| io::Error::other(format!("run numbering for {name:?} is exhausted")))?,
    };
    Ok(root.join(format!("{name}{n}")))
}

/// Plain decimal suffix only; `+5`, `-1` and `_2` belong to other names.
fn run_number(suffix: &str) -> Option<u32> {
    if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    suffix.parse().ok()
}
