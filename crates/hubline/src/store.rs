use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use hubline_peer::AttachmentStore;
use tracing::warn;

const FALLBACK_NAME: &str = "attachment";
const MAX_SUFFIX: u32 = 10_000;

/// Saves accepted attachments into one directory.
///
/// Only the final path component of the announced name is used, and an
/// existing file is never overwritten: `a.txt` becomes `a-1.txt`, `a-2.txt`
/// and so on.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Claim a free file name for `name` and fill it with `fill`.
    ///
    /// A file `fill` fails on is removed again.
    fn save_with<F>(&self, name: &str, fill: F) -> io::Result<PathBuf>
    where
        F: FnOnce(&mut File) -> io::Result<()>,
    {
        fs::create_dir_all(&self.root)?;
        let name = sanitize(name);

        for attempt in 0..MAX_SUFFIX {
            let path = self.root.join(candidate(&name, attempt));
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    let filled = fill(&mut file);
                    drop(file);
                    if let Err(err) = filled {
                        if let Err(cleanup) = fs::remove_file(&path) {
                            warn!(
                                path = %path.display(),
                                error = %cleanup,
                                "could not remove partial attachment"
                            );
                        }
                        return Err(err);
                    }
                    return Ok(path);
                }
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(err) => return Err(err),
            }
        }

        Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("no free file name for '{name}' in {}", self.root.display()),
        ))
    }
}

impl AttachmentStore for DirectoryStore {
    fn store(&self, name: &str, payload: &[u8]) -> io::Result<PathBuf> {
        self.save_with(name, |file| {
            file.write_all(payload)?;
            file.sync_all()
        })
    }
}

fn sanitize(name: &str) -> String {
    let last = name.rsplit(['/', '\\']).next().unwrap_or_default().trim();
    match last {
        "" | "." | ".." => FALLBACK_NAME.to_string(),
        other => other.to_string(),
    }
}

fn candidate(name: &str, attempt: u32) -> String {
    if attempt == 0 {
        return name.to_string();
    }
    match name.rfind('.') {
        Some(dot) if dot > 0 => format!("{}-{attempt}{}", &name[..dot], &name[dot..]),
        _ => format!("{name}-{attempt}"),
    }
}
