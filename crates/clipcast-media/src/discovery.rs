//! Replay-buffer file discovery.
//!
//! Fallback for when the save-event-delivered path is absent or stale: scan
//! the configured replay output directory for the most recently written
//! video file. Heuristic by nature, so it reports "nothing found" instead of
//! erroring, and must never override a primary path that exists.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::debug;

/// Extensions the recorder is known to emit.
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv", "mov", "flv", "ts", "m4v", "avi"];

/// Find the newest video file in `dir` modified within `max_age`.
///
/// Unreadable directories or entries are logged at debug level and skipped;
/// the scan only ever answers "this file" or "nothing usable".
pub async fn find_latest_buffer(dir: impl AsRef<Path>, max_age: Duration) -> Option<PathBuf> {
    let dir = dir.as_ref();
    let now = SystemTime::now();

    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(err) => {
            debug!(dir = %dir.display(), "buffer discovery skipped: {err}");
            return None;
        }
    };

    let mut newest: Option<(PathBuf, SystemTime)> = None;

    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(err) => {
                debug!(dir = %dir.display(), "unreadable directory entry: {err}");
                continue;
            }
        };

        let path = entry.path();
        if !has_video_extension(&path) {
            continue;
        }

        let metadata = match entry.metadata().await {
            Ok(metadata) => metadata,
            Err(err) => {
                debug!(path = %path.display(), "cannot stat candidate: {err}");
                continue;
            }
        };
        if !metadata.is_file() {
            continue;
        }

        let modified = match metadata.modified() {
            Ok(modified) => modified,
            Err(err) => {
                debug!(path = %path.display(), "no modification time: {err}");
                continue;
            }
        };

        // Only files young enough to be the buffer we were just told about.
        match now.duration_since(modified) {
            Ok(age) if age > max_age => continue,
            // Future mtimes (clock skew) count as brand new.
            _ => {}
        }

        let newer = match &newest {
            Some((_, best)) => modified > *best,
            None => true,
        };
        if newer {
            newest = Some((path, modified));
        }
    }

    newest.map(|(path, _)| path)
}

fn has_video_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            VIDEO_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}
