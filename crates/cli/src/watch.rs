//! Watch mode: re-run check (and optionally the ladder transform)
//! whenever the source file changes
//!
//! Events are debounced: edits arriving within a short window collapse
//! into one rebuild, so editors that write multiple times per save do
//! not trigger rebuild storms.

use notify::{Event, RecursiveMode, Watcher};
use rung_ladder::{TransformOptions, transform};
use std::path::Path;
use std::sync::mpsc::{Receiver, channel};
use std::time::Duration;
use tracing::debug;

const DEBOUNCE: Duration = Duration::from_millis(200);

/// Blocking watch loop; returns only on a fatal error
pub fn watch(input: &Path, with_ladder: bool) -> i32 {
    let (tx, rx) = channel::<()>();
    let target = input.file_name().map(|name| name.to_os_string());

    let mut watcher = match notify::recommended_watcher(move |result: Result<Event, _>| {
        if let Ok(event) = result {
            let matches = match &target {
                Some(name) => event
                    .paths
                    .iter()
                    .any(|p| p.file_name() == Some(name.as_os_str())),
                None => true,
            };
            if matches {
                let _ = tx.send(());
            }
        }
    }) {
        Ok(watcher) => watcher,
        Err(e) => {
            eprintln!("error: failed to create watcher: {}", e);
            return 1;
        }
    };

    // Watch the directory: editors replace files on save, which would
    // drop a watch on the file itself
    let dir = input.parent().unwrap_or_else(|| Path::new("."));
    if let Err(e) = watcher.watch(dir, RecursiveMode::NonRecursive) {
        eprintln!("error: failed to watch '{}': {}", dir.display(), e);
        return 1;
    }

    println!("watching {} (Ctrl-C to stop)", input.display());
    rebuild(input, with_ladder);

    loop {
        match rx.recv() {
            Ok(()) => {
                drain(&rx);
                debug!(path = %input.display(), "change detected");
                rebuild(input, with_ladder);
            }
            Err(_) => return 0,
        }
    }
}

/// Collapse a burst of events into one rebuild
fn drain(rx: &Receiver<()>) {
    while rx.recv_timeout(DEBOUNCE).is_ok() {}
}

/// One check (and optional transform) pass
pub fn rebuild(input: &Path, with_ladder: bool) {
    let source = match std::fs::read_to_string(input) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("error: failed to read '{}': {}", input.display(), e);
            return;
        }
    };

    let parsed = rungc::parse(&source);
    for diagnostic in &parsed.diagnostics {
        println!("{}", diagnostic);
    }
    if parsed.diagnostics.is_empty() {
        println!("ok: {} program(s)", parsed.programs.len());
    }

    if with_ladder {
        let result = transform(&source, &TransformOptions::default());
        println!(
            "ladder: {} node(s), {} edge(s), {} warning(s)",
            result.nodes.len(),
            result.edges.len(),
            result.warnings.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::Watcher;
    use serial_test::serial;
    use std::io::Write;
    use std::sync::mpsc::channel;
    use tempfile::TempDir;

    #[test]
    fn test_rebuild_tolerates_missing_file() {
        // Must not panic; the next save will retry
        rebuild(Path::new("/no/such/file.st"), true);
    }

    #[test]
    #[serial]
    fn test_watcher_sees_file_modification() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("watched.st");
        std::fs::write(&path, "a := 1;").unwrap();

        let (tx, rx) = channel::<()>();
        let mut watcher = notify::recommended_watcher(move |result: Result<notify::Event, _>| {
            if result.is_ok() {
                let _ = tx.send(());
            }
        })
        .unwrap();
        watcher
            .watch(dir.path(), RecursiveMode::NonRecursive)
            .unwrap();

        let mut file = std::fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .unwrap();
        writeln!(file, "b := 2;").unwrap();
        file.sync_all().unwrap();
        drop(file);

        assert!(
            rx.recv_timeout(Duration::from_secs(5)).is_ok(),
            "expected a filesystem event within five seconds"
        );
    }
}
