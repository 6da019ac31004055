#![forbid(unsafe_code)]

use std::path::{Path, PathBuf};

/// Last-turn record kept next to the database. One small file, rewritten on
/// every note, so a wedged process leaves behind what it was doing.
#[derive(Clone, Debug)]
pub(crate) struct TurnLog {
    path: PathBuf,
    start_rfc3339: String,
    pid: u32,
    last_root: Option<String>,
    last_scope: Option<String>,
    last_worker: Option<String>,
    last_error: Option<String>,
}

impl TurnLog {
    pub(crate) fn new(storage_dir: &Path) -> Self {
        let this = Self {
            path: storage_dir.join("planloom_last_turn.txt"),
            start_rfc3339: super::now_rfc3339(),
            pid: std::process::id(),
            last_root: None,
            last_scope: None,
            last_worker: None,
            last_error: None,
        };
        this.flush();
        this
    }

    pub(crate) fn note_turn(&mut self, root: &str, scope: &str, worker: Option<&str>) {
        self.last_root = Some(root.to_string());
        self.last_scope = Some(scope.to_string());
        self.last_worker = worker.map(str::to_string);
        self.last_error = None;
        self.flush();
    }

    pub(crate) fn note_error(&mut self, error: &str) {
        let error = error.trim();
        if error.is_empty() {
            return;
        }
        self.last_error = Some(truncate(error, 300));
        self.flush();
    }

    fn flush(&self) {
        let mut out = String::new();
        out.push_str(&format!("start: {}\n", self.start_rfc3339));
        out.push_str(&format!("pid: {}\n", self.pid));
        if let Some(root) = &self.last_root {
            out.push_str(&format!("root: {root}\n"));
        }
        if let Some(scope) = &self.last_scope {
            out.push_str(&format!("scope: {scope}\n"));
        }
        if let Some(worker) = &self.last_worker {
            out.push_str(&format!("worker: {worker}\n"));
        }
        if let Some(error) = &self.last_error {
            out.push_str(&format!("error: {error}\n"));
        }
        // Diagnostics only: losing this file must never fail a turn.
        let _ = std::fs::write(&self.path, out);
    }
}

fn truncate(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect()
}
