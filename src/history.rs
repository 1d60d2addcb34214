use std::collections::VecDeque;
use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

pub const DEFAULT_HISTORY_SIZE: usize = 1000;

/// Command history: capped in memory, mirrored to a plain-text file with one
/// entry per line.
#[derive(Debug)]
pub struct History {
    entries: VecDeque<String>,
    max: usize,
    path: Option<PathBuf>,
}

impl History {
    /// In-memory only; nothing is read or written.
    pub fn new(max: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            max: max.max(1),
            path: None,
        }
    }

    /// Load the most recent `max` entries from `path` and keep appending to
    /// it. A missing file is an empty history.
    pub fn load(path: PathBuf, max: usize) -> Self {
        let mut history = Self::new(max);
        match fs::File::open(&path) {
            Ok(file) => {
                for line in BufReader::new(file).lines() {
                    match line {
                        Ok(line) if !line.trim().is_empty() => history.push_in_memory(line),
                        Ok(_) => {}
                        Err(e) => {
                            tracing::warn!(path = %path.display(), "stopped reading history: {e}");
                            break;
                        }
                    }
                }
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(path = %path.display(), "cannot read history: {e}"),
        }
        tracing::debug!(path = %path.display(), entries = history.len(), "history loaded");
        history.path = Some(path);
        history
    }

    /// Record a submitted line and append it to the history file right away.
    /// Blank lines are not recorded.
    pub fn add(&mut self, line: &str) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }
        self.push_in_memory(line.to_string());

        if let Some(path) = &self.path {
            if let Err(e) = append_line(path, line) {
                tracing::warn!(path = %path.display(), "cannot append to history: {e}");
            }
        }
    }

    fn push_in_memory(&mut self, line: String) {
        self.entries.push_back(line);
        while self.entries.len() > self.max {
            self.entries.pop_front();
        }
    }

    /// Rewrite the history file with just the in-memory entries, so it never
    /// grows past the cap across sessions.
    pub fn flush(&self) -> io::Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let mut file = fs::File::create(path)?;
        for entry in &self.entries {
            writeln!(file, "{entry}")?;
        }
        file.flush()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.entries.get(index).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn append_line(path: &Path, line: &str) -> io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{line}")
}
