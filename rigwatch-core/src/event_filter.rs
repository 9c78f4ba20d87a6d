use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use regex::Regex;
use tracing::{error, warn};

use crate::error::EventFilterError;
use crate::model::{EventRule, Level, Source};

/// One rule's match against a line (spec §4.A output type).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Matched {
    pub rule_name: String,
    pub pattern: String,
    pub source_name: String,
    pub line: String,
    pub level: Level,
}

/// Per-file read cursor. Process-global, keyed by path, so two callers
/// watching the same file see disjoint forward progress (spec §4.A).
struct FileCursor {
    offset: u64,
    lines_seen: u64,
    /// Bounded backlog of recently consumed lines for late matchers.
    cache: Vec<String>,
    cache_size: usize,
}

impl FileCursor {
    fn push_cache(&mut self, line: String) {
        self.cache.push(line);
        if self.cache.len() > self.cache_size {
            let excess = self.cache.len() - self.cache_size;
            self.cache.drain(0..excess);
        }
    }
}

/// Process-global per-file registry backing the Event Filter (spec §4.A
/// implementation note). First registrant for a path owns the cursor; later
/// registrants receive the same handle, matching spec §5's "first registrant
/// owns the file" resource note.
#[derive(Default)]
pub struct FileRegistry {
    files: DashMap<PathBuf, Arc<Mutex<FileCursor>>>,
}

impl FileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `path` on first use, seeking to `skip_percent` of the
    /// file's current size. Missing files are logged and skipped, not
    /// fatal, per spec §4.A's failure semantics — callers get `None` back
    /// and should treat the source as producing no matches this tick.
    fn cursor(&self, path: &Path, skip_percent: u8, cache_size: usize) -> Option<Arc<Mutex<FileCursor>>> {
        if let Some(existing) = self.files.get(path) {
            return Some(existing.clone());
        }

        let metadata = match std::fs::metadata(path) {
            Ok(m) => m,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "event filter source file missing, skipping");
                return None;
            }
        };
        let len = metadata.len();
        let offset = len * u64::from(skip_percent.min(100)) / 100;
        let cursor = Arc::new(Mutex::new(FileCursor {
            offset,
            lines_seen: 0,
            cache: Vec::new(),
            cache_size,
        }));
        // `entry().or_insert` gives first-registrant-wins even under a race.
        let handle = self
            .files
            .entry(path.to_path_buf())
            .or_insert_with(|| cursor)
            .clone();
        Some(handle)
    }

    /// Drops `path`'s registration, releasing its file descriptor context.
    /// Called when an `EventFilter` owning the registration is closed.
    pub fn release(&self, path: &Path) {
        self.files.remove(path);
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

struct CompiledRule {
    rule: EventRule,
    regex: Regex,
}

/// Compiles named regex patterns once and checks file/command sources for
/// matches on demand (spec §4.A).
pub struct EventFilter {
    rules: Vec<CompiledRule>,
    registry: Arc<FileRegistry>,
    scratch_dir: PathBuf,
    skip_percent: u8,
    cache_size: usize,
    owned_files: Mutex<Vec<PathBuf>>,
}

impl EventFilter {
    /// Compiles `rules`. A malformed regex fails construction entirely
    /// (spec §4.A: "A malformed regex fails filter construction").
    pub fn new(
        rules: Vec<EventRule>,
        registry: Arc<FileRegistry>,
        scratch_dir: PathBuf,
        skip_percent: u8,
        cache_size: usize,
    ) -> Result<Self, EventFilterError> {
        let mut compiled = Vec::with_capacity(rules.len());
        for rule in rules {
            let regex = Regex::new(&rule.regexp).map_err(|source| EventFilterError::InvalidPattern {
                rule: rule.name.clone(),
                source,
            })?;
            compiled.push(CompiledRule { rule, regex });
        }
        Ok(Self {
            rules: compiled,
            registry,
            scratch_dir,
            skip_percent,
            cache_size,
            owned_files: Mutex::new(Vec::new()),
        })
    }

    /// Runs every configured rule once and returns all matches found since
    /// the last call. Safe to call concurrently across filters that share
    /// no files.
    pub fn check(&self) -> Vec<Matched> {
        let mut matches = Vec::new();
        for compiled in &self.rules {
            match &compiled.rule.source {
                Source::LogFile(path) => {
                    self.check_file(compiled, path, self.skip_percent, &mut matches);
                }
                Source::Cmd(argv) => {
                    if let Some(scratch) = self.run_command(&compiled.rule.name, argv) {
                        self.check_file(compiled, &scratch, 0, &mut matches);
                    }
                }
            }
        }
        matches
    }

    fn check_file(&self, compiled: &CompiledRule, path: &Path, skip_percent: u8, out: &mut Vec<Matched>) {
        let Some(cursor) = self.registry.cursor(path, skip_percent, self.cache_size) else {
            return;
        };
        {
            let mut owned = self.owned_files.lock();
            if !owned.contains(&path.to_path_buf()) {
                owned.push(path.to_path_buf());
            }
        }

        let mut guard = cursor.lock();
        let mut file = match std::fs::File::open(path) {
            Ok(f) => f,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "event filter source file missing, skipping");
                return;
            }
        };
        if file.seek(SeekFrom::Start(guard.offset)).is_err() {
            return;
        }
        let mut buf = String::new();
        if file.read_to_string(&mut buf).is_err() {
            // Non-UTF8 or transient read error: leave offset untouched, retry next tick.
            return;
        }
        guard.offset += buf.len() as u64;

        for line in buf.lines() {
            guard.lines_seen += 1;
            guard.push_cache(line.to_string());
            if compiled.regex.is_match(line) {
                out.push(Matched {
                    rule_name: compiled.rule.name.clone(),
                    pattern: compiled.rule.regexp.clone(),
                    source_name: path.display().to_string(),
                    line: line.to_string(),
                    level: compiled.rule.level,
                });
            }
        }
    }

    /// Executes `argv`, writing stdout+stderr (truncating) to a scratch file
    /// named from the rule, per spec §4.A's command-source handling. Errors
    /// are logged; the command's prior scratch-file contents are still
    /// matched (we simply fall through to `check_file` on whatever is on
    /// disk from a previous run).
    fn run_command(&self, rule_name: &str, argv: &[String]) -> Option<PathBuf> {
        let scratch = self.scratch_dir.join(format!("{rule_name}.scratch"));
        let Some((program, args)) = argv.split_first() else {
            return Some(scratch);
        };
        let output = std::process::Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output();
        match output {
            Ok(output) => {
                let mut combined = output.stdout;
                combined.extend_from_slice(&output.stderr);
                if let Err(err) = std::fs::write(&scratch, combined) {
                    error!(rule = rule_name, error = %err, "failed to write event filter scratch file");
                }
            }
            Err(err) => {
                error!(rule = rule_name, argv = ?argv, error = %err, "event filter command failed to spawn");
            }
        }
        Some(scratch)
    }

    /// Releases all file descriptors/registrations this filter touched.
    pub fn close(&self) {
        let owned = self.owned_files.lock();
        for path in owned.iter() {
            self.registry.release(path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn rule(name: &str, path: &Path, pattern: &str) -> EventRule {
        EventRule {
            name: name.to_string(),
            description: None,
            source: Source::LogFile(path.to_path_buf()),
            regexp: pattern.to_string(),
            level: Level::Critical,
        }
    }

    #[test]
    fn matches_lines_written_after_construction() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("kernel.log");
        std::fs::write(&log_path, "boot ok\n").unwrap();

        let registry = Arc::new(FileRegistry::new());
        let filter = EventFilter::new(
            vec![rule("xid", &log_path, r"Xid \d+")],
            registry,
            dir.path().to_path_buf(),
            0,
            16,
        )
        .unwrap();

        // skip_percent=0 means the whole existing file is in scope.
        assert!(filter.check().is_empty());

        let mut f = std::fs::OpenOptions::new().append(true).open(&log_path).unwrap();
        writeln!(f, "NVRM: Xid 79: GPU has fallen off the bus").unwrap();

        let matches = filter.check();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].rule_name, "xid");
        filter.close();
    }

    #[test]
    fn missing_file_is_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("does-not-exist.log");
        let registry = Arc::new(FileRegistry::new());
        let filter = EventFilter::new(
            vec![rule("missing", &missing, "anything")],
            registry,
            dir.path().to_path_buf(),
            99,
            16,
        )
        .unwrap();
        assert!(filter.check().is_empty());
    }

    #[test]
    fn malformed_regex_fails_construction() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.log");
        std::fs::write(&path, "").unwrap();
        let registry = Arc::new(FileRegistry::new());
        let err = EventFilter::new(vec![rule("bad", &path, "(unclosed")], registry, dir.path().to_path_buf(), 0, 8);
        assert!(err.is_err());
    }

    #[test]
    fn two_filters_on_the_same_file_see_disjoint_progress() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shared.log");
        std::fs::write(&path, "line-a\n").unwrap();
        let registry = Arc::new(FileRegistry::new());

        let first = EventFilter::new(vec![rule("r1", &path, "line")], registry.clone(), dir.path().to_path_buf(), 0, 8).unwrap();
        let first_matches = first.check();
        assert_eq!(first_matches.len(), 1);

        let mut f = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(f, "line-b").unwrap();

        // A second filter on the same path shares the single registered cursor
        // (first registrant owns the file), so it sees only what's unread.
        let second = EventFilter::new(vec![rule("r2", &path, "line")], registry, dir.path().to_path_buf(), 0, 8).unwrap();
        let second_matches = second.check();
        assert_eq!(second_matches.len(), 1);
        assert_eq!(second_matches[0].line, "line-b");
    }

    #[test]
    fn skip_percent_seeks_past_existing_history() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.log");
        std::fs::write(&path, "old-line\n".repeat(100)).unwrap();
        let registry = Arc::new(FileRegistry::new());
        let filter = EventFilter::new(vec![rule("r", &path, "old-line")], registry, dir.path().to_path_buf(), 99, 8).unwrap();
        let matches = filter.check();
        assert!(matches.len() < 5, "skip_percent=99 should have consumed almost all history already");
    }
}
