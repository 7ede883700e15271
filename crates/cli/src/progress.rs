//! Console progress and the JSONL result file.

use crate::output::{result_line, JsonFormatter};
use anyhow::{Context, Result};
use chatbench_application::ProgressSink;
use chatbench_domain::{LogKind, RunResult};
use colored::Colorize;
use parking_lot::Mutex;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Prints progress and appends every result to a JSONL file as it arrives.
pub struct ConsoleProgress {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
    results: Mutex<Vec<RunResult>>,
    write_error: Mutex<Option<String>>,
    quiet: bool,
}

impl ConsoleProgress {
    /// Creates (truncating) the result file at `path`.
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: Mutex::new(BufWriter::new(file)),
            results: Mutex::new(Vec::new()),
            write_error: Mutex::new(None),
            quiet: false,
        })
    }

    /// Suppresses console lines; the file is still written.
    pub fn quiet(mut self) -> Self {
        self.quiet = true;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn results(&self) -> Vec<RunResult> {
        self.results.lock().clone()
    }

    /// Flushes the file and reports the first write failure, if any.
    pub fn finish(&self) -> Result<()> {
        self.writer
            .lock()
            .flush()
            .with_context(|| format!("failed to flush {}", self.path.display()))?;
        match self.write_error.lock().take() {
            Some(e) => anyhow::bail!("failed to write {}: {e}", self.path.display()),
            None => Ok(()),
        }
    }

    fn append(&self, result: &RunResult) -> Result<()> {
        let line = JsonFormatter::line(result)?;
        let mut writer = self.writer.lock();
        writeln!(writer, "{line}")?;
        writer.flush()?;
        Ok(())
    }
}

impl ProgressSink for ConsoleProgress {
    fn log(&self, kind: LogKind, message: String) {
        debug!(kind = ?kind, "{message}");
        if self.quiet {
            return;
        }
        match kind {
            LogKind::Info | LogKind::Log => println!("{message}"),
            LogKind::Success => println!("{}", message.green()),
            LogKind::Warn => eprintln!("{}", message.yellow()),
            LogKind::Error => eprintln!("{}", message.red()),
        }
    }

    fn result(&self, result: RunResult) {
        if !self.quiet {
            println!("{}", result_line(&result));
        }
        if let Err(e) = self.append(&result) {
            warn!(error = %e, path = %self.path.display(), "Result not written");
            self.write_error.lock().get_or_insert_with(|| e.to_string());
        }
        self.results.lock().push(result);
    }
}
