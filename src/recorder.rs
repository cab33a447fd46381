use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use log::{error, info, warn};

/// Writes the per-account result lines and handles quarantine moves.
pub struct OutcomeRecorder {
    result_file: PathBuf,
    quarantine_dir: PathBuf,
}

impl OutcomeRecorder {
    /// Ensures the quarantine directory exists and truncates the result file.
    pub fn create(result_file: &Path, quarantine_dir: &Path) -> io::Result<OutcomeRecorder> {
        if !quarantine_dir.exists() {
            fs::create_dir_all(quarantine_dir)?;
            info!("Created quarantine directory {:?}", quarantine_dir);
        }
        File::create(result_file)?;
        info!("Result file {:?} ready", result_file);

        Ok(OutcomeRecorder {
            result_file: result_file.to_path_buf(),
            quarantine_dir: quarantine_dir.to_path_buf(),
        })
    }

    /// Appends one `name|plan|expiry` line, synced to disk before returning.
    pub fn record(&self, file_name: &str, plan: &str, expiry: &str) {
        let line = format!("{}|{}|{}", file_name, plan, expiry);
        match self.append_line(&line) {
            Ok(()) => info!("Recorded result for {}", file_name),
            Err(e) => error!("Could not write result line for {}: {}", file_name, e),
        }
    }

    fn append_line(&self, line: &str) -> io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.result_file)?;
        writeln!(file, "{}", line)?;
        file.sync_all()
    }

    /// Moves a dead cookie file into quarantine, overwriting any previous
    /// occupant. A failed move is logged and the file stays where it was.
    pub fn quarantine(&self, cookie_path: &Path, file_name: &str) {
        let target = self.quarantine_dir.join(file_name);
        match fs::rename(cookie_path, &target) {
            Ok(()) => info!("Moved {} to {:?}", file_name, self.quarantine_dir),
            Err(e) => warn!("Could not move {} to quarantine: {}", file_name, e),
        }
    }
}
