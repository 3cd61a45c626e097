//! Output writer for finished review runs.
//!
//! Each run produces two flat files under the output directory, named with a
//! single Unix timestamp taken at write time:
//!
//! ```text
//! <output_dir>/
//! ├── recommendations_<ts>.txt   (header + pretty JSON state dump)
//! └── report_<ts>.txt            (final plain-text report)
//! ```
//!
//! Files are created with `create_new`, so two runs finishing within the same
//! second fail with an I/O error instead of overwriting each other. No
//! collision avoidance beyond that is attempted.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use readme_review_shared::{Result, ReviewError};

/// First line of every recommendations dump.
pub const RECOMMENDATIONS_HEADER: &str = "Recommendations (auto-generated state)";

/// Paths of the two files written for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenOutputs {
    pub recommendations_path: PathBuf,
    pub report_path: PathBuf,
    /// The shared Unix timestamp embedded in both names.
    pub timestamp: i64,
}

/// Write the state dump and report for a run, creating `output_dir` if needed.
#[instrument(skip_all, fields(dir = %output_dir.display()))]
pub fn write_outputs<S: Serialize>(
    output_dir: &Path,
    state: &S,
    report: &str,
) -> Result<WrittenOutputs> {
    let timestamp = chrono::Utc::now().timestamp();
    write_outputs_at(output_dir, state, report, timestamp)
}

/// Same as [`write_outputs`] with an explicit timestamp.
pub fn write_outputs_at<S: Serialize>(
    output_dir: &Path,
    state: &S,
    report: &str,
    timestamp: i64,
) -> Result<WrittenOutputs> {
    std::fs::create_dir_all(output_dir).map_err(|e| ReviewError::io(output_dir, e))?;

    let recommendations_path = output_dir.join(format!("recommendations_{timestamp}.txt"));
    let report_path = output_dir.join(format!("report_{timestamp}.txt"));

    let dump = serde_json::to_string_pretty(state)?;
    write_new(
        &recommendations_path,
        &format!("{RECOMMENDATIONS_HEADER}\n\n{dump}"),
    )?;
    if let Err(e) = write_new(&report_path, report) {
        // Never leave a dump without its report.
        if let Err(cleanup) = std::fs::remove_file(&recommendations_path) {
            warn!(
                file = %recommendations_path.display(),
                error = %cleanup,
                "could not remove orphaned recommendations dump"
            );
        }
        return Err(e);
    }

    info!(
        recommendations = %recommendations_path.display(),
        report = %report_path.display(),
        "outputs written"
    );

    Ok(WrittenOutputs {
        recommendations_path,
        report_path,
        timestamp,
    })
}

/// Create `path` (failing if it exists) and write `content`.
fn write_new(path: &Path, content: &str) -> Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| ReviewError::io(path, e))?;
    file.write_all(content.as_bytes())
        .map_err(|e| ReviewError::io(path, e))?;
    debug!(file = %path.display(), size = content.len(), "wrote output file");
    Ok(())
}
