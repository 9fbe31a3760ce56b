//! Status-line extraction from the servicing log that SFC writes to.
//!
//! Read-only and best-effort: a missing, locked or unreadable file yields no lines.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// How many trailing lines of CBS.log are inspected.
pub const TAIL_LINES: usize = 50;

// CBS.log can grow to hundreds of MB; only the end is of interest.
const TAIL_BYTES: u64 = 256 * 1024;

pub fn cbs_log_path() -> PathBuf {
    let windir = std::env::var_os("WINDIR")
        .or_else(|| std::env::var_os("SystemRoot"))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(r"C:\Windows"));
    windir.join("Logs").join("CBS").join("CBS.log")
}

fn read_tail_lines(path: &Path, count: usize) -> io::Result<Vec<String>> {
    let mut file = File::open(path)?;
    let len = file.metadata()?.len();
    let start = len.saturating_sub(TAIL_BYTES);
    file.seek(SeekFrom::Start(start))?;

    let mut buf = Vec::new();
    file.read_to_end(&mut buf)?;
    let text = String::from_utf8_lossy(&buf);

    let mut lines: Vec<&str> = text.lines().collect();
    // The first line is probably cut in half when we started mid-file.
    if start > 0 && !lines.is_empty() {
        lines.remove(0);
    }
    let skip = lines.len().saturating_sub(count);
    Ok(lines[skip..].iter().map(|l| l.trim_end().to_string()).collect())
}

fn is_verification_line(line: &str) -> bool {
    let lower = line.to_ascii_lowercase();
    lower.contains("verif") && lower.contains("complete")
}

/// Lines among the last [`TAIL_LINES`] of `path` that report verification completion.
pub fn verification_lines(path: &Path) -> Vec<String> {
    read_tail_lines(path, TAIL_LINES)
        .map(|lines| {
            lines
                .into_iter()
                .filter(|l| is_verification_line(l))
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt::Write as _;

    #[test]
    fn missing_file_yields_nothing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(verification_lines(&dir.path().join("CBS.log")).is_empty());
    }

    #[test]
    fn picks_verification_lines_from_tail() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("CBS.log");
        let mut text = String::new();
        writeln!(text, "2024-03-07 09:00:00, Info CSI [SR] Verify complete (old run)").unwrap();
        for i in 0..100 {
            writeln!(text, "2024-03-07 09:01:00, Info CSI filler line {i}").unwrap();
        }
        writeln!(text, "2024-03-07 09:30:00, Info CSI [SR] Verifying 100 components").unwrap();
        writeln!(text, "2024-03-07 09:30:01, Info CSI [SR] Verify complete").unwrap();
        writeln!(text, "2024-03-07 09:30:02, Info CSI [SR] Repairing 0 components").unwrap();
        std::fs::write(&path, text).unwrap();

        let lines = verification_lines(&path);
        assert_eq!(lines, vec!["2024-03-07 09:30:01, Info CSI [SR] Verify complete"]);
    }

    #[test]
    fn large_file_only_reads_the_end() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("CBS.log");
        let mut text = "x".repeat((TAIL_BYTES as usize) * 2);
        text.push('\n');
        text.push_str("Info CSI [SR] Verification 100% complete.\n");
        std::fs::write(&path, text).unwrap();

        assert_eq!(
            verification_lines(&path),
            vec!["Info CSI [SR] Verification 100% complete."]
        );
    }

    #[test]
    fn default_path_points_at_cbs_log() {
        let p = cbs_log_path();
        assert!(p.ends_with(Path::new("Logs").join("CBS").join("CBS.log")));
    }
}
