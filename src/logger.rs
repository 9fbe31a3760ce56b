//! Session logger.
//!
//! Every message goes through [`SessionLogger::log`], which mirrors it to two
//! independently optional sinks: the console (colorized when attached to a
//! terminal) and a per-session plain-text file with sortable timestamps.

use owo_colors::OwoColorize;
use std::fs::{self, File, OpenOptions};
use std::io::{self, IsTerminal, LineWriter, Write};
use std::path::{Path, PathBuf};
use time::macros::format_description;
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
    /// Secondary output such as command lines and surfaced tool log lines.
    Detail,
}

impl LogLevel {
    fn tag(self) -> &'static str {
        match self {
            LogLevel::Info => "INFO",
            LogLevel::Success => "SUCCESS",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
            LogLevel::Detail => "DETAIL",
        }
    }
}

/// Current wall-clock time, in the local offset when the platform can tell us.
pub fn now_local() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

/// `YYYY-MM-DD HH:MM:SS`, used for log lines.
pub fn format_timestamp(ts: OffsetDateTime) -> String {
    ts.format(format_description!(
        "[year]-[month]-[day] [hour]:[minute]:[second]"
    ))
    .unwrap_or_else(|_| ts.unix_timestamp().to_string())
}

/// `YYYYMMDD_HHMMSS`, used in file names.
pub fn file_stamp(ts: OffsetDateTime) -> String {
    ts.format(format_description!(
        "[year][month][day]_[hour][minute][second]"
    ))
    .unwrap_or_else(|_| ts.unix_timestamp().to_string())
}

/// Candidate file names for `prefix` at `stamp`: the plain name first, then
/// `_1`, `_2`, ... suffixes.
fn candidate_name(prefix: &str, stamp: &str, ext: &str, attempt: u32) -> String {
    if attempt == 0 {
        format!("{prefix}_{stamp}.{ext}")
    } else {
        format!("{prefix}_{stamp}_{attempt}.{ext}")
    }
}

/// Return a path under `dir` that does not exist yet, for a file another
/// process will create (the DISM detail log).
pub fn unused_path(dir: &Path, prefix: &str, stamp: &str, ext: &str) -> PathBuf {
    let mut attempt = 0;
    loop {
        let path = dir.join(candidate_name(prefix, stamp, ext, attempt));
        if !path.exists() {
            return path;
        }
        attempt += 1;
    }
}

/// Create a new file under `dir`, never reusing an existing one.
fn create_unique(dir: &Path, prefix: &str, stamp: &str, ext: &str) -> io::Result<(PathBuf, File)> {
    let mut attempt = 0;
    loop {
        let path = dir.join(candidate_name(prefix, stamp, ext, attempt));
        match OpenOptions::new().append(true).create_new(true).open(&path) {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => attempt += 1,
            Err(e) => return Err(e),
        }
    }
}

/// Console side of the logger.
pub struct ConsoleSink {
    out: Box<dyn Write>,
    color: bool,
}

impl ConsoleSink {
    pub fn stdout() -> Self {
        let color = color_enabled(io::stdout().is_terminal(), colors_allowed(), || {
            enable_ansi(Stream::Stdout)
        });
        Self {
            out: Box::new(io::stdout()),
            color,
        }
    }

    pub fn stderr() -> Self {
        let color = color_enabled(io::stderr().is_terminal(), colors_allowed(), || {
            enable_ansi(Stream::Stderr)
        });
        Self {
            out: Box::new(io::stderr()),
            color,
        }
    }

    /// Uncolored sink over an arbitrary writer.
    #[cfg(test)]
    pub fn plain(out: impl Write + 'static) -> Self {
        Self {
            out: Box::new(out),
            color: false,
        }
    }

    fn write_line(&mut self, level: LogLevel, message: &str) {
        let _ = if self.color {
            match level {
                LogLevel::Info => writeln!(self.out, "{}", message.cyan()),
                LogLevel::Success => writeln!(self.out, "{}", message.green()),
                LogLevel::Warning => writeln!(self.out, "{}", message.yellow()),
                LogLevel::Error => writeln!(self.out, "{}", message.red()),
                LogLevel::Detail => writeln!(self.out, "{}", message.bright_black()),
            }
        } else {
            writeln!(self.out, "{message}")
        };
        let _ = self.out.flush();
    }
}

fn colors_allowed() -> bool {
    std::env::var_os("NO_COLOR").is_none()
}

#[derive(Debug, Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

/// Color only on a terminal, without `NO_COLOR`, and once the console accepts
/// escape sequences. `enable_console` is not called unless the first two hold.
fn color_enabled(is_terminal: bool, allowed: bool, enable_console: impl FnOnce() -> bool) -> bool {
    is_terminal && allowed && enable_console()
}

/// Turn on virtual-terminal processing for the console behind `stream`.
/// Classic consoles print escape codes literally without it.
#[cfg(windows)]
fn enable_ansi(stream: Stream) -> bool {
    use windows_sys::Win32::Foundation::INVALID_HANDLE_VALUE;
    use windows_sys::Win32::System::Console::{
        GetConsoleMode, GetStdHandle, SetConsoleMode, ENABLE_VIRTUAL_TERMINAL_PROCESSING,
        STD_ERROR_HANDLE, STD_OUTPUT_HANDLE,
    };

    let which = match stream {
        Stream::Stdout => STD_OUTPUT_HANDLE,
        Stream::Stderr => STD_ERROR_HANDLE,
    };
    unsafe {
        let handle = GetStdHandle(which);
        if handle.is_null() || handle == INVALID_HANDLE_VALUE {
            return false;
        }
        let mut mode = 0;
        if GetConsoleMode(handle, &mut mode) == 0 {
            return false;
        }
        if mode & ENABLE_VIRTUAL_TERMINAL_PROCESSING != 0 {
            return true;
        }
        SetConsoleMode(handle, mode | ENABLE_VIRTUAL_TERMINAL_PROCESSING) != 0
    }
}

#[cfg(not(windows))]
fn enable_ansi(_stream: Stream) -> bool {
    true
}

struct FileSink {
    path: PathBuf,
    out: LineWriter<File>,
}

pub struct SessionLogger {
    console: Option<ConsoleSink>,
    file: Option<FileSink>,
}

impl SessionLogger {
    /// Create `log_dir` if needed and open a fresh session log in it.
    ///
    /// Never fails: on any I/O error the logger keeps only the console sink and
    /// says so once.
    pub fn initialize(log_dir: &Path, started: OffsetDateTime, console: ConsoleSink) -> Self {
        let opened = fs::create_dir_all(log_dir)
            .and_then(|_| create_unique(log_dir, "SystemRepair", &file_stamp(started), "log"));

        match opened {
            Ok((path, file)) => Self {
                console: Some(console),
                file: Some(FileSink {
                    path,
                    out: LineWriter::new(file),
                }),
            },
            Err(e) => {
                let mut logger = Self::console_only(console);
                logger.warn(format!(
                    "Could not create a log file in {}: {e}. Continuing with console output only.",
                    log_dir.display()
                ));
                logger
            }
        }
    }

    pub fn console_only(console: ConsoleSink) -> Self {
        Self {
            console: Some(console),
            file: None,
        }
    }

    pub fn log_file(&self) -> Option<&Path> {
        self.file.as_ref().map(|f| f.path.as_path())
    }

    pub fn log(&mut self, level: LogLevel, message: impl AsRef<str>) {
        let message = message.as_ref();
        if let Some(file) = self.file.as_mut() {
            let _ = writeln!(
                file.out,
                "[{}] [{}] {}",
                format_timestamp(now_local()),
                level.tag(),
                message
            );
        }
        if let Some(console) = self.console.as_mut() {
            console.write_line(level, message);
        }
    }

    pub fn info(&mut self, message: impl AsRef<str>) {
        self.log(LogLevel::Info, message);
    }

    pub fn success(&mut self, message: impl AsRef<str>) {
        self.log(LogLevel::Success, message);
    }

    pub fn warn(&mut self, message: impl AsRef<str>) {
        self.log(LogLevel::Warning, message);
    }

    pub fn error(&mut self, message: impl AsRef<str>) {
        self.log(LogLevel::Error, message);
    }

    pub fn detail(&mut self, message: impl AsRef<str>) {
        self.log(LogLevel::Detail, message);
    }
}

/// In-memory console used by tests across the crate.
#[cfg(test)]
#[derive(Clone, Default)]
pub(crate) struct SharedBuffer(std::rc::Rc<std::cell::RefCell<Vec<u8>>>);

#[cfg(test)]
impl SharedBuffer {
    pub(crate) fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }
}

#[cfg(test)]
impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn timestamp_is_sortable() {
        let ts = datetime!(2024-03-07 09:05:01 UTC);
        assert_eq!(format_timestamp(ts), "2024-03-07 09:05:01");
        assert_eq!(file_stamp(ts), "20240307_090501");
    }

    #[test]
    fn color_needs_terminal_permission_and_ansi_console() {
        assert!(color_enabled(true, true, || true));
        // console refused virtual-terminal mode
        assert!(!color_enabled(true, true, || false));

        let mut asked = false;
        assert!(!color_enabled(false, true, || {
            asked = true;
            true
        }));
        assert!(!color_enabled(true, false, || {
            asked = true;
            true
        }));
        assert!(!asked, "console mode is left alone when color is off anyway");
    }

    #[test]
    fn writes_plain_timestamped_lines_to_file_and_console() {
        let dir = tempfile::tempdir().unwrap();
        let console = SharedBuffer::default();
        let mut logger = SessionLogger::initialize(
            dir.path(),
            datetime!(2024-03-07 09:05:01 UTC),
            ConsoleSink::plain(console.clone()),
        );
        logger.info("Starting DISM");
        logger.warn("DISM exited with code 87");

        let path = logger.log_file().unwrap().to_path_buf();
        assert_eq!(
            path.file_name().unwrap().to_string_lossy(),
            "SystemRepair_20240307_090501.log"
        );
        drop(logger);

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with('['));
        assert!(lines[0].ends_with("[INFO] Starting DISM"));
        assert!(lines[1].ends_with("[WARNING] DISM exited with code 87"));
        // "[YYYY-MM-DD HH:MM:SS]" prefix
        assert_eq!(&lines[0][20..21], "]");

        assert_eq!(
            console.contents(),
            "Starting DISM\nDISM exited with code 87\n"
        );
    }

    #[test]
    fn creates_missing_log_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        let logger = SessionLogger::initialize(
            &nested,
            datetime!(2024-03-07 09:05:01 UTC),
            ConsoleSink::plain(io::sink()),
        );
        assert!(nested.is_dir());
        assert!(logger.log_file().unwrap().starts_with(&nested));
    }

    #[test]
    fn degrades_to_console_when_directory_cannot_be_created() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, b"occupied").unwrap();

        let console = SharedBuffer::default();
        let mut logger = SessionLogger::initialize(
            &blocker.join("logs"),
            datetime!(2024-03-07 09:05:01 UTC),
            ConsoleSink::plain(console.clone()),
        );
        assert!(logger.log_file().is_none());
        logger.info("still visible");

        let out = console.contents();
        assert!(out.contains("console output only"));
        assert!(out.contains("still visible"));
    }

    #[test]
    fn sessions_at_different_seconds_get_separate_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut first = SessionLogger::initialize(
            dir.path(),
            datetime!(2024-03-07 09:05:01 UTC),
            ConsoleSink::plain(io::sink()),
        );
        let mut second = SessionLogger::initialize(
            dir.path(),
            datetime!(2024-03-07 09:05:02 UTC),
            ConsoleSink::plain(io::sink()),
        );
        first.info("from first");
        second.info("from second");

        let a = first.log_file().unwrap().to_path_buf();
        let b = second.log_file().unwrap().to_path_buf();
        assert_ne!(a, b);
        drop(first);
        drop(second);

        let a_text = fs::read_to_string(a).unwrap();
        let b_text = fs::read_to_string(b).unwrap();
        assert!(a_text.contains("from first") && !a_text.contains("from second"));
        assert!(b_text.contains("from second") && !b_text.contains("from first"));
    }

    #[test]
    fn same_second_never_reuses_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let ts = datetime!(2024-03-07 09:05:01 UTC);
        let first = SessionLogger::initialize(dir.path(), ts, ConsoleSink::plain(io::sink()));
        let second = SessionLogger::initialize(dir.path(), ts, ConsoleSink::plain(io::sink()));
        assert_eq!(
            second.log_file().unwrap().file_name().unwrap().to_string_lossy(),
            "SystemRepair_20240307_090501_1.log"
        );
        assert_ne!(first.log_file(), second.log_file());
    }

    #[test]
    fn unused_path_skips_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        let taken = dir.path().join("DISM_20240307_090501.log");
        fs::write(&taken, b"").unwrap();
        let next = unused_path(dir.path(), "DISM", "20240307_090501", "log");
        assert_eq!(next, dir.path().join("DISM_20240307_090501_1.log"));
    }
}
