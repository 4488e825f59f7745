use std::{
    fs::{File, OpenOptions},
    io::{self, BufRead, BufReader, Write},
    path::PathBuf,
    sync::Arc,
};

use parking_lot::Mutex;

/// Strips ANSI escape sequences so the log file stays plain text.
pub fn strip_ansi_escapes(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut in_escape = false;
    for c in s.chars() {
        if c == '\x1b' {
            in_escape = true;
        } else if in_escape {
            if c.is_ascii_alphabetic() {
                in_escape = false;
            }
        } else {
            result.push(c);
        }
    }
    result
}

/// Append-only log file that keeps at most `max_lines` lines.
///
/// The line count is tracked in memory; the file is only rewritten once it has grown
/// 10% (at least 50 lines) past the limit.
#[derive(Clone)]
pub(crate) struct BoundedFileWriter {
    path: PathBuf,
    max_lines: usize,
    lines: Arc<Mutex<usize>>,
}

impl BoundedFileWriter {
    pub fn new(path: impl Into<PathBuf>, max_lines: usize) -> Self {
        let path = path.into();
        let existing = File::open(&path)
            .map(|f| BufReader::new(f).lines().count())
            .unwrap_or(0);
        Self {
            path,
            max_lines: max_lines.max(1),
            lines: Arc::new(Mutex::new(existing)),
        }
    }

    fn slack(&self) -> usize {
        (self.max_lines / 10).max(50)
    }

    fn truncate_head(&self) -> io::Result<usize> {
        let reader = BufReader::new(File::open(&self.path)?);
        let lines: Vec<String> = reader.lines().collect::<Result<_, _>>()?;
        if lines.len() <= self.max_lines {
            return Ok(lines.len());
        }
        let keep = &lines[lines.len() - self.max_lines..];
        let mut file = File::create(&self.path)?;
        for line in keep {
            writeln!(file, "{}", line)?;
        }
        Ok(keep.len())
    }
}

impl io::Write for BoundedFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut lines = self.lines.lock();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(buf)?;

        *lines += buf.iter().filter(|&&b| b == b'\n').count();
        if *lines > self.max_lines + self.slack() {
            match self.truncate_head() {
                Ok(n) => *lines = n,
                Err(e) => eprintln!("Failed to prune log file: {}", e),
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for BoundedFileWriter {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_ansi() {
        assert_eq!(strip_ansi_escapes("\x1b[32mINFO\x1b[0m ok"), "INFO ok");
    }

    #[test]
    fn test_file_is_pruned_to_max_lines() {
        let path = std::env::temp_dir().join(format!("watchparty-log-{}.log", uuid::Uuid::new_v4()));
        let mut writer = BoundedFileWriter::new(&path, 10);
        for i in 0..100 {
            writer.write_all(format!("line {}\n", i).as_bytes()).unwrap();
        }
        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert!(lines.len() <= 10 + 50);
        assert_eq!(lines.last(), Some(&"line 99"));
        let _ = std::fs::remove_file(&path);
    }
}
