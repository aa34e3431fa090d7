use std::{
    fmt::Display,
    io::{self, Write},
};

use tracing::warn;

/// Human readable run output.
///
/// Write failures do not interrupt the run; the first one is kept and
/// handed back by [`Report::finish`].
pub struct Report<W: Write> {
    out: W,
    failures: usize,
    write_error: Option<io::Error>,
}

impl<W: Write> Report<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            failures: 0,
            write_error: None,
        }
    }

    pub fn line(&mut self, text: impl AsRef<str>) {
        if self.write_error.is_some() {
            return;
        }
        if let Err(e) = writeln!(self.out, "{}", text.as_ref()) {
            warn!("unable to write report: {e}");
            self.write_error = Some(e);
        }
    }

    pub fn blank(&mut self) {
        self.line("");
    }

    pub fn failure(&mut self, err: impl Display) {
        self.failures += 1;
        self.line(format!("{err}\n"));
    }

    pub fn failures(&self) -> usize {
        self.failures
    }

    pub fn finish(mut self) -> io::Result<W> {
        if let Some(e) = self.write_error.take() {
            return Err(e);
        }
        self.out.flush()?;
        Ok(self.out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_report_lines_and_failures() {
        let mut report = Report::new(Vec::new());
        report.line("Project is: demo");
        report.failure("Error running Traceroute: boom");
        assert_eq!(report.failures(), 1);

        let out = String::from_utf8(report.finish().unwrap()).unwrap();
        assert_eq!(out, "Project is: demo\nError running Traceroute: boom\n\n");
    }

    #[test]
    fn test_first_write_error_is_returned() {
        let mut report = Report::new(BrokenPipe);
        report.line("lost");
        report.line("also lost");
        let err = report.finish().err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }
}
