use std::io::{self, Write};

pub fn write_stdout_text(text: &str) -> io::Result<()> {
    write_text(&mut io::stdout().lock(), text, false)
}

pub fn write_stdout_line(text: &str) -> io::Result<()> {
    write_text(&mut io::stdout().lock(), text, true)
}

/// Writes and flushes, treating a closed reader (`pocketbook ... | head`) as success.
fn write_text(writer: &mut dyn Write, text: &str, newline: bool) -> io::Result<()> {
    let written = writer.write_all(text.as_bytes()).and_then(|()| {
        if newline {
            writer.write_all(b"\n")
        } else {
            Ok(())
        }
    });
    ignore_broken_pipe(written.and_then(|()| writer.flush()))
}

fn ignore_broken_pipe(result: io::Result<()>) -> io::Result<()> {
    match result {
        Err(error) if error.kind() == io::ErrorKind::BrokenPipe => Ok(()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use std::io::{self, Write};

    use super::write_text;

    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn line_mode_appends_newline() {
        let mut buffer = Vec::new();
        assert!(write_text(&mut buffer, "done", true).is_ok());
        assert_eq!(buffer, b"done\n");
    }

    #[test]
    fn closed_reader_is_not_an_error() {
        assert!(write_text(&mut ClosedPipe, "rows", true).is_ok());
    }
}
