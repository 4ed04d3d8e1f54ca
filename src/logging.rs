//! Console + file logging
//!
//! Records look like `2024-05-01 12:00:00 - [INFO] - message` and go to stderr and,
//! unless disabled, are appended to the configured log file.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};

use chrono::Local;
use env_logger::{Builder, Env, Target};

use crate::config::LogConfig;
use crate::errors::Result;

/// Writes every record to stderr and an optional file
struct TeeWriter {
    file: Option<File>,
}

impl Write for TeeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stderr().write_all(buf)?;
        if let Some(file) = self.file.as_mut() {
            file.write_all(buf)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()?;
        if let Some(file) = self.file.as_mut() {
            file.flush()?;
        }
        Ok(())
    }
}

fn open_log_file(path: &str) -> Result<Option<File>> {
    if path.trim().is_empty() {
        return Ok(None);
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    Ok(Some(file))
}

/// Install the global logger. `RUST_LOG` takes precedence over `config.level`.
///
/// Calling it again once a logger is installed is a no-op.
pub fn init_logging(config: &LogConfig) -> Result<()> {
    let file = open_log_file(&config.file)?;

    let _ = Builder::from_env(Env::default().default_filter_or(config.level.as_str()))
        .format(|buf, record| {
            writeln!(
                buf,
                "{} - [{}] - {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .target(Target::Pipe(Box::new(TeeWriter { file })))
        .try_init();

    Ok(())
}
