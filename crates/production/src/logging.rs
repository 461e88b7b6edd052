//! Console and file logging.
//!
//! Every event goes to stdout and to a per-run file
//! `<program>-console-output-YYYYMMDD-HHMMSS.log`. File output is produced
//! into a [`Channel`] and written by a background task one drained batch at
//! a time, so a burst of events costs one write.

use crate::config::LoggingConfig;
use anyhow::Context;
use capclaim_core::Channel;
use std::io::{self, Write};
use std::path::Path;
use std::time::SystemTime;
use tokio::task::JoinHandle;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::{self, MakeWriter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Log file name for a run of `program` started at `started` (UTC).
pub fn log_file_name(program: &str, started: SystemTime) -> String {
    // "2023-11-14T22:13:20Z" -> "20231114-221320"
    let stamp: String = humantime::format_rfc3339_seconds(started)
        .to_string()
        .chars()
        .filter_map(|c| match c {
            '-' | ':' | 'Z' => None,
            'T' => Some('-'),
            c => Some(c),
        })
        .collect();
    format!("{program}-console-output-{stamp}.log")
}

/// `io::Write` handle that produces each write into the log channel.
#[derive(Clone)]
pub struct ChannelWriter {
    channel: Channel<Vec<u8>>,
}

impl Write for ChannelWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.channel
            .produce(buf.to_vec())
            .map_err(|e| io::Error::new(io::ErrorKind::BrokenPipe, e))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for ChannelWriter {
    type Writer = ChannelWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Keeps the file writer alive. Dropping it closes the channel; call
/// [`LogGuard::flush`] to wait for buffered output to reach the file.
pub struct LogGuard {
    channel: Channel<Vec<u8>>,
    task: Option<JoinHandle<()>>,
}

impl LogGuard {
    /// Open `dir/file_name` and start the background writer.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn open(dir: &Path, file_name: &str) -> anyhow::Result<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create log directory {}", dir.display()))?;
        let mut appender = RollingFileAppender::builder()
            .rotation(Rotation::NEVER)
            .filename_prefix(file_name)
            .build(dir)
            .context("failed to open log file")?;

        let channel = Channel::<Vec<u8>>::new();
        let task = tokio::spawn({
            let channel = channel.clone();
            async move {
                channel
                    .run_consume_batch_forever(|batch| {
                        let bytes = batch.concat();
                        if let Err(e) = appender.write_all(&bytes).and_then(|_| appender.flush()) {
                            eprintln!("log file write failed: {e}");
                        }
                        async {}
                    })
                    .await;
            }
        });

        Ok(Self {
            channel,
            task: Some(task),
        })
    }

    /// A writer feeding this guard's file.
    pub fn writer(&self) -> ChannelWriter {
        ChannelWriter {
            channel: self.channel.clone(),
        }
    }

    /// Close the channel and wait until everything buffered is written.
    pub async fn flush(mut self) {
        self.channel.close();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for LogGuard {
    fn drop(&mut self) {
        self.channel.close();
    }
}

/// Install the global subscriber: stdout plus the per-run log file.
///
/// `RUST_LOG` takes precedence over the configured filter.
pub fn init(config: &LoggingConfig) -> anyhow::Result<LogGuard> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.filter))
        .with_context(|| format!("invalid log filter {:?}", config.filter))?;

    let file_name = log_file_name(&config.program, SystemTime::now());
    let guard = LogGuard::open(&config.directory, &file_name)?;

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(fmt::layer().with_writer(guard.writer()).with_ansi(false))
        .try_init()
        .context("logging already initialized")?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_log_file_name() {
        let started = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        assert_eq!(
            log_file_name("capclaim", started),
            "capclaim-console-output-20231114-221320.log"
        );
    }

    #[tokio::test]
    async fn test_writes_reach_file_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let guard = LogGuard::open(dir.path(), "run.log").unwrap();

        let mut writer = guard.writer();
        writer.write_all(b"first\n").unwrap();
        guard.writer().write_all(b"second\n").unwrap();
        guard.flush().await;

        let written = std::fs::read_to_string(dir.path().join("run.log")).unwrap();
        assert_eq!(written, "first\nsecond\n");

        // Channel closed with the guard.
        assert!(writer.write_all(b"late\n").is_err());
    }
}
