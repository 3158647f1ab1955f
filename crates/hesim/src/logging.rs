use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// A log file past this size is trimmed when logging starts
const MAX_LOG_BYTES: u64 = 5 * 1024 * 1024;
/// Most recent bytes kept by a trim
const KEEP_BYTES: u64 = 1024 * 1024;

/// Cut an oversized log down to its most recent whole lines
fn trim_log(path: &Path) -> io::Result<()> {
    let len = match fs::metadata(path) {
        Ok(metadata) => metadata.len(),
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };
    if len <= MAX_LOG_BYTES {
        return Ok(());
    }

    let mut tail = Vec::with_capacity(KEEP_BYTES as usize);
    let mut file = File::open(path)?;
    file.seek(SeekFrom::Start(len - KEEP_BYTES))?;
    file.read_to_end(&mut tail)?;

    let first_line = tail.iter().position(|&b| b == b'\n').map_or(0, |i| i + 1);
    let mut file = File::create(path)?;
    writeln!(file, "--- log trimmed to its last {} KB ---", KEEP_BYTES / 1024)?;
    file.write_all(&tail[first_line..])
}

fn open_log(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    if let Err(e) = trim_log(path) {
        eprintln!("Warning: could not trim log file {}: {e}", path.display());
    }
    OpenOptions::new().create(true).append(true).open(path)
}

/// Initialize logging.
///
/// Events go to stderr so reports on stdout stay clean, or are appended to
/// `log_file` when one is given. A log file over 5MB is first trimmed to its
/// last 1MB. `RUST_LOG` overrides `level`.
pub fn init_logging(log_file: Option<&Path>, level: &str) -> color_eyre::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("hesim={level},hesim_core={level}")));

    let writer = match log_file {
        Some(path) => BoxMakeWriter::new(Mutex::new(open_log(path)?)),
        None => BoxMakeWriter::new(io::stderr),
    };
    let to_file = log_file.is_some();

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(writer)
                .with_ansi(!to_file)
                .with_target(to_file)
                .with_thread_ids(to_file),
        )
        .init();

    if let Some(path) = log_file {
        tracing::info!(log_path = %path.display(), "hesim logging initialized");
    }
    Ok(())
}
