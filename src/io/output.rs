//! Log formatting and report output.

use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::Write;
use std::time::{SystemTime, UNIX_EPOCH};

use color_eyre::eyre::{Result, WrapErr};
use tracing_subscriber::{
    fmt::format::Writer, fmt::layer, fmt::time::FormatTime, layer::SubscriberExt,
    util::SubscriberInitExt, Registry,
};

use crate::io::store::EntryId;

/// Time-of-day formatter with seconds precision, keeping log lines short.
struct WallClockSeconds;

impl FormatTime for WallClockSeconds {
    fn format_time(&self, w: &mut Writer<'_>) -> fmt::Result {
        let since_epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        let hours = (since_epoch / 3600) % 24;
        let minutes = (since_epoch / 60) % 60;
        let seconds = since_epoch % 60;
        write!(w, "{:02}:{:02}:{:02}", hours, minutes, seconds)
    }
}

/// Route tracing output to a log file when one is given, to stdout
/// otherwise. Call once at process start.
pub fn setup_logging(log_file: Option<&str>) -> Result<()> {
    match log_file {
        Some(path) => {
            let log = File::create(path)
                .wrap_err_with(|| format!("cannot create log file: {}", path))?;
            let file_layer = layer()
                .with_writer(log)
                .with_timer(WallClockSeconds)
                .with_ansi(false);
            Registry::default().with(file_layer).init();
        }
        None => {
            let stdout_layer = layer()
                .with_writer(std::io::stdout)
                .with_timer(WallClockSeconds)
                .with_ansi(true);
            Registry::default().with(stdout_layer).init();
        }
    }
    Ok(())
}

/// Write the population summary and the duplicate report to a writer.
pub fn write_population_report<W: Write, P: fmt::Display>(
    writer: &mut W,
    population: &P,
    duplicates: &BTreeMap<EntryId, Vec<EntryId>>,
) -> Result<()> {
    writeln!(writer, "{}", population)?;
    if duplicates.is_empty() {
        writeln!(writer, " No duplicates below the distance threshold")?;
    } else {
        writeln!(writer, " Duplicates:")?;
        for (representative, equivalents) in duplicates {
            let listed: Vec<String> = equivalents.iter().map(|id| id.to_string()).collect();
            writeln!(
                writer,
                "   entry {} repeats as {}",
                representative,
                listed.join(", ")
            )?;
        }
    }
    Ok(())
}
