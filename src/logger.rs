use std::fs::File;

use anyhow::Context;
use time::{format_description, OffsetDateTime};
use tracing::{subscriber::set_global_default, Level};
use tracing_subscriber::{fmt::writer::BoxMakeWriter, FmtSubscriber};

/// Install a global subscriber writing every event to `<timestamp>_log.txt`.
///
/// # Errors
/// If the log file cannot be created or a global subscriber is already set.
pub fn init_logger() -> anyhow::Result<()> {
    let file_name = format!("{}_log.txt", timestamp()?);
    let file = File::create(&file_name).with_context(|| format!("cannot create {file_name}"))?;
    let writer = BoxMakeWriter::new(file);
    let local_offset = time::UtcOffset::current_local_offset().unwrap_or(time::UtcOffset::UTC);
    let timer = tracing_subscriber::fmt::time::OffsetTime::new(
        local_offset,
        format_description::parse("[year]-[month]-[day] [hour]:[minute]:[second]")?,
    );

    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::TRACE)
        .with_ansi(false)
        .with_thread_names(true)
        .with_timer(timer)
        .with_writer(writer)
        .finish();

    set_global_default(subscriber).context(
        "could not set global default tracing subscriber, disable logs if you already set one",
    )
}

/// Local time (UTC if the offset is unknown) as `YYYY_MM_DD_hh_mm_ss`, used to name output files.
pub fn timestamp() -> anyhow::Result<String> {
    let format =
        format_description::parse("[year]_[month]_[day]_[hour]_[minute]_[second]")?;
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    Ok(now.format(&format)?)
}
