use serde::Deserialize;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    /// Append to `slotgrid.log` in this directory instead of stderr.
    pub directory: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
        }
    }
}

static INITIALIZED: OnceLock<()> = OnceLock::new();

const LOG_FILE: &str = "slotgrid.log";
const HEADER_LINE: &str = "-------------------------------------------------------------------------------";
const HEADER_TITLE: &str = "slotgrid - container view synchronization";

const WEEKDAYS: [&str; 7] = ["Thu", "Fri", "Sat", "Sun", "Mon", "Tue", "Wed"];
const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

pub fn init(config: &LogConfig) -> Result<(), String> {
    if INITIALIZED.get().is_some() {
        return Ok(());
    }
    let filter = EnvFilter::try_new(&config.level)
        .map_err(|err| format!("invalid log level '{}': {}", config.level, err))?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let installed = match config.directory.as_ref() {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .map_err(|err| format!("log directory create failed: {}", err))?;
            let file = open_log(&dir.join(LOG_FILE))?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        None => builder.with_writer(std::io::stderr).try_init(),
    };
    // Another subscriber (e.g. a test harness) may already own the global slot.
    if installed.is_err() {
        tracing::debug!("global tracing subscriber already installed");
    }
    let _ = INITIALIZED.set(());
    Ok(())
}

fn open_log(path: &std::path::Path) -> Result<File, String> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|err| format!("open log {} failed: {}", path.display(), err))?;
    if file.metadata().map(|m| m.len()).unwrap_or(0) == 0 {
        write_header(&mut file)?;
    }
    Ok(file)
}

fn write_header(file: &mut File) -> Result<(), String> {
    let timestamp = format_header_timestamp(unix_timestamp());
    writeln!(file, "{HEADER_LINE}")
        .and_then(|_| writeln!(file, "{HEADER_TITLE}"))
        .and_then(|_| writeln!(file, "{LOG_FILE} - started {timestamp}"))
        .map_err(|err| format!("header write failed: {}", err))
}

fn format_header_timestamp(ts: i64) -> String {
    let datetime = breakdown_timestamp(ts);
    let weekday = WEEKDAYS[(datetime.weekday as usize).min(6)];
    let month = MONTHS[(datetime.month as usize).saturating_sub(1).min(11)];
    format!(
        "{weekday} {month} {:>2} {:02}:{:02}:{:02} {}",
        datetime.day, datetime.hour, datetime.minute, datetime.second, datetime.year
    )
}

fn unix_timestamp() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

struct DateTimeParts {
    year: i32,
    month: u32,
    day: u32,
    hour: u32,
    minute: u32,
    second: u32,
    weekday: u32,
}

fn breakdown_timestamp(ts: i64) -> DateTimeParts {
    let secs = ts.max(0);
    let days = secs / 86_400;
    let seconds_of_day = (secs % 86_400) as u32;
    let (year, month, day) = civil_from_days(days);
    DateTimeParts {
        year,
        month,
        day,
        hour: seconds_of_day / 3_600,
        minute: (seconds_of_day % 3_600) / 60,
        second: seconds_of_day % 60,
        weekday: (days % 7) as u32,
    }
}

// Howard Hinnant's days-to-civil conversion.
fn civil_from_days(days: i64) -> (i32, u32, u32) {
    let z = days + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1_460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = (if mp < 10 { mp + 3 } else { mp - 9 }) as u32;
    let year = (yoe + era * 400 + if month <= 2 { 1 } else { 0 }) as i32;
    (year, month, day)
}
