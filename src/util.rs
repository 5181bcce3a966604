use std::fs;
use std::path::Path;

use url::Url;

use crate::error::ConfigError;

/// Sources used when no URL file is given.
pub const DEFAULT_SOURCES: [&str; 3] = [
    "https://speed.hetzner.de/1GB.bin",
    "https://proof.ovh.net/files/1Gb.dat",
    "https://download.samplelib.com/mp4/sample-30s.mp4",
];

pub fn load_sources(path: Option<&Path>) -> Result<Vec<Url>, ConfigError> {
    let Some(path) = path else {
        return DEFAULT_SOURCES
            .iter()
            .enumerate()
            .map(|(idx, raw)| parse_source(idx + 1, raw))
            .collect();
    };

    let text = fs::read_to_string(path).map_err(|source| ConfigError::SourceFile {
        path: path.to_path_buf(),
        source,
    })?;
    let urls = parse_source_list(&text)?;
    if urls.is_empty() {
        return Err(ConfigError::EmptySourceFile(path.to_path_buf()));
    }
    Ok(urls)
}

/// One URL per line; blank lines and `#` comments are skipped.
pub fn parse_source_list(text: &str) -> Result<Vec<Url>, ConfigError> {
    text.lines()
        .enumerate()
        .map(|(idx, line)| (idx + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
        .map(|(line_no, line)| parse_source(line_no, line))
        .collect()
}

fn parse_source(line: usize, raw: &str) -> Result<Url, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidSource {
        line,
        url: raw.to_string(),
        reason,
    };
    let parsed = Url::parse(raw).map_err(|err| invalid(err.to_string()))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(invalid(format!("unsupported scheme {}", parsed.scheme())));
    }
    Ok(parsed)
}

/// Binary-scaled size with two decimals, e.g. `1.50 MB`.
pub fn format_bytes(value: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut val = value as f64;
    let mut unit = 0usize;
    while val >= 1024.0 && unit < UNITS.len() - 1 {
        val /= 1024.0;
        unit += 1;
    }
    format!("{val:.2} {}", UNITS[unit])
}
