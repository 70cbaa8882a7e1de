use std::fs;
use std::path::Path;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;

use super::{run_capture, Measurement, Pid};

/// Leading number plus optional unit, e.g. `812M`, `4096K+`, `1.2G`
static RE_MEM: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^([\d.]+)([KMGB]?)").unwrap());

/// Snapshot resident plus compressed/swapped memory for every process.
///
/// macOS `top` reports both columns directly; elsewhere `top` has no
/// compressed column, so procfs is read instead.
pub async fn sample_memory(timeout: Duration) -> Measurement {
    if cfg!(target_os = "linux") {
        let task = tokio::task::spawn_blocking(|| sample_procfs(Path::new("/proc")));
        match tokio::time::timeout(timeout, task).await {
            Ok(Ok(measurement)) => measurement,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "procfs sampler panicked");
                Measurement::new()
            }
            Err(_) => {
                tracing::warn!(?timeout, "procfs sampler timed out");
                Measurement::new()
            }
        }
    } else {
        let args = ["-l", "1", "-o", "mem", "-n", "9999", "-stats", "pid,mem,cmprs"];
        match run_capture("top", &args, timeout).await {
            Some(out) => parse_top_output(&out),
            None => Measurement::new(),
        }
    }
}

/// Parse `pid mem cmprs` rows; anything whose first field is not a pid is skipped
pub fn parse_top_output(output: &str) -> Measurement {
    let mut result = Measurement::new();

    for line in output.lines() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 3 {
            continue;
        }
        let Ok(pid) = parts[0].parse::<Pid>() else {
            continue;
        };
        if pid == 0 {
            continue;
        }
        result.insert(pid, parse_mem_value(parts[1]) + parse_mem_value(parts[2]));
    }

    result
}

/// Convert a `top` memory cell to megabytes. Unparseable cells count as zero.
pub fn parse_mem_value(raw: &str) -> f64 {
    let raw = raw.trim();
    if raw.is_empty() || raw == "-" {
        return 0.0;
    }

    let Some(caps) = RE_MEM.captures(raw) else {
        return 0.0;
    };
    let Ok(value) = caps[1].parse::<f64>() else {
        return 0.0;
    };

    match caps[2].to_ascii_uppercase().as_str() {
        "K" => value / 1024.0,
        "G" => value * 1024.0,
        "B" => value / (1024.0 * 1024.0),
        _ => value,
    }
}

fn sample_procfs(root: &Path) -> Measurement {
    let mut result = Measurement::new();

    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(root = %root.display(), error = %e, "cannot list procfs");
            return result;
        }
    };

    for entry in entries.flatten() {
        let Some(pid) = entry.file_name().to_str().and_then(|s| s.parse::<Pid>().ok()) else {
            continue;
        };
        // Processes can exit between listing and reading.
        let Ok(status) = fs::read_to_string(entry.path().join("status")) else {
            continue;
        };
        if let Some(mb) = parse_proc_status(&status) {
            result.insert(pid, mb);
        }
    }

    result
}

/// VmRSS + VmSwap in megabytes. Kernel threads carry neither and yield `None`.
fn parse_proc_status(content: &str) -> Option<f64> {
    let mut rss_kb: Option<u64> = None;
    let mut swap_kb: u64 = 0;

    for line in content.lines() {
        if let Some(rest) = line.strip_prefix("VmRSS:") {
            rss_kb = rest.split_whitespace().next().and_then(|v| v.parse().ok());
        } else if let Some(rest) = line.strip_prefix("VmSwap:") {
            swap_kb = rest
                .split_whitespace()
                .next()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0);
        }
    }

    rss_kb.map(|rss| (rss + swap_kb) as f64 / 1024.0)
}
