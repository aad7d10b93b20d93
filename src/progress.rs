use std::time::Duration;

use crate::models::TransferProgress;

const KIB: f64 = 1024.0;
const MIB: f64 = 1024.0 * 1024.0;

/// Percentage in `[0, 100]`; an empty transfer reports `0`.
pub fn percentage(transferred: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (100.0 * transferred as f64 / total as f64).clamp(0.0, 100.0)
}

/// Bytes per second averaged over `elapsed`.
pub fn throughput(transferred: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        transferred as f64 / secs
    } else {
        0.0
    }
}

/// Seconds left at the given throughput; `None` without throughput or once done.
pub fn eta(transferred: u64, total: u64, throughput: f64) -> Option<u64> {
    if throughput <= 0.0 || transferred >= total {
        return None;
    }
    Some(((total - transferred) as f64 / throughput) as u64)
}

pub fn snapshot(transferred: u64, total: u64, elapsed: Duration) -> TransferProgress {
    let speed = throughput(transferred, elapsed);
    TransferProgress {
        bytes_transferred: transferred,
        total_bytes: total,
        speed_bps: speed,
        percentage: percentage(transferred, total),
        eta_seconds: eta(transferred, total, speed),
    }
}

pub fn format_bytes(bytes: u64) -> String {
    let b = bytes as f64;
    if b >= MIB {
        format!("{:.2} MB", b / MIB)
    } else if b >= KIB {
        format!("{:.2} KB", b / KIB)
    } else {
        format!("{bytes} B")
    }
}

pub fn format_speed(bytes_per_second: f64) -> String {
    if bytes_per_second >= MIB {
        format!("{:.2} MB/s", bytes_per_second / MIB)
    } else {
        format!("{:.2} KB/s", bytes_per_second / KIB)
    }
}

pub fn format_eta(seconds: u64) -> String {
    match seconds {
        s if s < 60 => format!("{s}s"),
        s if s < 3600 => format!("{}m {}s", s / 60, s % 60),
        s => format!("{}h {}m", s / 3600, (s % 3600) / 60),
    }
}
