//! Read-only host resource snapshot from `/proc`.
//!
//! CPU usage comes from two samples of `/proc/stat` taken an interval apart.
//! Per-process figures use the same interval over `/proc/[pid]/stat`, so a
//! process at 100% of one core on a four-core host shows 25%.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::fs;
use std::io;
use std::thread;
use std::time::Duration;

use nix::unistd::{SysconfVar, sysconf};
use tracing::{debug, instrument};

const FALLBACK_PAGE_SIZE: u64 = 4096;
const NAME_WIDTH: usize = 24;

/// Aggregate CPU time counters, in clock ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CpuTimes {
    pub total: u64,
    pub idle: u64,
}

impl CpuTimes {
    /// Busy percentage between `earlier` and `self`.
    #[must_use]
    pub fn usage_since(&self, earlier: &CpuTimes) -> f64 {
        let total = self.total.saturating_sub(earlier.total);
        let idle = self.idle.saturating_sub(earlier.idle);
        if total == 0 {
            return 0.0;
        }
        (total.saturating_sub(idle)) as f64 * 100.0 / total as f64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryInfo {
    pub total_kib: u64,
    pub available_kib: u64,
}

impl MemoryInfo {
    #[must_use]
    pub fn used_kib(&self) -> u64 {
        self.total_kib.saturating_sub(self.available_kib)
    }

    #[must_use]
    pub fn percent(&self) -> f64 {
        if self.total_kib == 0 {
            return 0.0;
        }
        self.used_kib() as f64 * 100.0 / self.total_kib as f64
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProcessUsage {
    pub pid: u32,
    pub name: String,
    pub cpu_percent: f64,
    pub memory_percent: f64,
}

/// Host CPU, memory and the busiest processes at one point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceSnapshot {
    pub cpu_percent: f64,
    pub memory: MemoryInfo,
    pub processes: Vec<ProcessUsage>,
}

impl ResourceSnapshot {
    /// Renders the snapshot as the `monitor` command prints it.
    #[must_use]
    pub fn render(&self) -> String {
        let mut text = String::new();
        let _ = writeln!(
            text,
            "CPU: {:.1}%  |  Memory: {:.1}% ({}MB / {}MB)",
            self.cpu_percent,
            self.memory.percent(),
            self.memory.used_kib() / 1024,
            self.memory.total_kib / 1024,
        );
        let _ = writeln!(text, "\nTop processes (by CPU%):");
        let _ = writeln!(text, "{:<6} {:<25} {:>6} {:>7}", "PID", "NAME", "CPU%", "MEM%");
        for process in &self.processes {
            let name: String = process.name.chars().take(NAME_WIDTH).collect();
            let _ = writeln!(
                text,
                "{:<6} {:<25} {:>6.1} {:>7.2}",
                process.pid, name, process.cpu_percent, process.memory_percent
            );
        }
        text
    }
}

/// Samples the host twice, `interval` apart, and keeps the `top` busiest
/// processes.
///
/// # Errors
///
/// Returns an error when `/proc/stat` or `/proc/meminfo` cannot be read or
/// parsed. Processes that vanish between samples are skipped.
#[instrument(level = "debug")]
pub fn snapshot(interval: Duration, top: usize) -> io::Result<ResourceSnapshot> {
    let cpu_before = read_cpu_times()?;
    let procs_before = read_process_ticks();
    thread::sleep(interval);
    let cpu_after = read_cpu_times()?;
    let procs_after = read_process_ticks();

    let memory = parse_meminfo(&fs::read_to_string("/proc/meminfo")?)
        .ok_or_else(|| invalid_data("/proc/meminfo"))?;
    let elapsed = cpu_after.total.saturating_sub(cpu_before.total);
    let page_size = page_size();

    let mut processes: Vec<ProcessUsage> = procs_after
        .into_iter()
        .map(|(pid, (name, ticks))| {
            let before = procs_before.get(&pid).map_or(ticks, |(_, t)| *t);
            let cpu_percent = if elapsed == 0 {
                0.0
            } else {
                ticks.saturating_sub(before) as f64 * 100.0 / elapsed as f64
            };
            let rss = fs::read_to_string(format!("/proc/{pid}/statm"))
                .ok()
                .and_then(|statm| parse_statm_resident(&statm))
                .unwrap_or(0);
            let memory_percent = if memory.total_kib == 0 {
                0.0
            } else {
                (rss * page_size) as f64 * 100.0 / (memory.total_kib * 1024) as f64
            };
            ProcessUsage {
                pid,
                name,
                cpu_percent,
                memory_percent,
            }
        })
        .collect();

    processes.sort_by(|a, b| {
        b.cpu_percent
            .total_cmp(&a.cpu_percent)
            .then_with(|| a.pid.cmp(&b.pid))
    });
    processes.truncate(top);

    let snapshot = ResourceSnapshot {
        cpu_percent: cpu_after.usage_since(&cpu_before),
        memory,
        processes,
    };
    debug!(cpu = snapshot.cpu_percent, "Sampled host resources");
    Ok(snapshot)
}

fn read_cpu_times() -> io::Result<CpuTimes> {
    parse_cpu_times(&fs::read_to_string("/proc/stat")?).ok_or_else(|| invalid_data("/proc/stat"))
}

/// Name and cumulative CPU ticks of every readable process.
fn read_process_ticks() -> HashMap<u32, (String, u64)> {
    let Ok(entries) = fs::read_dir("/proc") else {
        return HashMap::new();
    };
    entries
        .filter_map(Result::ok)
        .filter_map(|entry| entry.file_name().to_str()?.parse::<u32>().ok())
        .filter_map(|pid| {
            let stat = fs::read_to_string(format!("/proc/{pid}/stat")).ok()?;
            Some((pid, parse_process_stat(&stat)?))
        })
        .collect()
}

fn page_size() -> u64 {
    match sysconf(SysconfVar::PAGE_SIZE) {
        Ok(Some(size)) => u64::try_from(size).unwrap_or(FALLBACK_PAGE_SIZE),
        _ => FALLBACK_PAGE_SIZE,
    }
}

fn invalid_data(source: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, format!("unexpected format in {source}"))
}

/// Parses the aggregate `cpu` line of `/proc/stat`.
///
/// Idle time includes iowait; guest time is already part of user time and
/// is not added again.
pub fn parse_cpu_times(stat: &str) -> Option<CpuTimes> {
    let line = stat.lines().find(|l| l.starts_with("cpu "))?;
    let values: Vec<u64> = line
        .split_whitespace()
        .skip(1)
        .take(8)
        .map(str::parse::<u64>)
        .collect::<Result<_, _>>()
        .ok()?;
    if values.len() < 4 {
        return None;
    }
    let idle = values[3] + values.get(4).copied().unwrap_or(0);
    Some(CpuTimes {
        total: values.iter().sum(),
        idle,
    })
}

/// Parses `MemTotal` and `MemAvailable` from `/proc/meminfo`.
pub fn parse_meminfo(meminfo: &str) -> Option<MemoryInfo> {
    let field = |name: &str| {
        meminfo
            .lines()
            .find_map(|l| l.strip_prefix(name))
            .and_then(|rest| rest.trim_start_matches(':').split_whitespace().next())
            .and_then(|v| v.parse::<u64>().ok())
    };
    Some(MemoryInfo {
        total_kib: field("MemTotal")?,
        available_kib: field("MemAvailable")?,
    })
}

/// Parses the command name and utime+stime from `/proc/[pid]/stat`.
///
/// The name is wrapped in parentheses and may itself contain spaces or
/// parentheses, so fields are counted from the last `)`.
pub fn parse_process_stat(stat: &str) -> Option<(String, u64)> {
    let open = stat.find('(')?;
    let close = stat.rfind(')')?;
    let name = stat.get(open + 1..close)?.to_string();
    let fields: Vec<&str> = stat.get(close + 1..)?.split_whitespace().collect();
    // fields[0] is the state (field 3); utime and stime are fields 14 and 15
    let utime: u64 = fields.get(11)?.parse().ok()?;
    let stime: u64 = fields.get(12)?.parse().ok()?;
    Some((name, utime + stime))
}

/// Resident set size in pages from `/proc/[pid]/statm`.
pub fn parse_statm_resident(statm: &str) -> Option<u64> {
    statm.split_whitespace().nth(1)?.parse().ok()
}
