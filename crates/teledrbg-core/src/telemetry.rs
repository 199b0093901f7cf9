//! Telemetry Source boundary and the live system implementation.
//!
//! A snapshot always carries the full [`METRIC_KEYS`] set. Metrics the
//! platform cannot provide are present as `null`, never omitted, so the
//! serialized shape is identical on every machine:
//! - works without elevated privileges,
//! - reads only values observable from user space,
//! - treats only a wholly unreadable `/proc` as a failure.

use std::collections::BTreeMap;
use std::sync::{Arc, mpsc};
#[cfg(target_os = "linux")]
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::config::TelemetryConfig;
use crate::error::{Error, Result};

/// The fixed metric key set of every snapshot, in serialized (sorted) order.
pub const METRIC_KEYS: &[&str] = &[
    "battery_percent",
    "cpu_count",
    "cpu_freq_mhz",
    "cpu_load_pct",
    "cpu_temp_c",
    "disk_free",
    "disk_io_bytes",
    "disk_used",
    "gpu_temp_c",
    "load_avg_15m",
    "load_avg_1m",
    "load_avg_5m",
    "memory_available",
    "memory_used",
    "net_recv",
    "net_sent",
    "open_files",
    "power_plugged",
    "process_count",
    "process_fingerprint",
    "self_rss_bytes",
    "swap_used",
    "tcp_connections",
    "timestamp_ns",
    "uptime_secs",
];

/// A single scalar reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Sample {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
}

impl From<i64> for Sample {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<u64> for Sample {
    fn from(v: u64) -> Self {
        Self::Int(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<usize> for Sample {
    fn from(v: usize) -> Self {
        Self::from(v as u64)
    }
}

impl From<f64> for Sample {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for Sample {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<String> for Sample {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

/// Ordered mapping from metric name to an optional reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TelemetrySnapshot {
    metrics: BTreeMap<String, Option<Sample>>,
}

impl TelemetrySnapshot {
    /// A snapshot with every key in [`METRIC_KEYS`] set to `null`.
    pub fn new() -> Self {
        Self {
            metrics: METRIC_KEYS.iter().map(|k| (k.to_string(), None)).collect(),
        }
    }

    /// Record a reading. Non-finite floats are stored as `null`.
    pub fn set(&mut self, key: &str, value: impl Into<Sample>) {
        let value = match value.into() {
            Sample::Float(f) if !f.is_finite() => None,
            other => Some(other),
        };
        self.metrics.insert(key.to_string(), value);
    }

    /// Record a reading that may be unavailable.
    pub fn set_opt<V: Into<Sample>>(&mut self, key: &str, value: Option<V>) {
        match value {
            Some(v) => self.set(key, v),
            None => {
                self.metrics.insert(key.to_string(), None);
            }
        }
    }

    /// Reading for `key`; `None` when absent or `null`.
    pub fn get(&self, key: &str) -> Option<&Sample> {
        self.metrics.get(key).and_then(Option::as_ref)
    }

    /// Whether `key` is present in the map at all (including as `null`).
    pub fn contains_key(&self, key: &str) -> bool {
        self.metrics.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    /// Compact JSON with keys in lexicographic order.
    pub fn to_canonical_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.metrics)?)
    }
}

impl Default for TelemetrySnapshot {
    fn default() -> Self {
        Self::new()
    }
}

/// Anything that can report a snapshot of system counters.
pub trait TelemetrySource: Send + Sync {
    /// Read the full key set. Only a total platform failure is an error.
    fn sample(&self) -> Result<TelemetrySnapshot>;
}

impl<T: TelemetrySource + ?Sized> TelemetrySource for &T {
    fn sample(&self) -> Result<TelemetrySnapshot> {
        (**self).sample()
    }
}

impl<T: TelemetrySource + ?Sized> TelemetrySource for Arc<T> {
    fn sample(&self) -> Result<TelemetrySnapshot> {
        (**self).sample()
    }
}

impl<T: TelemetrySource + ?Sized> TelemetrySource for Box<T> {
    fn sample(&self) -> Result<TelemetrySnapshot> {
        (**self).sample()
    }
}

// ---------------------------------------------------------------------------
// Timeout wrapper
// ---------------------------------------------------------------------------

/// Bounds every query of an inner source with a timeout.
///
/// The query runs on a helper thread. If it does not answer in time the
/// caller gets [`Error::TelemetryTimeout`] and the helper is abandoned; its
/// late result is dropped.
pub struct BoundedTelemetry {
    inner: Arc<dyn TelemetrySource>,
    timeout: Duration,
}

impl BoundedTelemetry {
    pub fn new<T: TelemetrySource + 'static>(inner: T, timeout: Duration) -> Self {
        Self {
            inner: Arc::new(inner),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl TelemetrySource for BoundedTelemetry {
    fn sample(&self) -> Result<TelemetrySnapshot> {
        let inner = Arc::clone(&self.inner);
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            let _ = tx.send(inner.sample());
        });
        match rx.recv_timeout(self.timeout) {
            Ok(result) => result,
            Err(mpsc::RecvTimeoutError::Timeout) => Err(Error::TelemetryTimeout(self.timeout)),
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(Error::TelemetryUnavailable(
                "telemetry worker exited without a result".to_string(),
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Live system telemetry
// ---------------------------------------------------------------------------

/// Reads live OS counters.
#[derive(Debug, Clone, Default)]
pub struct SystemTelemetry {
    config: TelemetryConfig,
}

impl SystemTelemetry {
    pub fn new(config: TelemetryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TelemetryConfig {
        &self.config
    }
}

impl TelemetrySource for SystemTelemetry {
    fn sample(&self) -> Result<TelemetrySnapshot> {
        let mut snap = TelemetrySnapshot::new();

        #[cfg(target_os = "linux")]
        collect_linux(&self.config, &mut snap)?;

        snap.set(
            "cpu_count",
            std::thread::available_parallelism()
                .map(std::num::NonZero::get)
                .unwrap_or(1),
        );

        let (load1, load5, load15) = collect_loadavg();
        snap.set_opt("load_avg_1m", load1);
        snap.set_opt("load_avg_5m", load5);
        snap.set_opt("load_avg_15m", load15);

        if let Some((used, free)) = disk_usage("/") {
            snap.set("disk_used", used);
            snap.set("disk_free", free);
        }

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        snap.set("timestamp_ns", i64::try_from(now).unwrap_or(i64::MAX));

        Ok(snap)
    }
}

fn collect_loadavg() -> (Option<f64>, Option<f64>, Option<f64>) {
    #[cfg(unix)]
    {
        let mut values = [0.0_f64; 3];
        // SAFETY: `getloadavg` writes up to `n` doubles to a valid buffer.
        let n = unsafe { libc::getloadavg(values.as_mut_ptr(), 3) };
        if n <= 0 {
            (None, None, None)
        } else {
            (
                Some(values[0]),
                (n > 1).then_some(values[1]),
                (n > 2).then_some(values[2]),
            )
        }
    }
    #[cfg(not(unix))]
    {
        (None, None, None)
    }
}

/// `(used, free)` bytes of the filesystem holding `path`.
fn disk_usage(path: &str) -> Option<(u64, u64)> {
    #[cfg(unix)]
    {
        let c_path = std::ffi::CString::new(path).ok()?;
        // SAFETY: statvfs is plain old data; all-zero is a valid bit pattern.
        let mut st: libc::statvfs = unsafe { std::mem::zeroed() };
        // SAFETY: c_path is a valid NUL-terminated string and st is a valid
        // out-pointer for the duration of the call.
        let rc = unsafe { libc::statvfs(c_path.as_ptr(), &mut st) };
        if rc != 0 {
            return None;
        }
        let frsize = st.f_frsize as u64;
        let blocks = st.f_blocks as u64;
        let bfree = st.f_bfree as u64;
        let bavail = st.f_bavail as u64;
        Some((blocks.saturating_sub(bfree) * frsize, bavail * frsize))
    }
    #[cfg(not(unix))]
    {
        let _ = path;
        None
    }
}

#[cfg(target_os = "linux")]
fn read_trimmed(path: &Path) -> Option<String> {
    let raw = std::fs::read_to_string(path).ok()?;
    let v = raw.trim();
    if v.is_empty() {
        None
    } else {
        Some(v.to_string())
    }
}

#[cfg(target_os = "linux")]
fn collect_linux(config: &TelemetryConfig, snap: &mut TelemetrySnapshot) -> Result<()> {
    let before = read_cpu_times().ok_or_else(|| {
        Error::TelemetryUnavailable("cannot read /proc/stat".to_string())
    })?;
    std::thread::sleep(config.cpu_sample_interval());
    if let Some(after) = read_cpu_times() {
        snap.set("cpu_load_pct", cpu_load_pct(before, after));
    }

    snap.set_opt("cpu_temp_c", cpu_temperature());
    snap.set_opt("cpu_freq_mhz", cpu_frequency_mhz());

    collect_memory(snap);

    snap.set_opt("disk_io_bytes", disk_io_bytes());
    if let Some((recv, sent)) = net_bytes() {
        snap.set("net_recv", recv);
        snap.set("net_sent", sent);
    }
    snap.set_opt("tcp_connections", tcp_connections());

    if let Some((percent, plugged)) = battery() {
        snap.set("battery_percent", percent);
        snap.set_opt("power_plugged", plugged);
    }
    if config.gpu {
        snap.set_opt("gpu_temp_c", gpu_temperature());
    }

    snap.set_opt(
        "uptime_secs",
        std::fs::read_to_string("/proc/uptime").ok().and_then(|s| {
            s.split_whitespace()
                .next()
                .and_then(|v| v.parse::<f64>().ok())
        }),
    );

    let (count, fingerprint) = process_table(config.process_fingerprint);
    snap.set("process_count", count);
    snap.set_opt("process_fingerprint", fingerprint);

    snap.set_opt("self_rss_bytes", self_rss_bytes());
    snap.set_opt(
        "open_files",
        std::fs::read_dir("/proc/self/fd").ok().map(|d| d.count()),
    );
    Ok(())
}

/// `(idle, total)` jiffies from the aggregate `cpu` line.
#[cfg(target_os = "linux")]
fn read_cpu_times() -> Option<(u64, u64)> {
    let stat = std::fs::read_to_string("/proc/stat").ok()?;
    let line = stat.lines().next()?;
    if !line.starts_with("cpu ") {
        return None;
    }
    let fields: Vec<u64> = line
        .split_whitespace()
        .skip(1)
        .filter_map(|v| v.parse().ok())
        .collect();
    if fields.len() < 4 {
        return None;
    }
    // idle + iowait
    let idle = fields[3] + fields.get(4).copied().unwrap_or(0);
    Some((idle, fields.iter().sum()))
}

#[cfg(target_os = "linux")]
fn cpu_load_pct(before: (u64, u64), after: (u64, u64)) -> f64 {
    let idle = after.0.saturating_sub(before.0) as f64;
    let total = after.1.saturating_sub(before.1) as f64;
    if total <= 0.0 {
        return 0.0;
    }
    (100.0 * (1.0 - idle / total)).clamp(0.0, 100.0)
}

#[cfg(target_os = "linux")]
fn cpu_temperature() -> Option<f64> {
    let mut zones: Vec<_> = std::fs::read_dir("/sys/class/thermal")
        .ok()?
        .flatten()
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("thermal_zone"))
        })
        .collect();
    zones.sort();
    zones.iter().find_map(|dir| {
        read_trimmed(&dir.join("temp"))
            .and_then(|s| s.parse::<f64>().ok())
            .map(|milli| milli / 1000.0)
    })
}

#[cfg(target_os = "linux")]
fn cpu_frequency_mhz() -> Option<f64> {
    let cpufreq_paths = [
        "/sys/devices/system/cpu/cpu0/cpufreq/scaling_cur_freq",
        "/sys/devices/system/cpu/cpu0/cpufreq/cpuinfo_cur_freq",
    ];
    cpufreq_paths.iter().find_map(|path| {
        read_trimmed(Path::new(path))
            .and_then(|s| s.parse::<f64>().ok())
            .map(|khz| khz / 1000.0)
    })
}

#[cfg(target_os = "linux")]
fn collect_memory(snap: &mut TelemetrySnapshot) {
    let Ok(mem) = std::fs::read_to_string("/proc/meminfo") else {
        return;
    };
    let mut fields = std::collections::HashMap::new();
    for line in mem.lines() {
        let Some((key, rest)) = line.split_once(':') else {
            continue;
        };
        if let Some(kb) = rest
            .split_whitespace()
            .next()
            .and_then(|v| v.parse::<u64>().ok())
        {
            fields.insert(key, kb * 1024);
        }
    }
    let total = fields.get("MemTotal").copied();
    let available = fields.get("MemAvailable").copied();
    snap.set_opt("memory_available", available);
    snap.set_opt(
        "memory_used",
        total.zip(available).map(|(t, a)| t.saturating_sub(a)),
    );
    snap.set_opt(
        "swap_used",
        fields
            .get("SwapTotal")
            .zip(fields.get("SwapFree"))
            .map(|(t, f)| t.saturating_sub(*f)),
    );
}

/// Sectors read plus written across all block devices, in bytes.
#[cfg(target_os = "linux")]
fn disk_io_bytes() -> Option<u64> {
    let stats = std::fs::read_to_string("/proc/diskstats").ok()?;
    let sectors: u64 = stats
        .lines()
        .filter_map(|line| {
            let f: Vec<&str> = line.split_whitespace().collect();
            let read = f.get(5)?.parse::<u64>().ok()?;
            let written = f.get(9)?.parse::<u64>().ok()?;
            Some(read + written)
        })
        .sum();
    Some(sectors * 512)
}

/// `(received, sent)` bytes summed over all interfaces.
#[cfg(target_os = "linux")]
fn net_bytes() -> Option<(u64, u64)> {
    let dev = std::fs::read_to_string("/proc/net/dev").ok()?;
    let mut recv = 0u64;
    let mut sent = 0u64;
    for line in dev.lines().skip(2) {
        let Some((_, counters)) = line.split_once(':') else {
            continue;
        };
        let f: Vec<u64> = counters
            .split_whitespace()
            .filter_map(|v| v.parse().ok())
            .collect();
        if f.len() >= 9 {
            recv += f[0];
            sent += f[8];
        }
    }
    Some((recv, sent))
}

#[cfg(target_os = "linux")]
fn tcp_connections() -> Option<usize> {
    let mut any = false;
    let mut count = 0;
    for path in ["/proc/net/tcp", "/proc/net/tcp6"] {
        if let Ok(table) = std::fs::read_to_string(path) {
            any = true;
            count += table.lines().skip(1).filter(|l| !l.trim().is_empty()).count();
        }
    }
    any.then_some(count)
}

/// Battery charge and mains state. `None` when the machine has no battery.
#[cfg(target_os = "linux")]
fn battery() -> Option<(i64, Option<bool>)> {
    let mut percent = None;
    let mut plugged = None;
    for entry in std::fs::read_dir("/sys/class/power_supply").ok()?.flatten() {
        let dir = entry.path();
        match read_trimmed(&dir.join("type")).as_deref() {
            Some("Battery") if percent.is_none() => {
                percent = read_trimmed(&dir.join("capacity")).and_then(|s| s.parse::<i64>().ok());
            }
            Some("Mains") => {
                if let Some(online) = read_trimmed(&dir.join("online")) {
                    plugged = Some(plugged.unwrap_or(false) || online == "1");
                }
            }
            _ => {}
        }
    }
    percent.map(|p| (p, plugged))
}

#[cfg(target_os = "linux")]
fn gpu_temperature() -> Option<f64> {
    const GPU_CHIPS: &[&str] = &["amdgpu", "nouveau", "radeon", "i915", "xe"];
    std::fs::read_dir("/sys/class/hwmon")
        .ok()?
        .flatten()
        .map(|e| e.path())
        .filter(|dir| {
            read_trimmed(&dir.join("name")).is_some_and(|n| GPU_CHIPS.contains(&n.as_str()))
        })
        .find_map(|dir| {
            read_trimmed(&dir.join("temp1_input"))
                .and_then(|s| s.parse::<f64>().ok())
                .map(|milli| milli / 1000.0)
        })
}

/// Process count, plus every readable `/proc/<pid>/stat` line concatenated.
#[cfg(target_os = "linux")]
fn process_table(fingerprint: bool) -> (usize, Option<String>) {
    let Ok(entries) = std::fs::read_dir("/proc") else {
        return (0, None);
    };
    let mut pids: Vec<u32> = entries
        .flatten()
        .filter_map(|e| e.file_name().to_str().and_then(|n| n.parse().ok()))
        .collect();
    pids.sort_unstable();

    if !fingerprint {
        return (pids.len(), None);
    }
    let mut table = String::new();
    for pid in &pids {
        // Processes can exit between listing and reading.
        if let Ok(stat) = std::fs::read_to_string(format!("/proc/{pid}/stat")) {
            table.push_str(stat.trim_end());
        }
    }
    (pids.len(), Some(table))
}

#[cfg(target_os = "linux")]
fn self_rss_bytes() -> Option<u64> {
    let statm = std::fs::read_to_string("/proc/self/statm").ok()?;
    let pages = statm.split_whitespace().nth(1)?.parse::<u64>().ok()?;
    // SAFETY: sysconf has no preconditions.
    let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    (page_size > 0).then(|| pages * page_size as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Stalled;

    impl TelemetrySource for Stalled {
        fn sample(&self) -> Result<TelemetrySnapshot> {
            std::thread::sleep(Duration::from_secs(5));
            Ok(TelemetrySnapshot::new())
        }
    }

    #[test]
    fn new_snapshot_has_every_key_as_null() {
        let snap = TelemetrySnapshot::new();
        assert_eq!(snap.len(), METRIC_KEYS.len());
        for key in METRIC_KEYS {
            assert!(snap.contains_key(key));
            assert!(snap.get(key).is_none());
        }
    }

    #[test]
    fn metric_keys_are_sorted() {
        let mut sorted = METRIC_KEYS.to_vec();
        sorted.sort_unstable();
        assert_eq!(sorted, METRIC_KEYS);
    }

    #[test]
    fn canonical_json_is_compact_and_sorted() {
        let mut snap = TelemetrySnapshot::new();
        snap.set("memory_used", 1024u64);
        snap.set("cpu_load_pct", 10.0);
        let json = snap.to_canonical_json().unwrap();
        assert!(json.starts_with("{\"battery_percent\":null,\"cpu_count\":null,"));
        assert!(json.contains("\"cpu_load_pct\":10.0,"));
        assert!(json.contains("\"memory_used\":1024,"));
        assert!(json.ends_with("\"uptime_secs\":null}"));
    }

    #[test]
    fn non_finite_floats_degrade_to_null() {
        let mut snap = TelemetrySnapshot::new();
        snap.set("cpu_temp_c", f64::NAN);
        assert!(snap.contains_key("cpu_temp_c"));
        assert!(snap.get("cpu_temp_c").is_none());
    }

    #[test]
    fn system_snapshot_keeps_the_full_key_set() {
        let telemetry = SystemTelemetry::new(TelemetryConfig {
            process_fingerprint: false,
            cpu_sample_ms: 10,
            ..TelemetryConfig::default()
        });
        let snap = telemetry.sample().unwrap();
        for key in METRIC_KEYS {
            assert!(snap.contains_key(key), "missing {key}");
        }
        assert!(snap.get("timestamp_ns").is_some());
        assert!(snap.get("cpu_count").is_some());
        // Disabled fingerprinting is null, not absent.
        assert!(snap.get("process_fingerprint").is_none());
    }

    #[test]
    fn bounded_source_times_out() {
        let bounded = BoundedTelemetry::new(Stalled, Duration::from_millis(50));
        let err = bounded.sample().unwrap_err();
        assert!(matches!(err, Error::TelemetryTimeout(_)));
    }

    #[test]
    fn bounded_source_passes_results_through() {
        let bounded = BoundedTelemetry::new(
            SystemTelemetry::new(TelemetryConfig {
                process_fingerprint: false,
                cpu_sample_ms: 5,
                ..TelemetryConfig::default()
            }),
            Duration::from_secs(10),
        );
        assert_eq!(bounded.sample().unwrap().len(), METRIC_KEYS.len());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn cpu_load_is_a_percentage() {
        assert_eq!(cpu_load_pct((10, 100), (10, 100)), 0.0);
        assert!((cpu_load_pct((0, 0), (25, 100)) - 75.0).abs() < 1e-9);
        assert_eq!(cpu_load_pct((0, 0), (100, 100)), 0.0);
    }
}
