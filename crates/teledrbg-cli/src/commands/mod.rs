pub mod digest;
pub mod generate;
pub mod inspect;
pub mod telemetry;

use std::time::Duration;

use teledrbg_core::{BoundedTelemetry, SystemTelemetry, TelemetryConfig, TelemetrySource};

/// Live telemetry, bounded by the configured query timeout if there is one.
pub fn make_telemetry(config: &TelemetryConfig) -> Box<dyn TelemetrySource> {
    let system = SystemTelemetry::new(config.clone());
    match config.timeout() {
        Some(timeout) => Box::new(BoundedTelemetry::new(system, timeout)),
        None => Box::new(system),
    }
}

/// Render a duration the way the summaries print it.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs >= 60.0 {
        format!("{:.0}m{:02.0}s", (secs / 60.0).floor(), secs % 60.0)
    } else if secs >= 1.0 {
        format!("{secs:.2}s")
    } else {
        format!("{:.0}ms", secs * 1000.0)
    }
}
