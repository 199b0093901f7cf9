use teledrbg_core::{TelemetryConfig, TelemetrySource};

pub fn run(no_process_table: bool) -> teledrbg_core::Result<()> {
    let config = TelemetryConfig {
        process_fingerprint: !no_process_table,
        ..TelemetryConfig::default()
    };
    let snapshot = super::make_telemetry(&config).sample()?;
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}
