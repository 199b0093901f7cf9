use teledrbg_core::{
    EntropyCollector, OsRandom, SeedAssembler, TelemetryCollector, TelemetryConfig,
};

pub fn run(tag: Option<&str>) -> teledrbg_core::Result<()> {
    let telemetry = super::make_telemetry(&TelemetryConfig::default());
    let collector = TelemetryCollector::new(telemetry, OsRandom);
    let assembler = SeedAssembler::new(OsRandom, tag.map(str::to_string));

    let digest = collector.collect()?;
    let seed = assembler.assemble(&digest)?;
    println!("digest: {digest}");
    println!("seed:   {}", seed.as_str());
    Ok(())
}
