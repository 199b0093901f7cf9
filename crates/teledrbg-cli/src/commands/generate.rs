use std::path::PathBuf;

use teledrbg_core::{
    OsRandom, Pipeline, RunConfig, SeedAssembler, TelemetryCollector, open_output,
};

pub struct GenerateCommandConfig<'a> {
    pub config_path: Option<&'a str>,
    pub lineages: Option<usize>,
    pub rounds: Option<usize>,
    pub output: Option<&'a str>,
    pub tag: Option<&'a str>,
    pub workers: Option<usize>,
    pub no_process_table: bool,
    pub no_gpu: bool,
    pub cpu_sample_ms: Option<u64>,
    pub timeout_ms: Option<u64>,
}

/// Config file (or defaults) with command-line overrides applied.
pub fn resolve_config(cfg: &GenerateCommandConfig<'_>) -> teledrbg_core::Result<RunConfig> {
    let mut run = match cfg.config_path {
        Some(path) => RunConfig::load(path)?,
        None => RunConfig::default(),
    };
    if let Some(n) = cfg.lineages {
        run.lineage_count = n;
    }
    if let Some(r) = cfg.rounds {
        run.rounds_per_lineage = r;
    }
    if let Some(path) = cfg.output {
        run.output_path = PathBuf::from(path);
    }
    if let Some(tag) = cfg.tag {
        run.personalization_tag = Some(tag.to_string());
    }
    if cfg.workers.is_some() {
        run.workers = cfg.workers;
    }
    if cfg.no_process_table {
        run.telemetry.process_fingerprint = false;
    }
    if cfg.no_gpu {
        run.telemetry.gpu = false;
    }
    if let Some(ms) = cfg.cpu_sample_ms {
        run.telemetry.cpu_sample_ms = ms;
    }
    if cfg.timeout_ms.is_some() {
        run.telemetry.timeout_ms = cfg.timeout_ms;
    }
    run.validate()?;
    Ok(run)
}

pub fn run(cfg: GenerateCommandConfig<'_>) -> teledrbg_core::Result<()> {
    let run = resolve_config(&cfg)?;
    log::debug!("run configuration: {run:?}");

    let collector = TelemetryCollector::new(super::make_telemetry(&run.telemetry), OsRandom);
    let assembler = SeedAssembler::new(OsRandom, run.personalization_tag.clone());
    let mut pipeline = Pipeline::new(collector, assembler);
    if let Some(workers) = run.workers {
        pipeline = pipeline.with_workers(workers);
    }

    let mut file = open_output(&run.output_path)?;
    let report = pipeline.run(run.lineage_count, run.rounds_per_lineage, &mut file)?;
    file.sync_all()?;

    log::info!(
        "{} records ({} bytes) appended to {} in {} using {} workers",
        report.records_written,
        report.bytes_written,
        run.output_path.display(),
        super::format_duration(report.elapsed),
        report.workers,
    );
    Ok(())
}
