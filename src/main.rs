use std::{env, io::Write, path::PathBuf, str::FromStr, sync::Arc};

use anyhow::{bail, Error};
use care_roster::{
    clock::SystemClock,
    compliance::{ComplianceAuditor, ComplianceDriver, ComplianceSink, TracingSink},
    config::EngineConfig,
    roster::{load_roster_from_json_file, InMemoryDirectory},
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Error> {
    let args: Vec<String> = env::args().skip(1).collect();
    let watch = args.iter().any(|arg| arg == "--watch");
    let paths: Vec<&String> = args.iter().filter(|arg| !arg.starts_with("--")).collect();
    let Some(roster_path) = paths.first() else {
        bail!("usage: care_roster <roster.json> [config.json] [--watch]");
    };
    let config_path = paths.get(1).map(|path| PathBuf::from_str(path)).transpose()?;

    let config = EngineConfig::load(config_path.as_deref())?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_filter)),
        )
        .init();

    let path = PathBuf::from_str(roster_path)?;
    let roster = Arc::new(load_roster_from_json_file(&path, Arc::new(InMemoryDirectory::new()))?);

    let sink = TracingSink;
    let report = ComplianceAuditor::new().audit(&roster.snapshot());
    for violation in &report.violations {
        sink.report(violation)?;
    }

    let mut file = std::fs::File::create("./compliance_report.json")?;
    file.write_all(serde_json::to_string_pretty(&report)?.as_bytes())?;
    info!(violations = report.violations.len(), "compliance report written");

    if watch {
        let clock = Arc::new(SystemClock::new(config.time_zone()?));
        let driver = ComplianceDriver::new(clock, Arc::new(sink));
        driver.start(roster, ComplianceAuditor::new())?;
        tokio::signal::ctrl_c().await?;
        driver.stop().await;
    }

    Ok(())
}
