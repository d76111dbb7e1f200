//! Part Verification Station CLI

use clap::{Parser, Subcommand};
use qg_core::reference::{PartCatalog, VehicleRegistry};
use qg_core::{
    classify, MemoryAlertSink, OutcomeKind, RecentOutcomes, ReferenceData, StationConfig,
    VerificationEngine, Verdict, WorkflowError,
};
use qg_scan::{ScanAdapter, ScanKind, ScriptedScanner, SimulatedScanner, SimulatorConfig};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "qg-station")]
#[command(about = "Assembly line part verification station")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the reference scenarios against the demo line-up
    Demo,

    /// Drive a station with the simulated reader
    Simulate {
        /// Number of vehicles to process
        #[arg(short, long, default_value = "5")]
        cycles: usize,

        /// Parts to verify per vehicle
        #[arg(short, long, default_value = "3")]
        parts: usize,

        /// Simulator seed
        #[arg(short, long)]
        seed: Option<u64>,

        /// Probability that a read cannot be decoded
        #[arg(short, long)]
        failure_rate: Option<f64>,

        /// Reader latency in milliseconds
        #[arg(long)]
        latency_ms: Option<u64>,

        /// Station and simulator settings (JSON)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Vehicle registry and part catalog (JSON)
        #[arg(short, long)]
        reference: Option<PathBuf>,

        /// Raise an alert for every mismatch
        #[arg(long)]
        mismatch_alerts: bool,

        /// Print outcomes as JSON
        #[arg(long)]
        json: bool,
    },

    /// Classify one vehicle/part pair
    Classify {
        /// Vehicle VIN
        #[arg(long)]
        vin: String,

        /// Part ID
        #[arg(long)]
        part: String,

        /// Vehicle registry and part catalog (JSON)
        #[arg(short, long)]
        reference: Option<PathBuf>,
    },

    /// List the vehicle registry and part catalog
    Catalog {
        /// Vehicle registry and part catalog (JSON)
        #[arg(short, long)]
        reference: Option<PathBuf>,
    },
}

/// Settings file accepted by `simulate --config`
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct StationFile {
    station: StationConfig,
    scanner: SimulatorConfig,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set subscriber: {}", e);
    }

    match cli.command {
        Commands::Demo => cmd_demo().await,
        Commands::Simulate {
            cycles,
            parts,
            seed,
            failure_rate,
            latency_ms,
            config,
            reference,
            mismatch_alerts,
            json,
        } => {
            let mut file = match config {
                Some(path) => load_station_file(&path),
                None => StationFile::default(),
            };
            if let Some(seed) = seed {
                file.scanner.seed = seed;
            }
            if let Some(rate) = failure_rate {
                file.scanner.failure_rate = rate;
            }
            if let Some(latency) = latency_ms {
                file.scanner.latency_ms = latency;
            }
            if mismatch_alerts {
                file.station.alert_policy.emit_alert_on_mismatch = true;
            }
            let reference = load_reference(reference.as_deref());
            cmd_simulate(file, reference, cycles, parts, json).await;
        }
        Commands::Classify {
            vin,
            part,
            reference,
        } => cmd_classify(&load_reference(reference.as_deref()), &vin, &part),
        Commands::Catalog { reference } => cmd_catalog(&load_reference(reference.as_deref())),
    }
}

fn load_reference(path: Option<&Path>) -> ReferenceData {
    let Some(path) = path else {
        return ReferenceData::demo();
    };

    match ReferenceData::from_path(path) {
        Ok(data) => data,
        Err(e) => {
            error!("Failed to load reference data from {}: {}", path.display(), e);
            std::process::exit(1);
        }
    }
}

fn load_station_file(path: &Path) -> StationFile {
    let parsed = std::fs::read_to_string(path)
        .map_err(|e| e.to_string())
        .and_then(|json| serde_json::from_str(&json).map_err(|e| e.to_string()));

    match parsed {
        Ok(file) => file,
        Err(e) => {
            error!("Failed to load station config {}: {}", path.display(), e);
            std::process::exit(1);
        }
    }
}

fn build_engine<A: ScanAdapter>(
    config: StationConfig,
    adapter: A,
    reference: ReferenceData,
    alerts: Arc<MemoryAlertSink>,
    outcomes: Arc<RecentOutcomes>,
) -> VerificationEngine<A, ReferenceData> {
    match VerificationEngine::new(config, adapter, reference, alerts) {
        Ok(engine) => engine.with_outcome_sink(outcomes),
        Err(e) => {
            error!("Invalid station configuration: {}", e);
            std::process::exit(1);
        }
    }
}

async fn cmd_demo() {
    const VIN: &str = "SLA23SL001235";

    let scanner = ScriptedScanner::new()
        .then_read(ScanKind::Vehicle, VIN)
        .then_read(ScanKind::Part, "GS-SLA-AMB-SL-002")
        .then_read(ScanKind::Part, "DH-KUS-STY-WH-001")
        .then_unreadable(ScanKind::Part, Some("GS-SLA-AMB-SL-002"));

    let alerts = Arc::new(MemoryAlertSink::new());
    let recent = Arc::new(RecentOutcomes::default());
    let mut engine = build_engine(
        StationConfig::default(),
        scanner,
        ReferenceData::demo(),
        alerts.clone(),
        recent.clone(),
    );

    println!("\nReference Scenarios\n{}", "=".repeat(50));

    print_step(
        engine
            .scan_vehicle()
            .await
            .map(|v| format!("Vehicle bound: {} {}", v.vin, v.configuration())),
    );
    print_step(engine.scan_part().await.map(|o| format!("A: {}", o.summary())));

    engine.scan_next_part().ok();
    print_step(engine.scan_part().await.map(|o| format!("B: {}", o.summary())));
    print_step(engine.block_installation().map(|a| format!("   -> {}", a.message)));

    engine.reset();
    print_step(engine.enter_vehicle_manually(VIN).map(|v| format!("Vehicle bound: {}", v.vin)));
    print_step(engine.scan_part().await.map(|o| format!("C: {}", o.summary())));
    print_step(
        engine
            .enter_part_manually("GS-SLA-AMB-SL-002")
            .map(|o| format!("D: {}", o.summary())),
    );

    print_alerts(&alerts);
    println!("\nRecent verifications: {}", recent.snapshot().len());
}

fn print_step(step: Result<String, WorkflowError>) {
    match step {
        Ok(line) => println!("{}", line),
        Err(e) => println!("! {} ({})", e, e.prompt()),
    }
}

async fn cmd_simulate(
    file: StationFile,
    reference: ReferenceData,
    cycles: usize,
    parts_per_vehicle: usize,
    json: bool,
) {
    let mut scanner_config = file.scanner;
    if scanner_config.vehicle_pool.is_empty() {
        scanner_config.vehicle_pool = reference.vehicles().iter().map(|v| v.vin.clone()).collect();
    }
    if scanner_config.part_pool.is_empty() {
        scanner_config.part_pool = reference.parts().iter().map(|p| p.id.clone()).collect();
    }

    let scanner = match SimulatedScanner::new(scanner_config) {
        Ok(scanner) => scanner,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    let alerts = Arc::new(MemoryAlertSink::new());
    let recent = Arc::new(RecentOutcomes::new(recent_capacity(cycles, parts_per_vehicle)));
    let mut engine = build_engine(file.station, scanner, reference, alerts.clone(), recent.clone());

    info!(
        "Simulating {} vehicles x {} parts at {}",
        cycles,
        parts_per_vehicle,
        engine.config().station_id
    );

    for cycle in 0..cycles {
        engine.reset();
        if !bind_vehicle(&mut engine).await {
            warn!("Cycle {}: no vehicle could be bound, skipping", cycle + 1);
            continue;
        }

        for _ in 0..parts_per_vehicle {
            match verify_part(&mut engine).await {
                Some(OutcomeKind::Match) => {
                    engine.scan_next_part().ok();
                }
                Some(OutcomeKind::Mismatch) => {
                    if let Err(e) = engine.block_installation() {
                        warn!("{}", e);
                    }
                    break;
                }
                Some(OutcomeKind::ScanFailure) | None => break,
            }
        }
    }

    let mut outcomes = recent.snapshot();
    outcomes.reverse();

    if json {
        match serde_json::to_string_pretty(&outcomes) {
            Ok(out) => println!("{}", out),
            Err(e) => {
                error!("Failed to serialize outcomes: {}", e);
                std::process::exit(1);
            }
        }
        return;
    }

    println!("\nVerifications\n{}", "=".repeat(50));
    for outcome in &outcomes {
        println!("{}", outcome.summary());
    }

    let stats = engine.stats();
    println!("\nStation {}\n{}", engine.config().station_id, "=".repeat(50));
    println!("Vehicles bound:        {}", stats.vehicles_bound);
    println!("Matches:               {}", stats.matches);
    println!("Mismatches:            {}", stats.mismatches);
    println!("Scan failures:         {}", stats.scan_failures);
    println!("Manual entries:        {}", stats.manual_entries);
    println!("Installations blocked: {}", stats.installations_blocked);
    println!("Alerts raised:         {}", stats.alerts_raised);

    print_alerts(&alerts);
}

/// Scan a VIN, falling back to typing what the reader was aimed at
async fn bind_vehicle(engine: &mut VerificationEngine<SimulatedScanner, ReferenceData>) -> bool {
    match engine.scan_vehicle().await {
        Ok(_) => true,
        Err(WorkflowError::ScanFailed(reason)) => match reason.attempted() {
            Some(vin) => engine.enter_vehicle_manually(vin).is_ok(),
            None => false,
        },
        Err(e) => {
            warn!("{} ({})", e, e.prompt());
            false
        }
    }
}

/// One part: scan, and after a failed read enter the code by hand or retry once
async fn verify_part(
    engine: &mut VerificationEngine<SimulatedScanner, ReferenceData>,
) -> Option<OutcomeKind> {
    let outcome = match engine.scan_part().await {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!("{} ({})", e, e.prompt());
            return None;
        }
    };

    let Verdict::ScanFailure { part_id, .. } = &outcome.verdict else {
        return Some(outcome.kind());
    };

    let recovered = match part_id {
        Some(id) => engine.enter_part_manually(id),
        None => {
            engine.retry_scan_part().ok();
            engine.scan_part().await
        }
    };

    match recovered {
        Ok(outcome) => Some(outcome.kind()),
        Err(e) => {
            warn!("{} ({})", e, e.prompt());
            None
        }
    }
}

fn print_alerts(alerts: &MemoryAlertSink) {
    let active = alerts.active();
    println!("\nActive Alerts ({})\n{}", active.len(), "=".repeat(50));
    for alert in active {
        println!(
            "[{}] {} @ {}: {}",
            alert.severity.to_string().to_uppercase(),
            alert.title,
            alert.station,
            alert.message
        );
    }
}

fn cmd_classify(reference: &ReferenceData, vin: &str, part_id: &str) {
    let Some(vehicle) = reference.resolve_vehicle(vin) else {
        error!("Vehicle not found: {}", vin);
        std::process::exit(1);
    };
    let Some(part) = reference.resolve_part(part_id) else {
        error!("Part not found: {}", part_id);
        std::process::exit(1);
    };

    let verdict = classify(&vehicle, &part);

    println!("\nCompatibility\n{}", "=".repeat(50));
    println!("Vehicle:  {} ({})", vehicle.vin, vehicle.configuration());
    println!("Part:     {} {} ({})", part.id, part.name, part.expected);
    println!("Verdict:  {}", verdict.kind().to_string().to_uppercase());
    for field in verdict.diverging() {
        println!(
            "  - {}: vehicle '{}', part '{}'",
            field,
            vehicle.configuration().field(*field),
            part.expected.field(*field)
        );
    }

    if verdict.kind() != OutcomeKind::Match {
        std::process::exit(1);
    }
}

fn cmd_catalog(reference: &ReferenceData) {
    println!("\nVehicles\n{}", "=".repeat(50));
    for vehicle in reference.vehicles() {
        println!("  {}  {}", vehicle.vin, vehicle.configuration());
    }

    println!("\nParts\n{}", "=".repeat(50));
    for part in reference.parts() {
        println!("  {}  {} ({})", part.id, part.name, part.expected);
    }
}

/// Room for every outcome a run can record, counting one retry per part
fn recent_capacity(cycles: usize, parts_per_vehicle: usize) -> usize {
    cycles
        .saturating_mul(parts_per_vehicle)
        .saturating_mul(2)
        .max(1)
}
