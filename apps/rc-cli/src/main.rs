use clap::{Parser, Subcommand};
use rc_app::{
    AppConfig, AppError, AppResult, RunMode, RunProgressEvent, RunRequest, RunResponse, RunStage,
    Scenario, load_config, run_service,
};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Parser)]
#[command(name = "rc-cli")]
#[command(about = "Receding-horizon optimal control: offline solves and real-time loops", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List built-in scenarios
    Scenarios,
    /// Print the default configuration of a scenario as YAML
    Config {
        /// Scenario name (rocket, tank-drive)
        scenario: Scenario,
    },
    /// Solve a scenario once over the full horizon
    Solve {
        scenario: Scenario,
        /// YAML configuration overriding the scenario defaults
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Directory to store the run in
        #[arg(long)]
        record: Option<PathBuf>,
    },
    /// Run the real-time loop against a simulated plant
    Rti {
        scenario: Scenario,
        /// Number of control ticks
        #[arg(long, default_value_t = 20)]
        ticks: usize,
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(long)]
        record: Option<PathBuf>,
    },
    /// List stored runs of a scenario
    Runs {
        /// Run store directory
        record: PathBuf,
        scenario: Scenario,
    },
    /// Show a stored run
    ShowRun {
        record: PathBuf,
        run_id: String,
    },
    /// Export one series of a stored run as CSV
    ExportSeries {
        record: PathBuf,
        run_id: String,
        /// State, control or intermediate name
        name: String,
        /// Snapshot to export (defaults to the last one)
        #[arg(long)]
        snapshot: Option<usize>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> AppResult<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Scenarios => {
            for sc in Scenario::ALL {
                let closed_loop = if sc.plant_initial_state().is_some() {
                    "solve, rti"
                } else {
                    "solve"
                };
                println!("  {sc} ({closed_loop})");
            }
            Ok(())
        }
        Commands::Config { scenario } => {
            print!("{}", scenario.default_config().to_yaml()?);
            Ok(())
        }
        Commands::Solve {
            scenario,
            config,
            record,
        } => cmd_run(scenario, RunMode::Solve, config.as_deref(), record.as_deref()),
        Commands::Rti {
            scenario,
            ticks,
            config,
            record,
        } => cmd_run(
            scenario,
            RunMode::RealTime { ticks },
            config.as_deref(),
            record.as_deref(),
        ),
        Commands::Runs { record, scenario } => cmd_runs(&record, scenario),
        Commands::ShowRun { record, run_id } => cmd_show_run(&record, &run_id),
        Commands::ExportSeries {
            record,
            run_id,
            name,
            snapshot,
            output,
        } => cmd_export_series(&record, &run_id, &name, snapshot, output.as_deref()),
    }
}

fn resolve_config(scenario: Scenario, path: Option<&Path>) -> AppResult<AppConfig> {
    match path {
        Some(p) => load_config(p),
        None => Ok(scenario.default_config()),
    }
}

fn cmd_run(
    scenario: Scenario,
    mode: RunMode,
    config: Option<&Path>,
    record: Option<&Path>,
) -> AppResult<()> {
    match mode {
        RunMode::Solve => println!("Solving scenario: {scenario}"),
        RunMode::RealTime { ticks } => println!("Running {ticks} ticks of scenario: {scenario}"),
    }

    let request = RunRequest {
        scenario,
        mode,
        config: resolve_config(scenario, config)?,
        record_dir: record,
    };

    let mut last_emit = Instant::now();
    let mut last_stage = None;
    let response = run_service::execute_with_progress(
        &request,
        Some(&mut |event| {
            let emit_now = last_stage != Some(event.stage)
                || event.ticks.is_some_and(|(done, total)| done == total)
                || last_emit.elapsed().as_millis() >= 100;
            if emit_now {
                render_cli_progress(&event);
                last_stage = Some(event.stage);
                last_emit = Instant::now();
            }
        }),
        None,
    )?;
    clear_progress_line();

    print_run_summary(&request.mode, &response);
    if response.saved {
        println!("✓ Saved run: {}", response.run_id);
    }
    if response.status.is_failure() {
        return Err(AppError::Solver(format!(
            "run ended with status {}",
            response.status.as_str()
        )));
    }
    Ok(())
}

fn clear_progress_line() {
    print!("\r{}\r", " ".repeat(120));
    let _ = io::stdout().flush();
}

fn render_cli_progress(event: &RunProgressEvent) {
    match (event.stage, event.ticks) {
        (RunStage::Ticking, Some((done, total))) => {
            let width = 28usize;
            let fraction = done as f64 / total.max(1) as f64;
            let filled = ((fraction * width as f64).round() as usize).min(width);
            let mut line = format!(
                "\r[{}{}] {done}/{total}  elapsed={:.2}s",
                "#".repeat(filled),
                "-".repeat(width - filled),
                event.elapsed_wall_s
            );
            if let Some(obj) = event.objective {
                line.push_str(&format!("  objective={obj:.4e}"));
            }
            print!("{line}");
        }
        _ => {
            let spinner = ['|', '/', '-', '\\'];
            let spin_idx = ((event.elapsed_wall_s * 10.0) as usize) % spinner.len();
            let mut line = format!(
                "\r{} {}  elapsed={:.2}s",
                spinner[spin_idx],
                event.stage.label(),
                event.elapsed_wall_s
            );
            if let Some(msg) = &event.message {
                line.push_str(&format!("  {msg}"));
            }
            print!("{line}");
        }
    }
    let _ = io::stdout().flush();
}

fn print_run_summary(mode: &RunMode, response: &RunResponse) {
    let timing = &response.timing;
    let total = timing.total_time_s.max(1.0e-12);

    println!("Status:    {}", response.status.as_str());
    println!("Objective: {:.6e}", response.objective);
    println!("Iterations: {}", response.iterations);

    println!("\nTiming summary:");
    println!(
        "  Build:   {:.3}s ({:.1}%)",
        timing.build_time_s,
        100.0 * timing.build_time_s / total
    );
    println!(
        "  Solve:   {:.3}s ({:.1}%)",
        timing.solve_time_s,
        100.0 * timing.solve_time_s / total
    );
    if timing.save_time_s > 0.0 {
        println!("  Save:    {:.3}s", timing.save_time_s);
    }
    println!("  Total:   {:.3}s", timing.total_time_s);

    if let RunMode::RealTime { ticks } = mode {
        println!("  Max tick: {:.3} ms", 1e3 * timing.max_tick_time_s);
        let failed = response.failed_ticks();
        if failed > 0 {
            tracing::warn!(failed, ticks, "some ticks held the previous control");
        }
        println!("  Failed ticks: {failed}/{ticks}");
        if let Some(x) = &response.final_state {
            let values: Vec<String> = x.iter().map(|v| format!("{v:.4}")).collect();
            println!("  Final state: [{}]", values.join(", "));
        }
    }
}

fn cmd_runs(record: &Path, scenario: Scenario) -> AppResult<()> {
    let runs = run_service::list_runs(record, scenario)?;

    if runs.is_empty() {
        println!("No stored runs for scenario: {scenario}");
    } else {
        println!("Stored runs for '{scenario}':");
        for manifest in runs {
            println!(
                "  {} {} ({})",
                manifest.run_id, manifest.status, manifest.timestamp
            );
        }
    }
    Ok(())
}

fn cmd_show_run(record: &Path, run_id: &str) -> AppResult<()> {
    let (manifest, snapshots) = run_service::load_run(record, run_id)?;

    println!("Run {}", manifest.run_id);
    println!("  Scenario: {}", manifest.scenario);
    println!("  Type:     {:?}", manifest.run_type);
    println!("  Status:   {}", manifest.status);
    println!("  Version:  {}", manifest.solver_version);
    println!("  Snapshots: {}", snapshots.len());

    if let Some(last) = snapshots.last() {
        println!("\nLast snapshot (t = {:.3} s, {}):", last.time_s, last.status);
        println!("  Objective: {:.6e}", last.objective);
        for p in &last.params {
            println!("  {} = {:.6}", p.name, p.value);
        }
        println!("  Series:");
        for s in &last.series {
            println!("    {} ({:?}, {} nodes)", s.name, s.kind, s.values.len());
        }
    }
    Ok(())
}

fn cmd_export_series(
    record: &Path,
    run_id: &str,
    name: &str,
    snapshot: Option<usize>,
    output: Option<&Path>,
) -> AppResult<()> {
    let (_manifest, snapshots) = run_service::load_run(record, run_id)?;
    let index = snapshot.unwrap_or(snapshots.len().saturating_sub(1));
    let snap = snapshots
        .get(index)
        .ok_or_else(|| AppError::InvalidInput(format!("run {run_id} has no snapshot {index}")))?;
    let series = snap
        .series(name)
        .ok_or_else(|| AppError::InvalidInput(format!("no series named '{name}'")))?;

    let mut csv = String::from("time_s,value\n");
    for (t, v) in snap.node_times.iter().zip(&series.values) {
        csv.push_str(&format!("{t},{v}\n"));
    }

    if let Some(path) = output {
        std::fs::write(path, csv)?;
        println!(
            "✓ Exported {} points to {}",
            series.values.len(),
            path.display()
        );
    } else {
        print!("{csv}");
    }
    Ok(())
}
