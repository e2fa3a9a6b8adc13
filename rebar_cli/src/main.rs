//! # Rebar CLI
//!
//! Command line front end for `rebar_core`.
//!
//! ```text
//! rebar template foundation.rbp          write a sample project
//! rebar run foundation.rbp -o out.json   lay out every strip, save the report
//! rebar cut --lengths 2.5,3.4 --counts 20,40   (milp feature) cut from 12 m stock
//! ```
//!
//! Logging goes to stderr through `tracing`; set `RUST_LOG` to change the
//! level (default `info`).

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use rebar_core::file_io::{load_project, save_project, save_report, FileLock};
use rebar_core::report::{Bar, LayoutReport};
use rebar_core::{Foundation, LayoutError, LayoutResult, Project};

#[derive(Parser)]
#[command(name = "rebar", version, about = "Rebar layout for concrete foundation strips")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Lay out a project and write the report
    Run {
        /// Project file (.rbp)
        project: PathBuf,
        /// Report path, defaults to the project path with a .json extension
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Lock holder recorded while the run has the project open
        #[arg(long, default_value = "rebar-cli")]
        user: String,
        /// Print the report to stdout instead of a summary
        #[arg(long)]
        json: bool,
    },
    /// Write a sample project to start from
    Template {
        path: PathBuf,
        #[arg(long, default_value = "")]
        engineer: String,
    },
    /// Cut a bar list from 12 m stock bars
    #[cfg(feature = "milp")]
    Cut {
        #[arg(long, value_delimiter = ',', required = true)]
        lengths: Vec<f64>,
        #[arg(long, value_delimiter = ',', required = true)]
        counts: Vec<u32>,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Run { project, output, user, json } => run(&project, output, &user, json),
        Command::Template { path, engineer } => template(&path, &engineer),
        #[cfg(feature = "milp")]
        Command::Cut { lengths, counts } => cut(lengths, counts),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error [{}]: {}", e.error_code(), e);
            if let Ok(json) = serde_json::to_string_pretty(&e) {
                eprintln!("{}", json);
            }
            ExitCode::FAILURE
        }
    }
}

fn run(path: &Path, output: Option<PathBuf>, user: &str, json: bool) -> LayoutResult<ExitCode> {
    let _lock = FileLock::acquire(path, user)?;
    let mut project = load_project(path)?;
    project.validate()?;

    let mut foundation = Foundation::new(&project.strips, &project.config)?;
    foundation.run()?;
    let report = LayoutReport::new(&project.meta, &foundation)?;

    let output = output.unwrap_or_else(|| path.with_extension("json"));
    save_report(&report, &output)?;
    project.touch();
    save_project(&project, path)?;
    tracing::info!(report = %output.display(), "report written");

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&report);
    }
    Ok(if report.is_success() { ExitCode::SUCCESS } else { ExitCode::from(2) })
}

fn print_summary(report: &LayoutReport) {
    println!("Job {}  run {}", report.job_id, report.run_id);
    if let Some(errors) = &report.errors {
        let total = errors.total_type_num;
        println!(
            "  FAILED: {} length types requested, at least {} needed",
            total.num, total.min_feasible_num
        );
    }

    let catalog: Vec<String> = report.length_catalog.iter().map(|l| format!("{:.2}", l)).collect();
    println!("  Length types:  [{}]", catalog.join(", "));
    println!("  Shear types:   {}", report.shear_types.len());
    for strip in &report.strips {
        let bars = |rows: &[Vec<Bar>]| rows.iter().map(Vec::len).sum::<usize>();
        println!(
            "  {:<8} top {:>3} bars  bottom {:>3} bars  {} shear zones",
            strip.name,
            bars(&strip.top.rows),
            bars(&strip.bottom.rows),
            strip.shear_zones.len()
        );
    }
    if let Some(q) = &report.quantities {
        println!(
            "  Steel (t):     typical {:.3}  additional {:.3}  shear {:.3}  total {:.3}",
            q.typical, q.additional, q.shear, q.total
        );
    }

    let w = &report.warnings;
    if !w.is_empty() {
        println!(
            "  Warnings:      {} min gap, {} max gap, {} min ratio, {} excess stack",
            w.min_gap.len(),
            w.max_gap.len(),
            w.min_ratio.len(),
            w.excess_stack.len()
        );
    }
}

fn template(path: &Path, engineer: &str) -> LayoutResult<ExitCode> {
    if path.exists() {
        return Err(LayoutError::file_error(
            "write template",
            path.display().to_string(),
            "file already exists",
        ));
    }
    let mut project = Project::sample();
    project.meta.engineer = engineer.to_string();
    save_project(&project, path)?;
    println!("Sample project written to {}", path.display());
    Ok(ExitCode::SUCCESS)
}

#[cfg(feature = "milp")]
fn cut(lengths: Vec<f64>, counts: Vec<u32>) -> LayoutResult<ExitCode> {
    use rebar_core::optimization::cutting::{CuttingStock, HighsMaster};

    let mut cutting = CuttingStock::new(lengths, counts)?;
    let plan = cutting.solve(&mut HighsMaster)?;
    for (pattern, count) in plan.patterns.iter().zip(&plan.counts) {
        let pieces: Vec<String> = pattern
            .iter()
            .zip(&plan.lengths)
            .filter(|(&n, _)| n > 0)
            .map(|(n, l)| format!("{} x {:.2}", n, l))
            .collect();
        println!("{:>4} bars: {}", count, pieces.join(" + "));
    }
    println!("{} stock bars, {:.2} m offcut", plan.stock_bars(), plan.waste());
    Ok(ExitCode::SUCCESS)
}
