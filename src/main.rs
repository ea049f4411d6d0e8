//! `dryeye` command line: train models, assess one patient, run a batch, evaluate.

use clap::{Parser, Subcommand};
use dryeye_risk::{
    data::{load_records, PatientRecord},
    logging::StructuredLogger,
    report::{default_report_path, save_batch_report, save_report, ReportFormat},
    DryEyeSystem, Error, PatientAssessment, Result, SystemConfig,
};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "dryeye", version, about = "Dry eye disease risk and severity assessment")]
struct Cli {
    /// JSON configuration file (default: $DRYEYE_CONFIG_PATH, then config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Train the risk and severity models from a labelled CSV
    Train {
        #[arg(long)]
        data: Option<PathBuf>,
    },
    /// Assess a single patient, from a JSON object or interactive prompts
    Predict {
        /// Inline JSON object or path to a JSON file
        #[arg(long)]
        input: Option<String>,
        /// Save the report as txt, json or csv
        #[arg(long)]
        save: Option<ReportFormat>,
    },
    /// Assess every record in a CSV or JSON file
    Batch {
        file: PathBuf,
        /// Batch report path (default: <reports_dir>/batch_predictions.json)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Score the trained models on a labelled CSV
    Evaluate {
        #[arg(long)]
        data: Option<PathBuf>,
    },
}

fn config_path(cli: Option<PathBuf>) -> PathBuf {
    cli.or_else(|| std::env::var("DRYEYE_CONFIG_PATH").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("config.json"))
}

fn read_input(input: &str) -> Result<PatientRecord> {
    let trimmed = input.trim();
    let text = if trimmed.starts_with('{') {
        trimmed.to_string()
    } else {
        std::fs::read_to_string(trimmed).map_err(|e| Error::data_load(trimmed, e.to_string()))?
    };
    Ok(serde_json::from_str(&text)?)
}

fn prompt(lines: &mut impl Iterator<Item = io::Result<String>>, label: &str) -> Result<String> {
    print!("{}: ", label);
    io::stdout().flush()?;
    match lines.next() {
        Some(line) => Ok(line?.trim().to_string()),
        None => Err(Error::InvalidInput("input closed".into())),
    }
}

fn prompt_number(lines: &mut impl Iterator<Item = io::Result<String>>, label: &str) -> Result<f64> {
    let answer = prompt(lines, label)?;
    answer
        .parse::<f64>()
        .map_err(|_| Error::InvalidInput(format!("{}: expected a number, got {:?}", label, answer)))
}

fn prompt_patient() -> Result<PatientRecord> {
    println!("Interactive Dry Eye Risk Assessment");
    println!("{}", "=".repeat(40));
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    let mut record = PatientRecord::new();
    record.insert("age", prompt_number(&mut lines, "Age")?);
    let gender = prompt(&mut lines, "Gender (M/F)")?;
    record.insert("gender", if gender.eq_ignore_ascii_case("m") { "M" } else { "F" });
    record.insert("screen_time", prompt_number(&mut lines, "Daily screen time (hours)")?);
    record.insert("blink_frequency", prompt_number(&mut lines, "Blink frequency (per minute)")?);
    record.insert("sleep_quality", prompt_number(&mut lines, "Sleep quality (1-5)")?);
    record.insert("stress_level", prompt_number(&mut lines, "Stress level (1-5)")?);
    record.insert("physical_activity", prompt_number(&mut lines, "Physical activity (minutes/day)")?);
    record.insert("humidity", prompt_number(&mut lines, "Home humidity (%)")?);
    let ac = prompt(&mut lines, "Use air conditioner (Y/N)")?;
    record.insert("air_conditioner_use", if ac.eq_ignore_ascii_case("y") { "Yes" } else { "No" });
    Ok(record)
}

fn print_assessment(assessment: &PatientAssessment) {
    let rule = "=".repeat(40);
    println!("\n{}\nASSESSMENT RESULTS\n{}", rule, rule);
    let risk = &assessment.risk;
    println!("Risk Probability: {:.3}", risk.probability);
    println!("Risk Category: {}", risk.category);
    println!("Confidence: {}", risk.confidence);
    let level = assessment.severity.level();
    println!("\nSeverity Level: {}", level.index());
    println!("Description: {}", level.name());
    println!("Progression Risk: {}", assessment.progression);
    println!("{}", assessment.monitoring);
    for alert in &assessment.alerts {
        println!("[{:?}] {} ({})", alert.level, alert.message, alert.action);
    }
    println!("\nTop Recommendations:");
    for (i, rec) in assessment.action_plan.immediate_actions.iter().take(5).enumerate() {
        println!("{}. {}", i + 1, rec.message);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = SystemConfig::load(&config_path(cli.config));
    StructuredLogger::init(config.log.json, &config.log.level);
    let mut system = DryEyeSystem::new(config);

    match cli.command {
        Command::Train { data } => {
            let summary = system.train(data.as_deref())?;
            println!("Training completed on {} rows", summary.training_rows);
            if let Some(m) = &summary.metrics.risk {
                println!("Risk model: accuracy {:.3}, AUC {:.3}, F1 {:.3}", m.accuracy, m.auc_roc, m.f1_score);
            }
            if let Some(m) = &summary.metrics.severity {
                println!("Severity model: accuracy {:.3}, F1 {:.3}", m.accuracy, m.f1_score);
            }
            if let Some(cv) = &summary.cross_validation {
                println!("Cross-validation: {:.3} (+/- {:.3})", cv.mean, cv.std * 2.0);
            }
            println!("Selected features: {}", summary.selected_features.join(", "));
        }
        Command::Predict { input, save } => {
            system.load_models()?;
            let record = match input {
                Some(s) => read_input(&s)?,
                None => prompt_patient()?,
            };
            println!("\nAnalyzing...");
            let assessment = system.predict_for_patient(&record)?;
            print_assessment(&assessment);
            if let Some(format) = save {
                let path = default_report_path(&system.config().reports_dir, format);
                let saved = save_report(&assessment.report, format, &path)?;
                println!("Report saved to: {}", saved.display());
            }
        }
        Command::Batch { file, output } => {
            system.load_models()?;
            let records = load_records(&file)?;
            println!("Processing {} patients...", records.len());
            let output = output.unwrap_or_else(|| system.config().reports_dir.join("batch_predictions.json"));
            let audit_path = output.with_extension("ndjson");
            if let Some(parent) = audit_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let mut audit = io::BufWriter::new(std::fs::File::create(&audit_path)?);
            let batch = system.batch_predict(&records, &mut audit)?;
            audit.flush()?;
            save_batch_report(&batch, &output)?;

            println!("\nBatch processing completed!");
            println!("Processed {} patients successfully", batch.individual_reports.len());
            if !batch.failures.is_empty() {
                println!("{} records failed; see {}", batch.failures.len(), audit_path.display());
            }
            if let Some(stats) = &batch.summary_statistics {
                println!("Average risk: {:.3}", stats.average_risk);
                println!("High risk patients: {}", stats.high_risk_count);
            }
            println!("Report saved to: {}", output.display());
        }
        Command::Evaluate { data } => {
            system.load_models()?;
            let report = system.evaluate(data.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        error!(error = %e, "command failed");
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
    info!("done");
}
