//! dsheet - evaluate datasheet formulas against JSON fixtures
//!
//! A fixture is a JSON object `{"datasheets": [...]}` where each datasheet is
//! `{"id", "name", "fields": [...], "records": [...]}`.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use datasheet::prelude::*;
use datasheet::{LintWarning, ValueKind};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dsheet")]
#[command(author, version, about = "Datasheet formula evaluation tool")]
struct Cli {
    /// Log engine internals (-v debug, -vv trace). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a Formula field (or an ad-hoc expression) for records
    Eval {
        /// Fixture file (JSON)
        fixture: PathBuf,

        /// Datasheet id
        #[arg(short, long)]
        datasheet: String,

        /// Formula field id the expression is evaluated as
        #[arg(short, long)]
        field: String,

        /// Only this record (default: every record)
        #[arg(short, long)]
        record: Option<String>,

        /// Expression to evaluate instead of the field's own
        #[arg(short, long)]
        expression: Option<String>,

        /// Clock for TODAY()/NOW(), RFC 3339 (default: system clock)
        #[arg(long)]
        now: Option<String>,

        /// Print raw values instead of formatted ones
        #[arg(long)]
        raw: bool,
    },

    /// Parse an expression and report lint warnings or syntax errors
    Check {
        /// Expression text
        expression: String,
    },

    /// Calculate a Formula column for every record
    Calc {
        /// Fixture file (JSON)
        fixture: PathBuf,

        /// Datasheet id
        #[arg(short, long)]
        datasheet: String,

        /// Formula field id
        #[arg(short, long)]
        field: String,

        /// Clock for TODAY()/NOW(), RFC 3339 (default: system clock)
        #[arg(long)]
        now: Option<String>,
    },
}

#[derive(Deserialize)]
struct Fixture {
    datasheets: Vec<Datasheet>,
}

impl Fixture {
    fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read '{}'", path.display()))?;
        let fixture: Fixture = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse fixture '{}'", path.display()))?;
        tracing::debug!(
            path = %path.display(),
            datasheets = fixture.datasheets.len(),
            "loaded fixture"
        );
        Ok(fixture)
    }

    fn datasheet(&self, id: &str) -> Result<&Datasheet> {
        self.datasheets
            .iter()
            .find(|ds| ds.id == id)
            .with_context(|| format!("Datasheet '{}' not found in fixture", id))
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Eval {
            fixture,
            datasheet,
            field,
            record,
            expression,
            now,
            raw,
        } => eval(
            &fixture,
            &datasheet,
            &field,
            record.as_deref(),
            expression.as_deref(),
            now.as_deref(),
            raw,
        ),
        Commands::Check { expression } => check(&expression),
        Commands::Calc {
            fixture,
            datasheet,
            field,
            now,
        } => calc(&fixture, &datasheet, &field, now.as_deref()),
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn parse_now(now: Option<&str>) -> Result<DateTime<Utc>> {
    match now {
        Some(text) => DateTime::parse_from_rfc3339(text)
            .map(|dt| dt.with_timezone(&Utc))
            .with_context(|| format!("Invalid --now '{}', expected RFC 3339", text)),
        None => Ok(Utc::now()),
    }
}

/// Print `expression` with a caret under the byte offset
fn print_caret(expression: &str, offset: usize, message: &str) {
    let column = expression.get(..offset).map_or(0, |s| s.chars().count());
    eprintln!("  {}", expression);
    eprintln!("  {}^ {}", " ".repeat(column), message);
}

fn print_warnings(expression: &str, warnings: &[LintWarning]) {
    for warning in warnings {
        eprintln!("warning: {}", warning.message);
        print_caret(expression, warning.offset, "here");
    }
}

fn parse_or_report(expression: &str) -> Result<ParsedExpression> {
    match parse_expression(expression) {
        Ok(parsed) => {
            print_warnings(expression, parsed.warnings());
            Ok(parsed)
        }
        Err(err) => {
            eprintln!("error: {}", err);
            if let Some(offset) = err.offset() {
                print_caret(expression, offset, "here");
            }
            Err(anyhow::Error::new(err).context("Expression does not parse"))
        }
    }
}

fn render(value: &TypedValue, raw: bool) -> String {
    match (&value.value, raw) {
        (Value::Error(err), _) => format!("{} {}", err.kind.badge(), err.message),
        (other, true) => format!("{}({})", value.kind(), other.to_text()),
        (_, false) if value.kind() == ValueKind::Blank => String::new(),
        (_, false) => value.display(),
    }
}

#[allow(clippy::too_many_arguments)]
fn eval(
    fixture: &Path,
    datasheet_id: &str,
    field_id: &str,
    record_id: Option<&str>,
    expression: Option<&str>,
    now: Option<&str>,
    raw: bool,
) -> Result<()> {
    let fixture = Fixture::load(fixture)?;
    let sheet = fixture.datasheet(datasheet_id)?;
    let field = sheet
        .fields
        .require(field_id)
        .with_context(|| format!("Field '{}' not in datasheet '{}'", field_id, sheet.id))?;

    let expression = match (expression, field.formula()) {
        (Some(text), _) => text,
        (None, Some(property)) => property.expression.as_str(),
        (None, None) => bail!("Field '{}' is not a Formula field; pass --expression", field_id),
    };
    let parsed = parse_or_report(expression)?;
    let now = parse_now(now)?;

    let records: Vec<&Record> = match record_id {
        Some(id) => vec![sheet
            .record(id)
            .with_context(|| format!("Record '{}' not in datasheet '{}'", id, sheet.id))?],
        None => sheet.records.iter().collect(),
    };

    for record in records {
        let ctx =
            EvaluationContext::new(&sheet.fields, record, now).with_sources(&fixture.datasheets);
        let value = datasheet::evaluate_parsed(&parsed, &ctx, field);
        println!("{}\t{}", record.id, render(&value, raw));
    }

    Ok(())
}

fn check(expression: &str) -> Result<()> {
    let parsed = parse_or_report(expression)?;
    let references = parsed.field_references();
    if references.is_empty() {
        println!("ok");
    } else {
        println!("ok, references: {}", references.join(", "));
    }
    Ok(())
}

fn calc(fixture: &Path, datasheet_id: &str, field_id: &str, now: Option<&str>) -> Result<()> {
    let fixture = Fixture::load(fixture)?;
    let sheet = fixture.datasheet(datasheet_id)?;
    let options = CalculationOptions {
        now: Some(parse_now(now)?),
        ..CalculationOptions::default()
    };

    let output = sheet
        .calculate_field(field_id, &options, &fixture.datasheets)
        .with_context(|| format!("Failed to calculate field '{}'", field_id))?;

    for entry in &output.values {
        println!("{}\t{}", entry.record_id, render(&entry.value, false));
    }
    eprintln!(
        "Calculated {} records ({} errors)",
        output.stats.records, output.stats.errors
    );

    Ok(())
}
