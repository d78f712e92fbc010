use chrono::NaiveDateTime;
use logsift_core::model::table::{PersistencePlan, RunSummary, TableName};
use logsift_core::model::value::TIMESTAMP_FORMAT;
use logsift_ingest::FetchOutcome;
use logsift_store::StoreStatus;
use owo_colors::OwoColorize;
use serde_json::{Map, Value, json};
use uuid::Uuid;

pub fn counts_json(counts: &[(TableName, usize)]) -> Value {
    let map: Map<String, Value> = counts
        .iter()
        .map(|(t, n)| (t.as_str().to_string(), Value::from(*n)))
        .collect();
    Value::Object(map)
}

fn ts_json(ts: Option<NaiveDateTime>) -> Value {
    ts.map(|t| Value::from(t.format(TIMESTAMP_FORMAT).to_string()))
        .unwrap_or(Value::Null)
}

pub fn process_json(run_id: Uuid, summary: Option<&RunSummary>) -> Value {
    json!({
        "run_id": run_id.to_string(),
        "success": summary.is_some(),
        "tables": summary.map(|s| counts_json(&s.counts)),
        "total_rows": summary.map(RunSummary::total),
    })
}

pub fn plan_json(plan: &PersistencePlan) -> Value {
    json!({
        "tables": counts_json(&plan.row_counts().counts),
        "total_rows": plan.total_rows(),
    })
}

pub fn status_json(status: &StoreStatus) -> Value {
    json!({
        "db_path": status.db_path,
        "db_size_bytes": status.db_size_bytes,
        "tables": counts_json(&status.tables),
        "watermark": ts_json(status.watermark),
    })
}

pub fn fetch_json(outcome: &FetchOutcome) -> Value {
    json!({
        "path": outcome.path.display().to_string(),
        "start": outcome.start,
        "pages": outcome.pages,
        "hits": outcome.hits,
    })
}

fn print_counts(counts: &[(TableName, usize)]) {
    for (table, rows) in counts {
        let rows = if *rows == 0 {
            rows.bright_black().to_string()
        } else {
            rows.green().to_string()
        };
        println!("  {:<20} {rows}", table.as_str());
    }
}

pub fn print_process_human(run_id: Uuid, summary: Option<&RunSummary>) {
    match summary {
        Some(summary) => {
            println!("{} run={run_id}", "processed".green());
            print_counts(&summary.counts);
            println!("-- {} rows saved --", summary.total());
        }
        None => {
            println!("{} run={run_id}", "no logs were processed".yellow());
        }
    }
}

pub fn print_plan_human(plan: &PersistencePlan) {
    println!("{}", "dry run (nothing saved)".cyan());
    print_counts(&plan.row_counts().counts);
    println!("-- {} rows planned --", plan.total_rows());
}

pub fn print_status_human(status: &StoreStatus) {
    println!("db_path={}", status.db_path);
    println!("db_size_bytes={}", status.db_size_bytes);
    print_counts(&status.tables);
    match status.watermark {
        Some(ts) => println!("watermark={}", ts.format(TIMESTAMP_FORMAT)),
        None => println!("watermark=-"),
    }
}

pub fn print_fetch_human(outcome: &FetchOutcome) {
    println!(
        "fetched {} hits in {} pages since {}",
        outcome.hits, outcome.pages, outcome.start
    );
    println!("raw file: {}", outcome.path.display());
}
