pub mod classify;
pub mod derive;
pub mod fetch;
pub mod mining;
pub mod notify;
pub mod pipeline;
pub mod tokenize;

pub use fetch::{FetchOutcome, FetchSettings, Fetcher};
pub use notify::{Notifier, RunReport};
pub use pipeline::{build_plan, plan_file, process_and_notify, process_file, read_raw_lines};
