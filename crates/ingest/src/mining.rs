//! Turns narrative document messages into numeric fields.

use std::sync::OnceLock;

use logsift_core::model::record::LogRecord;
use logsift_core::model::value::Value;
use regex::Regex;

const INVOICES_CREATED_PREFIX: &str = "msg: Number of invoices created - ";
const INVOICE_FINISHED_PREFIX: &str = "msg: PROCESS invoice finished";
pub const INVOICE_FINISHED_MSG: &str = "PROCESS invoice finished";

struct Patterns {
    invoices_created: Regex,
    invoice_finished: Regex,
    input_tokens: Regex,
    output_tokens: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        invoices_created: Regex::new(r"Number of invoices created - (\d+)")
            .expect("invoices pattern is valid"),
        invoice_finished: Regex::new(r"PROCESS invoice finished in (\d+\.\d+) seconds")
            .expect("finish pattern is valid"),
        input_tokens: Regex::new(r"Input tokens (\d+)").expect("input tokens pattern is valid"),
        output_tokens: Regex::new(r"Output tokens (\d+)").expect("output tokens pattern is valid"),
    })
}

fn capture_int(re: &Regex, text: &str) -> Option<i64> {
    re.captures(text).and_then(|c| c[1].parse().ok())
}

/// Applies the first matching mining rule to the record's `msg`.
pub fn mine_document_message(record: &mut LogRecord) {
    let Some(msg) = record.text("msg").map(str::to_string) else {
        return;
    };
    let p = patterns();

    if msg.starts_with(INVOICES_CREATED_PREFIX) {
        if let Some(n) = capture_int(&p.invoices_created, &msg) {
            record.insert("number_of_invoices_created", n);
        }
        record.insert("msg", Value::Null);
    } else if msg.starts_with(INVOICE_FINISHED_PREFIX) {
        let seconds = p
            .invoice_finished
            .captures(&msg)
            .and_then(|c| c[1].parse::<f64>().ok());
        match seconds {
            Some(secs) => {
                record.insert("process_invoice_finished_time", secs);
                record.insert("msg", INVOICE_FINISHED_MSG);
            }
            None => record.insert("msg", Value::Null),
        }
    } else if msg.contains("Input tokens") && msg.contains("Output tokens") {
        if let Some(n) = capture_int(&p.input_tokens, &msg) {
            record.insert("input_tokens", n);
        }
        if let Some(n) = capture_int(&p.output_tokens, &msg) {
            record.insert("output_tokens", n);
        }
        record.insert("msg", Value::Null);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(msg: &str) -> LogRecord {
        let mut r: LogRecord = [("doc_id", "[DOC_1]")].into_iter().collect();
        r.insert("msg", msg);
        mine_document_message(&mut r);
        r
    }

    #[test]
    fn extracts_invoice_count() {
        let r = doc("msg: Number of invoices created - 7");
        assert_eq!(r.get("number_of_invoices_created"), Some(&Value::Int(7)));
        assert_eq!(r.raw("msg"), Some(&Value::Null));
    }

    #[test]
    fn invoice_count_without_digits_still_clears_msg() {
        let r = doc("msg: Number of invoices created - many");
        assert!(!r.contains("number_of_invoices_created"));
        assert_eq!(r.raw("msg"), Some(&Value::Null));
    }

    #[test]
    fn extracts_finish_time_and_rewrites_msg() {
        let r = doc("msg: PROCESS invoice finished in 12.75 seconds");
        assert_eq!(r.get("process_invoice_finished_time"), Some(&Value::Float(12.75)));
        assert_eq!(r.text("msg"), Some(INVOICE_FINISHED_MSG));
    }

    #[test]
    fn finish_without_float_clears_msg() {
        let r = doc("msg: PROCESS invoice finished in 12 seconds");
        assert!(!r.contains("process_invoice_finished_time"));
        assert_eq!(r.raw("msg"), Some(&Value::Null));
    }

    #[test]
    fn extracts_token_counts() {
        let r = doc("LLM call done. Input tokens 1200, Output tokens 345");
        assert_eq!(r.get("input_tokens"), Some(&Value::Int(1200)));
        assert_eq!(r.get("output_tokens"), Some(&Value::Int(345)));
        assert_eq!(r.raw("msg"), Some(&Value::Null));
    }

    #[test]
    fn leaves_other_messages_alone() {
        let r = doc("OCR step finished");
        assert_eq!(r.text("msg"), Some("OCR step finished"));
        let r = doc("Input tokens 5 only");
        assert_eq!(r.text("msg"), Some("Input tokens 5 only"));
        assert!(!r.contains("input_tokens"));
    }
}
