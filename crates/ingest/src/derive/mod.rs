//! Secondary tables computed from one record family.
//!
//! Every deriver is a pure function of its family's records and returns an
//! empty table when nothing qualifies.

pub mod document;
pub mod request;

use std::collections::HashMap;

use logsift_core::model::record::LogRecord;
use logsift_core::model::table::Table;
use logsift_core::model::value::Value;

use crate::classify::Partition;

/// First non-null value of `field` per correlation id, in input order.
pub struct FirstValueIndex<'a> {
    values: HashMap<&'a str, &'a Value>,
}

impl<'a> FirstValueIndex<'a> {
    pub fn build(records: &'a [LogRecord], id_key: &str, field: &str) -> Self {
        let mut values = HashMap::new();
        for record in records {
            let (Some(id), Some(value)) = (record.text(id_key), record.get(field)) else {
                continue;
            };
            values.entry(id).or_insert(value);
        }
        Self { values }
    }

    pub fn get(&self, id: &str) -> Option<&'a Value> {
        self.values.get(id).copied()
    }

    pub fn text(&self, id: &str) -> Option<&'a str> {
        self.get(id).and_then(Value::as_str)
    }
}

/// Ids of `records` in first-seen order, each paired with the rows sharing it.
pub(crate) fn group_by_id<'a>(
    records: &'a [LogRecord],
    id_key: &str,
) -> Vec<(&'a str, Vec<&'a LogRecord>)> {
    let mut order: Vec<(&'a str, Vec<&'a LogRecord>)> = Vec::new();
    let mut slots: HashMap<&'a str, usize> = HashMap::new();
    for record in records {
        let Some(id) = record.text(id_key) else {
            continue;
        };
        let slot = *slots.entry(id).or_insert_with(|| {
            order.push((id, Vec::new()));
            order.len() - 1
        });
        order[slot].1.push(record);
    }
    order
}

pub(crate) fn is_error_level(record: &LogRecord) -> bool {
    record.text("level") != Some("INFO")
}

/// Runs all six derivers over a classified batch.
pub fn derive_all(partition: &Partition) -> Vec<Table> {
    vec![
        request::errors(&partition.requests),
        request::logins(&partition.requests),
        request::path_durations(&partition.requests),
        document::errors(&partition.documents),
        document::times(&partition.documents),
        document::durations(&partition.documents),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(id: &str, status: Option<&str>) -> LogRecord {
        let mut r: LogRecord = [("req_id", id)].into_iter().collect();
        r.insert("status_code", status);
        r
    }

    #[test]
    fn index_keeps_first_non_null() {
        let records = vec![
            rec("R1", None),
            rec("R1", Some("500")),
            rec("R1", Some("200")),
            rec("R2", None),
        ];
        let index = FirstValueIndex::build(&records, "req_id", "status_code");
        assert_eq!(index.text("R1"), Some("500"));
        assert_eq!(index.get("R2"), None);
        assert_eq!(index.get("R3"), None);
    }

    #[test]
    fn grouping_preserves_first_seen_order() {
        let records = vec![rec("B", None), rec("A", None), rec("B", Some("1"))];
        let groups = group_by_id(&records, "req_id");
        let ids: Vec<_> = groups.iter().map(|(id, rows)| (*id, rows.len())).collect();
        assert_eq!(ids, vec![("B", 2), ("A", 1)]);
    }

    #[test]
    fn derive_all_yields_six_tables_for_empty_input() {
        let tables = derive_all(&Partition::default());
        assert_eq!(tables.len(), 6);
        assert!(tables.iter().all(Table::is_empty));
    }
}
