//! Column rules that turn a `RawTable` into the warehouse shape.
//!
//! Every rule is per-row and total: a bad cell is replaced with a default rather
//! than failing the file. The only hard failure is a source column that is missing
//! from the header entirely.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use std::collections::BTreeMap;
use tracing::debug;

use crate::config::TransformConfig;
use crate::constants::*;
use crate::domain::{RawRecord, RawTable, TargetRow, TargetTable};
use crate::error::{LoaderError, Result};

// Offset-bearing layouts tried after RFC 3339
const OFFSET_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y/%m/%d %H:%M:%S%.f%:z",
];

// Layouts without an offset, read as UTC
const NAIVE_FORMATS: [&str; 5] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%Y/%m/%d"];

#[derive(Debug, Clone)]
pub struct Transformer {
    country_codes: BTreeMap<String, String>,
    high_value_threshold: f64,
}

impl Transformer {
    pub fn new(country_codes: BTreeMap<String, String>, high_value_threshold: f64) -> Self {
        Self {
            country_codes,
            high_value_threshold,
        }
    }

    pub fn from_config(config: &TransformConfig) -> Self {
        Self::new(config.country_codes.clone(), config.high_value_threshold)
    }

    pub fn transform(&self, raw: &RawTable) -> Result<TargetTable> {
        self.transform_at(raw, Utc::now())
    }

    /// Applies the rules with `now` as both the fill value for bad timestamps and
    /// the processing time stamped on every row.
    pub fn transform_at(&self, raw: &RawTable, now: DateTime<Utc>) -> Result<TargetTable> {
        let missing: Vec<&str> = REQUIRED_SOURCE_COLUMNS
            .iter()
            .copied()
            .filter(|col| !raw.has_column(col))
            .collect();
        if !missing.is_empty() {
            return Err(LoaderError::Transform(format!(
                "source is missing column(s) {:?}; found {:?}",
                missing,
                raw.headers()
            )));
        }

        let processing_datetime = now.naive_utc();
        let rows: Vec<TargetRow> = raw
            .records()
            .map(|rec| self.transform_record(&rec, now, processing_datetime))
            .collect();

        let filled = rows.iter().filter(|r| r.event_timestamp == now).count();
        debug!(rows = rows.len(), timestamps_filled = filled, "Transformed rows");
        Ok(TargetTable { rows })
    }

    fn transform_record(
        &self,
        rec: &RawRecord<'_>,
        now: DateTime<Utc>,
        processing_datetime: NaiveDateTime,
    ) -> TargetRow {
        let value = coerce_value(rec.get(COL_VALUE));
        TargetRow {
            user_id: rec.get(COL_USER_ID).map(str::to_string),
            event_timestamp: rec
                .get(COL_EVENT_TIMESTAMP)
                .and_then(parse_timestamp)
                .unwrap_or(now),
            country_code: self.country_code(rec.get(COL_COUNTRY)).to_string(),
            value,
            is_high_value: value > self.high_value_threshold,
            processing_datetime,
        }
    }

    /// Uppercased exact lookup; anything unknown, padded names included, becomes the sentinel.
    pub fn country_code(&self, country: Option<&str>) -> &str {
        country
            .map(str::to_uppercase)
            .and_then(|c| self.country_codes.get(&c))
            .map(String::as_str)
            .unwrap_or(COUNTRY_SENTINEL)
    }
}

/// Parses the timestamp layouts seen in uploads, normalized to UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    // "2024-01-01 00:00:00Z" is not RFC 3339 but is common
    let naive_part = s
        .strip_suffix('Z')
        .or_else(|| s.strip_suffix('z'))
        .unwrap_or(s);
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(naive_part, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return date
                .and_hms_opt(0, 0, 0)
                .map(|naive| Utc.from_utc_datetime(&naive));
        }
    }
    None
}

/// Finite float or `0.0`.
pub fn coerce_value(raw: Option<&str>) -> f64 {
    raw.and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TransformConfig;

    fn transformer() -> Transformer {
        Transformer::from_config(&TransformConfig::default())
    }

    fn raw(rows: &[[&str; 4]]) -> RawTable {
        let mut table = RawTable::new(
            REQUIRED_SOURCE_COLUMNS.iter().map(|c| c.to_string()).collect(),
        );
        for row in rows {
            table.push_row(row.iter().map(|v| v.to_string()).collect());
        }
        table
    }

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 30, 0).unwrap()
    }

    #[test]
    fn test_unparseable_timestamp_high_value_row() {
        let now = fixed_now();
        let out = transformer()
            .transform_at(&raw(&[["u1", "not-a-date", "malaysia", "150"]]), now)
            .unwrap();
        let row = &out.rows[0];
        assert_eq!(row.user_id.as_deref(), Some("u1"));
        assert_eq!(row.event_timestamp, now);
        assert_eq!(row.country_code, "MY");
        assert_eq!(row.value, 150.0);
        assert!(row.is_high_value);
        assert_eq!(row.processing_datetime, now.naive_utc());
    }

    #[test]
    fn test_unknown_country_and_bad_value() {
        let out = transformer()
            .transform_at(
                &raw(&[["u2", "2024-01-01T00:00:00Z", "Vietnam", "abc"]]),
                fixed_now(),
            )
            .unwrap();
        let row = &out.rows[0];
        assert_eq!(row.country_code, "OT");
        assert_eq!(row.value, 0.0);
        assert!(!row.is_high_value);
        assert_eq!(
            row.event_timestamp,
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_country_codes_are_closed_set() {
        let t = transformer();
        let inputs = [
            Some("Singapore"),
            Some("THAILAND"),
            Some("indonesia"),
            Some(" indonesia "),
            Some("Malaysia\t"),
            Some("my"),
            Some(""),
            Some("nan"),
            None,
        ];
        let codes: Vec<&str> = inputs.iter().map(|c| t.country_code(*c)).collect();
        assert_eq!(codes, vec!["SG", "TH", "ID", "OT", "OT", "OT", "OT", "OT", "OT"]);
    }

    #[test]
    fn test_blank_user_id_becomes_null() {
        let out = transformer()
            .transform_at(&raw(&[["", "2024-01-01", "Singapore", "5"], ["42", "", "", ""]]), fixed_now())
            .unwrap();
        assert_eq!(out.rows[0].user_id, None);
        assert_eq!(out.rows[1].user_id.as_deref(), Some("42"));

        let ndjson = out.to_ndjson().unwrap();
        let first: serde_json::Value = serde_json::from_str(ndjson.lines().next().unwrap()).unwrap();
        assert!(first["user_id"].is_null());
        assert_eq!(first["country_code"], "SG");
    }

    #[test]
    fn test_high_value_boundary() {
        let out = transformer()
            .transform_at(
                &raw(&[
                    ["a", "", "", "100"],
                    ["b", "", "", "100.0001"],
                    ["c", "", "", "-500"],
                    ["d", "", "", ""],
                ]),
                fixed_now(),
            )
            .unwrap();
        let flags: Vec<bool> = out.rows.iter().map(|r| r.is_high_value).collect();
        assert_eq!(flags, vec![false, true, false, false]);
        assert_eq!(out.rows[3].value, 0.0);
    }

    #[test]
    fn test_processing_datetime_shared_and_deterministic() {
        let input = raw(&[
            ["a", "bad", "Malaysia", "1"],
            ["b", "2024-02-29 10:00:00", "Peru", "200"],
            ["c", "", "", ""],
        ]);
        let t = transformer();
        let first = t.transform_at(&input, fixed_now()).unwrap();
        let second = t.transform_at(&input, fixed_now()).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.to_ndjson().unwrap(), second.to_ndjson().unwrap());
        assert!(first
            .rows
            .iter()
            .all(|r| r.processing_datetime == fixed_now().naive_utc()));
    }

    #[test]
    fn test_missing_column_is_transform_error() {
        let mut table = RawTable::new(vec!["user_id".into(), "event_timestamp".into(), "value".into()]);
        table.push_row(vec!["u1".into(), "".into(), "1".into()]);
        let err = transformer().transform_at(&table, fixed_now()).unwrap_err();
        match err {
            LoaderError::Transform(msg) => assert!(msg.contains("country")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_extra_columns_dropped() {
        let mut table = RawTable::new(vec![
            "session".into(),
            "user_id".into(),
            "event_timestamp".into(),
            "country".into(),
            "value".into(),
        ]);
        table.push_row(vec!["s".into(), "u9".into(), "".into(), "Thailand".into(), "5".into()]);
        let out = transformer().transform_at(&table, fixed_now()).unwrap();
        let json: serde_json::Value =
            serde_json::from_str(out.to_ndjson().unwrap().trim()).unwrap();
        assert_eq!(json.as_object().unwrap().len(), 6);
        assert!(json.get("session").is_none());
        assert_eq!(json["country_code"], "TH");
    }

    #[test]
    fn test_parse_timestamp_layouts() {
        let midnight = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        for input in [
            "2024-01-01T00:00:00Z",
            "2024-01-01T08:00:00+08:00",
            "2024-01-01 00:00:00",
            "2024-01-01 00:00:00Z",
            "2024-01-01T00:00:00.000",
            "2023-12-31 19:00:00-05:00",
            "2024/01/01 00:00:00",
            "2024-01-01",
        ] {
            assert_eq!(parse_timestamp(input), Some(midnight), "{}", input);
        }
        for input in ["", "not-a-date", "2024-13-01", "yesterday", "1704067200"] {
            assert_eq!(parse_timestamp(input), None, "{}", input);
        }
    }

    #[test]
    fn test_coerce_value() {
        assert_eq!(coerce_value(Some(" 42.5 ")), 42.5);
        assert_eq!(coerce_value(Some("1e3")), 1000.0);
        assert_eq!(coerce_value(Some("NaN")), 0.0);
        assert_eq!(coerce_value(Some("inf")), 0.0);
        assert_eq!(coerce_value(Some("1,000")), 0.0);
        assert_eq!(coerce_value(None), 0.0);
    }
}
