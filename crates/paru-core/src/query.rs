//! Dashboard views over the prediction log.
//!
//! Every function takes a freshly read [`LogTable`]; nothing is cached between calls.

use crate::schema::{Breakdown, Summary};
use crate::store::{LogTable, TIMESTAMP_FORMAT};
use chrono::{NaiveDate, NaiveDateTime};
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;
use thiserror::Error;

/// Columns shown by the history listing, in display order.
pub const DISPLAY_COLUMNS: [&str; 12] = [
    "usia_tua",
    "jenis_kelamin_wanita",
    "merokok_pasif",
    "bekerja_ya",
    "rumah_tangga_ya",
    "aktivitas_begadang_ya",
    "aktivitas_olahraga_sering",
    "asuransi_tidak",
    "penyakit_bawaan_tidak",
    "prediction",
    "probability",
    "timestamp",
];

/// Human-readable labels for the given-side indicators: `(column, [label for 0, label for 1])`.
pub static CATEGORY_LABELS: [(&str, [&str; 2]); 9] = [
    ("usia_tua", ["Muda", "Tua"]),
    ("jenis_kelamin_wanita", ["Pria", "Wanita"]),
    ("merokok_pasif", ["Aktif", "Pasif"]),
    ("bekerja_ya", ["Tidak", "Ya"]),
    ("rumah_tangga_ya", ["Tidak", "Ya"]),
    ("aktivitas_begadang_ya", ["Tidak", "Ya"]),
    ("aktivitas_olahraga_sering", ["Jarang", "Sering"]),
    ("asuransi_tidak", ["Ya", "Tidak"]),
    ("penyakit_bawaan_tidak", ["Ya", "Tidak"]),
];

const PREDICTION: &str = "prediction";

#[derive(Debug, Error, PartialEq)]
pub enum QueryError {
    #[error("Kolom '{0}' tidak ditemukan dalam data.")]
    UnknownColumn(String),
    #[error("Kolom prediction tidak ditemukan dalam data.")]
    MissingPrediction,
    #[error("row {row}: column '{column}' holds '{value}', expected 0 or 1")]
    InvalidCell {
        column: String,
        row: usize,
        value: String,
    },
}

pub fn category_labels(column: &str) -> Option<&'static [&'static str; 2]> {
    CATEGORY_LABELS
        .iter()
        .find(|(c, _)| *c == column)
        .map(|(_, labels)| labels)
}

/// At-risk vs not-at-risk totals; empty prediction cells count as not at risk.
pub fn summary(table: &LogTable) -> Result<Summary, QueryError> {
    let col = table.column(PREDICTION).ok_or(QueryError::MissingPrediction)?;
    let mut berisiko = 0u64;
    for (i, cell) in table.column_values(col).enumerate() {
        if cell.is_empty() {
            continue;
        }
        match binary_cell(cell) {
            Some(v) => berisiko += u64::from(v),
            None => {
                return Err(QueryError::InvalidCell {
                    column: PREDICTION.to_string(),
                    row: i + 1,
                    value: cell.to_string(),
                })
            }
        }
    }
    Ok(Summary {
        berisiko,
        tidak_berisiko: table.len() as u64 - berisiko,
    })
}

/// Display projection of every row, numbered from 1.
pub fn history(table: &LogTable) -> Vec<Map<String, Value>> {
    let cols: Vec<(&str, usize)> = DISPLAY_COLUMNS
        .iter()
        .filter_map(|name| table.column(name).map(|i| (*name, i)))
        .collect();

    table
        .rows()
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let mut obj = Map::with_capacity(cols.len() + 1);
            obj.insert("no".into(), Value::from(i + 1));
            for &(name, idx) in &cols {
                let cell = row[idx].as_str();
                let v = match name {
                    "timestamp" => format_timestamp(cell).map_or(Value::Null, Value::String),
                    "probability" => format_percent(cell).map_or(Value::Null, Value::String),
                    _ => typed_cell(cell),
                };
                obj.insert(name.to_string(), v);
            }
            obj
        })
        .collect()
}

/// Counts per (label, prediction) for one column.
///
/// Known indicator columns are relabelled via [`CATEGORY_LABELS`]; cells outside the
/// label map, empty cells, and rows with a non-integer prediction are left out.
/// Labels are ordered numerically when all of them are numbers, else as strings.
pub fn breakdown(table: &LogTable, column: &str) -> Result<Breakdown, QueryError> {
    let col = table
        .column(column)
        .ok_or_else(|| QueryError::UnknownColumn(column.to_string()))?;
    let pred_col = table.column(PREDICTION).ok_or(QueryError::MissingPrediction)?;
    let labels_for = category_labels(column);

    // label -> (berisiko, tidak_berisiko)
    let mut groups: BTreeMap<String, (u64, u64)> = BTreeMap::new();
    for row in table.rows() {
        let Some(pred) = integer_cell(&row[pred_col]) else {
            continue;
        };
        let cell = row[col].as_str();
        let label = match labels_for {
            Some(map) => match binary_cell(cell) {
                Some(v) => map[usize::from(v)].to_string(),
                None => continue,
            },
            None if cell.is_empty() => continue,
            None => cell.to_string(),
        };
        let slot = groups.entry(label).or_default();
        match pred {
            1 => slot.0 += 1,
            0 => slot.1 += 1,
            _ => {}
        }
    }

    let mut entries: Vec<(String, (u64, u64))> = groups.into_iter().collect();
    let numeric: Option<Vec<f64>> = entries.iter().map(|(l, _)| l.parse::<f64>().ok()).collect();
    if let Some(keys) = numeric {
        let mut keyed: Vec<(f64, (String, (u64, u64)))> = keys.into_iter().zip(entries).collect();
        keyed.sort_by(|a, b| a.0.total_cmp(&b.0));
        entries = keyed.into_iter().map(|(_, e)| e).collect();
    }

    let mut out = Breakdown::default();
    for (label, (yes, no)) in entries {
        out.labels.push(label);
        out.berisiko.push(yes);
        out.tidak_berisiko.push(no);
    }
    Ok(out)
}

fn integer_cell(cell: &str) -> Option<i64> {
    let v: f64 = cell.trim().parse().ok()?;
    (v.fract() == 0.0 && v.is_finite()).then_some(v as i64)
}

fn binary_cell(cell: &str) -> Option<u8> {
    match integer_cell(cell)? {
        0 => Some(0),
        1 => Some(1),
        _ => None,
    }
}

fn typed_cell(cell: &str) -> Value {
    if cell.is_empty() {
        return Value::Null;
    }
    if let Ok(i) = cell.parse::<i64>() {
        return Value::from(i);
    }
    if let Some(n) = cell.parse::<f64>().ok().and_then(Number::from_f64) {
        return Value::Number(n);
    }
    Value::String(cell.to_string())
}

fn format_timestamp(cell: &str) -> Option<String> {
    let cell = cell.trim();
    const FORMATS: [&str; 4] = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
    ];
    FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(cell, f).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(cell, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .map(|ts| ts.format(TIMESTAMP_FORMAT).to_string())
}

fn format_percent(cell: &str) -> Option<String> {
    let p: f64 = cell.trim().parse().ok()?;
    p.is_finite().then(|| format!("{:.2}%", p * 100.0))
}
