use serde_json::{Map, Value};
use thiserror::Error;

/// One bipolar attribute: the client sends `given`, the encoder derives `derived = 1 - given`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndicatorPair {
    pub given: &'static str,
    pub derived: &'static str,
}

pub const INDICATOR_PAIRS: [IndicatorPair; 9] = [
    IndicatorPair { given: "usia_tua", derived: "usia_muda" },
    IndicatorPair { given: "jenis_kelamin_wanita", derived: "jenis_kelamin_pria" },
    IndicatorPair { given: "merokok_pasif", derived: "merokok_aktif" },
    IndicatorPair { given: "bekerja_ya", derived: "bekerja_tidak" },
    IndicatorPair { given: "rumah_tangga_ya", derived: "rumah_tangga_tidak" },
    IndicatorPair { given: "aktivitas_begadang_ya", derived: "aktivitas_begadang_tidak" },
    IndicatorPair { given: "aktivitas_olahraga_sering", derived: "aktivitas_olahraga_jarang" },
    IndicatorPair { given: "asuransi_tidak", derived: "asuransi_ada" },
    IndicatorPair { given: "penyakit_bawaan_tidak", derived: "penyakit_bawaan_ada" },
];

pub const FEATURE_DIM: usize = 18;

/// Canonical column order the classifier was fit on.
pub const FEATURE_ORDER: [&str; FEATURE_DIM] = [
    "usia_muda",
    "usia_tua",
    "jenis_kelamin_pria",
    "jenis_kelamin_wanita",
    "merokok_aktif",
    "merokok_pasif",
    "bekerja_tidak",
    "bekerja_ya",
    "rumah_tangga_tidak",
    "rumah_tangga_ya",
    "aktivitas_begadang_tidak",
    "aktivitas_begadang_ya",
    "aktivitas_olahraga_jarang",
    "aktivitas_olahraga_sering",
    "asuransi_ada",
    "asuransi_tidak",
    "penyakit_bawaan_ada",
    "penyakit_bawaan_tidak",
];

#[derive(Debug, Error, PartialEq)]
pub enum EncodeError {
    #[error("missing field '{0}'")]
    MissingField(&'static str),
    #[error("field '{field}' must be 0 or 1, got {value}")]
    InvalidValue { field: &'static str, value: String },
}

/// All 18 indicators, stored in `FEATURE_ORDER`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodedFeatures {
    values: [u8; FEATURE_DIM],
}

impl EncodedFeatures {
    pub fn values(&self) -> &[u8; FEATURE_DIM] {
        &self.values
    }

    pub fn get(&self, name: &str) -> Option<u8> {
        position(name).map(|i| self.values[i])
    }

    /// `(name, value)` in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, u8)> + '_ {
        FEATURE_ORDER.iter().copied().zip(self.values.iter().copied())
    }
}

#[inline]
pub fn position(name: &str) -> Option<usize> {
    FEATURE_ORDER.iter().position(|f| *f == name)
}

/// Completes every indicator pair from the given side and lays the result out in canonical order.
///
/// - absent or null given field -> `MissingField`
/// - anything other than 0/1 (integer, exact `0.0`/`1.0`, or a bool) -> `InvalidValue`
/// - unrelated keys, and client-sent derived keys, are ignored
pub fn encode(obj: &Map<String, Value>) -> Result<EncodedFeatures, EncodeError> {
    let mut values = [0u8; FEATURE_DIM];
    for pair in &INDICATOR_PAIRS {
        let given = binary_field(obj, pair.given)?;
        // FEATURE_ORDER is a constant superset of the pair names
        let gi = position(pair.given).unwrap_or_default();
        let di = position(pair.derived).unwrap_or_default();
        values[gi] = given;
        values[di] = 1 - given;
    }
    Ok(EncodedFeatures { values })
}

fn binary_field(obj: &Map<String, Value>, field: &'static str) -> Result<u8, EncodeError> {
    match obj.get(field) {
        None | Some(Value::Null) => Err(EncodeError::MissingField(field)),
        Some(Value::Bool(b)) => Ok(u8::from(*b)),
        // 1.0 / 0.0 from JS clients count as 1 / 0
        Some(Value::Number(n)) => match n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| *f == 0.0 || *f == 1.0)
                .map(|f| f as u64)
        }) {
            Some(v @ (0 | 1)) => Ok(v as u8),
            _ => Err(EncodeError::InvalidValue {
                field,
                value: n.to_string(),
            }),
        },
        Some(v) => Err(EncodeError::InvalidValue {
            field,
            value: v.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Map<String, Value> {
        json!({
            "usia_tua": 1,
            "jenis_kelamin_wanita": 0,
            "merokok_pasif": 0,
            "bekerja_ya": 1,
            "rumah_tangga_ya": 1,
            "aktivitas_begadang_ya": 0,
            "aktivitas_olahraga_sering": 1,
            "asuransi_tidak": 0,
            "penyakit_bawaan_tidak": 1
        })
        .as_object()
        .unwrap()
        .clone()
    }

    #[test]
    fn test_derives_complement_of_each_given_field() {
        let enc = encode(&sample()).unwrap();
        let expect = [
            ("usia_muda", 0),
            ("jenis_kelamin_pria", 1),
            ("merokok_aktif", 1),
            ("bekerja_tidak", 0),
            ("rumah_tangga_tidak", 0),
            ("aktivitas_begadang_tidak", 1),
            ("aktivitas_olahraga_jarang", 0),
            ("asuransi_ada", 1),
            ("penyakit_bawaan_ada", 0),
        ];
        for (name, v) in expect {
            assert_eq!(enc.get(name), Some(v), "{name}");
        }
        assert_eq!(
            enc.values(),
            &[0, 1, 1, 0, 1, 0, 0, 1, 0, 1, 1, 0, 0, 1, 1, 0, 0, 1]
        );
    }

    #[test]
    fn test_every_pair_sums_to_one() {
        // all 512 combinations of the given side
        for mask in 0u32..(1 << INDICATOR_PAIRS.len()) {
            let mut obj = Map::new();
            for (i, pair) in INDICATOR_PAIRS.iter().enumerate() {
                obj.insert(pair.given.to_string(), json!((mask >> i) & 1));
            }
            let enc = encode(&obj).unwrap();
            for pair in &INDICATOR_PAIRS {
                let a = enc.get(pair.given).unwrap();
                let b = enc.get(pair.derived).unwrap();
                assert_eq!(a + b, 1, "mask={mask} pair={}", pair.given);
            }
        }
    }

    #[test]
    fn test_missing_field() {
        let mut obj = sample();
        obj.remove("asuransi_tidak");
        assert_eq!(
            encode(&obj),
            Err(EncodeError::MissingField("asuransi_tidak"))
        );

        obj.insert("asuransi_tidak".into(), Value::Null);
        assert_eq!(
            encode(&obj),
            Err(EncodeError::MissingField("asuransi_tidak"))
        );
    }

    #[test]
    fn test_non_binary_rejected() {
        let bad_values = [
            json!(2),
            json!(-1),
            json!(0.5),
            json!(2.0),
            json!(-0.0001),
            json!("1"),
            json!([1]),
        ];
        for bad in bad_values {
            let mut obj = sample();
            obj.insert("usia_tua".into(), bad.clone());
            match encode(&obj) {
                Err(EncodeError::InvalidValue { field, .. }) => assert_eq!(field, "usia_tua"),
                other => panic!("{bad} -> {other:?}"),
            }
        }
    }

    #[test]
    fn test_bool_and_client_derived_fields() {
        let mut obj = sample();
        obj.insert("usia_tua".into(), json!(false));
        // derived side from the client is recomputed, not trusted
        obj.insert("usia_muda".into(), json!(0));
        obj.insert("nama".into(), json!("ignored"));
        let enc = encode(&obj).unwrap();
        assert_eq!(enc.get("usia_tua"), Some(0));
        assert_eq!(enc.get("usia_muda"), Some(1));
    }

    #[test]
    fn test_float_zero_and_one_accepted() {
        let mut obj = sample();
        obj.insert("usia_tua".into(), json!(1.0));
        obj.insert("merokok_pasif".into(), json!(0.0));
        let enc = encode(&obj).unwrap();
        assert_eq!(enc.get("usia_tua"), Some(1));
        assert_eq!(enc.get("usia_muda"), Some(0));
        assert_eq!(enc.get("merokok_pasif"), Some(0));
        assert_eq!(enc.get("merokok_aktif"), Some(1));
    }

    #[test]
    fn test_order_covers_every_pair_once() {
        let mut names: Vec<&str> = INDICATOR_PAIRS
            .iter()
            .flat_map(|p| [p.given, p.derived])
            .collect();
        names.sort_unstable();
        let mut order = FEATURE_ORDER.to_vec();
        order.sort_unstable();
        assert_eq!(names, order);
    }
}
