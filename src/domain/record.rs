// ============================================================
// Layer 3 — Record Domain Type
// ============================================================
// One structured row parsed from one line of the activity log.
//
// Every record carries a value for every field. Clothing and
// weather indicators default to 0; the comfort label defaults
// to 1 ("cool") because that is the most common entry in the
// logs and the one people leave out.
//
// Field order matters: it is the column order of every table
// the pipeline writes, so `Field::ALL` and the struct field
// order below must stay in sync.
//
// Reference: Rust Book §5 (Structs), §6 (Enums)

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ─── Field ────────────────────────────────────────────────────────────────────
/// Names every column of a [`Record`], in canonical table order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    TDress,
    TPoly,
    TCot,
    Sleeves,
    JLight,
    JFleece,
    JDown,
    Shorts,
    PThin,
    PThick,
    PFleece,
    PDown,
    Temp,
    Sun,
    Headwind,
    Snow,
    Rain,
    Fatigued,
    Hr,
    Feels,
}

impl Field {
    /// All fields in the order they appear in written tables
    pub const ALL: [Field; 20] = [
        Field::TDress,
        Field::TPoly,
        Field::TCot,
        Field::Sleeves,
        Field::JLight,
        Field::JFleece,
        Field::JDown,
        Field::Shorts,
        Field::PThin,
        Field::PThick,
        Field::PFleece,
        Field::PDown,
        Field::Temp,
        Field::Sun,
        Field::Headwind,
        Field::Snow,
        Field::Rain,
        Field::Fatigued,
        Field::Hr,
        Field::Feels,
    ];

    /// Column name used in tables, metadata and HTTP payloads
    pub fn name(self) -> &'static str {
        match self {
            Field::TDress   => "t_dress",
            Field::TPoly    => "t_poly",
            Field::TCot     => "t_cot",
            Field::Sleeves  => "sleeves",
            Field::JLight   => "j_light",
            Field::JFleece  => "j_fleece",
            Field::JDown    => "j_down",
            Field::Shorts   => "shorts",
            Field::PThin    => "p_thin",
            Field::PThick   => "p_thick",
            Field::PFleece  => "p_fleece",
            Field::PDown    => "p_down",
            Field::Temp     => "temp",
            Field::Sun      => "sun",
            Field::Headwind => "headwind",
            Field::Snow     => "snow",
            Field::Rain     => "rain",
            Field::Fatigued => "fatigued",
            Field::Hr       => "hr",
            Field::Feels    => "feels",
        }
    }

    /// Canonical column names, in order
    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(|f| f.name()).collect()
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Field {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Field::ALL
            .iter()
            .copied()
            .find(|f| f.name() == s)
            .ok_or_else(|| anyhow::anyhow!("unknown field '{s}'"))
    }
}

// ─── ComfortLabel ─────────────────────────────────────────────────────────────
/// The four comfort classes the `feels` field encodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ComfortLabel {
    Cold = 0,
    Cool = 1,
    Warm = 2,
    Hot  = 3,
}

impl ComfortLabel {
    pub const ALL: [ComfortLabel; 4] = [
        ComfortLabel::Cold,
        ComfortLabel::Cool,
        ComfortLabel::Warm,
        ComfortLabel::Hot,
    ];

    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.iter().copied().find(|l| l.code() == code)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ComfortLabel::Cold => "cold",
            ComfortLabel::Cool => "cool",
            ComfortLabel::Warm => "warm",
            ComfortLabel::Hot  => "hot",
        }
    }
}

impl Default for ComfortLabel {
    fn default() -> Self {
        ComfortLabel::Cool
    }
}

impl fmt::Display for ComfortLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Record ───────────────────────────────────────────────────────────────────
/// A fixed-width row of numeric features.
///
/// Serde field order is the table column order; the csv writer
/// derives the header from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub t_dress:  i32,
    pub t_poly:   i32,
    pub t_cot:    i32,
    pub sleeves:  i32,
    pub j_light:  i32,
    pub j_fleece: i32,
    pub j_down:   i32,
    pub shorts:   i32,
    pub p_thin:   i32,
    pub p_thick:  i32,
    pub p_fleece: i32,
    pub p_down:   i32,
    pub temp:     i32,
    pub sun:      i32,
    pub headwind: i32,
    pub snow:     i32,
    pub rain:     i32,
    pub fatigued: i32,
    pub hr:       i32,
    pub feels:    i32,
}

impl Default for Record {
    fn default() -> Self {
        Self {
            t_dress:  0,
            t_poly:   0,
            t_cot:    0,
            sleeves:  0,
            j_light:  0,
            j_fleece: 0,
            j_down:   0,
            shorts:   0,
            p_thin:   0,
            p_thick:  0,
            p_fleece: 0,
            p_down:   0,
            temp:     0,
            sun:      0,
            headwind: 0,
            snow:     0,
            rain:     0,
            fatigued: 0,
            hr:       0,
            feels:    ComfortLabel::default().code(),
        }
    }
}

impl Record {
    pub fn get(&self, field: Field) -> i32 {
        *self.slot(field)
    }

    pub fn set(&mut self, field: Field, value: i32) {
        *self.slot_mut(field) = value;
    }

    /// Values in canonical column order
    pub fn values(&self) -> Vec<i32> {
        Field::ALL.iter().map(|&f| self.get(f)).collect()
    }

    pub fn comfort(&self) -> Option<ComfortLabel> {
        ComfortLabel::from_code(self.feels)
    }

    fn slot(&self, field: Field) -> &i32 {
        match field {
            Field::TDress   => &self.t_dress,
            Field::TPoly    => &self.t_poly,
            Field::TCot     => &self.t_cot,
            Field::Sleeves  => &self.sleeves,
            Field::JLight   => &self.j_light,
            Field::JFleece  => &self.j_fleece,
            Field::JDown    => &self.j_down,
            Field::Shorts   => &self.shorts,
            Field::PThin    => &self.p_thin,
            Field::PThick   => &self.p_thick,
            Field::PFleece  => &self.p_fleece,
            Field::PDown    => &self.p_down,
            Field::Temp     => &self.temp,
            Field::Sun      => &self.sun,
            Field::Headwind => &self.headwind,
            Field::Snow     => &self.snow,
            Field::Rain     => &self.rain,
            Field::Fatigued => &self.fatigued,
            Field::Hr       => &self.hr,
            Field::Feels    => &self.feels,
        }
    }

    fn slot_mut(&mut self, field: Field) -> &mut i32 {
        match field {
            Field::TDress   => &mut self.t_dress,
            Field::TPoly    => &mut self.t_poly,
            Field::TCot     => &mut self.t_cot,
            Field::Sleeves  => &mut self.sleeves,
            Field::JLight   => &mut self.j_light,
            Field::JFleece  => &mut self.j_fleece,
            Field::JDown    => &mut self.j_down,
            Field::Shorts   => &mut self.shorts,
            Field::PThin    => &mut self.p_thin,
            Field::PThick   => &mut self.p_thick,
            Field::PFleece  => &mut self.p_fleece,
            Field::PDown    => &mut self.p_down,
            Field::Temp     => &mut self.temp,
            Field::Sun      => &mut self.sun,
            Field::Headwind => &mut self.headwind,
            Field::Snow     => &mut self.snow,
            Field::Rain     => &mut self.rain,
            Field::Fatigued => &mut self.fatigued,
            Field::Hr       => &mut self.hr,
            Field::Feels    => &mut self.feels,
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_record_is_cool_and_zeroed() {
        let r = Record::default();
        assert_eq!(r.feels, 1);
        assert_eq!(r.comfort(), Some(ComfortLabel::Cool));
        let values = r.values();
        assert_eq!(values.len(), 20);
        assert!(values[..19].iter().all(|&v| v == 0));
    }

    #[test]
    fn test_serde_keys_match_field_names() {
        let json = serde_json::to_value(Record::default()).unwrap();
        let obj = json.as_object().unwrap();
        let keys: Vec<&str> = obj.keys().map(|k| k.as_str()).collect();
        let mut expected = Field::names();
        let mut keys_sorted = keys.clone();
        keys_sorted.sort();
        expected.sort();
        assert_eq!(keys_sorted, expected);
    }

    #[test]
    fn test_get_set_roundtrip_every_field() {
        let mut r = Record::default();
        for (i, f) in Field::ALL.iter().enumerate() {
            r.set(*f, i as i32 + 100);
        }
        for (i, f) in Field::ALL.iter().enumerate() {
            assert_eq!(r.get(*f), i as i32 + 100);
        }
    }

    #[test]
    fn test_field_from_str() {
        assert_eq!("p_thick".parse::<Field>().unwrap(), Field::PThick);
        assert!("nope".parse::<Field>().is_err());
    }

    #[test]
    fn test_comfort_codes() {
        assert_eq!(ComfortLabel::from_code(3), Some(ComfortLabel::Hot));
        assert_eq!(ComfortLabel::from_code(4), None);
        assert_eq!(ComfortLabel::Cold.to_string(), "cold");
    }
}
