use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A whole-yen amount, displayed the way the site shows it, e.g. `-¥1,280`.
///
/// Parsing accepts the site's forms too: `1,280`, `¥1,280`, `1,280円` and `-1280` all work.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Yen(i64);

impl Yen {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

impl From<i64> for Yen {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl fmt::Display for Yen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(
            f,
            "{sign}¥{}",
            format_num::format_num!(",.0f", self.0.unsigned_abs() as f64)
        )
    }
}

impl FromStr for Yen {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let cleaned: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, ',' | '¥' | '円' | ' '))
            .collect();
        cleaned
            .parse()
            .map(Yen)
            .map_err(|_| format!("'{s}' is not a yen amount"))
    }
}

impl Serialize for Yen {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_i64(self.0)
    }
}

impl<'de> Deserialize<'de> for Yen {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        i64::deserialize(deserializer).map(Yen)
    }
}
