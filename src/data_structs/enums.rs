use std::fmt::Display;
use std::str::FromStr;

use anyhow::bail;
use serde::{
    Deserialize,
    Serialize,
};

/// The modification a record reports on: 5mC or 5hmC.
///
/// The variant order follows the byte order of the single-letter codes
/// ('h' < 'm'), so that sorting by [`SiteKey`](super::records::SiteKey)
/// agrees with the lexicographic row order produced by bedMethyl sorting
/// tools.
#[derive(Eq, Hash, PartialEq, Copy, Clone, Debug, PartialOrd, Ord)]
pub enum SignalType {
    /// 5-hydroxymethylcytosine ('h').
    Hydroxymethylation,
    /// 5-methylcytosine ('m').
    Methylation,
}

impl SignalType {
    pub fn code(&self) -> char {
        match self {
            SignalType::Hydroxymethylation => 'h',
            SignalType::Methylation => 'm',
        }
    }
}

impl FromStr for SignalType {
    type Err = anyhow::Error;

    /// Accepts the single-letter code or any word beginning with it
    /// ("m", "methylation", "H", "hydroxymethylation", ...).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.chars().next().map(|c| c.to_ascii_lowercase()) {
            Some('m') => Ok(SignalType::Methylation),
            Some('h') => Ok(SignalType::Hydroxymethylation),
            _ => bail!("unrecognised signal type '{}' (expected 'm' or 'h')", s),
        }
    }
}

impl Display for SignalType {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl Serialize for SignalType {
    fn serialize<S>(
        &self,
        serializer: S,
    ) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer, {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for SignalType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>, {
        let s = String::deserialize(deserializer)?;
        Self::from_str(&s).map_err(serde::de::Error::custom)
    }
}
