//! Lenient scalar deserializers for collaborator payloads
//!
//! ffprobe reports numbers as strings ("320000", "N/A"); the recognition API
//! mixes numeric and string identifiers. Anything unparseable becomes `None`.

use serde::{Deserialize, Deserializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Int(u64),
    Float(f64),
    Text(String),
    #[allow(dead_code)]
    Other(serde::de::IgnoredAny),
}

/// `"320000"`, `320000` or `320000.0` → `Some(320000)`; `"N/A"` → `None`
pub fn opt_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<Scalar> = Option::deserialize(deserializer)?;
    Ok(match value {
        Some(Scalar::Int(n)) => Some(n),
        Some(Scalar::Float(f)) if f.is_finite() && f >= 0.0 => Some(f as u64),
        Some(Scalar::Text(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Any scalar → its string form; empty strings → `None`
pub fn opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<Scalar> = Option::deserialize(deserializer)?;
    Ok(match value {
        Some(Scalar::Int(n)) => Some(n.to_string()),
        Some(Scalar::Float(f)) => Some(f.to_string()),
        Some(Scalar::Text(s)) if !s.is_empty() => Some(s),
        _ => None,
    })
}
