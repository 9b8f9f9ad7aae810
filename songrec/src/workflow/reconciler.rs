//! Metadata reconciler: clean, validate and diff before any tag write

use crate::error::{PipelineError, PipelineResult};
use crate::models::{MetadataChange, MetadataField, MetadataRecord};

/// Characters that must never reach a file name
const PATH_HOSTILE: [char; 2] = ['/', '\\'];

/// Normalize a record
///
/// Trims every value and drops empty ones. Display fields have path-hostile
/// characters replaced with `_`. Track, disc and year are reduced to their
/// leading number so values read back from tags compare equal. Idempotent.
pub fn clean(record: &MetadataRecord) -> MetadataRecord {
    let mut cleaned = MetadataRecord::default();

    for (field, value) in record.fields() {
        let value = value.trim();
        let value = match field {
            f if f.is_display() => value.replace(PATH_HOSTILE, "_"),
            MetadataField::Track | MetadataField::Disc | MetadataField::Year => {
                let digits: String = value.chars().take_while(char::is_ascii_digit).collect();
                match digits.parse::<u32>() {
                    Ok(n) => n.to_string(),
                    Err(_) => continue,
                }
            }
            _ => value.to_string(),
        };

        if !value.is_empty() {
            cleaned.set(field, Some(value));
        }
    }

    cleaned
}

/// Require non-empty `title` and `artist`
pub fn validate(record: &MetadataRecord) -> PipelineResult<()> {
    let missing: Vec<&str> = [MetadataField::Title, MetadataField::Artist]
        .into_iter()
        .filter(|f| record.get(*f).map_or(true, |v| v.trim().is_empty()))
        .map(MetadataField::as_str)
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(PipelineError::InvalidMetadata(format!(
            "missing required field(s): {}",
            missing.join(", ")
        )))
    }
}

/// Clean then validate
pub fn reconcile(record: &MetadataRecord) -> PipelineResult<MetadataRecord> {
    let cleaned = clean(record);
    validate(&cleaned)?;
    Ok(cleaned)
}

/// Per-field differences between stored tags and the proposed record
///
/// Only fields that are persisted as tags take part; the artwork URL is
/// not stored in the file and never counts as a change.
pub fn compare_metadata(existing: &MetadataRecord, proposed: &MetadataRecord) -> Vec<MetadataChange> {
    MetadataField::ALL
        .into_iter()
        .filter(|f| f.is_tag())
        .filter(|f| existing.get(*f) != proposed.get(*f))
        .map(|field| MetadataChange {
            field,
            old: existing.get(field).map(str::to_string),
            new: proposed.get(field).map(str::to_string),
        })
        .collect()
}
