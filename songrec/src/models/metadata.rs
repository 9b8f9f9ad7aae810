//! Metadata record carried from recognition to tag write

use serde::{Deserialize, Serialize};
use std::fmt;

/// Field of a [`MetadataRecord`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataField {
    Title,
    Artist,
    Album,
    AlbumArtist,
    Composer,
    Genre,
    Year,
    Track,
    Disc,
    ArtworkUrl,
}

impl MetadataField {
    pub const ALL: [MetadataField; 10] = [
        MetadataField::Title,
        MetadataField::Artist,
        MetadataField::Album,
        MetadataField::AlbumArtist,
        MetadataField::Composer,
        MetadataField::Genre,
        MetadataField::Year,
        MetadataField::Track,
        MetadataField::Disc,
        MetadataField::ArtworkUrl,
    ];

    /// Fields that end up in filenames or display tags
    pub fn is_display(self) -> bool {
        matches!(
            self,
            MetadataField::Title
                | MetadataField::Artist
                | MetadataField::Album
                | MetadataField::AlbumArtist
                | MetadataField::Composer
        )
    }

    /// Fields persisted as tags and readable back from a file
    pub fn is_tag(self) -> bool {
        self != MetadataField::ArtworkUrl
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MetadataField::Title => "title",
            MetadataField::Artist => "artist",
            MetadataField::Album => "album",
            MetadataField::AlbumArtist => "album_artist",
            MetadataField::Composer => "composer",
            MetadataField::Genre => "genre",
            MetadataField::Year => "year",
            MetadataField::Track => "track",
            MetadataField::Disc => "disc",
            MetadataField::ArtworkUrl => "artwork_url",
        }
    }
}

impl fmt::Display for MetadataField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Descriptive metadata for one track
///
/// Every field is optional at the type level; `title` and `artist` are
/// enforced by reconciliation before anything is written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub album_artist: Option<String>,
    pub composer: Option<String>,
    pub genre: Option<String>,
    pub year: Option<String>,
    pub track: Option<String>,
    pub disc: Option<String>,
    pub artwork_url: Option<String>,
}

impl MetadataRecord {
    pub fn get(&self, field: MetadataField) -> Option<&str> {
        self.slot(field).as_deref()
    }

    pub fn set(&mut self, field: MetadataField, value: Option<String>) {
        *self.slot_mut(field) = value;
    }

    /// Present fields in declaration order
    pub fn fields(&self) -> impl Iterator<Item = (MetadataField, &str)> + '_ {
        MetadataField::ALL
            .into_iter()
            .filter_map(move |field| self.get(field).map(|value| (field, value)))
    }

    /// Fields of `overrides` win where present; `self` fills the gaps
    pub fn overlay(mut self, overrides: &MetadataRecord) -> Self {
        for (field, value) in overrides.fields() {
            self.set(field, Some(value.to_string()));
        }
        self
    }

    /// Leading number of the track field ("3/12" → 3)
    pub fn track_number(&self) -> Option<u32> {
        leading_number(self.track.as_deref())
    }

    pub fn disc_number(&self) -> Option<u32> {
        leading_number(self.disc.as_deref())
    }

    /// Four-digit year prefix ("2019-05-03" → 2019)
    pub fn year_number(&self) -> Option<u32> {
        leading_number(self.year.as_deref())
    }

    fn slot(&self, field: MetadataField) -> &Option<String> {
        match field {
            MetadataField::Title => &self.title,
            MetadataField::Artist => &self.artist,
            MetadataField::Album => &self.album,
            MetadataField::AlbumArtist => &self.album_artist,
            MetadataField::Composer => &self.composer,
            MetadataField::Genre => &self.genre,
            MetadataField::Year => &self.year,
            MetadataField::Track => &self.track,
            MetadataField::Disc => &self.disc,
            MetadataField::ArtworkUrl => &self.artwork_url,
        }
    }

    fn slot_mut(&mut self, field: MetadataField) -> &mut Option<String> {
        match field {
            MetadataField::Title => &mut self.title,
            MetadataField::Artist => &mut self.artist,
            MetadataField::Album => &mut self.album,
            MetadataField::AlbumArtist => &mut self.album_artist,
            MetadataField::Composer => &mut self.composer,
            MetadataField::Genre => &mut self.genre,
            MetadataField::Year => &mut self.year,
            MetadataField::Track => &mut self.track,
            MetadataField::Disc => &mut self.disc,
            MetadataField::ArtworkUrl => &mut self.artwork_url,
        }
    }
}

fn leading_number(value: Option<&str>) -> Option<u32> {
    let digits: String = value?
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// One field that differs between the file's tags and the proposed record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetadataChange {
    pub field: MetadataField,
    pub old: Option<String>,
    pub new: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlay_prefers_overrides() {
        let primary = MetadataRecord {
            title: Some("Primary".into()),
            album: Some("Primary Album".into()),
            track: Some("1".into()),
            ..Default::default()
        };
        let secondary = MetadataRecord {
            album: Some("Real Album".into()),
            composer: Some("Someone".into()),
            ..Default::default()
        };

        let merged = primary.overlay(&secondary);
        assert_eq!(merged.title.as_deref(), Some("Primary"));
        assert_eq!(merged.album.as_deref(), Some("Real Album"));
        assert_eq!(merged.composer.as_deref(), Some("Someone"));
        assert_eq!(merged.track.as_deref(), Some("1"));
    }

    #[test]
    fn test_numeric_accessors() {
        let record = MetadataRecord {
            track: Some("3/12".into()),
            disc: Some(" 2".into()),
            year: Some("2019-05-03".into()),
            ..Default::default()
        };
        assert_eq!(record.track_number(), Some(3));
        assert_eq!(record.disc_number(), Some(2));
        assert_eq!(record.year_number(), Some(2019));

        let empty = MetadataRecord::default();
        assert_eq!(empty.track_number(), None);
    }

    #[test]
    fn test_fields_skips_absent() {
        let record = MetadataRecord {
            title: Some("X".into()),
            genre: Some("Rock".into()),
            ..Default::default()
        };
        let fields: Vec<_> = record.fields().collect();
        assert_eq!(
            fields,
            vec![(MetadataField::Title, "X"), (MetadataField::Genre, "Rock")]
        );
    }
}
