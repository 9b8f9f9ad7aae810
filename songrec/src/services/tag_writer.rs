//! Tag read/write using lofty
//!
//! Writes replace the file's primary tag wholesale: existing tags of that
//! type are removed first so stale frames from the source never survive.

use crate::models::MetadataRecord;
use async_trait::async_trait;
use lofty::config::WriteOptions;
use lofty::picture::{Picture, PictureType};
use lofty::prelude::*;
use lofty::tag::{ItemKey, Tag};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Tag errors
#[derive(Debug, Error)]
pub enum TagError {
    #[error("Failed to read tags from {0}: {1}")]
    Read(PathBuf, String),

    #[error("Failed to write tags to {0}: {1}")]
    Write(PathBuf, String),

    #[error("Tag task failed: {0}")]
    Task(String),
}

/// Tag-writing collaborator
#[async_trait]
pub trait TagWriter: Send + Sync {
    /// Tags currently stored in the file (empty record when untagged)
    async fn read_tags(&self, path: &Path) -> Result<MetadataRecord, TagError>;

    /// Persist `record`, optionally embedding `artwork` as the front cover
    async fn write_tags(
        &self,
        path: &Path,
        record: &MetadataRecord,
        artwork: Option<Vec<u8>>,
    ) -> Result<(), TagError>;
}

/// lofty-backed tag writer
#[derive(Debug, Default, Clone, Copy)]
pub struct LoftyTagWriter;

impl LoftyTagWriter {
    pub fn new() -> Self {
        Self
    }
}

fn read_blocking(path: &Path) -> Result<MetadataRecord, TagError> {
    let tagged_file =
        lofty::read_from_path(path).map_err(|e| TagError::Read(path.to_path_buf(), e.to_string()))?;

    let Some(tag) = tagged_file.primary_tag().or_else(|| tagged_file.first_tag()) else {
        return Ok(MetadataRecord::default());
    };

    Ok(MetadataRecord {
        title: tag.title().map(|s| s.to_string()),
        artist: tag.artist().map(|s| s.to_string()),
        album: tag.album().map(|s| s.to_string()),
        album_artist: tag.get_string(&ItemKey::AlbumArtist).map(str::to_string),
        composer: tag.get_string(&ItemKey::Composer).map(str::to_string),
        genre: tag.genre().map(|s| s.to_string()),
        year: tag.year().map(|y| y.to_string()),
        track: tag.track().map(|t| t.to_string()),
        disc: tag.disk().map(|d| d.to_string()),
        artwork_url: None,
    })
}

fn write_blocking(
    path: &Path,
    record: &MetadataRecord,
    artwork: Option<Vec<u8>>,
) -> Result<(), TagError> {
    let write_err = |e: lofty::error::LoftyError| TagError::Write(path.to_path_buf(), e.to_string());

    let tag_type = lofty::read_from_path(path).map_err(write_err)?.primary_tag_type();

    // Strip whatever is there before writing fresh frames
    Tag::new(tag_type).remove_from_path(path).map_err(write_err)?;

    let mut tag = Tag::new(tag_type);
    if let Some(title) = &record.title {
        tag.set_title(title.clone());
    }
    if let Some(artist) = &record.artist {
        tag.set_artist(artist.clone());
    }
    if let Some(album) = &record.album {
        tag.set_album(album.clone());
    }
    if let Some(album_artist) = &record.album_artist {
        tag.insert_text(ItemKey::AlbumArtist, album_artist.clone());
    }
    if let Some(composer) = &record.composer {
        tag.insert_text(ItemKey::Composer, composer.clone());
    }
    if let Some(genre) = &record.genre {
        tag.set_genre(genre.clone());
    }
    if let Some(year) = record.year_number() {
        tag.set_year(year);
    }
    if let Some(track) = record.track_number() {
        tag.set_track(track);
    }
    if let Some(disc) = record.disc_number() {
        tag.set_disk(disc);
    }

    if let Some(bytes) = artwork {
        match Picture::from_reader(&mut bytes.as_slice()) {
            Ok(mut picture) => {
                picture.set_pic_type(PictureType::CoverFront);
                tag.push_picture(picture);
            }
            Err(e) => {
                tracing::warn!(file = %path.display(), error = %e, "Artwork is not a usable image, skipping");
            }
        }
    }

    tag.save_to_path(path, WriteOptions::default())
        .map_err(write_err)
}

#[async_trait]
impl TagWriter for LoftyTagWriter {
    async fn read_tags(&self, path: &Path) -> Result<MetadataRecord, TagError> {
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || read_blocking(&path))
            .await
            .map_err(|e| TagError::Task(e.to_string()))?
    }

    async fn write_tags(
        &self,
        path: &Path,
        record: &MetadataRecord,
        artwork: Option<Vec<u8>>,
    ) -> Result<(), TagError> {
        let path = path.to_path_buf();
        let record = record.clone();
        tokio::task::spawn_blocking(move || write_blocking(&path, &record, artwork))
            .await
            .map_err(|e| TagError::Task(e.to_string()))?
    }
}
