//! Stage orchestrator
//!
//! A pass runs in two phases:
//! 1. Resume: files left in the converted folder by an interrupted pass
//!    continue from identification.
//! 2. Raw: every regular file in the raw folder runs the full pipeline.
//!
//! Both phases use a bounded worker pool (`buffer_unordered(workers)`);
//! stages within a file run strictly in order.
//!
//! Raw files are grouped by stem, since the stem becomes the canonical name
//! in the converted folder. One worker owns a whole group: every member is
//! validated, converted and placed first, so the deduplicator only ever
//! compares finished conversions, and only the survivors go on to be
//! identified. No two workers hold files under the same converted name.

use super::converter::ConversionEngine;
use super::deduplicator::{Deduplicator, Resolution};
use super::identifier::Identifier;
use super::validator::{Classification, Validator};
use super::{mover, reconciler};
use super::{ItemOutcome, PassSummary, PipelineContext, PipelineEvent};
use crate::error::{PipelineError, PipelineResult};
use crate::models::{AudioItem, MetadataRecord, Stage, State};
use crate::services::FileScanner;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Result of the validate → convert → dedup half of a raw file's run
enum Prepared {
    /// Sitting in the converted folder; `displaced` is the group member it
    /// replaced, if any
    Placed {
        item: AudioItem,
        displaced: Option<PathBuf>,
    },
    Done(ItemOutcome),
}

pub struct Orchestrator {
    ctx: Arc<PipelineContext>,
    scanner: FileScanner,
    validator: Validator,
    converter: ConversionEngine,
    deduplicator: Deduplicator,
    identifier: Identifier,
}

impl Orchestrator {
    pub fn new(ctx: PipelineContext) -> Self {
        let c = &ctx.collaborators;
        let validator = Validator::new(c.prober.clone());
        let converter = ConversionEngine::new(
            c.prober.clone(),
            c.transcoder.clone(),
            ctx.folders.temp().to_path_buf(),
            ctx.settings.max_bitrate_kbps,
        );
        let deduplicator = Deduplicator::new(c.prober.clone(), ctx.locks.clone());
        let identifier = Identifier::new(
            c.transcoder.clone(),
            c.recognizer.clone(),
            ctx.sample_spec(),
            ctx.settings.artwork_size,
        );

        Self {
            ctx: Arc::new(ctx),
            scanner: FileScanner::new(),
            validator,
            converter,
            deduplicator,
            identifier,
        }
    }

    pub fn context(&self) -> &PipelineContext {
        &self.ctx
    }

    /// Run one full pass over the folder set
    pub async fn run_pass(&self) -> PassSummary {
        let mut summary = PassSummary::new(Utc::now());
        let workers = self.ctx.settings.workers.max(1);

        let resumed = self.list(self.ctx.folders.converted());
        let raw = self.list(self.ctx.folders.raw());

        tracing::info!(
            raw_files = raw.len(),
            resumed_files = resumed.len(),
            workers,
            "Pipeline pass started"
        );
        self.ctx
            .emit(PipelineEvent::PassStarted {
                raw_files: raw.len(),
                resumed_files: resumed.len(),
                timestamp: summary.started_at,
            })
            .await;

        let resumed_outcomes: Vec<ItemOutcome> = stream::iter(resumed)
            .map(|path| self.resume_file(path))
            .buffer_unordered(workers)
            .collect()
            .await;

        let raw_outcomes: Vec<Vec<ItemOutcome>> = stream::iter(group_by_stem(raw))
            .map(|group| self.process_group(group))
            .buffer_unordered(workers)
            .collect()
            .await;

        for outcome in resumed_outcomes.iter().chain(raw_outcomes.iter().flatten()) {
            summary.record(outcome);
        }
        summary.finished_at = Utc::now();

        tracing::info!(
            processed = summary.processed,
            succeeded = summary.succeeded,
            discarded = summary.discarded,
            video = summary.video,
            skipped = summary.skipped,
            quarantined = summary.quarantined_total(),
            "Pipeline pass completed"
        );
        self.ctx
            .emit(PipelineEvent::PassCompleted {
                summary: summary.clone(),
            })
            .await;

        summary
    }

    fn list(&self, folder: &Path) -> Vec<PathBuf> {
        match self.scanner.scan(folder) {
            Ok(files) => files,
            Err(e) => {
                tracing::error!(folder = %folder.display(), error = %e, "Cannot scan folder");
                Vec::new()
            }
        }
    }

    /// Raw files sharing a stem, in listing order
    async fn process_group(&self, paths: Vec<PathBuf>) -> Vec<ItemOutcome> {
        let mut outcomes = Vec::with_capacity(paths.len());
        let mut placed: Vec<AudioItem> = Vec::new();

        for path in paths {
            match self.prepare(path).await {
                Prepared::Placed { item, displaced } => {
                    if let Some(displaced) = displaced {
                        if let Some(pos) = placed.iter().position(|p| p.source_path == displaced) {
                            placed.remove(pos);
                            outcomes.push(ItemOutcome::Discarded);
                        }
                    }
                    placed.push(item);
                }
                Prepared::Done(outcome) => outcomes.push(outcome),
            }
        }

        for item in placed {
            outcomes.push(self.identify_and_finalize(item).await);
        }
        outcomes
    }

    /// Validate, convert and place one raw file into the converted folder
    async fn prepare(&self, path: PathBuf) -> Prepared {
        let mut item = AudioItem::from_path(&path, State::Raw);

        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Prepared::Done(
                self.skip(&item, "file vanished before processing".to_string())
                    .await,
            );
        }

        tracing::debug!(file = %path.display(), "Processing file");

        // Validate
        let report = match self.validator.classify(&item.source_path).await {
            Ok(Classification::Audio(report)) => report,
            Ok(Classification::Video) => return Prepared::Done(self.park_video(&mut item).await),
            Ok(Classification::Corrupt(reason)) => {
                let err = PipelineError::CorruptMedia {
                    path: path.clone(),
                    reason,
                };
                return Prepared::Done(self.fail(&mut item, Stage::Validate, err).await);
            }
            Ok(Classification::Unsupported) => {
                let err = PipelineError::UnsupportedFormat {
                    path: path.clone(),
                    extension: item.extension.clone(),
                };
                return Prepared::Done(self.fail(&mut item, Stage::Validate, err).await);
            }
            Err(e) => return Prepared::Done(self.fail(&mut item, Stage::Validate, e).await),
        };
        item.detected_bitrate_kbps = report.audio_bitrate_kbps();
        self.advance(&mut item, State::Validated, None).await;

        // Convert
        let staged = match self.converter.convert(&item).await {
            Ok(staged) => staged,
            Err(e) => return Prepared::Done(self.fail(&mut item, Stage::Convert, e).await),
        };
        self.advance(&mut item, State::Converted, None).await;

        // Deduplicate into the converted folder
        let resolution = match self
            .deduplicator
            .resolve(&staged.output, self.ctx.folders.converted())
            .await
        {
            Ok(resolution) => resolution,
            Err(e) => return Prepared::Done(self.fail(&mut item, Stage::Deduplicate, e).await),
        };
        let passthrough = staged.passthrough;
        drop(staged);

        if !passthrough {
            self.archive_original(&item.source_path).await;
        }

        let displaced = match &resolution {
            Resolution::Replaced { displaced, .. } => Some(displaced.clone()),
            _ => None,
        };
        match resolution.placed_path() {
            Some(placed) => {
                let placed = placed.to_path_buf();
                self.advance(&mut item, State::Deduplicated, Some(placed)).await;
                Prepared::Placed { item, displaced }
            }
            None => Prepared::Done(ItemOutcome::Discarded),
        }
    }

    /// Continue a file found in the converted folder
    async fn resume_file(&self, path: PathBuf) -> ItemOutcome {
        let item = AudioItem::from_path(&path, State::Deduplicated);
        tracing::info!(file = %path.display(), "Resuming converted file");
        self.identify_and_finalize(item).await
    }

    /// Identify → Reconcile → Tag → Finalize for a file in the converted folder
    async fn identify_and_finalize(&self, mut item: AudioItem) -> ItemOutcome {
        let path = item.source_path.clone();

        let proposed = match self.identifier.identify(&path).await {
            Ok(record) => record,
            Err(e) => return self.fail(&mut item, Stage::Identify, e).await,
        };

        let cleaned = match reconciler::reconcile(&proposed) {
            Ok(record) => record,
            Err(e) => return self.fail(&mut item, Stage::Reconcile, e).await,
        };
        item.metadata = Some(cleaned.clone());
        self.advance(&mut item, State::Identified, None).await;

        let file_name = match self.tag(&path, &cleaned).await {
            Ok(true) => mover::final_file_name(&cleaned),
            Ok(false) => item.file_name(),
            Err(e) => return self.fail(&mut item, Stage::Tag, e).await,
        };
        self.advance(&mut item, State::Tagged, None).await;

        let resolution = match self
            .deduplicator
            .resolve_as(&path, self.ctx.folders.success(), &file_name)
            .await
        {
            Ok(resolution) => resolution,
            Err(e) => return self.fail(&mut item, Stage::Finalize, e).await,
        };

        match resolution {
            Resolution::Placed(placed) | Resolution::Replaced { path: placed, .. } => {
                self.advance(&mut item, State::Finalized, Some(placed.clone()))
                    .await;
                tracing::info!(file = %placed.display(), "Finalized");
                ItemOutcome::Finalized(placed)
            }
            Resolution::Discarded { .. } => ItemOutcome::Discarded,
        }
    }

    /// Write tags when they differ from the file's; `Ok(true)` if written
    async fn tag(&self, path: &Path, proposed: &MetadataRecord) -> PipelineResult<bool> {
        let tag_writer = &self.ctx.collaborators.tag_writer;

        let existing = match tag_writer.read_tags(path).await {
            Ok(existing) => existing,
            Err(e) => {
                tracing::warn!(file = %path.display(), error = %e, "Cannot read existing tags");
                MetadataRecord::default()
            }
        };

        let changes = reconciler::compare_metadata(&existing, proposed);
        if changes.is_empty() {
            tracing::info!(file = %path.display(), "Tags already up to date, no write needed");
            return Ok(false);
        }

        for change in &changes {
            tracing::debug!(
                file = %path.display(),
                field = %change.field,
                old = change.old.as_deref().unwrap_or(""),
                new = change.new.as_deref().unwrap_or(""),
                "Tag change"
            );
        }

        let artwork = self.fetch_artwork(proposed).await;
        tag_writer.write_tags(path, proposed, artwork).await?;

        tracing::info!(file = %path.display(), changes = changes.len(), "Tags written");
        Ok(true)
    }

    async fn fetch_artwork(&self, record: &MetadataRecord) -> Option<Vec<u8>> {
        let fetcher = self.ctx.collaborators.artwork.as_ref()?;
        let url = record.artwork_url.as_deref()?;

        match fetcher.fetch(url).await {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                tracing::warn!(url, error = %e, "Artwork fetch failed, tagging without cover");
                None
            }
        }
    }

    /// Move the converted-from source into the archive; failure only logs
    async fn archive_original(&self, source: &Path) {
        match mover::relocate_unique(source, self.ctx.folders.archive()).await {
            Ok(archived) => {
                tracing::debug!(file = %source.display(), archived = %archived.display(), "Archived original");
            }
            Err(e) => {
                tracing::error!(file = %source.display(), error = %e, "Failed to archive original");
            }
        }
    }

    async fn park_video(&self, item: &mut AudioItem) -> ItemOutcome {
        match mover::relocate_unique(&item.source_path, self.ctx.folders.video()).await {
            Ok(parked) => {
                self.advance(item, State::Video, Some(parked.clone())).await;
                tracing::info!(file = %parked.display(), "Video file moved to holding area");
                ItemOutcome::Video(parked)
            }
            Err(e) => self.fail(item, Stage::Validate, e).await,
        }
    }

    /// Route a failed item to its quarantine folder, or skip it
    async fn fail(&self, item: &mut AudioItem, stage: Stage, err: PipelineError) -> ItemOutcome {
        let kind = err.kind();
        let Some(state) = kind.quarantine_state(stage) else {
            tracing::warn!(
                file = %item.source_path.display(),
                stage = ?stage,
                kind = ?kind,
                error = %err,
                "Skipping file for this pass"
            );
            return self.skip(item, err.to_string()).await;
        };

        tracing::error!(
            file = %item.source_path.display(),
            stage = ?stage,
            kind = ?kind,
            error = %err,
            "File failed, quarantining"
        );

        let Some(folder) = self.ctx.folders.folder_for(state) else {
            return self.skip(item, err.to_string()).await;
        };

        match mover::relocate_unique(&item.source_path, folder).await {
            Ok(quarantined) => {
                item.last_error = Some(err.to_string());
                self.advance(item, state, Some(quarantined.clone())).await;
                self.ctx
                    .emit(PipelineEvent::ItemQuarantined {
                        file: quarantined,
                        state,
                        error_kind: format!("{:?}", kind),
                        error_message: err.to_string(),
                    })
                    .await;
                ItemOutcome::Quarantined(state)
            }
            Err(move_err) => {
                tracing::error!(
                    file = %item.source_path.display(),
                    error = %move_err,
                    "Failed to quarantine file, leaving in place"
                );
                self.skip(item, move_err.to_string()).await
            }
        }
    }

    async fn skip(&self, item: &AudioItem, reason: String) -> ItemOutcome {
        self.ctx
            .emit(PipelineEvent::ItemSkipped {
                file: item.source_path.clone(),
                reason,
            })
            .await;
        ItemOutcome::Skipped
    }

    async fn advance(&self, item: &mut AudioItem, state: State, new_path: Option<PathBuf>) {
        let transition = item.transition_to(state, new_path);
        tracing::debug!(
            file = %transition.path.display(),
            from = %transition.old_state,
            to = %transition.new_state,
            "State transition"
        );
        self.ctx
            .emit(PipelineEvent::ItemTransitioned {
                file: transition.path,
                from: transition.old_state,
                to: transition.new_state,
                timestamp: transition.transitioned_at,
            })
            .await;
    }
}

/// Bucket raw files by stem; groups and members keep listing order
fn group_by_stem(paths: Vec<PathBuf>) -> Vec<Vec<PathBuf>> {
    let mut groups: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    for path in paths {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        groups.entry(stem).or_default().push(path);
    }
    groups.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_by_stem_buckets_same_stem_across_extensions() {
        let groups = group_by_stem(vec![
            PathBuf::from("/raw/a.wav"),
            PathBuf::from("/raw/song.flac"),
            PathBuf::from("/raw/song.wav"),
            PathBuf::from("/raw/Song.mp3"),
        ]);
        assert_eq!(
            groups,
            vec![
                vec![PathBuf::from("/raw/Song.mp3")],
                vec![PathBuf::from("/raw/a.wav")],
                vec![
                    PathBuf::from("/raw/song.flac"),
                    PathBuf::from("/raw/song.wav")
                ],
            ]
        );
    }
}
