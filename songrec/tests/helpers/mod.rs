//! Test Helper Utilities
//!
//! Shared harness for pipeline integration tests: a temp folder set wired to
//! fake collaborators.

#![allow(dead_code)]

pub mod fakes;

pub use fakes::{
    stored_tags, FakeProber, FakeRecognizer, FakeTagWriter, FakeTranscoder, TranscodeCall,
};

use songrec::workflow::{Collaborators, FolderSet, Orchestrator, PipelineContext, PipelineEvent};
use songrec_common::config::PipelineSettings;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::mpsc;

pub struct Harness {
    pub dir: TempDir,
    pub folders: FolderSet,
    pub prober: Arc<FakeProber>,
    pub transcoder: Arc<FakeTranscoder>,
    pub recognizer: Arc<FakeRecognizer>,
    pub tag_writer: Arc<FakeTagWriter>,
    pub settings: PipelineSettings,
}

impl Harness {
    pub async fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let folders = FolderSet::under(dir.path());
        folders.ensure_exist().await.unwrap();

        Self {
            dir,
            folders,
            prober: Arc::new(FakeProber::default()),
            transcoder: Arc::new(FakeTranscoder::default()),
            recognizer: Arc::new(FakeRecognizer::default()),
            tag_writer: Arc::new(FakeTagWriter::default()),
            settings: PipelineSettings::default(),
        }
    }

    fn collaborators(&self) -> Collaborators {
        Collaborators {
            prober: self.prober.clone(),
            transcoder: self.transcoder.clone(),
            recognizer: self.recognizer.clone(),
            tag_writer: self.tag_writer.clone(),
            artwork: None,
        }
    }

    pub fn orchestrator(&self) -> Orchestrator {
        Orchestrator::new(PipelineContext::new(
            self.folders.clone(),
            self.settings.clone(),
            self.collaborators(),
        ))
    }

    pub fn orchestrator_with_events(&self, tx: mpsc::Sender<PipelineEvent>) -> Orchestrator {
        Orchestrator::new(
            PipelineContext::new(
                self.folders.clone(),
                self.settings.clone(),
                self.collaborators(),
            )
            .with_events(tx),
        )
    }

    pub fn write(&self, folder: &Path, name: &str, content: &str) -> PathBuf {
        let path = folder.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    pub fn write_raw(&self, name: &str, content: &str) -> PathBuf {
        self.write(self.folders.raw(), name, content)
    }

    pub fn read(&self, path: &Path) -> String {
        std::fs::read_to_string(path).unwrap()
    }
}

/// Sorted entry names directly inside `folder`
pub fn names_in(folder: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(folder)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}
