//! External collaborators used by the pipeline
//!
//! Each collaborator sits behind an async trait so the workflow can run
//! against fakes in tests:
//! - [`Prober`]: stream metadata (`ffprobe`)
//! - [`Transcoder`]: transcode and sample extraction (`ffmpeg`)
//! - [`Recognizer`]: audio recognition (Shazam via RapidAPI)
//! - [`TagWriter`]: tag persistence (lofty)
//! - [`ArtworkFetcher`]: cover art download

pub mod artwork;
pub mod file_scanner;
pub mod prober;
pub mod recognizer;
pub mod tag_writer;
pub mod transcoder;

pub use artwork::{expand_artwork_url, ArtworkError, ArtworkFetcher, HttpArtworkFetcher};
pub use file_scanner::{FileScanner, ScanError};
pub use prober::{FfprobeProber, ProbeError, ProbeReport, Prober, StreamInfo};
pub use recognizer::{DetailsResponse, RecognitionError, Recognizer, ShazamClient, ShazamTrack};
pub use tag_writer::{LoftyTagWriter, TagError, TagWriter};
pub use transcoder::{FfmpegTranscoder, SampleSpec, TranscodeError, TranscodeMode, Transcoder};
