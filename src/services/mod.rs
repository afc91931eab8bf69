pub mod artifact_publisher;
pub mod captcha_solver;
pub mod ocr;
pub mod status_reporter;

pub use artifact_publisher::{ArtifactPublisher, ArtifactStore, HttpArtifactStore};
pub use captcha_solver::{parse_challenge, CaptchaSolver};
pub use ocr::{build_ocr_engine, OcrEngine, TesseractOcr, VisionOcr};
pub use status_reporter::{HistoryRecord, HttpStatusStore, StatusReporter, StatusStore};
