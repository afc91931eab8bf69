pub mod artifact;
pub mod captcha;
pub mod loaders;
pub mod outcome;
pub mod request;
pub mod session;

pub use artifact::{receipt_file_name, remote_receipt_key, FilingArtifact, FILING_TYPE_LABEL};
pub use captcha::{CaptchaAttempt, Operator};
pub use loaders::{load_all_requests, load_request, QueuedRequest};
pub use outcome::{FilingOutcome, FilingResponse, FilingStatus, OutcomeSlot};
pub use request::{CorrelationIds, Credential, FilingRequest, RegistrationType};
pub use session::{BannerSignals, PageState, SessionState};
