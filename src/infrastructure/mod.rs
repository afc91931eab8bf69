pub mod chrome_page;
pub mod dialogs;
pub mod portal_page;

pub use chrome_page::ChromePage;
pub use dialogs::{DialogAction, DialogInterpreter, DialogLedger, DialogPlan, HandledDialog};
pub use portal_page::{PortalPage, Probe};
