pub mod backend;
pub mod log;
pub mod webhook;

pub use backend::{DeltaNotice, Notifier};
pub use log::LogNotifier;
pub use webhook::WebhookNotifier;
