pub mod evaluator;
pub mod notify;
pub mod scheduler;
pub mod store;
pub mod users;

pub use evaluator::AlertEvaluator;
pub use notify::{LogNotifier, WebhookNotifier};
pub use scheduler::{AlertScheduler, CycleOutcome, CycleReport};
pub use store::{InMemoryAlertStore, SqliteAlertStore};
pub use users::{InMemoryUserDirectory, SqliteUserDirectory};
