//! Pure decisions: backoff arithmetic, the size guard and completion checks.

mod guard;
mod retry;
mod validation;

pub use guard::SizeGuard;
pub use retry::retry_delay;
pub use validation::validate_completed;
