//! Domain layer: the `Job` aggregate and its value objects.
//!
//! This is the only aggregate in the system (`spec.md` §3) — everything
//! else (queue state, model status) is ephemeral and lives in the
//! components that own it.

mod error_info;
mod job;
mod status;

pub use error_info::{ErrorInfo, ErrorKind};
pub use job::Job;
pub use status::JobStatus;

use rand::Rng;
use rand::distr::Alphanumeric;

/// Generate a `JOB-XXXXXX` id: 6 characters drawn uniformly from `[A-Z0-9]`
/// using a cryptographically secure RNG.
///
/// Grounded on `original_source/app/config.py`'s `secrets.choice` over
/// `string.ascii_uppercase + string.digits`; here `rand::rng()` (OS-seeded)
/// is sampled and filtered to uppercase-alphanumeric, discarding lowercase
/// draws, to keep the character distribution uniform over the 36-symbol
/// alphabet rather than biased by folding case.
pub fn generate_job_id() -> String {
    let mut rng = rand::rng();
    let mut suffix = String::with_capacity(6);
    while suffix.len() < 6 {
        let c = rng.sample(Alphanumeric) as char;
        let upper = c.to_ascii_uppercase();
        if upper.is_ascii_digit() || upper.is_ascii_uppercase() {
            suffix.push(upper);
        }
    }
    format!("JOB-{suffix}")
}
