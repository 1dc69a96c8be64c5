//! Two-phase push protocol for fbox.
//!
//! A push first asks which blobs the server lacks ([`PushCoordinator::plan`]),
//! uploads only those out of band, then asks the server to record the commit
//! and advance the branch ([`PushCoordinator::finalize`]):
//!
//! ```text
//! PLANNING -> upload missing blobs -> FINALIZING -> COMMITTED | CONFLICT | REJECTED
//! ```

pub mod coordinator;
pub mod error;

pub use coordinator::{FinalizeRequest, PushCoordinator, PushPlan};
pub use error::{PushError, PushResult};
