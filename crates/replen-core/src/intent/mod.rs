//! Intent data model.
//!
//! An intent records a liquidity operation (add, remove, rebalance) that a
//! client wants performed at or after a given time. Identity fields never
//! change after creation; only the registry mutates the lifecycle fields.
//!
//! # Example
//!
//! ```
//! use chrono::{Duration, Utc};
//! use replen_core::intent::{Amount, Intent, IntentAction, IntentStatus};
//!
//! let intent = Intent::new(
//!     "I1",
//!     IntentAction::Add,
//!     "0xabc",
//!     "pool-1",
//!     Amount::from_minor_units(100),
//!     "0xsigner",
//!     Utc::now() - Duration::seconds(1),
//! );
//!
//! assert_eq!(intent.status, IntentStatus::Pending);
//! assert!(intent.is_due(Utc::now()));
//! ```

mod amount;
mod types;

pub use amount::Amount;
pub use types::{Intent, IntentAction, IntentDraft, IntentStatus};
