//! Per-session review state: navigation history and reason editing.
//!
//! ## Components
//!
//! - [`history`]: bounded back/forward log of presented targets
//! - [`reasons`]: reason edits with confidence recomputation and restore
//!
//! ## Example
//!
//! ```
//! use warden::review::{ReasonAggregator, ReviewHistory};
//! use warden::{User, UserReasonType};
//!
//! let mut history = ReviewHistory::new(3);
//! for id in [1, 2, 3, 4] {
//!     history.push(id);
//! }
//! assert_eq!(history.ids(), &[2, 3, 4]);
//!
//! let mut user = User::new(7, "bob");
//! let mut reasons = ReasonAggregator::new();
//! reasons
//!     .upsert(&mut user, UserReasonType::Chat, "solicits in chat", 0.5, vec![])
//!     .unwrap();
//! reasons
//!     .upsert(&mut user, UserReasonType::Outfit, "outfit", 0.5, vec![])
//!     .unwrap();
//! assert_eq!(user.confidence, 0.75);
//!
//! reasons.restore(&mut user);
//! assert!(user.reasons.is_empty());
//! ```

pub mod history;
pub mod reasons;

pub use history::{DEFAULT_MAX_HISTORY_SIZE, Direction, ReviewHistory};
pub use reasons::{ReasonAggregator, ReasonChange};
