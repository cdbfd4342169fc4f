//! CLI command implementations.
//!
//! | Module   | Commands handled                     |
//! |----------|--------------------------------------|
//! | `config` | `Config` (`show`, `validate`, `init`) |
//! | `audit`  | `Audit` (`show`, `viewers`)           |

pub mod audit;
pub mod config;

pub use audit::cmd_audit;
pub use config::cmd_config;
