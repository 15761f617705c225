//! Utility functions shared by the library and the CLI host.
//!
//! - **Base URL validation**: HTTPS enforcement for the feed service gateway
//! - **Text processing**: terminal-safe cleanup and width-aware truncation
//!
//! ```
//! use chatter::util::{display_width, truncate_to_width};
//!
//! assert_eq!(display_width("Hello 世界"), 10);
//! assert_eq!(truncate_to_width("A rather long post body", 10), "A rathe...");
//! ```

mod base_url;
mod text;

pub use base_url::{validate_base_url, UrlValidationError};
pub use text::{display_width, single_line, strip_control_chars, truncate_to_width};
