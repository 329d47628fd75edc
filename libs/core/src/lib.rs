//! Tagline Core - Wire data model
//!
//! Tags, frames and the line-oriented frame grammar shared by every
//! tagline component. Nothing here touches a runtime or a socket.
//!
//! # Example
//!
//! ```
//! use tagline_core::{Frame, Parsed, Tag};
//!
//! let tag = Tag::new("1", 5).unwrap();
//! let frame = Frame::request(&tag, r#"{"a":1}"#);
//! assert_eq!(frame.as_text(), Some(r#"1.--5,,{"a":1}"#));
//!
//! match frame.parse() {
//!     Parsed::Match { tag: parsed, data } => {
//!         assert_eq!(parsed, tag);
//!         assert_eq!(data.as_deref(), Some(r#"{"a":1}"#));
//!     }
//!     Parsed::NoMatch => unreachable!(),
//! }
//! ```

pub mod error;
pub mod frame;
pub mod tag;

pub use error::{Error, Result};
pub use frame::{Frame, Parsed};
pub use tag::Tag;
