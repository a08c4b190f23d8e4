#![cfg_attr(test, allow(unused_crate_dependencies))]

//! Postal-code lookups.
//!
//! A [`PostalTable`] is loaded once from a JSON file mapping country code to
//! postal code to an ordered list of [`PostalCandidate`]s:
//!
//! ```json
//! {
//!   "GBR": {
//!     "SW1A 1AA": [
//!       { "id": "101750367", "name": "London", "layer": "locality" }
//!     ]
//!   }
//! }
//! ```
//!
//! Country and postal codes are normalised on load and on lookup, see
//! [`normalize_code`].

mod error;
mod table;

pub use error::PostalError;
pub use table::{PostalCandidate, PostalTable, normalize_code, normalize_country};
