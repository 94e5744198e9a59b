//! Conduit Validation
//!
//! Maps a declarative spec of named fields to schema checks. Each field has a
//! [`Selector`] that extracts a candidate value from the raw input and a
//! [`Schema`] that checks (and, for numeric or boolean strings, coerces) it.
//!
//! ```ignore
//! use conduit_validation::{ValidationSpec, schema, selector};
//!
//! let spec = ValidationSpec::new()
//!   .field("id", selector::param("id"), schema::string().uuid())
//!   .field("page_size", selector::query("pageSize"), schema::integer().min(1).default(20));
//!
//! match spec.validate(&raw) {
//!   ValidationResult::Valid(input) => { /* only `id` and `page_size` */ }
//!   ValidationResult::Invalid(errors) => { /* keyed by failing field */ }
//! }
//! ```
//!
//! Output data only ever contains the declared fields, so unknown input is
//! dropped by construction.

mod error;
pub mod schema;
pub mod selector;
mod spec;

pub use error::{ErrorCode, FieldError, FieldErrors, validation_problem};
pub use schema::Schema;
pub use selector::Selector;
pub use spec::{ValidatedInput, ValidationField, ValidationResult, ValidationSpec, validate};
