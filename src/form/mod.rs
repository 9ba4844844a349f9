//! # Form Layer
//!
//! Label-anchored reading and writing of semi-structured forms. A [`layout::FormLayout`]
//! lists where every field of a form version lives: fixed coordinates, captions, and
//! repeated sections delimited by labels. [`layout::assemble`] turns a grid into a
//! [`model::FormModel`]; [`layout::fill`] writes one back, growing the template's reserved
//! rows where a section holds more records than the template has room for.

pub mod descriptor;
pub mod layout;
pub mod layouts;
pub mod locator;
pub mod model;
pub mod reader;
pub mod record;
pub mod writer;
