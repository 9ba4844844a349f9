//! # Rusty ECR
//!
//! Reads and writes engineering change request forms kept in `.xlsx` workbooks. The forms
//! are semi-structured: values are found next to captions rather than at fixed addresses,
//! and repeated sections grow and shrink between form versions.
//!
//! ## Layers
//!
//! - [`spreadsheet`]: one worksheet as a merge-aware [`Grid`], with row insertion that keeps
//!   merges and formulas consistent, and in-place saving of the workbook.
//! - [`form`]: caption lookup, section reading and writing, and the built-in layouts of the
//!   Change Request and Field Change Request forms.
//! - [`collab`]: validation, persistence and notification of assembled forms.
//! - [`workflow`]: [`read_form`], [`write_form`] and [`ingest`].
//!
//! ## Example
//!
//! ```no_run
//! use rusty_ecr::{read_form, Criteria};
//! use rusty_ecr::form::layouts::change_request;
//!
//! let model = read_form("CR-0042.xlsx", &change_request::layout(), &Criteria::default())?;
//! println!("{}: {}", model.identifier(), model.scalar("reason"));
//! # Ok::<(), rusty_ecr::RustyEcrError>(())
//! ```

pub mod collab;
pub mod error;
pub mod form;
pub(crate) mod helpers;
pub mod spreadsheet;
pub mod workflow;

pub use error::RustyEcrError;
pub use form::layout::FormLayout;
pub use form::model::FormModel;
pub use spreadsheet::criteria::Criteria;
pub use spreadsheet::grid::Grid;
pub use workflow::ingest;
pub use workflow::read_form;
pub use workflow::write_form;
