//! The line protocol shared by every resource.
//!
//! Resources render themselves into `set` statements through [`SetLines`] and
//! rebuild themselves from `| display set relative` output through a
//! [`LineTable`]. Repeated sub-blocks use the helpers in [`keyed`], and every
//! failure carries a [`FieldPath`] pointing at the offending field.

pub mod keyed;
pub mod lines;
mod path;
mod table;

pub use lines::SetLines;
pub use path::{FieldPath, Segment};
pub use table::{Handler, LineTable};
