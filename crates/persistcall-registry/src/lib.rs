//! Static metadata for persistcall.
//!
//! - [`TypeRegistry`]: host types and their invocable members, the lookup
//!   table member resolution runs against
//! - [`TypeBuilder`]: typed registration of methods, fields, properties and
//!   implicit conversion operators
//! - [`ConversionRegistry`]: built-in, registered and discovered conversions
//! - [`InstantiationTable`]: holder and thunk-factory instantiations that a
//!   restricted target registers ahead of time

mod builder;
pub mod conversion;
mod entries;
mod instantiation_table;
mod registry;

pub use builder::TypeBuilder;
pub use conversion::{ConversionEntry, ConversionKind, ConversionRegistry, ConversionStatus};
pub use entries::{MemberEntry, TypeEntry};
pub use instantiation_table::InstantiationTable;
pub use registry::{BaseChain, TypeRegistry};
