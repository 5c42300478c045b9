//! Value system for derived queries
//!
//! This module holds both sides of argument binding:
//!
//! - **`Argument` / `ParamType`** - call-time arguments (scalars are `sea_query::Value`)
//!   and the declared types of method parameters
//! - **`WireValue` / `WireType`** - the store-native representation bound to tags
//! - **`ValueConverter` / `ConverterRegistry`** - per-type coercion for composite values
//! - **`coerce_argument`** - the conversion used by the binder

pub mod argument;
pub mod conversion;
pub mod wire;

pub use argument::{Argument, ParamMeta, ParamType};
pub use conversion::{
    coerce_argument, declared_wire_type, object_fields_to_struct, scalar_to_wire,
    ConverterRegistry, ValueConverter,
};
pub use wire::{WireType, WireValue};
