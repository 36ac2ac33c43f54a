//! Data module: coordinates, id maps, variable catalogs and field storage.

pub mod coordinates;
pub mod field_store;
pub mod id_map;
pub mod variables;

pub use coordinates::Coordinates;
pub use field_store::{FieldMode, FieldSource, FieldStore};
pub use id_map::{IdMap, MapKind};
pub use variables::{VarCatalog, VarScope};
