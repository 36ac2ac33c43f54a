//! Variable catalogs: ordered, unique variable names per scope.

use crate::mesh_error::MeshError;
use itertools::Itertools;
use std::fmt;

/// Scope a field variable is defined over.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum VarScope {
    /// One value per node.
    Nodal,
    /// One value per element, stored block by block.
    Element,
    /// One value per time step for the whole mesh.
    Global,
}

impl fmt::Display for VarScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            VarScope::Nodal => "nodal",
            VarScope::Element => "element",
            VarScope::Global => "global",
        })
    }
}

/// Ordered variable names of one scope; index order is the codec's
/// variable numbering minus one.
#[derive(Clone, Debug, PartialEq)]
pub struct VarCatalog {
    scope: VarScope,
    names: Vec<String>,
}

impl VarCatalog {
    pub fn new(scope: VarScope) -> Self {
        Self {
            scope,
            names: Vec::new(),
        }
    }

    /// Builds a catalog, rejecting repeated names.
    pub fn try_from_names(scope: VarScope, names: Vec<String>) -> Result<Self, MeshError> {
        if let Some(name) = names.iter().duplicates().next() {
            return Err(MeshError::DuplicateVariable {
                scope,
                name: name.clone(),
            });
        }
        Ok(Self { scope, names })
    }

    #[inline]
    pub fn scope(&self) -> VarScope {
        self.scope
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    #[inline]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Appends a name and returns its index.
    pub fn try_push(&mut self, name: impl Into<String>) -> Result<usize, MeshError> {
        let name = name.into();
        if self.names.contains(&name) {
            return Err(MeshError::DuplicateVariable {
                scope: self.scope,
                name,
            });
        }
        self.names.push(name);
        Ok(self.names.len() - 1)
    }

    /// 0-based index of `name`.
    pub fn index_of(&self, name: &str) -> Result<usize, MeshError> {
        self.names
            .iter()
            .position(|n| n == name)
            .ok_or_else(|| MeshError::UnknownVariable {
                scope: self.scope,
                name: name.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_unique() {
        let err = VarCatalog::try_from_names(
            VarScope::Nodal,
            vec!["temp".into(), "disp".into(), "temp".into()],
        )
        .unwrap_err();
        assert_eq!(
            err,
            MeshError::DuplicateVariable {
                scope: VarScope::Nodal,
                name: "temp".into()
            }
        );

        let mut catalog = VarCatalog::new(VarScope::Element);
        assert_eq!(catalog.try_push("density").unwrap(), 0);
        assert!(catalog.try_push("density").is_err());
    }

    #[test]
    fn lookup_reports_scope() {
        let catalog = VarCatalog::try_from_names(VarScope::Global, vec!["energy".into()]).unwrap();
        assert_eq!(catalog.index_of("energy").unwrap(), 0);
        assert_eq!(
            catalog.index_of("mass").unwrap_err(),
            MeshError::UnknownVariable {
                scope: VarScope::Global,
                name: "mass".into()
            }
        );
    }
}
