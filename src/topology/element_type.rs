//! Topology tag for element blocks.
//!
//! Exodus files name block topologies with free-form strings such as
//! `"TRI3"` or `"HEX"`. [`ElementTopology`] parses the common spellings into
//! a typed tag and keeps anything unrecognized verbatim so that writing a
//! block back emits the token it was read with.

use std::fmt;
use std::str::FromStr;

/// Element topology of a block.
#[derive(Clone, Debug, Eq, Hash, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum ElementTopology {
    /// 2-node line element.
    Bar2,
    /// 3-node triangle.
    Tri3,
    /// 6-node quadratic triangle.
    Tri6,
    /// 4-node quadrilateral.
    Quad4,
    /// 8-node serendipity quadrilateral.
    Quad8,
    /// 9-node Lagrange quadrilateral.
    Quad9,
    /// 4-node shell.
    Shell4,
    /// 4-node tetrahedron.
    Tetra4,
    /// 10-node quadratic tetrahedron.
    Tetra10,
    /// 8-node hexahedron.
    Hex8,
    /// 20-node serendipity hexahedron.
    Hex20,
    /// 27-node Lagrange hexahedron.
    Hex27,
    /// 6-node wedge.
    Wedge6,
    /// 5-node pyramid.
    Pyramid5,
    /// Any token not listed above, preserved as read.
    Other(String),
}

impl ElementTopology {
    /// Canonical token written to the file.
    pub fn to_token(&self) -> &str {
        match self {
            ElementTopology::Bar2 => "BAR2",
            ElementTopology::Tri3 => "TRI3",
            ElementTopology::Tri6 => "TRI6",
            ElementTopology::Quad4 => "QUAD4",
            ElementTopology::Quad8 => "QUAD8",
            ElementTopology::Quad9 => "QUAD9",
            ElementTopology::Shell4 => "SHELL4",
            ElementTopology::Tetra4 => "TETRA4",
            ElementTopology::Tetra10 => "TETRA10",
            ElementTopology::Hex8 => "HEX8",
            ElementTopology::Hex20 => "HEX20",
            ElementTopology::Hex27 => "HEX27",
            ElementTopology::Wedge6 => "WEDGE6",
            ElementTopology::Pyramid5 => "PYRAMID5",
            ElementTopology::Other(token) => token,
        }
    }

    /// Parses a topology token. Never fails: unknown tokens become `Other`.
    pub fn from_token(token: &str) -> Self {
        match token.trim().to_ascii_uppercase().as_str() {
            "BAR" | "BAR2" | "BEAM" | "BEAM2" | "TRUSS" | "TRUSS2" => ElementTopology::Bar2,
            "TRI" | "TRI3" | "TRIANGLE" => ElementTopology::Tri3,
            "TRI6" => ElementTopology::Tri6,
            "QUAD" | "QUAD4" => ElementTopology::Quad4,
            "QUAD8" => ElementTopology::Quad8,
            "QUAD9" => ElementTopology::Quad9,
            "SHELL" | "SHELL4" => ElementTopology::Shell4,
            "TET" | "TETRA" | "TET4" | "TETRA4" => ElementTopology::Tetra4,
            "TET10" | "TETRA10" => ElementTopology::Tetra10,
            "HEX" | "HEX8" => ElementTopology::Hex8,
            "HEX20" => ElementTopology::Hex20,
            "HEX27" => ElementTopology::Hex27,
            "WEDGE" | "WEDGE6" => ElementTopology::Wedge6,
            "PYRAMID" | "PYRAMID5" => ElementTopology::Pyramid5,
            _ => ElementTopology::Other(token.to_string()),
        }
    }

    /// Number of nodes per element implied by the topology, if known.
    pub fn nodes_per_element(&self) -> Option<usize> {
        match self {
            ElementTopology::Bar2 => Some(2),
            ElementTopology::Tri3 => Some(3),
            ElementTopology::Tri6 => Some(6),
            ElementTopology::Quad4 | ElementTopology::Shell4 | ElementTopology::Tetra4 => Some(4),
            ElementTopology::Quad8 | ElementTopology::Hex8 => Some(8),
            ElementTopology::Quad9 => Some(9),
            ElementTopology::Tetra10 => Some(10),
            ElementTopology::Hex20 => Some(20),
            ElementTopology::Hex27 => Some(27),
            ElementTopology::Wedge6 => Some(6),
            ElementTopology::Pyramid5 => Some(5),
            ElementTopology::Other(_) => None,
        }
    }
}

impl FromStr for ElementTopology {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_token(s))
    }
}

impl fmt::Display for ElementTopology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_token())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_map_to_canonical_tokens() {
        assert_eq!(ElementTopology::from_token("tri"), ElementTopology::Tri3);
        assert_eq!(ElementTopology::from_token("TETRA"), ElementTopology::Tetra4);
        assert_eq!(ElementTopology::from_token(" hex "), ElementTopology::Hex8);
        assert_eq!(ElementTopology::Hex8.to_token(), "HEX8");
    }

    #[test]
    fn unknown_token_is_preserved() {
        let topo = ElementTopology::from_token("NSIDED");
        assert_eq!(topo, ElementTopology::Other("NSIDED".into()));
        assert_eq!(topo.to_token(), "NSIDED");
        assert_eq!(topo.nodes_per_element(), None);
    }
}
