use flowsplit_core::element::{ElementAttributes, ElementRole};
use nalgebra::Point3;
use schemars::JsonSchema;
use std::fmt::{Display, Formatter};

#[derive(serde::Deserialize, serde::Serialize, Copy, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ElementRoleSchema {
    Inlet,
    Outlet,
    #[default]
    Segment,
}

impl From<ElementRoleSchema> for ElementRole {
    fn from(role: ElementRoleSchema) -> Self {
        match role {
            ElementRoleSchema::Inlet => ElementRole::Inlet,
            ElementRoleSchema::Outlet => ElementRole::Outlet,
            ElementRoleSchema::Segment => ElementRole::Segment,
        }
    }
}

impl From<ElementRole> for ElementRoleSchema {
    fn from(role: ElementRole) -> Self {
        match role {
            ElementRole::Inlet => ElementRoleSchema::Inlet,
            ElementRole::Outlet => ElementRoleSchema::Outlet,
            ElementRole::Segment => ElementRoleSchema::Segment,
        }
    }
}

/// A single vessel segment.
///
/// `behind` and `front` hold the ids of the upstream element and of a representative downstream
/// element. When `front` is omitted the first element (in document order) naming this element
/// as its `behind` is used.
#[derive(serde::Deserialize, serde::Serialize, Clone, Debug, PartialEq, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ElementSchema {
    pub id: u64,
    #[serde(default)]
    pub role: ElementRoleSchema,
    #[serde(default)]
    pub blanked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proximal_point_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub behind: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub front: Option<u64>,
    pub mean_area: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_area: Option<f64>,
    /// Centerline points, from the proximal to the distal end.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub points: Vec<[f64; 3]>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cell_ids: Vec<u64>,
}

impl ElementSchema {
    pub fn attributes(&self) -> ElementAttributes {
        let mut attributes = ElementAttributes::new(self.role.into(), self.mean_area)
            .with_proximal_point_id(self.proximal_point_id)
            .with_points(self.points.iter().map(|p| Point3::from(*p)).collect())
            .with_cell_ids(self.cell_ids.clone());
        attributes.blanked = self.blanked;
        attributes.local_area = self.local_area;
        attributes
    }
}

const LINK_SYMBOL: &str = "->";

impl Display for ElementSchema {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.behind {
            Some(behind) => write!(f, "{}{}{}", behind, LINK_SYMBOL, self.id),
            None => write!(f, "{}", self.id),
        }
    }
}
