use crate::element::{ElementRoleSchema, ElementSchema};
use flowsplit_core::element::{AreaMode, ElementId, ElementIndex};
use flowsplit_core::network::{Network, NetworkError};
use schemars::JsonSchema;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum NetworkSchemaReadError {
    #[error("IO error on path `{path}`: {error}")]
    IO { path: PathBuf, error: std::io::Error },
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum NetworkSchemaBuildError {
    #[error("Failed to add element `{id}`: {source}")]
    AddElementError {
        id: u64,
        #[source]
        source: NetworkError,
    },
    #[error("Element `{id}` refers to unknown {link} element `{reference}`")]
    ElementReferenceNotFound { id: u64, reference: u64, link: &'static str },
    #[error("Failed to connect element `{behind}` -> `{id}`: {source}")]
    ConnectError {
        id: u64,
        behind: u64,
        #[source]
        source: NetworkError,
    },
    #[error("Failed to set the front segment of element `{id}` to `{front}`: {source}")]
    SetFrontSegmentError {
        id: u64,
        front: u64,
        #[source]
        source: NetworkError,
    },
    #[error("Invalid local radii threshold: {0}")]
    InvalidLocalRadii(f64),
}

/// A resolved vascular network.
///
/// `local_radii` mirrors the user facing threshold: any strictly positive value selects the
/// local areas for every area based computation.
#[derive(serde::Deserialize, serde::Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct NetworkSchema {
    pub elements: Vec<ElementSchema>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_radii: Option<f64>,
}

impl FromStr for NetworkSchema {
    type Err = NetworkSchemaReadError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        Ok(serde_json::from_str(data)?)
    }
}

impl NetworkSchema {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, NetworkSchemaReadError> {
        let data = std::fs::read_to_string(path.as_ref()).map_err(|error| NetworkSchemaReadError::IO {
            path: path.as_ref().to_path_buf(),
            error,
        })?;
        data.parse()
    }

    pub fn get_element_by_id(&self, id: u64) -> Option<&ElementSchema> {
        self.elements.iter().find(|e| e.id == id)
    }

    /// The area mode selected by `local_radii`.
    pub fn area_mode(&self) -> Result<AreaMode, NetworkSchemaBuildError> {
        match self.local_radii {
            None => Ok(AreaMode::Mean),
            Some(threshold) if threshold.is_nan() || threshold < 0.0 => {
                Err(NetworkSchemaBuildError::InvalidLocalRadii(threshold))
            }
            Some(threshold) => Ok(AreaMode::from_local_radii(threshold)),
        }
    }

    /// Build the core network.
    ///
    /// Elements are added in document order, then linked to their `behind` element, and
    /// finally any explicit `front` overrides are applied.
    pub fn build_network(&self) -> Result<Network, NetworkSchemaBuildError> {
        let mut network = Network::default();
        let mut indices = HashMap::with_capacity(self.elements.len());

        for element in &self.elements {
            let index = network
                .add_element(element.id, element.attributes())
                .map_err(|source| NetworkSchemaBuildError::AddElementError { id: element.id, source })?;
            indices.insert(element.id, index);
        }

        let lookup = |id: u64, reference: u64, link: &'static str| {
            indices
                .get(&reference)
                .copied()
                .ok_or(NetworkSchemaBuildError::ElementReferenceNotFound { id, reference, link })
        };

        for element in &self.elements {
            if let Some(behind) = element.behind {
                let upstream = lookup(element.id, behind, "behind")?;
                let downstream = lookup(element.id, element.id, "behind")?;
                network
                    .connect(upstream, downstream)
                    .map_err(|source| NetworkSchemaBuildError::ConnectError {
                        id: element.id,
                        behind,
                        source,
                    })?;
            }
        }

        for element in &self.elements {
            if let Some(front) = element.front {
                let index = lookup(element.id, element.id, "front")?;
                let front_index = lookup(element.id, front, "front")?;
                network
                    .set_front_segment(index, front_index)
                    .map_err(|source| NetworkSchemaBuildError::SetFrontSegmentError {
                        id: element.id,
                        front,
                        source,
                    })?;
            }
        }

        debug!(
            "Built network with {} elements ({} outlets)",
            network.len(),
            network.outlet_count()
        );
        Ok(network)
    }

    /// Rebuild a schema from a core network.
    pub fn from_network(network: &Network) -> Self {
        let id_of = |index: ElementIndex| network.get_element(&index).map(|e| *e.id()).ok();

        let elements = network
            .elements()
            .iter()
            .map(|element| ElementSchema {
                id: *element.id(),
                role: element.role().into(),
                blanked: element.is_blanked(),
                proximal_point_id: element.proximal_point_id(),
                behind: element.behind_segment().and_then(id_of),
                front: element.front_segment().and_then(id_of),
                mean_area: element.mean_area(),
                local_area: element.local_area(),
                points: element.points().iter().map(|p| [p.x, p.y, p.z]).collect(),
                cell_ids: element.cell_ids().to_vec(),
            })
            .collect();

        Self {
            elements,
            local_radii: None,
        }
    }

    /// Id of the only inlet, if any.
    pub fn inlet_id(&self) -> Option<ElementId> {
        self.elements
            .iter()
            .find(|e| e.role == ElementRoleSchema::Inlet)
            .map(|e| ElementId::from(e.id))
    }
}
