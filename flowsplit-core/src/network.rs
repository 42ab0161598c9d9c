use crate::element::{Element, ElementAttributes, ElementId, ElementIndex, ElementVec};
use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum NetworkError {
    #[error("Element with index `{index}` not found")]
    ElementIndexNotFound { index: ElementIndex },
    #[error("Element with id `{id}` not found")]
    ElementNotFound { id: ElementId },
    #[error("Element with id `{id}` already exists")]
    ElementAlreadyExists { id: ElementId },
    #[error("Cannot connect an element to itself: `{id}`")]
    ElementConnectToSelf { id: ElementId },
    #[error("Element `{id}` already has an upstream element (`{existing}`)")]
    BehindSegmentAlreadyDefined { id: ElementId, existing: ElementId },
    #[error("Inlet element `{id}` cannot have an upstream element")]
    InvalidConnectionToInlet { id: ElementId },
    #[error("Outlet element `{id}` cannot have downstream elements")]
    InvalidConnectionFromOutlet { id: ElementId },
    #[error("Element `{front}` is not downstream of element `{id}` and cannot be its front segment")]
    FrontSegmentNotDownstream { id: ElementId, front: ElementId },
}

/// A vascular tree stored as a flat arena of elements.
///
/// Elements are kept in insertion order, which is the order every computation visits them in.
/// Connectivity is expressed with indices into the arena: each element knows its upstream
/// ("behind") neighbour and one representative downstream ("front") neighbour.
#[derive(Default, Debug, Clone)]
pub struct Network {
    elements: ElementVec,
    ids: HashMap<ElementId, ElementIndex>,
}

impl Network {
    pub fn elements(&self) -> &ElementVec {
        &self.elements
    }

    pub(crate) fn elements_mut(&mut self) -> &mut ElementVec {
        &mut self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Add a new element to the network.
    pub fn add_element(
        &mut self,
        id: u64,
        attributes: ElementAttributes,
    ) -> Result<ElementIndex, NetworkError> {
        let id = ElementId::from(id);
        if self.ids.contains_key(&id) {
            return Err(NetworkError::ElementAlreadyExists { id });
        }

        let index = self.elements.push_new(id, attributes);
        self.ids.insert(id, index);
        Ok(index)
    }

    /// Connect `downstream` to `upstream`.
    ///
    /// The upstream element becomes the downstream element's behind segment. The first element
    /// connected downstream of `upstream` becomes its representative front segment; further
    /// connections leave it unchanged (use [`Network::set_front_segment`] to pick another one).
    pub fn connect(&mut self, upstream: ElementIndex, downstream: ElementIndex) -> Result<(), NetworkError> {
        let upstream_element = self.elements.get(&upstream)?;
        let downstream_element = self.elements.get(&downstream)?;

        if upstream == downstream {
            return Err(NetworkError::ElementConnectToSelf {
                id: upstream_element.id(),
            });
        }
        if upstream_element.is_outlet() {
            return Err(NetworkError::InvalidConnectionFromOutlet {
                id: upstream_element.id(),
            });
        }
        if downstream_element.is_inlet() {
            return Err(NetworkError::InvalidConnectionToInlet {
                id: downstream_element.id(),
            });
        }
        if let Some(existing) = downstream_element.behind_segment() {
            return Err(NetworkError::BehindSegmentAlreadyDefined {
                id: downstream_element.id(),
                existing: self.elements.get(&existing)?.id(),
            });
        }

        debug!(
            "Connecting element {} -> {}",
            upstream_element.id(),
            downstream_element.id()
        );

        self.elements.get_mut(&downstream)?.set_behind_segment(upstream);
        let upstream_element = self.elements.get_mut(&upstream)?;
        if upstream_element.front_segment().is_none() {
            upstream_element.set_front_segment(downstream);
        }
        Ok(())
    }

    /// Override the representative front segment of `index`.
    ///
    /// `front` must already be connected directly downstream of `index`.
    pub fn set_front_segment(&mut self, index: ElementIndex, front: ElementIndex) -> Result<(), NetworkError> {
        let element = self.elements.get(&index)?;
        if index == front {
            return Err(NetworkError::ElementConnectToSelf { id: element.id() });
        }
        if element.is_outlet() {
            return Err(NetworkError::InvalidConnectionFromOutlet { id: element.id() });
        }
        let front_element = self.elements.get(&front)?;
        if front_element.behind_segment() != Some(index) {
            return Err(NetworkError::FrontSegmentNotDownstream {
                id: element.id(),
                front: front_element.id(),
            });
        }
        self.elements.get_mut(&index)?.set_front_segment(front);
        Ok(())
    }

    pub fn get_element(&self, index: &ElementIndex) -> Result<&Element, NetworkError> {
        self.elements.get(index)
    }

    pub fn get_element_index_by_id(&self, id: ElementId) -> Option<ElementIndex> {
        self.ids.get(&id).copied()
    }

    pub fn get_element_by_id(&self, id: ElementId) -> Result<&Element, NetworkError> {
        let index = self
            .get_element_index_by_id(id)
            .ok_or(NetworkError::ElementNotFound { id })?;
        self.elements.get(&index)
    }

    pub fn inlets(&self) -> impl Iterator<Item = &Element> {
        self.elements.iter().filter(|e| e.is_inlet())
    }

    pub fn outlets(&self) -> impl Iterator<Item = &Element> {
        self.elements.iter().filter(|e| e.is_outlet())
    }

    pub fn blanked(&self) -> impl Iterator<Item = &Element> {
        self.elements.iter().filter(|e| e.is_blanked())
    }

    pub fn inlet_count(&self) -> usize {
        self.inlets().count()
    }

    pub fn outlet_count(&self) -> usize {
        self.outlets().count()
    }

    /// The inlet element, if the network has exactly one.
    pub fn inlet(&self) -> Option<&Element> {
        let mut inlets = self.inlets();
        match (inlets.next(), inlets.next()) {
            (Some(inlet), None) => Some(inlet),
            _ => None,
        }
    }

    /// Reset every computed coefficient.
    pub fn clear_coefficients(&mut self) {
        for element in self.elements.iter_mut() {
            element.clear_coefficients();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_network() {
        let mut network = Network::default();

        let inlet = network.add_element(0, ElementAttributes::inlet(4.0)).unwrap();
        let left = network.add_element(1, ElementAttributes::segment(2.0).blanked(10)).unwrap();
        let right = network.add_element(2, ElementAttributes::segment(2.0).blanked(10)).unwrap();

        assert_eq!(*inlet, 0);
        assert_eq!(*left, 1);
        assert_eq!(*right, 2);

        network.connect(inlet, left).unwrap();
        network.connect(inlet, right).unwrap();

        let inlet = network.get_element(&inlet).unwrap();
        assert_eq!(inlet.behind_segment(), None);
        // The first connection is kept as the representative front segment.
        assert_eq!(inlet.front_segment(), Some(left));

        let right = network.get_element_by_id(ElementId::from(2)).unwrap();
        assert_eq!(right.behind_segment(), Some(ElementIndex::new(0)));
        assert_eq!(right.front_segment(), None);

        assert_eq!(network.inlet_count(), 1);
        assert_eq!(network.outlet_count(), 0);
        assert_eq!(network.blanked().count(), 2);
        assert_eq!(network.inlet().map(|e| e.id()), Some(ElementId::from(0)));
    }

    #[test]
    /// Test the duplicate element ids are not permitted.
    fn test_duplicate_element_id() {
        let mut network = Network::default();

        network.add_element(3, ElementAttributes::inlet(1.0)).unwrap();
        assert!(matches!(
            network.add_element(3, ElementAttributes::outlet(1.0)),
            Err(NetworkError::ElementAlreadyExists { id }) if *id == 3));
    }

    #[test]
    fn test_invalid_connections() {
        let mut network = Network::default();
        let inlet = network.add_element(0, ElementAttributes::inlet(1.0)).unwrap();
        let segment = network.add_element(1, ElementAttributes::segment(1.0)).unwrap();
        let outlet = network.add_element(2, ElementAttributes::outlet(1.0)).unwrap();

        assert!(matches!(
            network.connect(segment, segment),
            Err(NetworkError::ElementConnectToSelf { .. })
        ));
        assert!(matches!(
            network.connect(segment, inlet),
            Err(NetworkError::InvalidConnectionToInlet { .. })
        ));
        assert!(matches!(
            network.connect(outlet, segment),
            Err(NetworkError::InvalidConnectionFromOutlet { .. })
        ));

        network.connect(inlet, segment).unwrap();
        network.connect(segment, outlet).unwrap();
        assert!(matches!(
            network.connect(inlet, outlet),
            Err(NetworkError::BehindSegmentAlreadyDefined { id, existing }) if *id == 2 && *existing == 1
        ));

        assert!(matches!(
            network.connect(inlet, ElementIndex::new(42)),
            Err(NetworkError::ElementIndexNotFound { .. })
        ));
    }

    #[test]
    fn test_set_front_segment() {
        let mut network = Network::default();
        let inlet = network.add_element(0, ElementAttributes::inlet(1.0)).unwrap();
        let a = network.add_element(1, ElementAttributes::outlet(1.0)).unwrap();
        let b = network.add_element(2, ElementAttributes::outlet(1.0)).unwrap();
        network.connect(inlet, a).unwrap();
        network.connect(inlet, b).unwrap();

        network.set_front_segment(inlet, b).unwrap();
        assert_eq!(network.get_element(&inlet).unwrap().front_segment(), Some(b));
        assert!(network.set_front_segment(a, b).is_err());
    }

    #[test]
    /// Only a direct child can be the representative front segment.
    fn test_front_segment_must_be_downstream() {
        let mut network = Network::default();
        let inlet = network.add_element(0, ElementAttributes::inlet(5.0)).unwrap();
        let left = network.add_element(1, ElementAttributes::segment(1.0).blanked(10)).unwrap();
        let right = network.add_element(2, ElementAttributes::segment(1.0).blanked(10)).unwrap();
        let left_outlet = network.add_element(3, ElementAttributes::outlet(1.0)).unwrap();
        let right_outlet = network.add_element(4, ElementAttributes::outlet(1.0)).unwrap();
        network.connect(inlet, left).unwrap();
        network.connect(inlet, right).unwrap();
        network.connect(left, left_outlet).unwrap();
        network.connect(right, right_outlet).unwrap();

        // The parent.
        assert!(matches!(
            network.set_front_segment(left, inlet),
            Err(NetworkError::FrontSegmentNotDownstream { id, front }) if *id == 1 && *front == 0
        ));
        // A sibling's child.
        assert!(matches!(
            network.set_front_segment(left, right_outlet),
            Err(NetworkError::FrontSegmentNotDownstream { id, front }) if *id == 1 && *front == 4
        ));
        // A grandchild.
        assert!(matches!(
            network.set_front_segment(inlet, left_outlet),
            Err(NetworkError::FrontSegmentNotDownstream { .. })
        ));
        // The original front segment is kept.
        assert_eq!(network.get_element(&left).unwrap().front_segment(), Some(left_outlet));
    }

    #[test]
    fn test_inlet_requires_exactly_one() {
        let mut network = Network::default();
        assert!(network.inlet().is_none());
        network.add_element(0, ElementAttributes::inlet(1.0)).unwrap();
        network.add_element(1, ElementAttributes::inlet(1.0)).unwrap();
        assert_eq!(network.inlet_count(), 2);
        assert!(network.inlet().is_none());
    }
}
