use crate::network::NetworkError;
use nalgebra::Point3;
use std::f64::consts::PI;
use std::fmt;
use std::fmt::{Display, Formatter};
use std::ops::{Deref, DerefMut};

/// Position of an element in the network's arena.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash)]
pub struct ElementIndex(usize);

impl Deref for ElementIndex {
    type Target = usize;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl ElementIndex {
    pub fn new(idx: usize) -> Self {
        Self(idx)
    }
}

impl Display for ElementIndex {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable identifier of an element, assigned by whoever built the network.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash)]
pub struct ElementId(u64);

impl Deref for ElementId {
    type Target = u64;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<u64> for ElementId {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

impl Display for ElementId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum ElementRole {
    /// The root of the network where the flow enters.
    Inlet,
    /// A terminal segment where flow leaves the network.
    Outlet,
    /// Any other segment.
    #[default]
    Segment,
}

/// Which cross-sectional area is used for area based computations.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum AreaMode {
    /// Area averaged along the whole segment.
    #[default]
    Mean,
    /// Area sampled at a single point close to the segment's start.
    Local,
}

impl AreaMode {
    /// Translate the user facing "local radii" threshold into an area mode.
    ///
    /// Any strictly positive threshold enables local radii; zero, negative or NaN values keep
    /// the length averaged areas.
    pub fn from_local_radii(threshold: f64) -> Self {
        if threshold > 0.0 {
            Self::Local
        } else {
            Self::Mean
        }
    }
}

impl Display for AreaMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mean => write!(f, "mean"),
            Self::Local => write!(f, "local"),
        }
    }
}

/// The geometric and topological description of an element as supplied by a network builder.
///
/// Connectivity is not part of the attributes; it is added with [`crate::Network::connect`]
/// once every element exists.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ElementAttributes {
    pub role: ElementRole,
    pub blanked: bool,
    pub proximal_point_id: Option<u64>,
    pub mean_area: f64,
    pub local_area: Option<f64>,
    pub points: Vec<Point3<f64>>,
    pub cell_ids: Vec<u64>,
}

impl ElementAttributes {
    pub fn new(role: ElementRole, mean_area: f64) -> Self {
        Self {
            role,
            mean_area,
            ..Default::default()
        }
    }

    pub fn inlet(mean_area: f64) -> Self {
        Self::new(ElementRole::Inlet, mean_area)
    }

    pub fn outlet(mean_area: f64) -> Self {
        Self::new(ElementRole::Outlet, mean_area)
    }

    pub fn segment(mean_area: f64) -> Self {
        Self::new(ElementRole::Segment, mean_area)
    }

    /// Mark the element as one of the daughter branches created at the bifurcation point
    /// `proximal_point_id`.
    pub fn blanked(mut self, proximal_point_id: u64) -> Self {
        self.blanked = true;
        self.proximal_point_id = Some(proximal_point_id);
        self
    }

    pub fn with_proximal_point_id(mut self, proximal_point_id: Option<u64>) -> Self {
        self.proximal_point_id = proximal_point_id;
        self
    }

    pub fn with_local_area(mut self, local_area: f64) -> Self {
        self.local_area = Some(local_area);
        self
    }

    pub fn with_points(mut self, points: Vec<Point3<f64>>) -> Self {
        self.points = points;
        self
    }

    pub fn with_cell_ids(mut self, cell_ids: Vec<u64>) -> Self {
        self.cell_ids = cell_ids;
        self
    }
}

/// A single vessel segment of the network.
#[derive(Clone, Debug, PartialEq)]
pub struct Element {
    index: ElementIndex,
    id: ElementId,
    attributes: ElementAttributes,
    behind: Option<ElementIndex>,
    front: Option<ElementIndex>,
    alpha: Option<f64>,
    beta: Option<f64>,
    gamma: Option<f64>,
}

impl Element {
    pub(crate) fn new(index: ElementIndex, id: ElementId, attributes: ElementAttributes) -> Self {
        Self {
            index,
            id,
            attributes,
            behind: None,
            front: None,
            alpha: None,
            beta: None,
            gamma: None,
        }
    }

    pub fn index(&self) -> ElementIndex {
        self.index
    }

    pub fn id(&self) -> ElementId {
        self.id
    }

    pub fn role(&self) -> ElementRole {
        self.attributes.role
    }

    pub fn is_inlet(&self) -> bool {
        self.attributes.role == ElementRole::Inlet
    }

    pub fn is_outlet(&self) -> bool {
        self.attributes.role == ElementRole::Outlet
    }

    pub fn is_blanked(&self) -> bool {
        self.attributes.blanked
    }

    /// The bifurcation point this element emanates from.
    pub fn proximal_point_id(&self) -> Option<u64> {
        self.attributes.proximal_point_id
    }

    /// The upstream neighbour, `None` for the inlet.
    pub fn behind_segment(&self) -> Option<ElementIndex> {
        self.behind
    }

    /// A representative downstream neighbour.
    pub fn front_segment(&self) -> Option<ElementIndex> {
        self.front
    }

    pub(crate) fn set_behind_segment(&mut self, behind: ElementIndex) {
        self.behind = Some(behind);
    }

    pub(crate) fn set_front_segment(&mut self, front: ElementIndex) {
        self.front = Some(front);
    }

    pub fn mean_area(&self) -> f64 {
        self.attributes.mean_area
    }

    pub fn local_area(&self) -> Option<f64> {
        self.attributes.local_area
    }

    /// The area used by `mode`; `None` if a local area was requested but never measured.
    pub fn area(&self, mode: AreaMode) -> Option<f64> {
        match mode {
            AreaMode::Mean => Some(self.attributes.mean_area),
            AreaMode::Local => self.attributes.local_area,
        }
    }

    /// Radius of the circle with the element's mean area.
    pub fn mean_radius(&self) -> f64 {
        radius_from_area(self.attributes.mean_area)
    }

    pub fn local_radius(&self) -> Option<f64> {
        self.attributes.local_area.map(radius_from_area)
    }

    pub fn radius(&self, mode: AreaMode) -> Option<f64> {
        self.area(mode).map(radius_from_area)
    }

    pub fn points(&self) -> &[Point3<f64>] {
        &self.attributes.points
    }

    pub fn cell_ids(&self) -> &[u64] {
        &self.attributes.cell_ids
    }

    /// The first centerline cell, used to identify the element in diagnostics.
    pub fn first_cell_id(&self) -> Option<u64> {
        self.attributes.cell_ids.first().copied()
    }

    /// Arc length of the element's centerline.
    pub fn length(&self) -> f64 {
        self.attributes
            .points
            .windows(2)
            .map(|w| nalgebra::distance(&w[0], &w[1]))
            .sum()
    }

    /// The distal end of the centerline, where an outlet boundary condition is applied.
    pub fn outlet_point(&self) -> Option<&Point3<f64>> {
        self.attributes.points.last()
    }

    /// Returns the first centerline point whose curvilinear abscissa reaches `length`.
    ///
    /// Lengths beyond the end of the centerline return its last point.
    pub fn point_at_length(&self, length: f64) -> Option<&Point3<f64>> {
        let points = &self.attributes.points;
        let first = points.first()?;
        if length <= 0.0 {
            return Some(first);
        }

        let mut abscissa = 0.0;
        for w in points.windows(2) {
            abscissa += nalgebra::distance(&w[0], &w[1]);
            if abscissa >= length {
                return Some(&w[1]);
            }
        }
        points.last()
    }

    pub fn alpha(&self) -> Option<f64> {
        self.alpha
    }

    /// The split factor this element contributes to a beta product.
    ///
    /// Non-blanked elements never divide the flow and always contribute `1.0`. Blanked
    /// elements contribute their alpha once computed.
    pub fn effective_alpha(&self) -> Option<f64> {
        if self.attributes.blanked {
            self.alpha
        } else {
            Some(1.0)
        }
    }

    pub fn beta(&self) -> Option<f64> {
        self.beta
    }

    pub fn gamma(&self) -> Option<f64> {
        self.gamma
    }

    pub(crate) fn set_alpha(&mut self, alpha: f64) {
        self.alpha = Some(alpha);
    }

    pub(crate) fn set_beta(&mut self, beta: f64) {
        self.beta = Some(beta);
    }

    pub(crate) fn set_gamma(&mut self, gamma: f64) {
        self.gamma = Some(gamma);
    }

    pub(crate) fn clear_coefficients(&mut self) {
        self.alpha = None;
        self.beta = None;
        self.gamma = None;
    }
}

fn radius_from_area(area: f64) -> f64 {
    (area / PI).sqrt()
}

#[derive(Default, Debug, Clone)]
pub struct ElementVec {
    elements: Vec<Element>,
}

impl Deref for ElementVec {
    type Target = Vec<Element>;

    fn deref(&self) -> &Self::Target {
        &self.elements
    }
}

impl DerefMut for ElementVec {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.elements
    }
}

impl ElementVec {
    pub fn get(&self, index: &ElementIndex) -> Result<&Element, NetworkError> {
        self.elements
            .get(index.0)
            .ok_or(NetworkError::ElementIndexNotFound { index: *index })
    }

    pub fn get_mut(&mut self, index: &ElementIndex) -> Result<&mut Element, NetworkError> {
        self.elements
            .get_mut(index.0)
            .ok_or(NetworkError::ElementIndexNotFound { index: *index })
    }

    pub fn push_new(&mut self, id: ElementId, attributes: ElementAttributes) -> ElementIndex {
        let index = ElementIndex(self.elements.len());
        let element = Element::new(index, id, attributes);
        self.elements.push(element);
        index
    }
}
