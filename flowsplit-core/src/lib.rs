//! Outlet flow splitting for tree-structured vascular networks.
//!
//! A [`network::Network`] is a flat arena of vessel segments ([`element::Element`]) linked to
//! their upstream ("behind") and downstream ("front") neighbours by index. The
//! [`splitting::FlowSplitting`] engine writes three families of coefficients back onto the
//! elements:
//!
//! - **alpha**: the share of flow entering each daughter branch of a bifurcation, computed from
//!   the cross-sectional area immediately downstream of each daughter.
//! - **beta**: the share of the inlet flow leaving each outlet, the product of every ancestor
//!   alpha on the path back to the inlet.
//! - **gamma**: an area-proportional alternative to beta that ignores topology.
//!
//! The [`report`] module turns the coefficients into the tables used as boundary conditions.
pub mod element;
pub mod network;
pub mod report;
pub mod splitting;
pub mod test_utils;

pub use element::{Element, ElementId, ElementIndex, ElementRole};
pub use network::{Network, NetworkError};
pub use splitting::{AreaMode, FlowSplitting, FlowSplittingError, OutletCoefficient, TopologyError};
