//! The flow splitting engine.
//!
//! For a network division with N daughter branches the alpha coefficient of daughter `i` is
//!
//! ```text
//! alpha_i = S_i / (S_1 + ... + S_N)
//! ```
//!
//! where `S_j` is the cross-sectional area of the segment immediately downstream of daughter
//! `j` (its front segment), not the daughter's own area. Measurements taken right at a
//! bifurcation point are unreliable, so the area one segment further down is used instead.
//!
//! The beta coefficient of an outlet is the product of the alphas met while walking from the
//! outlet back to the inlet, i.e. the share of the inlet flow that leaves through that outlet.
//! The gamma coefficient is a topology free alternative: the outlet's area over the total
//! outlet area.
use crate::element::{Element, ElementId, ElementIndex};
use crate::network::{Network, NetworkError};
use std::collections::HashMap;
use std::fmt;
use std::fmt::{Display, Formatter};
use thiserror::Error;
use tracing::{debug, info};

pub use crate::element::AreaMode;

/// Absolute tolerance on the sum of the outlet coefficients.
pub const FLOW_BALANCE_TOLERANCE: f64 = 1e-6;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Coefficient {
    Alpha,
    Beta,
    Gamma,
}

impl Display for Coefficient {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Alpha => write!(f, "alpha"),
            Self::Beta => write!(f, "beta"),
            Self::Gamma => write!(f, "gamma"),
        }
    }
}

/// The coefficients that describe the share of the inlet flow leaving an outlet.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum OutletCoefficient {
    /// Topology aware split (product of the alphas up to the inlet).
    #[default]
    Beta,
    /// Split proportional to the outlet areas.
    Gamma,
}

impl OutletCoefficient {
    /// The value of this coefficient on `element`, if computed.
    pub fn value(&self, element: &Element) -> Option<f64> {
        match self {
            Self::Beta => element.beta(),
            Self::Gamma => element.gamma(),
        }
    }
}

impl From<OutletCoefficient> for Coefficient {
    fn from(c: OutletCoefficient) -> Self {
        match c {
            OutletCoefficient::Beta => Coefficient::Beta,
            OutletCoefficient::Gamma => Coefficient::Gamma,
        }
    }
}

impl Display for OutletCoefficient {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Coefficient::from(*self).fmt(f)
    }
}

/// The set of coefficient families computed so far.
///
/// Flags are only ever added; a successful computation marks its family as ready and nothing
/// clears it.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Readiness(u8);

impl Readiness {
    fn bit(coefficient: Coefficient) -> u8 {
        match coefficient {
            Coefficient::Alpha => 0b001,
            Coefficient::Beta => 0b010,
            Coefficient::Gamma => 0b100,
        }
    }

    pub fn contains(&self, coefficient: Coefficient) -> bool {
        self.0 & Self::bit(coefficient) != 0
    }

    fn insert(&mut self, coefficient: Coefficient) {
        self.0 |= Self::bit(coefficient);
    }
}

/// The network does not have the shape flow splitting requires.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum TopologyError {
    #[error("The network has {found} outlet(s); at least two are required to split the flow")]
    TooFewOutlets { found: usize },
    #[error("The network has {found} inlet(s); exactly one is required")]
    InletCount { found: usize },
    #[error(
        "Element `{id}` has no parent while searching for the network root. The network is made of one segment or the centerlines have a hanging segment"
    )]
    NoParent { id: ElementId },
    #[error("Blanked element `{id}` has no front segment")]
    MissingFrontSegment { id: ElementId },
    #[error("The path from outlet `{id}` never reaches the inlet; the network contains a cycle")]
    Cycle { id: ElementId },
    #[error("{0}")]
    Network(#[from] NetworkError),
}

#[derive(Error, Debug, PartialEq)]
pub enum FlowSplittingError {
    #[error("Topology error: {0}")]
    Topology(#[from] TopologyError),
    #[error(
        "Adjacent branch not found for blanked element `{id}` (bifurcation point: {proximal_point_id:?}, cell: {cell_id:?}). Check the connectivity and/or the tolerance used to compute it"
    )]
    Connectivity {
        id: ElementId,
        proximal_point_id: Option<u64>,
        cell_id: Option<u64>,
    },
    #[error("The {required} coefficients need to be computed before the {requested} coefficients")]
    Sequencing {
        requested: Coefficient,
        required: Coefficient,
    },
    #[error("The sum of the outlet {coefficient} coefficients is {sum}, expected 1.0 (tolerance: {tolerance})")]
    Conservation {
        coefficient: Coefficient,
        sum: f64,
        tolerance: f64,
    },
    #[error("Element `{id}` has an invalid area: {area}")]
    InvalidArea { id: ElementId, area: f64 },
    #[error("Local areas were requested but element `{id}` has none")]
    MissingLocalArea { id: ElementId },
}

impl From<NetworkError> for FlowSplittingError {
    fn from(e: NetworkError) -> Self {
        Self::Topology(TopologyError::Network(e))
    }
}

/// Computes the flow splitting coefficients of a network.
///
/// The engine only keeps track of which coefficients have been computed; the values themselves
/// are written onto the network's elements. Each step stages its results and writes them only
/// once every element has been processed, so a failed step leaves the network untouched.
#[derive(Debug, Default, Clone)]
pub struct FlowSplitting {
    readiness: Readiness,
}

impl FlowSplitting {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn readiness(&self) -> Readiness {
        self.readiness
    }

    pub fn coefficient_ready(&self, coefficient: impl Into<Coefficient>) -> bool {
        self.readiness.contains(coefficient.into())
    }

    /// Compute the alpha coefficient of every blanked element.
    ///
    /// Non-blanked elements are left without an alpha; they do not divide the flow and count
    /// as `1.0` in any product (see [`Element::effective_alpha`]).
    pub fn compute_alphas(&mut self, network: &mut Network, area_mode: AreaMode) -> Result<(), FlowSplittingError> {
        let outlet_count = network.outlet_count();
        if outlet_count < 2 {
            return Err(TopologyError::TooFewOutlets { found: outlet_count }.into());
        }
        check_single_inlet(network)?;

        // Downstream area of each blanked element, in network order.
        let mut downstream = Vec::new();
        for element in network.blanked() {
            let front_index = element
                .front_segment()
                .ok_or(TopologyError::MissingFrontSegment { id: element.id() })?;
            let front = network.get_element(&front_index)?;
            downstream.push((element, checked_area(front, area_mode)?));
        }

        // Total downstream area and number of daughters of each bifurcation point.
        let mut groups: HashMap<u64, (f64, usize)> = HashMap::new();
        for (element, area) in &downstream {
            if let Some(key) = element.proximal_point_id() {
                let group = groups.entry(key).or_insert((0.0, 0));
                group.0 += area;
                group.1 += 1;
            }
        }

        let mut staged: Vec<(ElementIndex, f64)> = Vec::with_capacity(downstream.len());
        for (element, area) in &downstream {
            let sum_surfaces = match element.proximal_point_id().and_then(|key| groups.get(&key)) {
                // At least one adjacent blanked branch must share the bifurcation point.
                Some((sum, count)) if *count > 1 => *sum,
                _ => {
                    return Err(FlowSplittingError::Connectivity {
                        id: element.id(),
                        proximal_point_id: element.proximal_point_id(),
                        cell_id: element.first_cell_id(),
                    });
                }
            };

            let alpha = area / sum_surfaces;
            debug!(
                "Alpha of element {} (bifurcation point {:?}): {alpha}",
                element.id(),
                element.proximal_point_id()
            );
            staged.push((element.index(), alpha));
        }

        let count = staged.len();
        let elements = network.elements_mut();
        for (index, alpha) in staged {
            elements.get_mut(&index)?.set_alpha(alpha);
        }

        info!("Computed {count} alpha coefficient(s) using {area_mode} areas");
        self.readiness.insert(Coefficient::Alpha);
        Ok(())
    }

    /// Compute the beta coefficient of every outlet.
    ///
    /// Beta is the product of the alphas of the blanked elements met while walking upstream from
    /// the outlet to the inlet.
    pub fn compute_betas(&mut self, network: &mut Network) -> Result<(), FlowSplittingError> {
        if !self.readiness.contains(Coefficient::Alpha) {
            return Err(FlowSplittingError::Sequencing {
                requested: Coefficient::Beta,
                required: Coefficient::Alpha,
            });
        }
        check_single_inlet(network)?;

        let mut staged: Vec<(ElementIndex, f64)> = Vec::new();
        for outlet in network.outlets() {
            let beta = upstream_alpha_product(network, outlet)?;
            debug!("Beta of outlet {}: {beta}", outlet.id());
            staged.push((outlet.index(), beta));
        }

        let count = staged.len();
        let elements = network.elements_mut();
        for (index, beta) in staged {
            elements.get_mut(&index)?.set_beta(beta);
        }

        info!("Computed {count} beta coefficient(s)");
        self.readiness.insert(Coefficient::Beta);
        Ok(())
    }

    /// Compute the gamma coefficient of every outlet: its mean area over the total outlet area.
    pub fn compute_gammas(&mut self, network: &mut Network) -> Result<(), FlowSplittingError> {
        let outlet_count = network.outlet_count();
        if outlet_count < 2 {
            return Err(TopologyError::TooFewOutlets { found: outlet_count }.into());
        }
        check_single_inlet(network)?;

        let areas = network
            .outlets()
            .map(|outlet| checked_area(outlet, AreaMode::Mean).map(|area| (outlet.index(), area)))
            .collect::<Result<Vec<_>, _>>()?;
        let sum_areas: f64 = areas.iter().map(|(_, area)| area).sum();

        let elements = network.elements_mut();
        for (index, area) in areas {
            let gamma = area / sum_areas;
            let outlet = elements.get_mut(&index)?;
            debug!("Gamma of outlet {}: {gamma}", outlet.id());
            outlet.set_gamma(gamma);
        }

        info!("Computed {outlet_count} gamma coefficient(s)");
        self.readiness.insert(Coefficient::Gamma);
        Ok(())
    }

    /// Check that the computed outlet coefficients add up to 100% of the inlet flow.
    ///
    /// Coefficients that have not been computed are not checked.
    pub fn check_total_flow_rate(&self, network: &Network) -> Result<(), FlowSplittingError> {
        for coefficient in [OutletCoefficient::Beta, OutletCoefficient::Gamma] {
            if !self.coefficient_ready(coefficient) {
                continue;
            }

            let sum: f64 = network
                .outlets()
                .map(|outlet| coefficient.value(outlet).unwrap_or(0.0))
                .sum();

            // Written so that a NaN sum fails the check.
            if !((sum - 1.0).abs() <= FLOW_BALANCE_TOLERANCE) {
                return Err(FlowSplittingError::Conservation {
                    coefficient: coefficient.into(),
                    sum,
                    tolerance: FLOW_BALANCE_TOLERANCE,
                });
            }
            debug!("Sum of the outlet {coefficient} coefficients: {sum}");
        }
        Ok(())
    }
}

/// Run the usual flow splitting sequence on `network`.
///
/// For [`OutletCoefficient::Beta`] the alphas and then the betas are computed; for
/// [`OutletCoefficient::Gamma`] only the gammas. The total flow rate is checked in both cases.
/// If any step fails every coefficient on the network is cleared before returning the error.
pub fn split_flow(
    network: &mut Network,
    method: OutletCoefficient,
    area_mode: AreaMode,
) -> Result<FlowSplitting, FlowSplittingError> {
    let mut splitting = FlowSplitting::new();

    let result = match method {
        OutletCoefficient::Beta => splitting
            .compute_alphas(network, area_mode)
            .and_then(|_| splitting.compute_betas(network)),
        OutletCoefficient::Gamma => splitting.compute_gammas(network),
    }
    .and_then(|_| splitting.check_total_flow_rate(network));

    match result {
        Ok(()) => Ok(splitting),
        Err(e) => {
            network.clear_coefficients();
            Err(e)
        }
    }
}

fn check_single_inlet(network: &Network) -> Result<(), TopologyError> {
    match network.inlet_count() {
        1 => Ok(()),
        found => Err(TopologyError::InletCount { found }),
    }
}

fn checked_area(element: &Element, area_mode: AreaMode) -> Result<f64, FlowSplittingError> {
    let area = element
        .area(area_mode)
        .ok_or(FlowSplittingError::MissingLocalArea { id: element.id() })?;

    if area.is_finite() && area > 0.0 {
        Ok(area)
    } else {
        Err(FlowSplittingError::InvalidArea { id: element.id(), area })
    }
}

/// Product of the effective alphas on the path from `outlet` up to the inlet.
fn upstream_alpha_product(network: &Network, outlet: &Element) -> Result<f64, FlowSplittingError> {
    let mut beta = 1.0;
    let mut current = outlet;

    // A path in a tree visits every element at most once.
    for _ in 0..network.len() {
        let behind_index = current
            .behind_segment()
            .ok_or(TopologyError::NoParent { id: current.id() })?;
        let behind = network.get_element(&behind_index)?;

        beta *= behind.effective_alpha().ok_or(FlowSplittingError::Sequencing {
            requested: Coefficient::Beta,
            required: Coefficient::Alpha,
        })?;

        if behind.is_inlet() {
            return Ok(beta);
        }
        current = behind;
    }

    Err(TopologyError::Cycle { id: outlet.id() }.into())
}
