/// Utilities for unit tests, benchmarks and smoke runs.
use crate::element::{ElementAttributes, ElementId, ElementRole};
use crate::network::{Network, NetworkError};
use float_cmp::{approx_eq, F64Margin};
use nalgebra::Point3;
use rand::Rng;
use rand_distr::{Distribution, LogNormal};

/// Bifurcation point id used by the canned single bifurcation networks.
pub const BIFURCATION_POINT: u64 = 100;

fn straight_line(from: Point3<f64>, to: Point3<f64>, num_points: usize) -> Vec<Point3<f64>> {
    let num_points = num_points.max(2);
    (0..num_points)
        .map(|i| from + (to - from) * (i as f64 / (num_points - 1) as f64))
        .collect()
}

/// An inlet feeding one bifurcation whose daughters each lead straight to an outlet.
///
/// Ids are assigned as follows: the inlet is `0`, daughter `i` is `1 + 2i` and its outlet
/// `2 + 2i`. Each daughter's own area is deliberately unrelated to its outlet's area.
pub fn single_bifurcation_network_with_local_areas(mean_areas: &[f64], local_areas: &[f64]) -> Network {
    let mut network = Network::default();
    let total: f64 = mean_areas.iter().sum();

    let top = Point3::new(0.0, 0.0, 2.0);
    let inlet = network
        .add_element(
            0,
            ElementAttributes::inlet(total)
                .with_local_area(total)
                .with_points(straight_line(Point3::origin(), top, 3))
                .with_cell_ids(vec![0]),
        )
        .unwrap();

    let offset = (mean_areas.len() as f64 - 1.0) / 2.0;
    for (i, (mean, local)) in mean_areas.iter().zip(local_areas).enumerate() {
        let x = i as f64 - offset;
        let split = Point3::new(x, 0.0, 2.5);
        let end = Point3::new(x, 0.0, 4.5);
        let id = 1 + 2 * i as u64;

        let daughter = network
            .add_element(
                id,
                ElementAttributes::segment(10.0 * (i + 1) as f64)
                    .blanked(BIFURCATION_POINT)
                    .with_points(straight_line(top, split, 2))
                    .with_cell_ids(vec![id]),
            )
            .unwrap();
        let outlet = network
            .add_element(
                id + 1,
                ElementAttributes::outlet(*mean)
                    .with_local_area(*local)
                    .with_points(straight_line(split, end, 3))
                    .with_cell_ids(vec![id + 1]),
            )
            .unwrap();

        network.connect(inlet, daughter).unwrap();
        network.connect(daughter, outlet).unwrap();
    }

    network
}

/// See [`single_bifurcation_network_with_local_areas`]; local areas equal the mean areas.
pub fn single_bifurcation_network(areas: &[f64]) -> Network {
    single_bifurcation_network_with_local_areas(areas, areas)
}

/// Two daughters with equal downstream areas.
pub fn symmetric_network() -> Network {
    single_bifurcation_network(&[1.0, 1.0])
}

/// Two daughters with downstream areas 3.0 and 1.0.
pub fn asymmetric_network() -> Network {
    single_bifurcation_network(&[3.0, 1.0])
}

/// Three daughters with downstream areas 2.0, 1.0 and 1.0.
pub fn three_way_network() -> Network {
    single_bifurcation_network(&[2.0, 1.0, 1.0])
}

/// Two levels of bifurcations separated by pass-through segments.
///
/// ```text
/// inlet(0) -+- d(1) -> outlet(3)                      area 1.0
///           +- d(2) -> seg(4) -> seg(5) -+- d(6) -> outlet(8)   area 2.0
///                       area 3.0         +- d(7) -> outlet(9)   area 2.0
/// ```
///
/// Expected betas in outlet order: 0.25, 0.375, 0.375.
pub fn nested_network() -> Network {
    let mut network = Network::default();

    let inlet = network.add_element(0, ElementAttributes::inlet(4.0)).unwrap();
    let d1 = network.add_element(1, ElementAttributes::segment(1.5).blanked(10)).unwrap();
    let d2 = network.add_element(2, ElementAttributes::segment(2.5).blanked(10)).unwrap();
    let o3 = network.add_element(3, ElementAttributes::outlet(1.0)).unwrap();
    let s4 = network.add_element(4, ElementAttributes::segment(3.0)).unwrap();
    let s5 = network.add_element(5, ElementAttributes::segment(3.5)).unwrap();
    let d6 = network.add_element(6, ElementAttributes::segment(1.0).blanked(20)).unwrap();
    let d7 = network.add_element(7, ElementAttributes::segment(1.0).blanked(20)).unwrap();
    let o8 = network.add_element(8, ElementAttributes::outlet(2.0)).unwrap();
    let o9 = network.add_element(9, ElementAttributes::outlet(2.0)).unwrap();

    network.connect(inlet, d1).unwrap();
    network.connect(inlet, d2).unwrap();
    network.connect(d1, o3).unwrap();
    network.connect(d2, s4).unwrap();
    network.connect(s4, s5).unwrap();
    network.connect(s5, d6).unwrap();
    network.connect(s5, d7).unwrap();
    network.connect(d6, o8).unwrap();
    network.connect(d7, o9).unwrap();

    network
}

/// An inlet connected straight to a single outlet.
pub fn single_outlet_network() -> Network {
    let mut network = Network::default();
    let inlet = network.add_element(0, ElementAttributes::inlet(1.0)).unwrap();
    let outlet = network.add_element(1, ElementAttributes::outlet(1.0)).unwrap();
    network.connect(inlet, outlet).unwrap();
    network
}

/// A symmetric bifurcation plus a blanked element (id `5`) whose bifurcation point (`99`) is
/// shared with no other element.
pub fn orphan_sibling_network() -> Network {
    let mut network = symmetric_network();
    let inlet = network.get_element_index_by_id(ElementId::from(0)).unwrap();
    let orphan = network.add_element(5, ElementAttributes::segment(1.0).blanked(99)).unwrap();
    let outlet = network.add_element(6, ElementAttributes::outlet(1.0)).unwrap();
    network.connect(inlet, orphan).unwrap();
    network.connect(orphan, outlet).unwrap();
    network
}

/// A symmetric bifurcation plus an outlet (id `5`) that is connected to nothing.
pub fn hanging_segment_network() -> Network {
    let mut network = symmetric_network();
    network.add_element(5, ElementAttributes::outlet(1.0)).unwrap();
    network
}

/// Make a random, valid network with `num_bifurcations` bifurcations.
///
/// Each bifurcation splits an existing leaf segment into between two and `max_daughters`
/// blanked daughters. Every daughter is followed by one or two plain segments. Leaves become
/// outlets once all the bifurcations have been placed.
pub fn make_random_network<R: Rng + ?Sized>(
    num_bifurcations: usize,
    max_daughters: usize,
    rng: &mut R,
) -> Result<Network, NetworkError> {
    struct Planned {
        parent: Option<usize>,
        bifurcation: Option<u64>,
        area: f64,
        has_children: bool,
    }

    let max_daughters = max_daughters.max(2);
    let areas = LogNormal::new(0.0, 0.5).expect("Invalid log-normal distribution");

    let mut plan = vec![Planned {
        parent: None,
        bifurcation: None,
        area: 10.0,
        has_children: false,
    }];
    let mut leaves = vec![0];

    for bifurcation in 0..num_bifurcations as u64 {
        let parent = leaves.swap_remove(rng.random_range(0..leaves.len()));
        plan[parent].has_children = true;

        let num_daughters = rng.random_range(2..=max_daughters);
        for _ in 0..num_daughters {
            plan.push(Planned {
                parent: Some(parent),
                bifurcation: Some(bifurcation),
                area: areas.sample(rng),
                has_children: true,
            });
            let mut upstream = plan.len() - 1;

            let num_segments = if rng.random_bool(0.3) { 2 } else { 1 };
            for s in 0..num_segments {
                plan.push(Planned {
                    parent: Some(upstream),
                    bifurcation: None,
                    area: areas.sample(rng),
                    has_children: s + 1 < num_segments,
                });
                upstream = plan.len() - 1;
            }
            leaves.push(upstream);
        }
    }

    let mut network = Network::default();
    let mut indices = Vec::with_capacity(plan.len());
    for (id, planned) in plan.iter().enumerate() {
        let role = if planned.parent.is_none() {
            ElementRole::Inlet
        } else if planned.has_children {
            ElementRole::Segment
        } else {
            ElementRole::Outlet
        };

        let mut attributes = ElementAttributes::new(role, planned.area)
            .with_proximal_point_id(planned.bifurcation)
            .with_local_area(planned.area * 0.9);
        attributes.blanked = planned.bifurcation.is_some();

        let index = network.add_element(id as u64, attributes)?;
        if let Some(parent) = planned.parent {
            network.connect(indices[parent], index)?;
        }
        indices.push(index);
    }

    Ok(network)
}

/// Compare two arrays of f64
pub fn assert_approx_array_eq(calculated_values: &[f64], expected_values: &[f64]) {
    assert_eq!(
        calculated_values.len(),
        expected_values.len(),
        "arrays differ in length"
    );
    let margins = F64Margin {
        epsilon: 1e-12,
        ulps: 2,
    };
    for (i, (calculated, expected)) in calculated_values.iter().zip(expected_values).enumerate() {
        if !approx_eq!(f64, *calculated, *expected, margins) {
            panic!(
                r#"assertion failed on item #{i:?}
                    actual: `{calculated:?}`,
                    expected: `{expected:?}`"#,
            )
        }
    }
}
