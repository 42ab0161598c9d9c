//! Tabular outputs used as boundary conditions or overlay labels.
use crate::element::{AreaMode, ElementId};
use crate::network::Network;
use crate::splitting::OutletCoefficient;
use nalgebra::Point3;
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use thiserror::Error;
use tracing::info;

/// Fraction of an element's length at which its diameter label is placed.
pub const DIAMETER_LABEL_POSITION: f64 = 0.666;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("The {coefficient} coefficient of outlet `{id}` has not been computed")]
    CoefficientNotComputed {
        id: ElementId,
        coefficient: OutletCoefficient,
    },
    #[error("Element `{id}` has no centerline points")]
    MissingGeometry { id: ElementId },
    #[error("Local radii were requested but element `{id}` has no local area")]
    MissingLocalArea { id: ElementId },
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Share of the inlet flow leaving one outlet.
#[derive(Clone, Debug, PartialEq)]
pub struct OutletFlow {
    pub id: ElementId,
    /// Distal end of the outlet's centerline.
    pub position: Point3<f64>,
    /// Outlet coefficient expressed as a percentage of the inlet flow.
    pub percent: f64,
}

/// Diameter of a vessel segment and where to display it.
#[derive(Clone, Debug, PartialEq)]
pub struct DiameterLabel {
    pub id: ElementId,
    pub position: Point3<f64>,
    pub diameter: f64,
}

#[derive(Serialize)]
struct OutletFlowRecord {
    id: u64,
    x: f64,
    y: f64,
    z: f64,
    percent_outflow: f64,
}

#[derive(Serialize)]
struct DiameterLabelRecord {
    id: u64,
    x: f64,
    y: f64,
    z: f64,
    diameter: f64,
}

/// One row per outlet, in network order.
pub fn outlet_flows(network: &Network, coefficient: OutletCoefficient) -> Result<Vec<OutletFlow>, ReportError> {
    network
        .outlets()
        .map(|outlet| {
            let value = coefficient
                .value(outlet)
                .ok_or(ReportError::CoefficientNotComputed {
                    id: outlet.id(),
                    coefficient,
                })?;
            let position = outlet
                .outlet_point()
                .ok_or(ReportError::MissingGeometry { id: outlet.id() })?;

            Ok(OutletFlow {
                id: outlet.id(),
                position: *position,
                percent: 100.0 * value,
            })
        })
        .collect()
}

/// One row per non-blanked element.
///
/// Blanked elements only exist to model the split at a bifurcation and are skipped. The label
/// is placed on the first centerline point at or beyond [`DIAMETER_LABEL_POSITION`] of the
/// element's length.
pub fn diameter_labels(network: &Network, area_mode: AreaMode) -> Result<Vec<DiameterLabel>, ReportError> {
    network
        .elements()
        .iter()
        .filter(|e| !e.is_blanked())
        .map(|element| {
            let position = element
                .point_at_length(element.length() * DIAMETER_LABEL_POSITION)
                .ok_or(ReportError::MissingGeometry { id: element.id() })?;
            let radius = element
                .radius(area_mode)
                .ok_or(ReportError::MissingLocalArea { id: element.id() })?;

            Ok(DiameterLabel {
                id: element.id(),
                position: *position,
                diameter: 2.0 * radius,
            })
        })
        .collect()
}

/// Prints the outlet flows to the log.
pub fn print_outlet_table(rows: &[OutletFlow]) {
    info!("{:^12}  {:^12}  {:^12} {:^12}", "X", "Y", "Z", "% outflow");
    for row in rows {
        info!(
            "{:^12.4}  {:^12.4}  {:^12.4} {:^12.2}",
            row.position.x, row.position.y, row.position.z, row.percent
        );
    }
}

/// Prints the diameter labels to the log.
pub fn print_diameter_table(rows: &[DiameterLabel]) {
    info!("{:^12}  {:^12}  {:^12} {:^12}", "X", "Y", "Z", "diameter");
    for row in rows {
        info!(
            "{:^12.4}  {:^12.4}  {:^12.4} {:^12.2}",
            row.position.x, row.position.y, row.position.z, row.diameter
        );
    }
}

pub fn write_outlet_flows<W: Write>(writer: W, rows: &[OutletFlow]) -> Result<(), ReportError> {
    let mut writer = csv::Writer::from_writer(writer);
    for row in rows {
        writer.serialize(OutletFlowRecord {
            id: *row.id,
            x: row.position.x,
            y: row.position.y,
            z: row.position.z,
            percent_outflow: row.percent,
        })?;
    }
    writer.flush().map_err(csv::Error::from)?;
    Ok(())
}

/// Write the outlet flows to a CSV file.
pub fn write_outlet_flows_csv<P: AsRef<Path>>(path: P, rows: &[OutletFlow]) -> Result<(), ReportError> {
    let file = std::fs::File::create(path.as_ref()).map_err(csv::Error::from)?;
    write_outlet_flows(file, rows)
}

pub fn write_diameter_labels<W: Write>(writer: W, rows: &[DiameterLabel]) -> Result<(), ReportError> {
    let mut writer = csv::Writer::from_writer(writer);
    for row in rows {
        writer.serialize(DiameterLabelRecord {
            id: *row.id,
            x: row.position.x,
            y: row.position.y,
            z: row.position.z,
            diameter: row.diameter,
        })?;
    }
    writer.flush().map_err(csv::Error::from)?;
    Ok(())
}

/// Write the diameter labels to a CSV file.
pub fn write_diameter_labels_csv<P: AsRef<Path>>(path: P, rows: &[DiameterLabel]) -> Result<(), ReportError> {
    let file = std::fs::File::create(path.as_ref()).map_err(csv::Error::from)?;
    write_diameter_labels(file, rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::splitting::split_flow;
    use crate::test_utils::{asymmetric_network, nested_network, symmetric_network};
    use float_cmp::assert_approx_eq;
    use std::f64::consts::PI;
    use tempfile::TempDir;

    #[test]
    fn test_outlet_flows() {
        let mut network = asymmetric_network();
        split_flow(&mut network, OutletCoefficient::Beta, AreaMode::Mean).unwrap();

        let rows = outlet_flows(&network, OutletCoefficient::Beta).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(*rows[0].id, 2);
        assert_eq!(rows[0].position, Point3::new(-0.5, 0.0, 4.5));
        assert_approx_eq!(f64, rows[0].percent, 75.0);
        assert_approx_eq!(f64, rows[1].percent, 25.0);
        assert_approx_eq!(f64, rows.iter().map(|r| r.percent).sum::<f64>(), 100.0);
    }

    #[test]
    fn test_outlet_flows_requires_coefficients() {
        let network = symmetric_network();
        assert!(matches!(
            outlet_flows(&network, OutletCoefficient::Gamma),
            Err(ReportError::CoefficientNotComputed {
                coefficient: OutletCoefficient::Gamma,
                ..
            })
        ));
    }

    #[test]
    fn test_outlet_flows_requires_geometry() {
        let mut network = nested_network();
        split_flow(&mut network, OutletCoefficient::Gamma, AreaMode::Mean).unwrap();
        assert!(matches!(
            outlet_flows(&network, OutletCoefficient::Gamma),
            Err(ReportError::MissingGeometry { .. })
        ));
    }

    #[test]
    fn test_diameter_labels() {
        let network = symmetric_network();
        let rows = diameter_labels(&network, AreaMode::Mean).unwrap();

        // The inlet and the two outlets; blanked daughters are skipped.
        assert_eq!(rows.iter().map(|r| *r.id).collect::<Vec<_>>(), vec![0, 2, 4]);
        // Inlet area is 2.0, so its diameter is 2 * sqrt(2 / pi).
        assert_approx_eq!(f64, rows[0].diameter, 2.0 * (2.0 / PI).sqrt());
        // 66.6% of a 2.0 long centerline sampled at 0.0, 1.0 and 2.0 lands on the last point.
        assert_eq!(rows[0].position, Point3::new(0.0, 0.0, 2.0));
        assert_eq!(rows[1].position, Point3::new(-0.5, 0.0, 4.5));
    }

    #[test]
    fn test_write_outlet_flows() {
        let mut network = symmetric_network();
        split_flow(&mut network, OutletCoefficient::Beta, AreaMode::Mean).unwrap();
        let rows = outlet_flows(&network, OutletCoefficient::Beta).unwrap();

        let mut buffer = Vec::new();
        write_outlet_flows(&mut buffer, &rows).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("id,x,y,z,percent_outflow"));
        assert_eq!(lines.next(), Some("2,-0.5,0.0,4.5,50.0"));
        assert_eq!(lines.next(), Some("4,0.5,0.0,4.5,50.0"));
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn test_write_diameter_labels_csv() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("diameters.csv");

        let network = symmetric_network();
        let rows = diameter_labels(&network, AreaMode::Local).unwrap();
        write_diameter_labels_csv(&path, &rows).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(headers.iter().collect::<Vec<_>>(), vec!["id", "x", "y", "z", "diameter"]);
        assert_eq!(reader.records().count(), 3);
    }
}
