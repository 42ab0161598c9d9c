mod tracing;

use crate::tracing::setup_tracing;
use ::tracing::{info, warn};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use flowsplit_core::element::AreaMode;
use flowsplit_core::report::{
    diameter_labels, outlet_flows, print_diameter_table, print_outlet_table, write_diameter_labels_csv,
    write_outlet_flows_csv, OutletFlow,
};
use flowsplit_core::splitting::{split_flow, OutletCoefficient};
use flowsplit_core::test_utils::make_random_network;
use flowsplit_schema::NetworkSchema;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

#[derive(Copy, Clone, ValueEnum)]
enum Method {
    Beta,
    Gamma,
}

impl Display for Method {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Method::Beta => write!(f, "beta"),
            Method::Gamma => write!(f, "gamma"),
        }
    }
}

impl From<Method> for OutletCoefficient {
    fn from(method: Method) -> Self {
        match method {
            Method::Beta => OutletCoefficient::Beta,
            Method::Gamma => OutletCoefficient::Gamma,
        }
    }
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the share of the inlet flow leaving each outlet.
    Outlets {
        /// Path(s) to network JSON.
        #[arg(required = true)]
        networks: Vec<PathBuf>,
        /// Outlet coefficient to report.
        #[arg(short, long, default_value_t = Method::Beta)]
        method: Method,
        /// CSV file to write. With several networks this is a directory receiving one CSV per network.
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Local radii threshold; overrides the value in the network document.
        #[arg(short, long)]
        local_radii: Option<f64>,
        /// Process the networks in parallel.
        #[arg(short, long, default_value_t = false)]
        parallel: bool,
        /// The number of threads to use when processing in parallel.
        #[arg(short, long, default_value_t = 1)]
        threads: usize,
        #[arg(long, default_value_t = false)]
        debug: bool,
    },
    /// Compute the diameter label of each non-blanked element.
    Diameters {
        /// Path to network JSON.
        network: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Local radii threshold; overrides the value in the network document.
        #[arg(short, long)]
        local_radii: Option<f64>,
        #[arg(long, default_value_t = false)]
        debug: bool,
    },
    /// Print the JSON schema of the network document.
    Schema,
    /// Split the flow of a seeded random network.
    RunRandom {
        num_bifurcations: usize,
        max_daughters: usize,
        #[arg(short, long, default_value_t = Method::Beta)]
        method: Method,
        #[arg(long, default_value_t = false)]
        debug: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Some(command) => match command {
            Commands::Outlets {
                networks,
                method,
                output,
                local_radii,
                parallel,
                threads,
                debug,
            } => {
                setup_tracing(*debug)?;
                outlets(networks, *method, output.as_deref(), *local_radii, *parallel, *threads)?
            }
            Commands::Diameters {
                network,
                output,
                local_radii,
                debug,
            } => {
                setup_tracing(*debug)?;
                diameters(network, output.as_deref(), *local_radii)?
            }
            Commands::Schema => schema()?,
            Commands::RunRandom {
                num_bifurcations,
                max_daughters,
                method,
                debug,
            } => {
                setup_tracing(*debug)?;
                run_random(*num_bifurcations, *max_daughters, *method)?
            }
        },
        None => {}
    }

    Ok(())
}

/// Resolve the area mode; `--local-radii` takes precedence over the document's value.
fn area_mode(schema: &mut NetworkSchema, local_radii: Option<f64>) -> Result<AreaMode> {
    if local_radii.is_some() {
        schema.local_radii = local_radii;
    }
    Ok(schema.area_mode()?)
}

fn outlets(
    paths: &[PathBuf],
    method: Method,
    output: Option<&Path>,
    local_radii: Option<f64>,
    parallel: bool,
    threads: usize,
) -> Result<()> {
    if paths.len() == 1 {
        let rows = split_network(&paths[0], method, output, local_radii)?;
        print_network_outlets(&paths[0], &rows);
        return Ok(());
    }

    if let Some(dir) = output {
        std::fs::create_dir_all(dir).with_context(|| format!("Could not create output directory: `{}`", dir.display()))?;
    }
    if !parallel && threads > 1 {
        warn!("`--threads` is ignored without `--parallel`");
    }

    // Tables are printed once every network is done so that parallel runs do not interleave them.
    for (path, rows) in paths.iter().zip(split_networks(paths, method, output, local_radii, parallel, threads)?) {
        print_network_outlets(path, &rows);
    }
    Ok(())
}

/// Split the flow of every network, returning the outlet rows in the order of `paths`.
///
/// With several networks `output` is a directory receiving one CSV per network.
fn split_networks(
    paths: &[PathBuf],
    method: Method,
    output: Option<&Path>,
    local_radii: Option<f64>,
    parallel: bool,
    threads: usize,
) -> Result<Vec<Vec<OutletFlow>>> {
    let split_one = |path: &PathBuf| -> Result<Vec<OutletFlow>> {
        let csv_path = output.map(|dir| outlet_csv_path(dir, path)).transpose()?;
        split_network(path, method, csv_path.as_deref(), local_radii)
    };

    if parallel {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .context("Could not build thread pool")?;
        pool.install(|| paths.par_iter().map(split_one).collect())
    } else {
        paths.iter().map(split_one).collect()
    }
}

/// The CSV written for `path` inside the output directory `dir`.
fn outlet_csv_path(dir: &Path, path: &Path) -> Result<PathBuf> {
    let stem = path
        .file_stem()
        .with_context(|| format!("Could not derive an output file name from: `{}`", path.display()))?;
    let mut name = stem.to_os_string();
    name.push("_outlets.csv");
    Ok(dir.join(name))
}

fn split_network(path: &Path, method: Method, output: Option<&Path>, local_radii: Option<f64>) -> Result<Vec<OutletFlow>> {
    let mut schema = NetworkSchema::from_path(path).with_context(|| format!("Could not read network: `{}`", path.display()))?;
    let area_mode = area_mode(&mut schema, local_radii)?;
    let mut network = schema
        .build_network()
        .with_context(|| format!("Could not build network: `{}`", path.display()))?;

    split_flow(&mut network, method.into(), area_mode)
        .with_context(|| format!("Could not split the flow of network: `{}`", path.display()))?;

    let rows = outlet_flows(&network, method.into())?;

    if let Some(output) = output {
        write_outlet_flows_csv(output, &rows).with_context(|| format!("Could not write: `{}`", output.display()))?;
        info!("Outlet flows of {} written to {}", path.display(), output.display());
    }

    Ok(rows)
}

fn print_network_outlets(path: &Path, rows: &[OutletFlow]) {
    info!("Network: {}", path.display());
    print_outlet_table(rows);
}

fn diameters(path: &Path, output: Option<&Path>, local_radii: Option<f64>) -> Result<()> {
    let mut schema = NetworkSchema::from_path(path).with_context(|| format!("Could not read network: `{}`", path.display()))?;
    let area_mode = area_mode(&mut schema, local_radii)?;
    let network = schema
        .build_network()
        .with_context(|| format!("Could not build network: `{}`", path.display()))?;

    let rows = diameter_labels(&network, area_mode)?;
    print_diameter_table(&rows);

    if let Some(output) = output {
        write_diameter_labels_csv(output, &rows).with_context(|| format!("Could not write: `{}`", output.display()))?;
        info!("Diameter labels written to {}", output.display());
    }

    Ok(())
}

fn schema() -> Result<()> {
    let schema = flowsplit_schema::json_schema();
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}

fn run_random(num_bifurcations: usize, max_daughters: usize, method: Method) -> Result<()> {
    let mut rng = ChaCha8Rng::seed_from_u64(0);
    let mut network = make_random_network(num_bifurcations, max_daughters, &mut rng)?;
    info!(
        "Random network with {} elements and {} outlets",
        network.len(),
        network.outlet_count()
    );

    split_flow(&mut network, method.into(), AreaMode::Mean)?;
    info!("Flow split using {method} coefficients");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn network_path(name: &str) -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("flowsplit-schema")
            .join("tests")
            .join("networks")
            .join(name)
    }

    #[test]
    fn test_outlet_csv_path() {
        let dir = Path::new("out");
        assert_eq!(
            outlet_csv_path(dir, Path::new("data/nested.json")).unwrap(),
            dir.join("nested_outlets.csv")
        );
        // No file name to derive the CSV name from.
        assert!(outlet_csv_path(dir, Path::new("/")).is_err());
        assert!(outlet_csv_path(dir, Path::new("data/..")).is_err());
    }

    #[test]
    fn test_split_networks_keeps_input_order() {
        let paths = vec![
            network_path("nested.json"),
            network_path("symmetric.json"),
            network_path("three_way.json"),
        ];
        let temp_dir = TempDir::new().unwrap();

        for parallel in [false, true] {
            let rows = split_networks(&paths, Method::Beta, Some(temp_dir.path()), None, parallel, 2).unwrap();
            let outlet_counts: Vec<usize> = rows.iter().map(|r| r.len()).collect();
            assert_eq!(outlet_counts, vec![3, 2, 3]);
            assert_eq!(*rows[0][0].id, 3);
            assert_eq!(*rows[1][0].id, 3);
            assert_eq!(*rows[2][0].id, 4);
        }

        for stem in ["nested", "symmetric", "three_way"] {
            assert!(temp_dir.path().join(format!("{stem}_outlets.csv")).exists());
        }
    }
}
