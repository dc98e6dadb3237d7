//! brepmesh CLI - mesh the built-in models and inspect results.
//!
//! Usage: brepmesh <COMMAND> [OPTIONS] <OUTPUT>
//!
//! Run `brepmesh --help` for available commands.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use clap::{Args, Parser, Subcommand, ValueEnum};

use brepmesh::algo::Progress;
use brepmesh::geometry::{shapes, Model};
use brepmesh::io::{self, CellKind, UnstructuredGrid};
use brepmesh::mesh::Mesh;
use brepmesh::options::{DumpOptions, MeshOptions, TriSmoothingType};

#[derive(Parser)]
#[command(name = "brepmesh")]
#[command(author, version, about = "Quad and swept hex meshing CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Mesh a rectangular plate with a centred hole
    Plate {
        /// Plate width
        #[arg(long, default_value = "2.0")]
        width: f64,

        /// Plate height
        #[arg(long, default_value = "1.0")]
        height: f64,

        /// Hole radius
        #[arg(short, long, default_value = "0.25")]
        radius: f64,

        #[command(flatten)]
        mesh: MeshArgs,
    },

    /// Mesh an L-shaped bracket
    Bracket {
        /// Leg width
        #[arg(long, default_value = "1.0")]
        size: f64,

        #[command(flatten)]
        mesh: MeshArgs,
    },

    /// Mesh a box with swept hexahedra
    Block {
        /// Extent along x
        #[arg(long, default_value = "1.0")]
        dx: f64,

        /// Extent along y
        #[arg(long, default_value = "1.0")]
        dy: f64,

        /// Extent along z (sweep direction)
        #[arg(long, default_value = "1.0")]
        dz: f64,

        #[command(flatten)]
        mesh: MeshArgs,
    },

    /// Mesh a plate with a hole extruded into a swept volume
    HoledBlock {
        /// Plate width
        #[arg(long, default_value = "2.0")]
        width: f64,

        /// Plate height
        #[arg(long, default_value = "1.0")]
        height: f64,

        /// Hole radius
        #[arg(short, long, default_value = "0.25")]
        radius: f64,

        /// Extrusion depth
        #[arg(short, long, default_value = "0.5")]
        depth: f64,

        #[command(flatten)]
        mesh: MeshArgs,
    },

    /// Display information about a VTK mesh file
    Info {
        /// Input mesh file
        input: PathBuf,
    },
}

#[derive(Args)]
struct MeshArgs {
    /// Output mesh file (.vtk, .bdf or .nas)
    output: PathBuf,

    /// Target element size
    #[arg(short = 'H', long, default_value = "0.1")]
    htarget: f64,

    /// Number of smoothing passes
    #[arg(short = 'n', long, default_value = "10")]
    smoothing_steps: usize,

    /// Triangle smoothing rule
    #[arg(short, long, value_enum, default_value = "laplacian")]
    smoothing: SmoothingMethod,

    /// Frontal refinement acceptance factor
    #[arg(short = 'q', long, default_value = "1.5")]
    quality_factor: f64,

    /// Directory for per-stage diagnostic dumps
    #[arg(long)]
    dump_dir: Option<PathBuf>,

    /// Dump every stage (requires --dump-dir)
    #[arg(long, requires = "dump_dir")]
    dump_all: bool,

    /// Print the quad quality histogram
    #[arg(long)]
    quality: bool,

    /// Use single-threaded execution (for benchmarking)
    #[arg(long)]
    sequential: bool,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum SmoothingMethod {
    /// Move points to the centroid of their neighbours
    Laplacian,
    /// Spring relaxation with a common rest length
    Spring,
}

impl From<SmoothingMethod> for TriSmoothingType {
    fn from(method: SmoothingMethod) -> Self {
        match method {
            SmoothingMethod::Laplacian => TriSmoothingType::Laplacian,
            SmoothingMethod::Spring => TriSmoothingType::Spring,
        }
    }
}

impl MeshArgs {
    fn options(&self) -> MeshOptions {
        let mut options = MeshOptions::default()
            .with_smoothing_steps(self.smoothing_steps)
            .with_tri_smoothing(self.smoothing.into())
            .with_frontal_quality_factor(self.quality_factor)
            .with_parallel(!self.sequential);
        if let Some(dir) = &self.dump_dir {
            let dump = if self.dump_all {
                DumpOptions::all(dir)
            } else {
                DumpOptions {
                    post_smooth_quad: true,
                    dir: dir.clone(),
                    ..DumpOptions::default()
                }
            };
            options = options.with_dump(dump);
        }
        options
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Plate {
            width,
            height,
            radius,
            mesh,
        } => {
            let model = shapes::plate_with_hole(width, height, radius)?;
            cmd_mesh("plate", &model, &mesh)?;
        }

        Commands::Bracket { size, mesh } => {
            let model = shapes::l_bracket(size)?;
            cmd_mesh("bracket", &model, &mesh)?;
        }

        Commands::Block { dx, dy, dz, mesh } => {
            let model = shapes::block(dx, dy, dz)?;
            cmd_mesh("block", &model, &mesh)?;
        }

        Commands::HoledBlock {
            width,
            height,
            radius,
            depth,
            mesh,
        } => {
            let model = shapes::holed_block(width, height, radius, depth)?;
            cmd_mesh("holed block", &model, &mesh)?;
        }

        Commands::Info { input } => {
            cmd_info(&input)?;
        }
    }

    Ok(())
}

/// Create a progress reporter that displays a progress bar on the terminal.
fn create_progress() -> Progress {
    let max_percent = Arc::new(AtomicUsize::new(0));

    Progress::new(move |current, total, message| {
        if total == 0 {
            return;
        }

        let raw_percent = if current >= total {
            100
        } else {
            ((current * 100) + (total / 2)) / total
        };

        // only ever move forward
        let previous = max_percent.fetch_max(raw_percent, Ordering::Relaxed);
        if raw_percent <= previous && raw_percent != 100 {
            return;
        }

        let bar_width = 30;
        let filled = (raw_percent * bar_width) / 100;
        let bar = "=".repeat(filled);
        let space = " ".repeat(bar_width - filled);

        eprint!("\r[{}{}] {:3}% {:<24}", bar, space, raw_percent, message);
        let _ = std::io::stderr().flush();

        if current >= total {
            eprintln!();
        }
    })
}

fn cmd_mesh(name: &str, model: &Model, args: &MeshArgs) -> Result<(), Box<dyn std::error::Error>> {
    let format = io::Format::from_path(&args.output)
        .ok_or("unsupported output format, use .vtk, .bdf or .nas")?;
    let options = args.options();

    println!(
        "Model '{}': {} vertices, {} edges, {} faces, {} volumes",
        name,
        model.num_vertices(),
        model.num_edges(),
        model.num_faces(),
        model.num_volumes()
    );

    let mode = if args.sequential { "sequential" } else { "parallel" };
    println!("Meshing at h = {} ({})...", args.htarget, mode);
    let progress = create_progress();

    let start = Instant::now();
    let mut mesh = Mesh::new(model);
    mesh.mesh_with_progress(&options, args.htarget, &progress)?;
    let elapsed = start.elapsed();

    let global = mesh.global()?;
    println!(
        "Result: {} nodes, {} quads, {} hexes",
        global.num_nodes(),
        global.num_quads(),
        global.num_hexes()
    );

    if args.quality {
        let hist = mesh.quad_quality(10)?;
        println!("Quad quality: min {:.3}, mean {:.3}", hist.min, hist.mean());
        let n = hist.bins.len();
        for (i, &count) in hist.bins.iter().enumerate() {
            println!(
                "  [{:.1}, {:.1}) {:>8}",
                i as f64 / n as f64,
                (i + 1) as f64 / n as f64,
                count
            );
        }
    }

    if format == io::Format::Bdf && global.num_hexes() > 0 {
        println!("Note: Nastran output carries the surface quads only");
    }
    io::save_global(global, &args.output)?;
    println!("Saved: {} ({:.2?})", args.output.display(), elapsed);

    Ok(())
}

fn cmd_info(input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let grid = UnstructuredGrid::load(input)?;

    println!("File: {}", input.display());
    println!("Title: {}", grid.title);
    println!("Points: {}", grid.num_points());
    println!("Cells: {}", grid.num_cells());
    for kind in [
        CellKind::Line,
        CellKind::Triangle,
        CellKind::Quad,
        CellKind::Hexahedron,
    ] {
        let count = grid.count(kind);
        if count > 0 {
            println!("  {:?}: {}", kind, count);
        }
    }

    if let Some(quality) = &grid.quality {
        let min = quality.iter().cloned().fold(f64::INFINITY, f64::min);
        let avg = quality.iter().sum::<f64>() / quality.len().max(1) as f64;
        println!("Quality: min={:.4}, avg={:.4}", min, avg);
    }

    if let Some((min, max)) = bounding_box(&grid) {
        let diag = max - min;
        println!(
            "Bounding box: ({:.3}, {:.3}, {:.3}) to ({:.3}, {:.3}, {:.3})",
            min.x, min.y, min.z, max.x, max.y, max.z
        );
        println!("Dimensions: {:.3} x {:.3} x {:.3}", diag.x, diag.y, diag.z);
    }

    Ok(())
}

fn bounding_box(
    grid: &UnstructuredGrid,
) -> Option<(brepmesh::nalgebra::Point3<f64>, brepmesh::nalgebra::Point3<f64>)> {
    let first = *grid.points.first()?;
    Some(
        grid.points
            .iter()
            .fold((first, first), |(lo, hi), p| (lo.inf(p), hi.sup(p))),
    )
}
