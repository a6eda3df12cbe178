//! atlasmesh CLI - build web-ready meshes from labelled atlas volumes.
//!
//! Usage: atlasmesh <COMMAND> [OPTIONS]
//!
//! Run `atlasmesh --help` for available commands.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use clap::{Parser, Subcommand, ValueEnum};

use atlasmesh::algo::{Progress, ProgressEvent};
use atlasmesh::io::{self, json, Format};
use atlasmesh::labels::LabelTable;
use atlasmesh::mesh::{EdgeTopology, Mesh, MeshCollection};
use atlasmesh::pipeline::{build_meshes_with_progress, simplify_collection, PipelineOptions};
use atlasmesh::sample;
use atlasmesh::volume::source::{templateflow_home, AtlasResolver, ExactFile};
use atlasmesh::volume::{nifti, Orientation, Volume};

#[derive(Parser)]
#[command(name = "atlasmesh")]
#[command(author, version, about = "Atlas volume to web mesh converter", long_about = None)]
struct Cli {
    /// Log debug details
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build full and simplified mesh collections from an atlas
    Build {
        /// Atlas volume (.nii or .nii.gz); searched for when omitted
        #[arg(short, long)]
        atlas: Option<PathBuf>,

        /// TemplateFlow directory to search (default: $TEMPLATEFLOW_HOME)
        #[arg(long)]
        templateflow: Option<PathBuf>,

        /// Use a built-in synthetic volume instead of an atlas
        #[arg(long, conflicts_with_all = ["atlas", "templateflow"])]
        synthetic: bool,

        /// Output directory
        #[arg(short, long, default_value = "subcortical_meshes")]
        output: PathBuf,

        /// Label table (.json or FreeSurfer LUT); FreeSurfer subcortical by default
        #[arg(short, long)]
        labels: Option<PathBuf>,

        /// Pipeline options as JSON; flags below override it
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Minimum voxels per structure
        #[arg(long)]
        min_voxels: Option<usize>,

        /// Opening/closing iterations per structure
        #[arg(long)]
        smoothing: Option<usize>,

        /// Viewer orientation code, e.g. LPS or RAS
        #[arg(long)]
        target_orientation: Option<Orientation>,

        /// Approximate vertex count of simplified meshes
        #[arg(long)]
        target_vertices: Option<usize>,

        /// Mesh labels present in the volume when none of the table's are
        #[arg(long)]
        fallback_labels: bool,

        /// Write the sample collection if no atlas can be loaded
        #[arg(long)]
        sample_fallback: bool,

        /// Also export each structure as a separate file
        #[arg(long, value_enum)]
        export: Option<ExportFormat>,

        /// Write a JSON report of built and skipped structures
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Write the built-in sample collection
    Sample {
        /// Output directory
        #[arg(short, long, default_value = "subcortical_meshes")]
        output: PathBuf,
    },

    /// Display mesh or collection information
    Info {
        /// Mesh file (.json, .stl, .ply) or collection (.json)
        input: PathBuf,
    },

    /// Print a label table
    Labels {
        /// Label table (.json or FreeSurfer LUT); FreeSurfer subcortical by default
        #[arg(short, long)]
        labels: Option<PathBuf>,

        /// Only list labels present in this volume, with voxel counts
        #[arg(short, long)]
        atlas: Option<PathBuf>,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum ExportFormat {
    /// Binary STL
    Stl,
    /// ASCII PLY with normals
    Ply,
}

impl From<ExportFormat> for Format {
    fn from(format: ExportFormat) -> Self {
        match format {
            ExportFormat::Stl => Format::Stl,
            ExportFormat::Ply => Format::Ply,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Build {
            atlas,
            templateflow,
            synthetic,
            output,
            labels,
            config,
            min_voxels,
            smoothing,
            target_orientation,
            target_vertices,
            fallback_labels,
            sample_fallback,
            export,
            report,
        } => {
            let mut options = match config {
                Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
                None => PipelineOptions::default(),
            };
            if let Some(n) = min_voxels {
                options = options.with_min_voxels(n);
            }
            if let Some(k) = smoothing {
                options = options.with_smoothing_iterations(k);
            }
            if let Some(orientation) = target_orientation {
                options = options.with_target_orientation(orientation);
            }
            if let Some(n) = target_vertices {
                options.simplify = options.simplify.with_target_vertices(n);
            }
            if fallback_labels {
                options = options.with_fallback_to_present_labels(true);
            }

            let source = if synthetic {
                VolumeSource::Synthetic
            } else {
                VolumeSource::Atlas { atlas, templateflow }
            };
            let table = match labels {
                Some(path) => LabelTable::load(path)?,
                None if synthetic => sample::synthetic_labels(),
                None => LabelTable::freesurfer_subcortical(),
            };

            match cmd_build(&source, &table, &options, &output, export, report.as_deref()) {
                Err(e) if sample_fallback => {
                    log::error!("Processing failed: {}", e);
                    log::info!("Generating sample data as fallback...");
                    cmd_sample(&output)?;
                }
                other => other?,
            }
        }

        Commands::Sample { output } => {
            cmd_sample(&output)?;
        }

        Commands::Info { input } => {
            cmd_info(&input)?;
        }

        Commands::Labels { labels, atlas } => {
            let table = match labels {
                Some(path) => LabelTable::load(path)?,
                None => LabelTable::freesurfer_subcortical(),
            };
            cmd_labels(&table, atlas.as_deref())?;
        }
    }

    Ok(())
}

/// Where the build command gets its volume from.
enum VolumeSource {
    Atlas {
        atlas: Option<PathBuf>,
        templateflow: Option<PathBuf>,
    },
    Synthetic,
}

impl VolumeSource {
    fn load(&self) -> Result<Volume, Box<dyn std::error::Error>> {
        match self {
            VolumeSource::Synthetic => {
                log::info!("Using synthetic volume");
                Ok(sample::synthetic_volume([96, 96, 96]))
            }
            VolumeSource::Atlas { atlas, templateflow } => {
                let mut resolver = AtlasResolver::new();
                if let Some(path) = atlas {
                    resolver = resolver.with_strategy(ExactFile::new(path));
                }
                if atlas.is_none() || templateflow.is_some() {
                    if let Some(root) = templateflow.clone().or_else(templateflow_home) {
                        resolver = resolver.with_templateflow_defaults(root);
                    }
                }
                let resolved = resolver.resolve()?;
                log::info!("Loading atlas data...");
                Ok(nifti::load(&resolved.path)?)
            }
        }
    }
}

/// Create a progress reporter that displays a progress bar on the terminal.
fn create_progress() -> Progress {
    let max_percent = Arc::new(AtomicUsize::new(0));

    Progress::new(move |event| {
        let raw_percent = (event.fraction() * 100.0).round() as usize;

        // Only ever move forward.
        let previous = max_percent.fetch_max(raw_percent, Ordering::Relaxed);
        let finished = matches!(event, ProgressEvent::Finished { .. });
        if raw_percent <= previous && !finished {
            return;
        }

        let message = match *event {
            ProgressEvent::Structure { name, stage, .. } => format!("{} {}", stage, name),
            ProgressEvent::Finished { built, total } => format!("built {} of {}", built, total),
        };

        let bar_width = 30;
        let filled = (raw_percent.min(100) * bar_width) / 100;
        let bar = "=".repeat(filled);
        let space = " ".repeat(bar_width - filled);

        eprint!("\r[{}{}] {:3}% {:<40}", bar, space, raw_percent, message);
        let _ = std::io::stderr().flush();

        if finished {
            eprintln!();
        }
    })
}

fn cmd_build(
    source: &VolumeSource,
    table: &LabelTable,
    options: &PipelineOptions,
    output: &Path,
    export: Option<ExportFormat>,
    report_path: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let volume = source.load()?;

    let start = Instant::now();
    let progress = create_progress();
    let result = build_meshes_with_progress(&volume, table, options, &progress)?;
    let simplified = simplify_collection(&result.meshes, &options.simplify);
    let elapsed = start.elapsed();

    json::write_outputs(output, &result.meshes, &simplified)?;

    if let Some(format) = export {
        export_structures(&result.meshes, &output.join("structures"), format.into())?;
    }

    if let Some(path) = report_path {
        let file = std::fs::File::create(path)?;
        serde_json::to_writer_pretty(file, &result.report)?;
        log::info!("Saved report to {}", path.display());
    }

    println!(
        "Built {} structures ({} skipped) in {:.2?}",
        result.meshes.len(),
        result.report.skipped.len(),
        elapsed
    );
    println!(
        "Vertices: {} full, {} simplified",
        result.meshes.total_vertices(),
        simplified.total_vertices()
    );

    Ok(())
}

fn export_structures(
    meshes: &MeshCollection,
    dir: &Path,
    format: Format,
) -> Result<(), Box<dyn std::error::Error>> {
    std::fs::create_dir_all(dir)?;
    for (name, mesh) in meshes.iter() {
        let path = dir.join(format!("{}.{}", name, format.extension()));
        io::save(mesh, &path)?;
        log::debug!("Exported {}", path.display());
    }
    log::info!("Exported {} structures to {}", meshes.len(), dir.display());
    Ok(())
}

fn cmd_sample(output: &Path) -> Result<(), Box<dyn std::error::Error>> {
    log::info!("Creating sample subcortical mesh data...");
    std::fs::create_dir_all(output)?;
    let collection = sample::sample_collection();
    let path = output.join(json::SAMPLE_FILE);
    json::save_collection(&collection, &path)?;
    println!("Saved {} sample meshes to {}", collection.len(), path.display());
    Ok(())
}

fn print_mesh_stats(mesh: &Mesh) {
    println!("  Vertices: {}", mesh.num_vertices());
    println!("  Faces: {}", mesh.num_faces());
    println!(
        "  Normals: {}",
        if mesh.has_normals() { "yes" } else { "no" }
    );
    println!("  Surface area: {:.3}", mesh.surface_area());

    if let Some((min, max)) = mesh.bounding_box() {
        println!(
            "  Bounding box: ({:.3}, {:.3}, {:.3}) to ({:.3}, {:.3}, {:.3})",
            min.x, min.y, min.z, max.x, max.y, max.z
        );
        let diag = max - min;
        println!("  Dimensions: {:.3} x {:.3} x {:.3}", diag.x, diag.y, diag.z);
    }

    let topology = EdgeTopology::of(mesh);
    if topology.is_closed() {
        println!(
            "  Topology: Closed (Euler characteristic {})",
            topology.euler_characteristic(mesh)
        );
    } else {
        println!(
            "  Topology: Open ({} boundary edges, {} non-manifold edges)",
            topology.boundary_edges, topology.non_manifold_edges
        );
    }
}

fn cmd_info(input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    println!("File: {}", input.display());

    if Format::from_path(input) == Some(Format::Json) {
        if let Ok(collection) = json::load_collection(input) {
            println!("Structures: {}", collection.len());
            println!(
                "Total: {} vertices, {} faces",
                collection.total_vertices(),
                collection.total_faces()
            );
            for (name, mesh) in collection.iter() {
                println!("\n{}:", name);
                print_mesh_stats(mesh);
            }
            return Ok(());
        }
    }

    let mesh = io::load(input)?;
    print_mesh_stats(&mesh);
    Ok(())
}

fn cmd_labels(table: &LabelTable, atlas: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match atlas {
        None => {
            for (id, name) in table.iter() {
                println!("{:>5}  {}", id, name);
            }
        }
        Some(path) => {
            let volume = nifti::load(path)?;
            let counts = volume.label_counts();
            let mut found = 0;
            for (id, name) in table.iter() {
                if let Some(count) = counts.get(&id) {
                    println!("{:>5}  {:<24} {:>8} voxels", id, name, count);
                    found += 1;
                }
            }
            println!("{} of {} labels present", found, table.len());
        }
    }
    Ok(())
}
