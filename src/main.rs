//! cortex_smooth: constrained Taubin smoothing of a white/pial surface pair.
//!
//! Reads the two input meshes, relaxes them together while keeping them
//! apart from each other and from themselves, and writes the two outputs.
//! Both outputs are staged next to their destinations and moved into place
//! together, so neither appears unless the run and both writes succeed.
//!
//! # Logging
//!
//! `RUST_LOG` takes precedence over the `-v` flags:
//! - `RUST_LOG=cortex_smooth=debug` - per-iteration residuals
//! - `RUST_LOG=cortex_smooth=trace` - traced vertex samples
//!
//! # Example
//!
//! ```bash
//! cortex_smooth lh.white.off lh.pial.off out.white.off out.pial.off \
//!     --nonctx-mask nonctx.nii.gz --pmin 0.6 --iter 100 -v
//! ```

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{ArgGroup, Parser};
use cortex_smooth::{
    Cortex, DeformConfig, DeformObserver, Deformer, NoopObserver, NonCortexMask, Rgb,
    SmoothingWeights, Surface, SurfacePair, SurfaceSelection, ThicknessBounds, VertexTracer,
    float_types::Real, io,
};
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Smooth a white/pial cortical surface pair with proximity and thickness
/// constraints.
#[derive(Parser, Debug)]
#[command(name = "cortex_smooth")]
#[command(author, version, about, long_about = None)]
#[command(group(ArgGroup::new("selection").args(["white_only", "pial_only", "both", "cortex"])))]
struct Cli {
    /// Input white surface (.off or .ply)
    white_in: PathBuf,

    /// Input pial surface, same vertex count as the white surface
    pial_in: PathBuf,

    /// Output white surface
    white_out: PathBuf,

    /// Output pial surface
    pial_out: PathBuf,

    /// Move the white surface only
    #[arg(long)]
    white_only: bool,

    /// Move the pial surface only
    #[arg(long)]
    pial_only: bool,

    /// Move both surfaces (default)
    #[arg(long)]
    both: bool,

    /// Surface selection by name or id (1 white, 2 pial, 3 both)
    #[arg(long, value_name = "SEL")]
    cortex: Option<SurfaceSelection>,

    /// Taubin shrink weights for white and pial
    #[arg(long, num_args = 2, value_names = ["WHITE", "PIAL"], allow_negative_numbers = true)]
    lambda: Option<Vec<f64>>,

    /// Taubin inflate weights for white and pial
    #[arg(long, num_args = 2, value_names = ["WHITE", "PIAL"], allow_negative_numbers = true)]
    mju: Option<Vec<f64>>,

    /// Minimum distance to any non-local face
    #[arg(long, default_value_t = 0.6)]
    pmin: f64,

    /// Maximum depth of the spatial index
    #[arg(long, default_value_t = 7)]
    depth: usize,

    /// Relaxation time-step
    #[arg(long, default_value_t = 0.5)]
    delta: f64,

    /// Damping applied to each step, in (0, 1]
    #[arg(long, default_value_t = 0.2)]
    apply: f64,

    /// Outer iterations
    #[arg(long, default_value_t = 100)]
    iter: usize,

    /// Sub-iterations per outer iteration
    #[arg(long, default_value_t = 5)]
    iter2: usize,

    /// Mean displacement per outer iteration below which the run stops
    #[arg(long, default_value_t = 1e-3)]
    tolerance: f64,

    /// Non-cortex mask image; vertices inside it skip the proximity check
    #[arg(long, value_name = "IMG")]
    nonctx_mask: Option<PathBuf>,

    /// T1-weighted image sampled at the traced vertex
    #[arg(long, value_name = "IMG", requires = "trace_vertex")]
    t1w: Option<PathBuf>,

    /// Record one vertex every outer iteration
    #[arg(long, value_name = "ID")]
    trace_vertex: Option<usize>,

    /// Tab separated trace output
    #[arg(long, value_name = "FILE", requires = "trace_vertex")]
    trace_out: Option<PathBuf>,

    /// Lower thickness bound
    #[arg(long, default_value_t = 0.0)]
    thick_min: f64,

    /// Upper thickness bound
    #[arg(long)]
    thick_max: Option<f64>,

    /// Refit the spatial index between sub-iterations instead of rebuilding it
    #[arg(long)]
    refit: bool,

    /// Let open-mesh boundary vertices move while smoothing
    #[arg(long)]
    free_boundaries: bool,

    /// Suppress all non-error output
    #[arg(long, short)]
    quiet: bool,

    /// Increase output verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(long, short, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn selection(&self) -> SurfaceSelection {
        if let Some(selection) = self.cortex {
            selection
        } else if self.white_only {
            SurfaceSelection::WhiteOnly
        } else if self.pial_only {
            SurfaceSelection::PialOnly
        } else {
            SurfaceSelection::Both
        }
    }

    fn config(&self) -> DeformConfig {
        let mut config = DeformConfig::default()
            .with_selection(self.selection())
            .with_step(self.delta as Real, self.apply as Real)
            .with_proximity(self.pmin as Real)
            .with_index_depth(self.depth)
            .with_iterations(self.iter, self.iter2)
            .with_tolerance(self.tolerance as Real)
            .with_thickness(ThicknessBounds::new(
                self.thick_min as Real,
                self.thick_max.map(|m| m as Real),
            ))
            .with_refit(self.refit)
            .with_preserve_boundaries(!self.free_boundaries);

        for cortex in Cortex::ALL {
            let defaults = config.smoothing_for(cortex);
            let pick = |values: &Option<Vec<f64>>, fallback: Real| {
                values
                    .as_ref()
                    .and_then(|v| v.get(cortex.index()))
                    .map_or(fallback, |&w| w as Real)
            };
            let weights = SmoothingWeights {
                lambda: pick(&self.lambda, defaults.lambda),
                mu: pick(&self.mju, defaults.mu),
            };
            config = config.with_smoothing(cortex, weights);
        }
        config
    }
}

/// Initialize the tracing subscriber based on verbosity level.
fn init_tracing(verbose: u8, quiet: bool) {
    if quiet {
        return;
    }

    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match verbose {
            0 => "warn",
            1 => "cortex_smooth=info",
            2 => "cortex_smooth=debug",
            _ => "cortex_smooth=trace",
        };
        EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .with(filter)
        .init();
}

fn run(cli: &Cli) -> Result<()> {
    let white = io::read_surface(&cli.white_in)
        .with_context(|| format!("reading white surface {}", cli.white_in.display()))?;
    let pial = io::read_surface(&cli.pial_in)
        .with_context(|| format!("reading pial surface {}", cli.pial_in.display()))?;
    let mut pair = SurfacePair::new(white, pial).context("pairing white and pial surfaces")?;

    let mask = match &cli.nonctx_mask {
        Some(path) => {
            let volume = io::read_volume(path)
                .with_context(|| format!("reading non-cortex mask {}", path.display()))?;
            let mask = NonCortexMask::from_volume(&volume, pair.white());
            info!(
                "non-cortex mask {}: {} of {} vertices",
                path.display(),
                mask.masked_count(),
                mask.len()
            );
            Some(mask)
        },
        None => None,
    };

    let mut tracer = match cli.trace_vertex {
        Some(vertex) if vertex >= pair.vertex_count() => {
            bail!(
                "trace vertex {vertex} is out of range for {} vertices",
                pair.vertex_count()
            );
        },
        Some(vertex) => {
            let mut tracer = VertexTracer::new(vertex);
            if let Some(path) = &cli.t1w {
                let image = io::read_volume(path)
                    .with_context(|| format!("reading T1w image {}", path.display()))?;
                tracer = tracer.with_background(image);
            }
            Some(tracer)
        },
        None => None,
    };

    let deformer = Deformer::new(cli.config());
    let mut noop = NoopObserver;
    let report = {
        let observer: &mut dyn DeformObserver = match tracer.as_mut() {
            Some(tracer) => tracer,
            None => &mut noop,
        };
        deformer
            .run(&mut pair, mask.as_ref(), observer)
            .context("deforming surfaces")?
    };

    let provenance = format!(
        "{} {}: {}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        std::env::args().collect::<Vec<_>>().join(" ")
    );
    let (mut white, mut pial) = pair.into_surfaces();
    for (surface, color) in [(&mut white, Rgb::YELLOW), (&mut pial, Rgb::RED)] {
        surface.add_comment(provenance.clone());
        surface.paint(color);
    }

    write_outputs(&[
        (cli.white_out.as_path(), &white, Cortex::White),
        (cli.pial_out.as_path(), &pial, Cortex::Pial),
    ])?;

    if let (Some(tracer), Some(path)) = (&tracer, &cli.trace_out) {
        let file = File::create(path)
            .with_context(|| format!("creating trace file {}", path.display()))?;
        tracer
            .write_tsv(&mut BufWriter::new(file))
            .with_context(|| format!("writing trace file {}", path.display()))?;
    }

    info!(
        "{} after {} iterations, {} proximity violations left",
        report.termination, report.iterations, report.violations
    );
    Ok(())
}

/// Hidden sibling of `path` that keeps its extension, so the format is
/// still picked from it
fn staging_path(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!(".{stem}.partial.{}", ext.to_string_lossy()),
        None => format!(".{stem}.partial"),
    };
    path.with_file_name(name)
}

fn discard(paths: &[PathBuf]) {
    for path in paths {
        if std::fs::remove_file(path).is_ok() {
            debug!("removed staged output {}", path.display());
        }
    }
}

/// Write every surface to its staging path, then rename them all into place.
/// A failed write removes whatever was staged.
fn write_outputs(outputs: &[(&Path, &Surface, Cortex)]) -> Result<()> {
    let mut staged = Vec::with_capacity(outputs.len());
    for &(path, surface, cortex) in outputs {
        let staging = staging_path(path);
        let written = io::write_surface(&staging, surface);
        staged.push(staging);
        if let Err(e) = written {
            discard(&staged);
            return Err(e).with_context(|| format!("writing {cortex} surface {}", path.display()));
        }
    }
    for (i, (&(path, _, cortex), staging)) in outputs.iter().zip(&staged).enumerate() {
        if let Err(e) = std::fs::rename(staging, path) {
            discard(&staged[i..]);
            return Err(e).with_context(|| format!("moving {cortex} surface to {}", path.display()));
        }
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    if let Err(e) = run(&cli) {
        if !cli.quiet {
            eprintln!("Error: {e}");
            for cause in e.chain().skip(1) {
                eprintln!("  Caused by: {cause}");
            }
        }
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Cli {
        let positionals = ["cortex_smooth", "w.off", "p.off", "w.out.off", "p.out.off"];
        Cli::try_parse_from(positionals.iter().chain(extra)).unwrap()
    }

    #[test]
    fn negative_shrink_weights_are_accepted() {
        let cfg = parse(&["--lambda", "-0.5", "0.3", "--mju", "-0.2", "-0.1"]).config();
        assert_eq!(cfg.smoothing_for(Cortex::White).lambda, -0.5);
        assert_eq!(cfg.smoothing_for(Cortex::Pial).lambda, 0.3);
        assert_eq!(cfg.smoothing_for(Cortex::White).mu, -0.2);
    }

    #[test]
    fn selection_flags_map_onto_the_config() {
        assert_eq!(parse(&[]).config().selection, SurfaceSelection::Both);
        assert_eq!(parse(&["--pial-only"]).config().selection, SurfaceSelection::PialOnly);
        assert_eq!(parse(&["--cortex", "1"]).config().selection, SurfaceSelection::WhiteOnly);
    }

    #[test]
    fn staging_keeps_the_extension() {
        let staged = staging_path(Path::new("/tmp/out/lh.white.ply"));
        assert_eq!(staged, Path::new("/tmp/out/.lh.white.partial.ply"));
    }
}
