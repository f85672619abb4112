use clap::Parser;
use cyclops::error::Result;
use cyclops::expression::SparseView;
use cyclops::tensor::{Norm, Sym, Tensor};
use cyclops::world::World;
use flexi_logger::{json_format, Duplicate, FileSpec, Logger, LoggerHandle};
use float_cmp::approx_eq;
use log::{info, LevelFilter};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[derive(Debug, Parser)]
#[command(version, about = "Chained matrix products through indexed expressions", long_about = None)]
struct Cli {
    /// Edge length of the matrices.
    #[arg(short, long, default_value_t = 8)]
    size: usize,
    #[arg(long, default_value_t = 23)]
    seed: u64,
    /// Write a debug log next to the stdout output.
    #[arg(short, long)]
    log_file: bool,
}

/// Sets up logging to stdout and, if requested, to a JSON file.
fn setup_logging(to_file: bool) -> LoggerHandle {
    let logger = Logger::with(LevelFilter::Debug).format(json_format);
    let logger = if to_file {
        logger
            .log_to_file(
                FileSpec::default()
                    .discriminant("matmul")
                    .suppress_timestamp()
                    .suffix("log.json"),
            )
            .duplicate_to_stdout(Duplicate::Info)
    } else {
        logger.log_to_stdout()
    };
    logger.start().unwrap()
}

fn random_matrix(size: usize, world: &World, name: &str, rng: &mut StdRng) -> Result<Tensor> {
    let matrix = Tensor::named(&[size, size], &[Sym::NS, Sym::NS], world, name)?;
    let values = (0..size * size).map(|_| rng.gen_range(-1.0..1.0)).collect::<Vec<_>>();
    matrix.set_from_slice(&values)?;
    Ok(matrix)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let _logger = setup_logging(cli.log_file);
    let mut rng = StdRng::seed_from_u64(cli.seed);
    let world = World::local();
    info!(size = cli.size, seed = cli.seed; "Configuration set");

    let a = random_matrix(cli.size, &world, "A", &mut rng)?;
    let b = random_matrix(cli.size, &world, "B", &mut rng)?;
    let c = random_matrix(cli.size, &world, "C", &mut rng)?;
    let d: Tensor = Tensor::named(&[cli.size, cli.size], &[Sym::NS, Sym::NS], &world, "D")?;

    let before = world.tensors_created();
    d.idx("il")?
        .assign(a.idx("ik")? * b.idx("kj")? * c.idx("jl")?)?;
    info!(intermediates = world.tensors_created() - before; "Evaluated chained product");

    // The same product through the primitives.
    let ab = a.zeros_like();
    ab.contract(1.0, &a, "ik", &b, "kj", 0.0, "ij")?;
    let reference = a.zeros_like();
    reference.contract(1.0, &ab, "ik", &c, "kj", 0.0, "ij")?;

    let difference = d.duplicate();
    difference.idx("ij")?.subtract(reference.idx("ij")?)?;
    let error = difference.norm(Norm::MaxAbs);
    info!(error, norm = d.norm(Norm::L2); "Compared against explicit contractions");

    // Repeated labels are rejected, so the trace is a contraction with the
    // identity.
    let diagonal_keys = (0..cli.size as i64)
        .map(|i| i * (cli.size as i64 + 1))
        .collect::<Vec<_>>();
    let identity = d.zeros_like();
    SparseView::new(&identity, diagonal_keys.clone())?.assign_values(&vec![1.0; cli.size])?;
    let trace: Tensor = Tensor::scalar(0.0, &world);
    trace.idx("")?.assign(d.idx("ij")? * identity.idx("ij")?)?;
    let trace = trace.value()?;

    let diagonal_sum: f64 = d.at(diagonal_keys)?.values()?.iter().sum();
    info!(trace, diagonal_sum; "Computed trace");

    if approx_eq!(f64, trace, diagonal_sum, epsilon = 1e-9) && error < 1e-9 {
        info!("Results agree");
    }
    Ok(())
}
