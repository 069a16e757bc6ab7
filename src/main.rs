use std::path::PathBuf;

use clap::Parser;
use plate_packer::config::{PackConfig, Strategy};
use plate_packer::export::{JsonExporter, ResultExporter, TextExporter};
use plate_packer::generate::{self, DemandRanges};
use plate_packer::occupancy::IndexKind;
use plate_packer::placement::PlacementPolicy;
use plate_packer::solver::Solver;
use plate_packer::types::{Demand, Problem, Rect};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use tracing::Level;

#[derive(Parser)]
#[command(
    name = "plate_packer",
    about = "Packs rectangle demands into identical plates"
)]
struct Cli {
    /// Plate dimensions (WxH, e.g. 100x100)
    #[arg(long)]
    bin: Option<String>,

    /// Rectangle types as [ID=]WxH:qty (e.g. 1=30x40:20 20x70:10)
    #[arg(long = "rects", num_args = 1..)]
    rects: Vec<String>,

    /// Read the whole problem from a JSON file instead
    #[arg(long, conflicts_with_all = ["rects", "random"])]
    input: Option<PathBuf>,

    /// Generate this many random rectangle types
    #[arg(long, conflicts_with = "rects")]
    random: Option<u32>,

    /// Seed for --random and for the annealing refiner
    #[arg(long)]
    seed: Option<u64>,

    /// Disable 90 degree rotation
    #[arg(long)]
    no_rotate: bool,

    /// greedy, anneal or exact
    #[arg(long, value_parser = parse_strategy)]
    strategy: Option<Strategy>,

    /// first-fit, best-area-fit, best-short-side-fit or best-long-side-fit
    #[arg(long, value_parser = parse_policy)]
    policy: Option<PlacementPolicy>,

    /// auto, dense-grid or free-rects
    #[arg(long, value_parser = parse_index)]
    index: Option<IndexKind>,

    /// Annealing iterations per restart
    #[arg(long)]
    iterations: Option<usize>,

    /// Independent annealing restarts, run in parallel
    #[arg(long)]
    restarts: Option<usize>,

    /// JSON file with a full or partial configuration
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output format: text or json
    #[arg(long, default_value = "text", value_parser = ["text", "json"])]
    format: String,

    /// Show ASCII layout of each bin
    #[arg(long)]
    layout: bool,

    /// error, warn, info, debug or trace
    #[arg(long, default_value = "warn")]
    log_level: Level,
}

fn parse_strategy(s: &str) -> Result<Strategy, String> {
    match s {
        "greedy" => Ok(Strategy::Greedy),
        "anneal" => Ok(Strategy::Anneal),
        "exact" => Ok(Strategy::Exact),
        _ => Err(format!(
            "invalid strategy '{}', expected: greedy, anneal, or exact",
            s
        )),
    }
}

fn parse_policy(s: &str) -> Result<PlacementPolicy, String> {
    match s {
        "first-fit" => Ok(PlacementPolicy::FirstFit),
        "best-area-fit" => Ok(PlacementPolicy::BestAreaFit),
        "best-short-side-fit" => Ok(PlacementPolicy::BestShortSideFit),
        "best-long-side-fit" => Ok(PlacementPolicy::BestLongSideFit),
        _ => Err(format!(
            "invalid policy '{}', expected: first-fit, best-area-fit, best-short-side-fit, or best-long-side-fit",
            s
        )),
    }
}

fn parse_index(s: &str) -> Result<IndexKind, String> {
    match s {
        "auto" => Ok(IndexKind::Auto),
        "dense-grid" => Ok(IndexKind::DenseGrid),
        "free-rects" => Ok(IndexKind::FreeRects),
        _ => Err(format!(
            "invalid index '{}', expected: auto, dense-grid, or free-rects",
            s
        )),
    }
}

fn parse_dimensions(s: &str) -> Result<Rect, String> {
    let parts: Vec<&str> = s.split('x').collect();
    if parts.len() != 2 {
        return Err(format!("invalid dimensions '{}', expected WxH", s));
    }
    let w = parts[0]
        .parse::<u32>()
        .map_err(|_| format!("invalid width in '{}'", s))?;
    let h = parts[1]
        .parse::<u32>()
        .map_err(|_| format!("invalid height in '{}'", s))?;
    if w == 0 || h == 0 {
        return Err(format!("dimensions must be non-zero in '{}'", s));
    }
    Ok(Rect::new(w, h))
}

/// `[ID=]WxH:qty`; rows without an explicit id get `default_id`.
fn parse_rect(s: &str, default_id: u32) -> Result<Demand, String> {
    let (id, body) = match s.split_once('=') {
        Some((id, rest)) => (
            id.parse::<u32>()
                .map_err(|_| format!("invalid id in '{}'", s))?,
            rest,
        ),
        None => (default_id, s),
    };
    let parts: Vec<&str> = body.split(':').collect();
    if parts.len() != 2 {
        return Err(format!("invalid rectangle '{}', expected [ID=]WxH:qty", s));
    }
    let rect = parse_dimensions(parts[0])?;
    let qty = parts[1]
        .parse::<u32>()
        .map_err(|_| format!("invalid quantity in '{}'", s))?;
    if qty == 0 {
        return Err(format!("quantity must be non-zero in '{}'", s));
    }
    Ok(Demand { id, rect, qty })
}

fn load_config(cli: &Cli) -> Result<PackConfig, String> {
    let mut config = match &cli.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
            serde_json::from_str(&text)
                .map_err(|e| format!("invalid config {}: {}", path.display(), e))?
        }
        None => PackConfig::default(),
    };
    if let Some(strategy) = cli.strategy {
        config.strategy = strategy;
    }
    if let Some(policy) = cli.policy {
        config.policy = policy;
    }
    if let Some(index) = cli.index {
        config.index = index;
    }
    if let Some(iterations) = cli.iterations {
        config.anneal.iterations = iterations;
    }
    if let Some(restarts) = cli.restarts {
        config.anneal.restarts = restarts;
    }
    if let Some(seed) = cli.seed {
        config.anneal.seed = seed;
    }
    Ok(config)
}

fn load_problem(cli: &Cli) -> Result<Problem, String> {
    let mut problem = if let Some(path) = &cli.input {
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
        let mut problem: Problem = serde_json::from_str(&text)
            .map_err(|e| format!("invalid problem {}: {}", path.display(), e))?;
        if let Some(bin) = &cli.bin {
            problem.bin = parse_dimensions(bin)?;
        }
        problem
    } else if let Some(types) = cli.random {
        let bin = match &cli.bin {
            Some(bin) => parse_dimensions(bin)?,
            None => generate::DEFAULT_RANDOM_BIN,
        };
        let mut rng = SmallRng::seed_from_u64(cli.seed.unwrap_or(0));
        let demands = generate::random_demands(&mut rng, types, &DemandRanges::default());
        Problem::new(bin, demands, true)
    } else {
        let bin = cli
            .bin
            .as_deref()
            .ok_or("--bin is required unless --input or --random is given")?;
        let bin = parse_dimensions(bin)?;
        let demands = cli
            .rects
            .iter()
            .enumerate()
            .map(|(i, r)| parse_rect(r, i as u32 + 1))
            .collect::<Result<Vec<_>, _>>()?;
        Problem::new(bin, demands, true)
    };
    if cli.no_rotate {
        problem.allow_rotate = false;
    }
    Ok(problem)
}

fn run(cli: &Cli) -> Result<(), String> {
    let config = load_config(cli)?;
    let problem = load_problem(cli)?;
    let solver = Solver::new(problem, config).map_err(|e| e.to_string())?;
    let result = solver.solve();

    let exporter: Box<dyn ResultExporter> = match cli.format.as_str() {
        "json" => Box::new(JsonExporter { pretty: true }),
        _ => Box::new(TextExporter { layout: cli.layout }),
    };
    let stdout = std::io::stdout();
    exporter
        .export(&result, &mut stdout.lock())
        .map_err(|e| e.to_string())
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(cli.log_level)
        .init();

    if let Err(e) = run(&cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
