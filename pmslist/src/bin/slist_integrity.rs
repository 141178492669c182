//! Driver for crash-consistency testing of a file-backed list.
//!
//! A crash-testing harness runs `create` once, then `fill` under its
//! store-reordering engine, and finally `check` (or
//! `check-without-recovery`) against every crash state it materializes.

use anyhow::{ensure, Context, Result};
use clap::{Args, Parser, Subcommand};
use pmslist::fixture::{generate_commands, generate_offsets, region_size_for, run_commands, FixtureNode};
use pmslist::pmem::mmap_pmemfile_t::FileBackedPersistentMemoryRegion;
use pmslist::pmem::pmcopy_t::PmCopy;
use pmslist::slist::{check_region_consistency, SinglyLinkedList, NODE_AREA_START};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_NUMBER_OF_COMMANDS: usize = 100;

/// Crash-consistency driver for the persistent singly-linked list
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    mode: Mode,

    /// Log level
    #[arg(long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Mode {
    /// Create (or truncate) the file and lay out an empty list
    Create(RegionArgs),
    /// Recover the list and run a random sequence of commands on it
    Fill {
        #[command(flatten)]
        region: RegionArgs,

        /// Number of commands to run
        #[arg(long, default_value_t = DEFAULT_NUMBER_OF_COMMANDS)]
        commands: usize,

        /// Seed for the command and offset generator
        #[arg(long, env = "TEST_SEED")]
        seed: Option<u64>,
    },
    /// Check a copy of the file after running recovery
    Check(RegionArgs),
    /// Check a copy of the file as it is on the media
    #[command(alias = "check_without_recovery")]
    CheckWithoutRecovery(RegionArgs),
}

#[derive(Args, Debug)]
struct RegionArgs {
    /// Backing file of the region
    file: PathBuf,

    /// Size of the region in bytes
    #[arg(long, default_value_t = region_size_for::<FixtureNode>(DEFAULT_NUMBER_OF_COMMANDS as u64))]
    region_size: u64,
}

type List = SinglyLinkedList<FileBackedPersistentMemoryRegion, FixtureNode>;

fn create(region: &RegionArgs) -> Result<()> {
    let pm = FileBackedPersistentMemoryRegion::new(&region.file, region.region_size)
        .with_context(|| format!("creating {}", region.file.display()))?;
    List::init(pm)?;
    info!(file = %region.file.display(), size = region.region_size, "created list");
    Ok(())
}

fn fill(region: &RegionArgs, number_of_commands: usize, seed: Option<u64>) -> Result<()> {
    let seed = match seed {
        Some(seed) => {
            info!("Running with TEST_SEED={}", seed);
            seed
        }
        None => {
            let seed = rand::random::<u64>();
            info!("To reproduce set env variable TEST_SEED={}", seed);
            seed
        }
    };
    let needed = number_of_commands as u64 * FixtureNode::size_of();
    ensure!(
        needed <= region.region_size.saturating_sub(NODE_AREA_START),
        "{} commands need {} bytes of node storage but the region only has {}",
        number_of_commands,
        needed,
        region.region_size.saturating_sub(NODE_AREA_START)
    );

    let pm = FileBackedPersistentMemoryRegion::restore(&region.file, region.region_size)
        .with_context(|| format!("opening {}", region.file.display()))?;
    let mut list = List::recover(pm)?;

    let mut rng = StdRng::seed_from_u64(seed);
    let commands = generate_commands(number_of_commands, &mut rng);
    let offsets = generate_offsets::<FixtureNode, _>(number_of_commands, &mut rng);
    run_commands(&mut list, &commands, &offsets)?;
    info!(commands = number_of_commands, "filled list");
    Ok(())
}

fn make_working_copy(path: &Path) -> Result<PathBuf> {
    let mut copy_path = path.as_os_str().to_owned();
    copy_path.push(".cpy");
    let copy_path = PathBuf::from(copy_path);
    std::fs::copy(path, &copy_path)
        .with_context(|| format!("copying {} to {}", path.display(), copy_path.display()))?;
    Ok(copy_path)
}

fn check(region: &RegionArgs, with_recovery: bool) -> Result<()> {
    let copy_path = make_working_copy(&region.file)?;
    let pm = FileBackedPersistentMemoryRegion::restore(&copy_path, region.region_size)
        .with_context(|| format!("opening {}", copy_path.display()))?;
    check_region_consistency::<_, FixtureNode>(pm, with_recovery)?;
    info!(file = %region.file.display(), with_recovery, "list is consistent");
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("pmslist={},slist_integrity={}", cli.log_level, cli.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match &cli.mode {
        Mode::Create(region) => create(region),
        Mode::Fill {
            region,
            commands,
            seed,
        } => fill(region, *commands, *seed),
        Mode::Check(region) => check(region, true),
        Mode::CheckWithoutRecovery(region) => check(region, false),
    }
}
