use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::info;

mod benches;
mod stats;

use crate::stats::BenchStats;

#[derive(Debug, Parser)]
#[command(name = "benchmark_runner", version, about = "Multi-threaded queue and list benchmarks")]
pub struct Opts {
    /// Sets the number of threads in the benchmark
    #[arg(short = 't', long, default_value_t = 4)]
    pub num_threads: usize,
    /// Sets the output directory
    #[arg(short = 'd', long, default_value = ".")]
    pub output_dir: PathBuf,
    /// Number of elements moved through the queues per sample
    #[arg(short = 'n', long, default_value_t = 256 * 256)]
    pub elements: usize,
    /// Number of keys in the list benchmarks
    #[arg(short = 'k', long, default_value_t = 256 * 4)]
    pub list_keys: usize,
    /// Number of samples taken per benchmark
    #[arg(short = 's', long, default_value_t = 50)]
    pub samples: usize,
    /// Only run the benchmarks whose name contains this
    #[arg(default_value = "")]
    pub name: String,
}

macro_rules! S {
  ($($f:expr),*) => {
    vec![$(
        ($f as fn(&Opts) -> BenchStats, stringify!($f)),
      )*
    ]
  }
}

fn main() -> Result<()> {
    env_logger::init();
    let opts = Opts::parse();
    if opts.num_threads == 0 {
        bail!("the number of threads must be at least 1");
    }

    let benches = S!(
        benches::ms_queue_push,
        benches::ms_queue_pop,
        benches::ms_queue_transfer,
        benches::locked_queue_push,
        benches::locked_queue_pop,
        benches::locked_queue_transfer,
        benches::crossbeam_queue_push,
        benches::crossbeam_queue_pop,
        benches::crossbeam_queue_transfer,
        benches::list_remove,
        benches::list_lookup,
        benches::list_mixed
    );

    let selected = benches
        .iter()
        .filter(|(_, name)| name.contains(&opts.name))
        .collect::<Vec<_>>();
    if selected.is_empty() {
        bail!(
            "No benchmarks were left after matching with the pattern '{}'",
            opts.name
        );
    }

    fs::create_dir_all(&opts.output_dir)
        .with_context(|| format!("creating {}", opts.output_dir.display()))?;
    for (f, name) in selected {
        info!("running {} on {} threads", name, opts.num_threads);
        let stat = f(&opts);
        println!("{}", stat);
        write_samples(&opts, &stat)?;
    }
    Ok(())
}

fn write_samples(opts: &Opts, stat: &BenchStats) -> Result<()> {
    let output_filename = format!(
        "s:{}-b:{}-t:{}",
        stat.variant(),
        stat.name(),
        stat.threads()
    );
    let path = opts.output_dir.join(output_filename);
    let file = File::create(&path).with_context(|| format!("creating {}", path.display()))?;
    let mut file = BufWriter::new(file);
    for sample in stat.samples() {
        writeln!(file, "{}", sample)?;
    }
    file.flush()?;
    Ok(())
}
