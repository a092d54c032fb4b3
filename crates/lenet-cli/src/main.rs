// SPDX-License-Identifier: AGPL-3.0-only

//! `lenet`: init file export and bit-exact verification for the LeNet-5
//! accelerator.
//!
//! ```text
//! USAGE:
//!   lenet export  --out-dir DIR              Write weight/bias/image init files
//!   lenet golden  --init-dir DIR --out-dir DIR   Per-stage dumps + comparison files
//!   lenet verify  --init-dir DIR --sim FILE  Compare simulator output (exit 1 on divergence)
//!   lenet passes  --channels N               Show the reload pass grouping
//! ```

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use lenet_chip::{files, lanes};
use lenet_golden::datapath::argmax;
use lenet_golden::dump::write_trace;
use lenet_golden::layout::pack_multipass;
use lenet_golden::prelude::*;
use lenet_golden::{write_image, write_sim_output, LayerTrace};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "lenet", about = "LeNet-5 accelerator golden model", version)]
struct Cli {
    #[command(subcommand)]
    command: Cmd,
}

#[derive(Clone, Copy, ValueEnum)]
enum BiasArg {
    /// One 32-bit value per line, passes padded to six lines.
    Column,
    /// One 192-bit word per pass.
    Wide,
}

impl From<BiasArg> for BiasFormat {
    fn from(arg: BiasArg) -> Self {
        match arg {
            BiasArg::Column => Self::Column,
            BiasArg::Wide => Self::Wide,
        }
    }
}

#[derive(Subcommand)]
enum Cmd {
    /// Write the hardware init files for a synthetic parameter set.
    Export {
        /// Directory for the .hex files.
        #[arg(long)]
        out_dir: PathBuf,
        /// Parameter generator seed.
        #[arg(long, default_value_t = 0)]
        seed: u64,
        /// Test image (ramp or diagonal).
        #[arg(long, default_value = "ramp")]
        pattern: InputPattern,
        /// Conv bias file layout.
        #[arg(long, value_enum, default_value_t = BiasArg::Column)]
        bias_format: BiasArg,
    },
    /// Run the golden model on an init directory and write every stage.
    Golden {
        /// Directory holding the .hex init files.
        #[arg(long)]
        init_dir: PathBuf,
        /// Directory for debug dumps and comparison files.
        #[arg(long)]
        out_dir: PathBuf,
        /// Conv bias file layout.
        #[arg(long, value_enum, default_value_t = BiasArg::Column)]
        bias_format: BiasArg,
    },
    /// Compare simulator output against the golden model.
    Verify {
        /// Directory holding the .hex init files.
        #[arg(long)]
        init_dir: PathBuf,
        /// Simulator output (decimal, one line per pixel per pass).
        #[arg(long)]
        sim: PathBuf,
        /// Layer the output belongs to.
        #[arg(long, default_value = "conv1",
              value_parser = ["conv1", "conv2", "fc1", "fc2", "fc3"])]
        layer: String,
        /// Pipeline stage the output was probed at.
        #[arg(long, default_value = "quantized")]
        stage: Stage,
        /// Divergences to print.
        #[arg(long, default_value_t = 10)]
        max_report: usize,
        /// Conv bias file layout.
        #[arg(long, value_enum, default_value_t = BiasArg::Column)]
        bias_format: BiasArg,
    },
    /// Show how a channel count splits into reload passes.
    Passes {
        /// Channel count.
        #[arg(long)]
        channels: usize,
        /// Lanes per word.
        #[arg(long, default_value_t = lanes::LANE_COUNT)]
        lanes: usize,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Cmd::Export {
            out_dir,
            seed,
            pattern,
            bias_format,
        } => cmd_export(&out_dir, seed, pattern, bias_format.into())?,
        Cmd::Golden {
            init_dir,
            out_dir,
            bias_format,
        } => cmd_golden(&init_dir, &out_dir, bias_format.into())?,
        Cmd::Verify {
            init_dir,
            sim,
            layer,
            stage,
            max_report,
            bias_format,
        } => cmd_verify(&init_dir, &sim, &layer, stage, max_report, bias_format.into())?,
        Cmd::Passes { channels, lanes } => cmd_passes(channels, lanes)?,
    }

    Ok(())
}

fn cmd_export(out_dir: &Path, seed: u64, pattern: InputPattern, bias: BiasFormat) -> Result<()> {
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("creating {}", out_dir.display()))?;

    tracing::info!("Exporting seed {seed}, {pattern:?} image to {}", out_dir.display());
    let params = ParameterSet::synthetic(seed)?;
    let written = params.write_init_files(out_dir, bias)?;
    write_image(out_dir.join(files::INPUT_IMAGE), &pattern.image()?)?;

    println!("Exported {} init file(s) to {}", written.len() + 1, out_dir.display());
    for path in &written {
        println!("  {}", path.display());
    }
    println!("  {}", out_dir.join(files::INPUT_IMAGE).display());
    Ok(())
}

/// Read an init directory and run the whole network on its image
fn golden_traces(init_dir: &Path, bias: BiasFormat) -> Result<(ParameterSet, Vec<LayerTrace>)> {
    let params = ParameterSet::read_init_files(init_dir, bias)
        .with_context(|| format!("loading init files from {}", init_dir.display()))?;
    let image = read_image(init_dir.join(files::INPUT_IMAGE))?;
    let traces = params.network()?.run(&image)?;
    Ok((params, traces))
}

fn cmd_golden(init_dir: &Path, out_dir: &Path, bias: BiasFormat) -> Result<()> {
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("creating {}", out_dir.display()))?;
    let (_, traces) = golden_traces(init_dir, bias)?;

    for trace in &traces {
        let layer = &trace.record.layer;
        let dumps = write_trace(out_dir, trace)?;
        let compare_file = out_dir.join(format!("{layer}_golden_compare.txt"));
        write_sim_output(&compare_file, trace.record.output(), lanes::LANE_COUNT)?;
        println!(
            "{layer:<6} {:<14} {} dump(s), {}",
            trace.record.output().shape().to_string(),
            dumps.len(),
            compare_file.display()
        );
    }

    if let Some(logits) = traces.last().map(|t| t.record.output()) {
        println!("Logits : {:?}", logits.data());
        if let Some(class) = argmax(logits) {
            println!("Class  : {class}");
        }
    }
    Ok(())
}

fn cmd_verify(
    init_dir: &Path,
    sim: &Path,
    layer: &str,
    stage: Stage,
    max_report: usize,
    bias: BiasFormat,
) -> Result<()> {
    tracing::info!("Verifying {layer}/{stage} against {}", sim.display());
    let (params, traces) = golden_traces(init_dir, bias)?;
    let Some(trace) = traces.iter().find(|t| t.record.layer == layer) else {
        bail!("Layer not found: {layer}");
    };
    let config = params
        .layer(layer)
        .map(|p| &p.config)
        .with_context(|| format!("no parameters for {layer}"))?;

    let format = match stage {
        Stage::Quantized => SimOutputFormat::for_layer(config),
        Stage::Pooled => SimOutputFormat::for_stage(config, true),
        Stage::Accumulated | Stage::Biased | Stage::Activated => {
            SimOutputFormat::for_stage(config, false)
        }
    };
    let actual = read_sim_output(sim, &format)
        .with_context(|| format!("reading simulation output {}", sim.display()))?;
    let golden = hwc_view(trace.record.stage(stage))?;

    let report = ComparisonReport::new(format!("{layer}/{stage}"), &golden, &actual)?;
    print!("{}", report.render(max_report));

    if !report.is_match() {
        bail!(
            "{layer}/{stage}: {} divergence(s) from golden",
            report.divergences.len()
        );
    }
    Ok(())
}

fn cmd_passes(channels: usize, lanes: usize) -> Result<()> {
    let passes = pack_multipass(channels, lanes)?;
    println!("{channels} channel(s) over {lanes} lane(s): {} pass(es)", passes.len());
    for pass in passes {
        println!(
            "  pass {}  channels {:>3}..{:<3}  padding {}",
            pass.index, pass.channels.start, pass.channels.end, pass.padding()
        );
    }
    Ok(())
}
