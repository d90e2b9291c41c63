//! Demo worker program for the process-pool strategy.
//!
//! Reads runs from stdin and combines the integer parameters `x` and `y`
//! into the result `z`.

use anyhow::Context;
use clap::{Parser, ValueEnum};
use paramsweep::trajectory::{ResultItem, Trajectory};
use paramsweep::value::NdArray;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Op {
    Product,
    Sum,
}

#[derive(Parser)]
#[command(name = "sweep-worker")]
#[command(about = "Worker process for paramsweep process-pool explorations")]
struct Cli {
    /// How `x` and `y` are combined
    #[arg(long, value_enum, default_value_t = Op::Product)]
    op: Op,

    /// Fail every run whose `x` equals this value
    #[arg(long)]
    fail_when_x: Option<i64>,

    /// Also emit `spread`, a float array holding NaN and both infinities
    #[arg(long)]
    spread: bool,

    /// Name of the produced result
    #[arg(long, default_value = "z")]
    result: String,

    /// Log filter used when `RUST_LOG` is unset
    #[arg(long, default_value = "warn")]
    log: String,
}

fn int_param(traj: &Trajectory, name: &str) -> anyhow::Result<i64> {
    traj.parameter_value(name)?
        .as_i64()
        .with_context(|| format!("parameter `{name}` is not an integer"))
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    paramsweep::logging::init(&cli.log);

    paramsweep::worker::serve(|traj| {
        let x = int_param(traj, "x")?;
        let y = int_param(traj, "y")?;
        if cli.fail_when_x == Some(x) {
            anyhow::bail!("injected failure for x = {x}");
        }
        let z = match cli.op {
            Op::Product => x * y,
            Op::Sum => x + y,
        };
        traj.add_result(ResultItem::new(cli.result.as_str(), z));
        if cli.spread {
            #[allow(clippy::cast_precision_loss)]
            let values = vec![f64::NAN, f64::INFINITY, f64::NEG_INFINITY, z as f64];
            traj.add_result(ResultItem::new("spread", NdArray::from_f64(values)));
        }
        Ok(None)
    })?;
    Ok(())
}
