use anyhow::Result;
use perf_series::cli;

fn main() -> Result<()> {
    cli::handle_calls()
}
