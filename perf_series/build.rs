use clap::CommandFactory;
use std::env;
use std::fs;
use std::path::PathBuf;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let out_dir = PathBuf::from(env::var("OUT_DIR")?);
    let version: &'static str = Box::leak(env::var("CARGO_PKG_VERSION")?.into_boxed_str());

    let man_dir = out_dir.join("man").join("man1");
    fs::create_dir_all(&man_dir)?;

    // Main command
    let cmd = perf_series_cli_types::Cli::command().version(version);
    let mut buffer: Vec<u8> = Default::default();
    clap_mangen::Man::new(cmd.clone()).render(&mut buffer)?;
    fs::write(man_dir.join("perf-series.1"), &buffer)?;

    // One page per subcommand
    for subcmd in cmd.get_subcommands() {
        let mut buffer: Vec<u8> = Default::default();
        clap_mangen::Man::new(subcmd.clone()).render(&mut buffer)?;
        let subcmd_name = subcmd.get_name();
        fs::write(man_dir.join(format!("perf-series-{subcmd_name}.1")), &buffer)?;
    }

    println!("cargo:rerun-if-changed=../cli_types/src/lib.rs");

    Ok(())
}
