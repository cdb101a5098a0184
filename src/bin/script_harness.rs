use std::env;

use anyhow::Result;
use kestrel_script_bridge::script_harness::{
    bless_golden, check_golden, load_fixture, run_fixture, GoldenMode, HarnessArgs, USAGE,
};
use tracing_subscriber::EnvFilter;

fn main() {
    let args: Vec<String> = env::args().skip(1).collect();
    if args.iter().any(|arg| arg == "--help" || arg == "-h") {
        println!("{USAGE}");
        return;
    }
    // Logs go to stderr so printed JSON stays clean.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).with_writer(std::io::stderr).compact().init();

    if let Err(err) = HarnessArgs::parse(&args).and_then(|args| run(&args)) {
        eprintln!("[script-harness] {err:#}");
        std::process::exit(1);
    }
}

fn run(args: &HarnessArgs) -> Result<()> {
    let fixture = load_fixture(&args.fixture)?;
    let output = run_fixture(&fixture)?;
    match &args.mode {
        GoldenMode::Print => {
            serde_json::to_writer_pretty(std::io::stdout(), &output)?;
            println!();
        }
        GoldenMode::Check(golden) => {
            check_golden(golden, &output)?;
            println!("[script-harness] {} steps match {}", output.results.len(), golden.display());
        }
        GoldenMode::Bless(golden) => {
            bless_golden(golden, &output)?;
            println!("[script-harness] wrote {}", golden.display());
        }
    }
    Ok(())
}
