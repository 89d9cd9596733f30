use clap::Parser;
use log::{error, info};
use std::time::Instant;

use label_converter::{run, Args};

fn main() {
    // Initialize the logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    if !args.src_path.exists() {
        error!("The specified src_path does not exist: {}", args.src_path.display());
        std::process::exit(2);
    }

    info!("Starting {} conversion of {} shapes...", args.mode, args.task);
    let start = Instant::now();

    match run(&args) {
        Ok(_) => {
            info!("Conversion completed successfully.");
            info!("Conversion time: {:.2} seconds", start.elapsed().as_secs_f64());
        }
        Err(e) => {
            error!("Conversion failed: {}", e);
            std::process::exit(1);
        }
    }
}
