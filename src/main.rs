use clap::Parser;
use shutter_rip::Rip;
use std::process::ExitCode;

mod args;
use args::Args;

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    env_logger::init();

    // Parse command-line arguments
    let args = Args::parse();

    let mut rip = match Rip::with_config_file(&args.config) {
        Ok(rip) => rip,
        Err(e) => {
            ::log::error!("Failed to load {}: {}", args.config.display(), e);
            return ExitCode::FAILURE;
        }
    };

    if let Some(max_sessions) = args.max_sessions {
        rip = rip.with_max_sessions(max_sessions);
    }
    if let Some(output_dir) = args.output_dir {
        rip = rip.with_output_dir(output_dir);
    }
    if let Some(state_file) = args.state_file {
        rip = rip.with_state_path(state_file);
    }
    if let Some(webdriver_url) = args.webdriver_url {
        rip = rip.with_webdriver_url(webdriver_url);
    }
    if args.headless {
        rip = rip.with_headless(true);
    }

    ::log::info!(
        "Starting rip of {} sites into {}",
        rip.config().site_links.len(),
        rip.config().output_dir.display()
    );
    println!("Note: a WebDriver server (e.g., ChromeDriver) must be running.");

    let start_time = std::time::Instant::now();
    match rip.run().await {
        Ok(summary) => {
            ::log::info!(
                "Rip complete in {:.2} seconds - {}",
                start_time.elapsed().as_secs_f64(),
                summary
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            ::log::error!("Rip failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
