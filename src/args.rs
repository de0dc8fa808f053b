use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "shutter-rip")]
#[command(about = "Resumable downloader for share site albums")]
#[command(version)]
pub struct Args {
    /// Path to the JSON configuration file
    #[arg(default_value = "config.json")]
    pub config: PathBuf,

    /// Maximum number of crawl sessions before giving up
    #[arg(long)]
    pub max_sessions: Option<usize>,

    /// Directory that receives the downloaded albums
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Path of the completion state file
    #[arg(short, long)]
    pub state_file: Option<PathBuf>,

    /// WebDriver URL (overrides config and WEBDRIVER_URL)
    #[arg(long)]
    pub webdriver_url: Option<String>,

    /// Run the browser without a window
    #[arg(long)]
    pub headless: bool,
}
