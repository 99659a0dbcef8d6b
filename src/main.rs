use anyhow::Result;
use clap::Parser;
use ebook2cbz::{cli, converter};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = cli::Cli::parse();
    converter::run(&cli)
}
