use anyhow::Result;
use spacelens::cli::Cli;

fn main() -> Result<()> {
    Cli::parse().run()
}
