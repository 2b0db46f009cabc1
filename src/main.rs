use anyhow::Result;
use devmetrics::cli::Cli;

fn main() -> Result<()> {
    let cli = Cli::parse();
    devmetrics::logging::init(cli.common.verbose);
    cli.execute()
}
