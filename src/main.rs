use anyhow::Result;

use quotamon::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();
    quotamon::app::run(cli).await
}
