#[tokio::main]
async fn main() -> anyhow::Result<()> {
    timetravel_cli::cli::app::run().await
}
