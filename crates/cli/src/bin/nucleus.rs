use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    nucleus_cli::main_entry().await
}
