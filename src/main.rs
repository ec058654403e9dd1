#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cerberus::run().await
}
