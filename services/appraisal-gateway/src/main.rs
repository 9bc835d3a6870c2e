use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    appraisal_gateway::run().await
}
