#[tokio::main]
async fn main() -> anyhow::Result<()> {
    excelqa_server::start().await
}
