#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = picrete_exam_client::run().await {
        eprintln!("picrete-exam-client fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
