#[tokio::main]
async fn main() -> std::io::Result<()> {
    board_server::run_with_config().await
}
