#[tokio::main]
async fn main() {
    let code = scanmatrix::app::startup::startup().await;
    std::process::exit(code);
}
