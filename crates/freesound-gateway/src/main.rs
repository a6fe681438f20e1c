use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // stdout carries the result literal for the host script; logs go to
    // stderr only.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let result = freesound_gateway::dispatch::run(&args).await;
    print!("return {}", freesound_gateway::lua::render(&result));
}
