use realtime_chat::config::Config;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    realtime_chat::init_tracing();

    let config = Config::load();
    realtime_chat::run(config).await?;

    Ok(())
}
