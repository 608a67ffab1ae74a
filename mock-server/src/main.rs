use mock_server::Credentials;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let shop_id = std::env::var("MOCK_SHOP_ID").unwrap_or_else(|_| "100500".to_string());
    let secret_key = std::env::var("MOCK_SECRET_KEY").unwrap_or_else(|_| "test_secret".to_string());

    let addr = format!("127.0.0.1:{port}");
    let listener = TcpListener::bind(&addr).await?;
    mock_server::run(listener, Credentials::new(shop_id, secret_key)).await
}
