/*
[INPUT]:  SPOT_API_KEY / SPOT_API_SECRET environment variables (optional)
[OUTPUT]: Server time offset and, with credentials, a signed account query
[POS]:    Examples - server time sync and signed requests
[UPDATE]: When changing sync behavior or signed request flow
*/

use spot_connector::*;

/// Example: measure the server time offset, then sign a request with it
#[tokio::main]
async fn main() {
    println!("=== Server Time Offset Example ===\n");

    let config = ClientConfig::default().with_server_time_offset(true);
    let credentials = match (std::env::var("SPOT_API_KEY"), std::env::var("SPOT_API_SECRET")) {
        (Ok(key), Ok(secret)) => Some(Credentials::new(key, secret)),
        _ => None,
    };
    let has_credentials = credentials.is_some();

    let client = match credentials {
        Some(credentials) => SpotClient::with_credentials(credentials, config),
        None => SpotClient::new(config),
    };
    let client = match client {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to create client: {}", e);
            return;
        }
    };
    println!("✓ HTTP client created\n");

    println!("Synchronizing with server clock...");
    match client.sync_time().await {
        Ok(outcome) => println!("✓ Sync outcome: {:?}", outcome),
        Err(e) => println!("✗ Error: {}", e),
    }
    println!("✓ Offset: {:?}", client.time_offset());

    if !has_credentials {
        println!("\nSet SPOT_API_KEY and SPOT_API_SECRET to try a signed request");
        return;
    }

    println!("\nQuerying account...");
    let params = Params::new().insert("recvWindow", 5000);
    match client
        .sign_request::<serde_json::Value>(Method::GET, "/api/v3/account", &params)
        .await
    {
        Ok(account) => println!("✓ Account: {}", account),
        Err(e) => println!("✗ Error: {}", e),
    }
}
