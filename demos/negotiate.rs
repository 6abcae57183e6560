// Lists the installed security packages and prints the first leg of a Negotiate handshake as an
// HTTP `Authorization` header.
//
// Environment:
//   SSPI_CLIENT_TARGET     service principal name of the peer (e.g. HTTP/proxy.example.com)
//   SSPI_CLIENT_PACKAGE    security package to use (default: Negotiate)
//   SSPI_CLIENT_LOG_LEVEL  tracing filter (e.g. sspi_client=trace)

#[cfg(windows)]
fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    use base64::Engine;
    use sspi_client::{enumerate_security_packages, SecurityContextClient, SecurityContextConfig};
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::{fmt, EnvFilter};

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_env("SSPI_CLIENT_LOG_LEVEL"))
        .init();

    for package in enumerate_security_packages()? {
        println!("{:<24} max token {:>6}  {}", package.name, package.max_token_len, package.comment);
    }

    let package = std::env::var("SSPI_CLIENT_PACKAGE").unwrap_or_else(|_| "Negotiate".to_owned());
    let mut config = SecurityContextConfig::new(package.as_str());
    if let Ok(target) = std::env::var("SSPI_CLIENT_TARGET") {
        config = config.with_target_name(target);
    }

    let mut client = SecurityContextClient::with_config(config)?;
    let token = client.get_client_token(None)?;

    tracing::info!(state = ?client.state(), expiry = %client.token_expiration(), "first leg done");
    println!(
        "Authorization: {package} {}",
        base64::engine::general_purpose::STANDARD.encode(&token)
    );

    client.dispose();

    Ok(())
}

#[cfg(not(windows))]
fn main() {
    println!("this demo talks to secur32.dll and only runs on Windows");
}
