//! Web server command.

use std::net::SocketAddr;

use console::style;

use crate::config::Settings;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;

/// Start the web server.
pub async fn cmd_serve(settings: &Settings, bind: &str) -> anyhow::Result<()> {
    let addr = parse_bind_address(bind)?;

    eprintln!(
        "{} Processor {} -> {}.{}.{}",
        style("→").cyan(),
        settings.processor_name(),
        settings.project_id,
        settings.dataset,
        settings.table
    );
    eprintln!(
        "{} Listening for storage events at http://{}",
        style("→").cyan(),
        addr
    );
    eprintln!("  Press Ctrl+C to stop");

    crate::server::serve(settings, addr).await
}

/// Parse a bind address that can be:
/// - Just a port: "8080" -> 0.0.0.0:8080
/// - Just a host: "127.0.0.1" -> 127.0.0.1:8080
/// - Host and port: "127.0.0.1:3000"
fn parse_bind_address(bind: &str) -> anyhow::Result<SocketAddr> {
    let bind = bind.trim();
    if let Ok(port) = bind.parse::<u16>() {
        return Ok(format!("{}:{}", DEFAULT_HOST, port).parse()?);
    }
    if let Ok(addr) = bind.parse::<SocketAddr>() {
        return Ok(addr);
    }
    Ok(format!("{}:{}", bind, DEFAULT_PORT).parse()?)
}
