//! Read a scale once
//!
//! ```text
//! cargo run --example read_scale -- 192.168.1.50 [--zero] [--no-info]
//! ```
//!
//! The address may also come from `SCALE_ADDR`. Without a port the SMA
//! default is used.

use anyhow::Context;
use smascale::{Reading, Scale, with_default_port};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let mut address = std::env::var("SCALE_ADDR").ok();
    let mut zero = false;
    let mut info = true;

    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--zero" | "-z" => zero = true,
            "--no-info" | "-n" => info = false,
            _ => address = Some(arg),
        }
    }

    let address = address.context("usage: read_scale <host[:port]> [--zero] [--no-info]")?;
    let address = with_default_port(&address);

    let scale = Scale::tcp(&address)?;
    scale
        .open()
        .await
        .with_context(|| format!("connecting to {}", address))?;

    if zero {
        scale.zero().await?;
        println!("Zeroed");
    }

    let reading = scale.get().await?;
    match &reading {
        Reading::Weight(_) => println!("{}", reading),
        Reading::Off => println!("Scale is off"),
    }

    if info {
        match scale.get_info().await? {
            Some(info) => println!("{}", info),
            None => println!("Scale info unavailable"),
        }
    }

    scale.close().await;

    Ok(())
}
