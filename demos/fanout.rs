//! Fan-out demo: several channels, several readers, one shared chain
//!
//! Run with: cargo run --example fanout
//!
//! Set RUST_LOG=consumable_stream=trace to watch every append.

use std::time::Duration;

use consumable_stream::{Packet, StreamConfig, StreamDemux};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("consumable_stream=debug".parse()?)
                .add_directive("fanout=info".parse()?),
        )
        .init();

    let config = StreamConfig::default()
        .default_timeout(Duration::from_secs(2))
        .backpressure_warning(8);
    let demux: StreamDemux<String> = StreamDemux::with_config(config);

    let mut readers = Vec::new();
    for channel in ["prices", "trades"] {
        for reader in 0..2 {
            let mut consumer = demux.create_consumer(channel, None);
            readers.push(tokio::spawn(async move {
                let mut count = 0;
                loop {
                    match consumer.next().await {
                        Ok(Packet::Value(value)) => {
                            count += 1;
                            tracing::info!(channel, reader, value = %value, "Received");
                        }
                        Ok(Packet::Done(value)) => {
                            tracing::info!(channel, reader, final_value = ?value, "Channel closed");
                            break;
                        }
                        Err(err) => {
                            tracing::warn!(channel, reader, error = %err, "Gave up waiting");
                            break;
                        }
                    }
                }
                count
            }));
        }
    }

    for i in 0..5 {
        tokio::time::sleep(Duration::from_millis(50)).await;
        demux.write("prices", format!("price #{}", i));
        if i % 2 == 0 {
            demux.write("trades", format!("trade #{}", i));
        }
    }

    tracing::info!(
        prices = demux.backpressure("prices"),
        trades = demux.backpressure("trades"),
        "Backpressure before close"
    );

    demux.close("trades", Some("no more trades".to_string()));
    tokio::time::sleep(Duration::from_millis(50)).await;
    demux.close_all(None);

    for reader in readers {
        let count = reader.await?;
        tracing::info!(count, "Reader finished");
    }

    Ok(())
}
