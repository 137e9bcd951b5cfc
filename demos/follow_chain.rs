//! Follows a redirect chain and prints every step.
//!
//! Run with: `cargo run --example follow_chain -- <base-url> <id> [max-redirects]`
//!
//! For example:
//!
//! ```text
//! cargo run --example follow_chain -- http://www.mocky.io/v2 5e0af46b3300007e1120a7ef 2
//! ```

use hopguard::{Event, Repository};

#[tokio::main]
async fn main() -> Result<(), hopguard::Error> {
    tracing_subscriber::fmt()
        .with_env_filter("hopguard=debug,follow_chain=info")
        .init();

    let mut args = std::env::args().skip(1);
    let base_url = args
        .next()
        .unwrap_or_else(|| "http://www.mocky.io/v2".to_string());
    let id = args
        .next()
        .unwrap_or_else(|| "5e0af46b3300007e1120a7ef".to_string());
    let max_redirects = match args.next() {
        Some(raw) => raw.parse::<u8>().map_err(|e| {
            hopguard::Error::ConfigurationError(format!("Invalid redirect budget {raw:?}: {e}"))
        })?,
        None => hopguard::DEFAULT_MAX_REDIRECTS,
    };

    let repository = Repository::builder()
        .base_url(base_url)
        .max_redirects(max_redirects)
        .build()?;

    println!("=== Fetching {id} (budget {max_redirects}) ===");
    let mut fetch = repository.get(&id);
    let mut hops = 0;

    while let Some(event) = fetch.next().await {
        match event {
            Event::Redirected(info) => {
                hops += 1;
                println!("#{hops} {} {} -> {}", info.status.as_u16(), info.method, info.url);
            }
            Event::Data(Some(data)) => {
                println!("Data after {hops} redirects:");
                for (key, value) in &data {
                    println!("  {key}: {value}");
                }
            }
            Event::Data(None) => println!("No data after {hops} redirects"),
            Event::Failed(e) => match e.classify() {
                Some(kind) => println!("Failed ({}): {kind}", kind.code()),
                None => println!("Transport failure: {e}"),
            },
        }
    }

    Ok(())
}
