//! Small walkthrough of the map's operations.

use clap::Parser;
use cmap::ConcurrentMap;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "setup-map", about = "Exercise a few ConcurrentMap operations")]
struct Args {
    /// Number of shards to create.
    #[arg(long, default_value_t = 5)]
    shards: usize,
}

fn main() -> Result<(), cmap::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let map: ConcurrentMap<&str, &str> = ConcurrentMap::new(args.shards)?;

    let inserted = map.set_if_absent("a", "b");
    println!("Insertion of a was successful: {}", inserted);

    if let Some(value) = map.get("a") {
        println!("Value of a is {}", value);
    }

    let removed = map.remove_if("a", |_, value| value.is_some());
    println!("Was the removal successful: {}", removed);
    println!("Is the map empty? {}", map.is_empty());

    Ok(())
}
