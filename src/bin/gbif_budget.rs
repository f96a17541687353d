use std::error::Error;
use std::sync::Arc;

use gbif_streams::GbifClient;
use gbif_streams::apps::run_budget;

fn main() -> Result<(), Box<dyn Error>> {
    run_budget(
        std::env::args().skip(1),
        |config| Arc::new(GbifClient::new(config)),
        &mut std::io::stdout().lock(),
    )
}
