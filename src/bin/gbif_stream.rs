use std::error::Error;
use std::sync::Arc;

use gbif_streams::GbifClient;
use gbif_streams::apps::run_stream;

fn main() -> Result<(), Box<dyn Error>> {
    let stdout = std::io::stdout();
    let stderr = std::io::stderr();
    run_stream(
        std::env::args().skip(1),
        |config| Arc::new(GbifClient::new(config)),
        &mut stdout.lock(),
        &mut stderr.lock(),
    )
}
