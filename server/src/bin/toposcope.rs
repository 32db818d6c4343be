use clap::Parser;
use toposcope::cli::{self, Cli};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = cli::init_tracing(&cli) {
        eprintln!("failed to initialize logging: {e}");
        std::process::exit(2);
    }

    if let Err(e) = cli::run(cli).await {
        eprintln!("error: {e}");
        std::process::exit(e.exit_code());
    }
}
