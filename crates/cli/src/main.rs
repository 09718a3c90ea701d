use std::process;

use clap::{Parser, Subcommand};

mod serve;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Paylane - storefront checkout gateway", long_about = None)]
struct Opts {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, PartialEq, Clone, Debug)]
enum Command {
    /// Start the checkout gateway server
    Serve(serve::ServeCommand),
}

#[tokio::main]
async fn main() {
    // Local dev keeps credentials in .env; absence is fine in production.
    dotenvy::dotenv().ok();

    let opts = Opts::parse();

    let result = match opts.command {
        Command::Serve(cmd) => cmd.execute().await,
    };

    if let Err(e) = result {
        eprintln!("{} {}", console::style("✗").red(), e);
        process::exit(1);
    }
}
