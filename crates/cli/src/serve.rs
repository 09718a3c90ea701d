use anyhow::Context;
use console::style;
use paylane_core::api::{ApiState, start_server};
use paylane_types::{AffirmEnv, GatewayConfig};

#[derive(Debug, Clone, PartialEq, clap::Args)]
pub struct ServeCommand {
    /// Port to run the gateway on
    #[arg(long, default_value = "8788")]
    pub port: u16,

    /// Use the Affirm sandbox environment regardless of AFFIRM_ENV
    #[arg(long)]
    pub sandbox: bool,
}

impl ServeCommand {
    pub async fn execute(&self) -> anyhow::Result<()> {
        println!();
        println!("{}{}", style("Pay").white(), style("lane").green());
        println!("{}", style("Starting checkout gateway").dim());
        println!();

        let mut config = GatewayConfig::from_env()
            .context("failed to resolve gateway configuration from environment")?;
        if self.sandbox {
            config = config.with_environment(AffirmEnv::Sandbox);
        }

        println!("{} {}", style("Affirm env").dim(), config.environment.as_str());
        println!(
            "{} {}",
            style("Affirm keys").dim(),
            if config.has_affirm_keys() {
                style("configured").green()
            } else {
                style("missing").yellow()
            }
        );
        println!(
            "{} {}",
            style("Stripe key").dim(),
            if config.stripe_secret_key.is_some() {
                style("configured").green()
            } else {
                style("missing").yellow()
            }
        );
        println!("{} {}", style("Merchant").dim(), config.merchant_origin);
        println!("{} {}", style("Port").dim(), self.port);
        println!();

        println!("{}", style("Endpoints").dim());
        println!("  GET  http://localhost:{}/health", self.port);
        println!("  POST http://localhost:{}/authorize", self.port);
        println!("  POST http://localhost:{}/card/checkout", self.port);
        println!();
        println!("{}", style("Press Ctrl+C to stop").dim());
        println!();

        // Initialize tracing
        tracing_subscriber::fmt::init();

        let state = ApiState::new(config);
        start_server(state, self.port)
            .await
            .map_err(|e| anyhow::anyhow!("{e}"))?;

        Ok(())
    }
}
