use lambda_bootstrap::config::Config;
use lambda_bootstrap::runtime::{HandlerRegistry, Runtime};

fn main() -> anyhow::Result<()> {
    let cfg = Config::load()?;

    let level = cfg
        .settings
        .log_level
        .parse::<tracing::Level>()
        .unwrap_or(tracing::Level::INFO);
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_max_level(level)
        .init();

    let mut registry = HandlerRegistry::new();
    registry.register_fn("echo::handler", |input| Ok(input.to_vec()));

    let runtime = Runtime::init(&cfg, &mut registry)?;
    runtime.run()
}
