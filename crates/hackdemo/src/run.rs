use anyhow::Result;
use renderer::{BundledResources, Demo, DemoConfig, Diagnostics, MonotonicClock, TracingSink};
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str =
    "warn,hackdemo=info,renderer=info,naga=error,wgpu=error,wgpu_core=error,wgpu_hal=error,winit=error";

/// Runs the demo to completion. Every failure is logged and degrades to an
/// early, successful return.
pub fn run() -> Result<()> {
    initialise_tracing();

    let config = DemoConfig::default();
    let resources = bundled_resources(&config);
    tracing::info!(title = %config.title, "starting demo");

    let mut demo = Demo::init(config, Diagnostics::new(TracingSink));
    demo.load(&resources);
    let report = demo.run(&mut MonotonicClock::new());
    tracing::info!(frames = report.frames, "demo finished");
    Ok(())
}

fn bundled_resources(config: &DemoConfig) -> BundledResources {
    BundledResources::new()
        .with(
            &config.sources.vertex,
            include_str!("../resources/raymarch.vert"),
        )
        .with(
            &config.sources.fragment,
            include_str!("../resources/raymarch.frag"),
        )
}

fn initialise_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
