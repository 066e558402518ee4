mod client;
mod config;
mod refrigerator;
#[allow(clippy::module_inception)]
mod thinq;

use anyhow::Context;
pub use client::DeviceInfo;
pub use client::HttpThinqClient;
pub use client::ThinqClient;
pub use client::TransportError;
pub use config::Config as ThinqConfig;
use linkme::distributed_slice;
pub use thinq::ThinqIntegration;

use crate::engine;

#[distributed_slice(engine::INTEGRATION_REGISTRY)]
fn init_thinq(ctx: &engine::IntegrationContext) -> engine::IntegrationFactoryResult {
    let thinq_config = if let Some(c) = &ctx.config.thinq {
        c
    } else {
        return Ok(None);
    };

    let client = HttpThinqClient::new(thinq_config).context("Failed to create ThinQ client")?;
    Ok(Some(Box::new(ThinqIntegration::new(client, thinq_config))))
}
