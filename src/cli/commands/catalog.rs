use anyhow::Result;

use crate::app::Services;
use crate::error::RelayError;

/// The catalog reports failures as empty listings
fn unavailable(services: &Services, what: &str) -> anyhow::Error {
    RelayError::execution(format!(
        "No {} listed; check that {} runs",
        what,
        services.config.opencode_bin.display()
    ))
    .into()
}

pub async fn list_models(services: &Services) -> Result<()> {
    let models = services.catalog.models().await;
    if models.is_empty() {
        return Err(unavailable(services, "models"));
    }
    for model in models {
        println!("{}", model);
    }
    Ok(())
}

pub async fn list_agents(services: &Services) -> Result<()> {
    let agents = services.catalog.agents().await;
    if agents.is_empty() {
        return Err(unavailable(services, "agents"));
    }
    for agent in agents {
        println!("{} ({})", agent.name, agent.kind);
    }
    Ok(())
}
