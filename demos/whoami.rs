use cds_webapi::{RequestDispatcher, ServiceConfig, StaticToken};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServiceConfig::from_env()?;
    let token = std::env::var("CDS_ACCESS_TOKEN")?;

    let service = RequestDispatcher::new(config, StaticToken::new(token))?;

    let whoami = service
        .get("WhoAmI", &[])
        .await?
        .ok_or_else(|| anyhow::anyhow!("WhoAmI returned no content"))?;

    println!("UserId: {}", whoami["UserId"]);
    println!("BusinessUnitId: {}", whoami["BusinessUnitId"]);
    println!("OrganizationId: {}", whoami["OrganizationId"]);

    Ok(())
}
