use config::{Config, Credentials};
use driver::Driver;
use logger::init_default_logger;
use node::NodeClient;
use source::AddressCycle;
use transfer::Transferrer;

mod config;
mod constants;
mod driver;
mod logger;
mod node;
mod source;
#[cfg(test)]
mod test_utils;
mod transfer;

#[tokio::main(flavor = "current_thread")]
async fn main() -> eyre::Result<()> {
    let _guard = init_default_logger();

    let config = Config::read_default().await?;
    let credentials = Credentials::from_env()?;
    let transfer_amount = config.transfer_amount_wei()?;

    let node = node::connect(&config)?;
    let chain_id = node.chain_id().await?;
    tracing::info!("Connected to {} (chain id {chain_id})", config.rpc_url);

    if let Some(expected) = config.chain_id {
        if expected != chain_id {
            eyre::bail!("Node reports chain id {chain_id}, expected {expected}");
        }
    }

    let source = AddressCycle::open(&config.addresses_file_path).await?;
    tracing::info!(
        "Loaded {} rows from {}",
        source.len(),
        config.addresses_file_path
    );

    let transferrer = Transferrer::new(node, credentials, transfer_amount, chain_id);
    let mut driver = Driver::new(source, transferrer);

    driver.run(None).await;

    Ok(())
}
