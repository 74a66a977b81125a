pub mod config;
pub mod engine;
pub mod report;
pub mod script;

pub use config::{Cli, DriverConfig};
pub use report::DriverReport;
pub use script::{Script, Step};

pub async fn run_script(config: DriverConfig) -> anyhow::Result<DriverReport> {
    engine::run(config).await
}
