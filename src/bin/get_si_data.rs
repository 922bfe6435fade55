use clap::Parser;
use museum_etl::app::{finish, report_failure};
use museum_etl::config::SiDataArgs;
use museum_etl::utils::validation::Validate;
use museum_etl::{EtlEngine, LocalStorage, SiDataPipeline};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = SiDataArgs::parse();
    args.log.init();

    tracing::info!("🚀 Starting Smithsonian Open Access download");
    tracing::info!("📡 Source: {}", args.src);

    if let Err(e) = args.validate() {
        std::process::exit(report_failure(&e));
    }

    let pipeline = SiDataPipeline::new(LocalStorage::new("."), args.into_options());
    let result = EtlEngine::new(pipeline).run().await;
    std::process::exit(finish(result));
}
