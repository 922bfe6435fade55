use clap::Parser;
use museum_etl::app::{finish, report_failure};
use museum_etl::config::MetDataArgs;
use museum_etl::utils::validation::Validate;
use museum_etl::{EtlEngine, LocalStorage, MetDataPipeline};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = MetDataArgs::parse();
    args.log.init();

    tracing::info!("🚀 Starting Met Open Access download");
    tracing::info!("📡 Source: {}", args.src);

    if let Err(e) = args.validate() {
        std::process::exit(report_failure(&e));
    }

    let pipeline = MetDataPipeline::new(LocalStorage::new("."), args.into_options());
    let result = EtlEngine::new(pipeline).run().await;
    std::process::exit(finish(result));
}
