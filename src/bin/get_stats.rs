use clap::Parser;
use museum_etl::app::{finish, report_failure};
use museum_etl::config::StatsArgs;
use museum_etl::utils::validation::Validate;
use museum_etl::{EtlEngine, LocalStorage, StatsPipeline};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = StatsArgs::parse();
    args.log.init();

    if let Err(e) = args.validate() {
        std::process::exit(report_failure(&e));
    }
    tracing::info!("📊 Counting {} in {}", args.cols.join(", "), args.src);

    let pipeline = StatsPipeline::new(LocalStorage::new("."), args.into_options());
    let result = EtlEngine::new(pipeline).run().await;
    std::process::exit(finish(result));
}
