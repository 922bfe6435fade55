use clap::Parser;
use museum_etl::app::{finish, report_failure};
use museum_etl::config::LocImagesArgs;
use museum_etl::utils::validation::Validate;
use museum_etl::{EtlEngine, LocImagesPipeline, LocalStorage};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = LocImagesArgs::parse();
    args.log.init();

    tracing::info!("🚀 Downloading Library of Congress images listed in {}", args.src);

    if let Err(e) = args.validate() {
        std::process::exit(report_failure(&e));
    }

    let pipeline = LocImagesPipeline::new(LocalStorage::new("."), args.into_options());
    let result = EtlEngine::new(pipeline).run().await;
    std::process::exit(finish(result));
}
