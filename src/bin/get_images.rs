use clap::Parser;
use museum_etl::app::{finish, report_failure};
use museum_etl::config::ImagesArgs;
use museum_etl::utils::validation::Validate;
use museum_etl::{EtlEngine, ImagesPipeline, LocalStorage};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = ImagesArgs::parse();
    args.log.init();

    tracing::info!("🚀 Downloading images listed in {}", args.src);
    if args.probe {
        tracing::info!("🔍 PROBE MODE - No images will be downloaded");
    }

    let options = match args.validate().and_then(|_| args.into_options()) {
        Ok(options) => options,
        Err(e) => std::process::exit(report_failure(&e)),
    };

    let pipeline = ImagesPipeline::new(LocalStorage::new("."), options);
    let result = EtlEngine::new(pipeline).run().await;
    std::process::exit(finish(result));
}
