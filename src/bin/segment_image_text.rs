use clap::Parser;
use museum_etl::app::{finish, report_failure};
use museum_etl::config::SegmentTextArgs;
use museum_etl::utils::validation::Validate;
use museum_etl::vision::{SamSegmenter, Tesseract};
use museum_etl::SegmentText;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = SegmentTextArgs::parse();
    args.log.init();

    tracing::info!("🚀 Segmenting text in {}", args.input);

    if let Err(e) = args.validate() {
        std::process::exit(report_failure(&e));
    }

    let segmenter = match SamSegmenter::from_files(&args.model.encoder, &args.model.decoder) {
        Ok(segmenter) => segmenter,
        Err(e) => std::process::exit(report_failure(&e)),
    };
    let tesseract = Tesseract::new(args.tesseract.clone(), args.lang.clone());

    let mut job = SegmentText::new(segmenter, tesseract, args.into_options());
    let result = job.run().await;
    std::process::exit(finish(result));
}
