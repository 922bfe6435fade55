use clap::Parser;
use museum_etl::app::{finish, report_failure};
use museum_etl::config::RemoveBackgroundArgs;
use museum_etl::utils::validation::Validate;
use museum_etl::vision::SamSegmenter;
use museum_etl::RemoveBackground;

fn main() -> anyhow::Result<()> {
    let args = RemoveBackgroundArgs::parse();
    args.log.init();

    tracing::info!("🚀 Removing backgrounds from {}", args.input);
    if args.debug {
        tracing::info!("🔍 DEBUG MODE - Listing outputs only");
    }

    if let Err(e) = args.validate() {
        std::process::exit(report_failure(&e));
    }

    let segmenter = match SamSegmenter::from_files(&args.model.encoder, &args.model.decoder) {
        Ok(segmenter) => segmenter,
        Err(e) => std::process::exit(report_failure(&e)),
    };

    let mut job = RemoveBackground::new(segmenter, args.into_options());
    std::process::exit(finish(job.run()));
}
