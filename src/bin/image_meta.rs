use anyhow::Context;
use clap::Parser;
use museum_etl::app::image_meta::collect_image_meta;
use museum_etl::app::report_failure;
use museum_etl::config::ImageMetaArgs;
use museum_etl::utils::validation::Validate;

fn main() -> anyhow::Result<()> {
    let args = ImageMetaArgs::parse();
    args.log.init();

    if let Err(e) = args.validate() {
        std::process::exit(report_failure(&e));
    }

    let fields = args.field_mapping()?;
    let found = collect_image_meta(&args.input, &fields)
        .with_context(|| format!("Could not list images matching {}", args.input))?;

    for image in found {
        println!("{}", image.path.display());
        match image.meta {
            Ok(meta) => {
                let mut entries: Vec<_> = meta.into_iter().collect();
                entries.sort();
                for (name, value) in entries {
                    println!("  {}: {}", name, value);
                }
            }
            Err(e) => println!("  ❌ {}", e),
        }
        println!("----------------------");
    }

    Ok(())
}
