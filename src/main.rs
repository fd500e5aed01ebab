use std::path::PathBuf;

use clap::{Parser, Subcommand};

use umbra::models::format_circle;
use umbra::params::ParameterSet;
use umbra::scoring;
use umbra::sweep::SweepGrid;

#[derive(Parser)]
#[command(name = "umbra")]
#[command(about = "Evaluate solar/lunar disk detection in eclipse photographs")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print one run id per line for every parameter set in the sweep
    Sweep,
    /// Run one detection configuration over an image list
    Detect {
        /// File listing one image name per line
        #[arg(long, value_name = "FILE")]
        images: PathBuf,

        /// Directory the image names are relative to
        #[arg(long, value_name = "DIR")]
        image_dir: PathBuf,

        /// Run id identifying the parameter set
        #[arg(long, value_name = "RUN_ID")]
        params: String,

        /// Directory the output record file is written to
        #[arg(long, value_name = "DIR", default_value = ".")]
        out_dir: PathBuf,
    },
    /// Score a detection output file against ground truth
    Score {
        #[arg(long, value_name = "FILE")]
        ground_truth: PathBuf,

        #[arg(long, value_name = "FILE")]
        detected: PathBuf,

        /// Try both role assignments of each detected pair and keep the
        /// cheaper one
        #[arg(long)]
        best_assignment: bool,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Cli::parse();

    match args.command {
        Command::Sweep => {
            let grid = SweepGrid::default();
            grid.for_each(|set| println!("{}", set.run_id()));
        }
        Command::Detect { images, image_dir, params, out_dir } => {
            let params = ParameterSet::parse(&params)?;
            let out_path = umbra::detection::run_detection(&params, &images, &image_dir, &out_dir)?;
            println!("wrote {}", out_path.display());
        }
        Command::Score { ground_truth, detected, best_assignment } => {
            let expected = scoring::read_record_file(&ground_truth)?;
            let actual = scoring::read_record_file(&detected)?;

            let samples = scoring::score_datasets(&expected, &actual, best_assignment);
            for sample in &samples {
                let exp = &expected[&sample.key];
                let act = &actual[&sample.key];
                println!(
                    "solar_circle: <exp: {} act: {}> lunar_circle: <exp: {} act: {}> => loss {}",
                    format_circle(exp.solar.as_ref()),
                    format_circle(act.solar.as_ref()),
                    format_circle(exp.lunar.as_ref()),
                    format_circle(act.lunar.as_ref()),
                    sample.total(),
                );
            }

            let report = scoring::aggregate(&samples)?;
            println!("Min loss:   {}", report.min);
            println!("Max loss:   {}", report.max);
            println!("Avg loss:   {}", report.avg);
            println!("Total loss: {}", report.total);
            let mut types: Vec<&String> = report.by_type().keys().collect();
            types.sort();
            for image_type in types {
                match report.average_for_type(image_type) {
                    Some(avg) => println!("Avg loss for {image_type} images: {avg}"),
                    None => println!("Avg loss for {image_type} images: undefined"),
                }
            }
        }
    }

    Ok(())
}
