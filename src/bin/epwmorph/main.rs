//! EPW climate morphing tool.
use clap::{crate_version, App, Arg, SubCommand};
use dirs::home_dir;
use std::{error::Error, path::PathBuf};

mod export;
mod files;
mod morph;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run() {
        println!("error: {}", e);

        let mut err = &*e;

        while let Some(cause) = err.source() {
            println!("caused by: {}", cause);
            err = cause;
        }

        ::std::process::exit(1);
    }
}

fn app() -> App<'static, 'static> {
    let layout_arg = || {
        Arg::with_name("layout")
            .short("l")
            .long("layout")
            .takes_value(true)
            .possible_values(&["dif", "raster"])
            .default_value("dif")
            .help("How the climate change data is stored.")
            .long_help(concat!(
                "How the climate change data is stored. 'dif' reads monthly difference tables",
                " from ROOT/dif, 'raster' reads monthly GeoTIFF grids from ROOT/raster."
            ))
    };

    let scenario_arg = || {
        Arg::with_name("scenario")
            .short("s")
            .long("scenario")
            .takes_value(true)
            .help("The emissions scenario, e.g. A2 or ssp245.")
    };

    let period_arg = || {
        Arg::with_name("period")
            .short("p")
            .long("period")
            .takes_value(true)
            .requires("scenario")
            .help("The future period, e.g. 2050 or 2041-2060.")
    };

    App::new("epwmorph")
        .author("Ryan <rnleach@users.noreply.github.com>")
        .version(crate_version!())
        .about("Morph hourly weather files toward a future climate.")
        .arg(
            Arg::with_name("root")
                .short("r")
                .long("root")
                .takes_value(true)
                .help("Set the root of the climate data directory.")
                .long_help(concat!(
                    "Set the root of the climate data directory. Difference tables are expected",
                    " in ROOT/dif and raster grids in ROOT/raster. Defaults to ~/epwmorph."
                ))
                .global(true),
        )
        .subcommand(
            SubCommand::with_name("files")
                .about("List the climate data files available.")
                .arg(layout_arg())
                .arg(scenario_arg())
                .arg(period_arg())
                .after_help(concat!(
                    "Without a scenario, lists the scenarios and periods present. With both a",
                    " scenario and a period, lists the files that would be used for a run."
                )),
        )
        .subcommand(
            SubCommand::with_name("morph")
                .about("Morph a weather file.")
                .arg(
                    Arg::with_name("epw")
                        .long("epw")
                        .required(true)
                        .takes_value(true)
                        .help("The baseline weather file."),
                )
                .arg(layout_arg())
                .arg(scenario_arg().required(true))
                .arg(period_arg().required(true))
                .arg(
                    Arg::with_name("variables")
                        .long("variables")
                        .short("v")
                        .takes_value(true)
                        .multiple(true)
                        .possible_values(&["TEMP", "RH", "DPT", "WIND", "PREC", "SOLRAD"])
                        .help("Only morph these variables.")
                        .long_help(concat!(
                            "Only morph these variables. Defaults to every variable the layout",
                            " supports. Dew point needs TEMP and RH in the same run."
                        )),
                )
                .arg(
                    Arg::with_name("config")
                        .long("config")
                        .short("c")
                        .takes_value(true)
                        .help("A YAML configuration file."),
                )
                .arg(
                    Arg::with_name("output")
                        .long("output")
                        .short("o")
                        .takes_value(true)
                        .help("Directory to write results in. Defaults to ROOT/output."),
                )
                .arg(
                    Arg::with_name("city")
                        .long("city")
                        .takes_value(true)
                        .help("City name used for validation ranges and the output directory.")
                        .long_help(concat!(
                            "City name used to look up validation ranges and to name the output",
                            " directory. Defaults to the city in the weather file header."
                        )),
                )
                .arg(
                    Arg::with_name("monthly")
                        .long("monthly")
                        .help("Print a table of monthly means for each morphed variable."),
                ),
        )
        .subcommand(
            SubCommand::with_name("export")
                .about("Export a weather file as CSV with named columns.")
                .arg(
                    Arg::with_name("epw")
                        .long("epw")
                        .required(true)
                        .takes_value(true)
                        .help("The weather file to export."),
                )
                .arg(
                    Arg::with_name("out")
                        .long("out")
                        .takes_value(true)
                        .help("Target CSV file. Writes to stdout if not given."),
                ),
        )
}

fn run() -> Result<(), Box<dyn Error>> {
    let matches = app().get_matches();

    let root = &matches
        .value_of("root")
        .map(PathBuf::from)
        .or_else(|| home_dir().map(|hd| hd.join("epwmorph")))
        .ok_or("unable to determine the data root, use -r to set it")?;

    match matches.subcommand() {
        ("files", Some(sub_args)) => files::files(root, sub_args)?,
        ("morph", Some(sub_args)) => morph::morph(root, sub_args)?,
        ("export", Some(sub_args)) => export::export(root, sub_args)?,
        _ => {
            println!("{}", matches.usage());
        }
    }

    Ok(())
}
