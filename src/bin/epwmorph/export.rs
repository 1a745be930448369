use clap::ArgMatches;
use epwmorph::{bail, WeatherRecord};
use std::{
    error::Error,
    fs::File,
    io::{self, BufWriter},
    path::{Path, PathBuf},
};

pub fn export(_root: &PathBuf, sub_args: &ArgMatches) -> Result<(), Box<dyn Error>> {
    // unwrap is ok, it is required.
    let epw = Path::new(sub_args.value_of("epw").unwrap());
    if !epw.is_file() {
        bail(&format!("Weather file {} does not exist.", epw.display()));
    }

    let record = WeatherRecord::open(epw)?;

    match sub_args.value_of("out") {
        Some(target) => {
            let f = File::create(target)?;
            record.export_csv(BufWriter::new(f))?;
            log::info!("exported {} rows to {}", record.num_rows(), target);
        }
        None => {
            let stdout = io::stdout();
            record.export_csv(stdout.lock())?;
        }
    }

    Ok(())
}
