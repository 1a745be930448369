use crate::files::locator;
use clap::ArgMatches;
use epwmorph::{
    bail, manifest_table, monthly_table, verify, MorphConfig, MorphingPipeline, OutputPlan,
    Variable, WeatherRecord,
};
use log::{info, warn};
use std::{
    error::Error,
    path::{Path, PathBuf},
    str::FromStr,
};

pub fn morph(root: &PathBuf, sub_args: &ArgMatches) -> Result<(), Box<dyn Error>> {
    // unwrap is ok, these are required.
    let epw = Path::new(sub_args.value_of("epw").unwrap());
    let scenario = sub_args.value_of("scenario").unwrap();
    let period = sub_args.value_of("period").unwrap();

    if !epw.is_file() {
        bail(&format!("Weather file {} does not exist.", epw.display()));
    }

    let config = match sub_args.value_of("config") {
        Some(path) => MorphConfig::load(path)?,
        None => MorphConfig::default(),
    };

    let locator = locator(root, sub_args)?;
    let layout = locator.layout();

    let scenarios = locator.scenarios()?;
    if !scenarios.iter().any(|s| s == scenario) {
        bail(&format!(
            "Scenario {} not found, available: {}",
            scenario,
            scenarios.join(", ")
        ));
    }
    let periods = locator.periods(scenario)?;
    if !periods.iter().any(|p| p == period) {
        bail(&format!(
            "Period {} not found for {}, available: {}",
            period,
            scenario,
            periods.join(", ")
        ));
    }

    let pipeline = match sub_args.values_of("variables") {
        Some(vals) => {
            let variables = vals
                .map(|v| match Variable::from_str(v) {
                    Ok(var) => var,
                    Err(_) => bail(&format!("Unknown variable: {}", v)),
                })
                .collect::<Vec<_>>();
            MorphingPipeline::for_variables(layout, &config, &variables)?
        }
        None => MorphingPipeline::standard(layout, &config)?,
    };

    let record = WeatherRecord::open(epw)?;
    let files = locator.locate(scenario, period)?;

    let city = sub_args
        .value_of("city")
        .map(str::to_owned)
        .unwrap_or_else(|| record.location().city.clone());

    info!(
        "morphing {} for {} with {} {} {}",
        epw.display(),
        city,
        layout,
        scenario,
        period
    );

    let outcome = pipeline.run(&record, &files, &config, Some(&city));
    print!("{}", manifest_table(&outcome.manifest).render()?);

    if sub_args.is_present("monthly") {
        for (variable, morphed) in outcome.results.iter() {
            let baseline = record.column(variable.column())?;
            let title = format!("{} ({})", variable.description(), variable.units());
            print!("{}", monthly_table(&title, &baseline, morphed).render()?);
        }
    }

    if !outcome.manifest.is_success() {
        bail("No variables were morphed, nothing written.");
    }

    let out_root = sub_args
        .value_of("output")
        .map(PathBuf::from)
        .unwrap_or_else(|| root.join("output"));

    let plan = OutputPlan::new(&out_root, &city, scenario, period, &record);
    plan.write(&record, &outcome.columns)?;

    let checks = verify(&record, plan.morphed_path(), &outcome.columns)?;
    if checks.iter().any(|c| !c.written_faithfully()) {
        warn!("some columns did not read back as written");
    }

    println!("Morphed file: {}", plan.morphed_path().display());
    println!("Baseline copy: {}", plan.baseline_path().display());

    Ok(())
}
