use clap::ArgMatches;
use epwmorph::{bail, ClimateFileLocator, ReportTable, SourceLayout};
use std::{error::Error, path::PathBuf, str::FromStr};
use strum::AsStaticRef;

pub fn files(root: &PathBuf, sub_args: &ArgMatches) -> Result<(), Box<dyn Error>> {
    let locator = locator(root, sub_args)?;

    match (sub_args.value_of("scenario"), sub_args.value_of("period")) {
        (Some(scenario), Some(period)) => list_files(&locator, scenario, period),
        (Some(scenario), None) => list_periods(&locator, &[scenario.to_owned()]),
        _ => list_periods(&locator, &locator.scenarios()?),
    }
}

/// Build a locator from the `layout` argument.
pub fn locator(root: &PathBuf, sub_args: &ArgMatches) -> Result<ClimateFileLocator, Box<dyn Error>> {
    // unwrap is ok, it has a default value.
    let layout = sub_args.value_of("layout").unwrap();
    let layout = match SourceLayout::from_str(layout) {
        Ok(layout) => layout,
        Err(_) => bail(&format!("Unknown layout: {}", layout)),
    };

    Ok(ClimateFileLocator::new(root.join(layout.as_static()), layout)?)
}

fn list_periods(locator: &ClimateFileLocator, scenarios: &[String]) -> Result<(), Box<dyn Error>> {
    if scenarios.is_empty() {
        println!("No scenarios found in {}", locator.root().display());
        return Ok(());
    }

    let mut table = ReportTable::new()
        .with_title(format!("{} data in {}", locator.layout(), locator.root().display()))
        .with_columns(&["Scenario", "Periods"]);

    for scenario in scenarios {
        let periods = locator.periods(scenario)?;
        let periods = if periods.is_empty() {
            "none".to_owned()
        } else {
            periods.join(", ")
        };
        table.add_row(vec![scenario.clone(), periods]);
    }

    print!("{}", table.render()?);
    Ok(())
}

fn list_files(
    locator: &ClimateFileLocator,
    scenario: &str,
    period: &str,
) -> Result<(), Box<dyn Error>> {
    let set = locator.locate(scenario, period)?;
    if set.is_empty() {
        bail(&format!(
            "No {} files for scenario {} and period {} in {}",
            locator.layout(),
            scenario,
            period,
            locator.root().display()
        ));
    }

    let mut table = ReportTable::new()
        .with_title(format!("{} {}", scenario, period))
        .with_columns(&["Key", "Files", "First"]);

    for (key, files) in set.iter() {
        let first = files
            .first()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        table.add_row(vec![key.to_owned(), files.len().to_string(), first]);
    }

    print!(
        "{}",
        table
            .with_footer(format!("{} keys", set.len()))
            .render()?
    );
    Ok(())
}
