use approx::assert_abs_diff_eq;
use epwmorph::calendar::{expected_stamp, month_range, HOURS_PER_YEAR};
use epwmorph::units::knots_to_ms;
use epwmorph::{
    verify, ClimateFileLocator, MorphConfig, MorphingPipeline, OutputPlan, SourceLayout, Variable,
    VariableStatus, WeatherRecord,
};
use std::fs::{self, File};
use std::path::Path;
use tempfile::TempDir;
use tiff::encoder::{colortype, TiffEncoder};
use tiff::tags::Tag;

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

fn dry_bulb(hour: usize) -> f64 {
    5.0 + (hour % 24) as f64 * 0.5
}

/// Zero at night with a noon peak of 540.
fn global_horizontal(hour: usize) -> f64 {
    let h = (hour % 24) as f64;
    if (6.0..=18.0).contains(&h) {
        (h - 6.0) * (18.0 - h) * 15.0
    } else {
        0.0
    }
}

fn write_record(path: &Path) {
    let mut text = String::from("LOCATION,Oslo,OS,NOR,SRC-TMYx,014920,59.9427,10.7207,1.0,94.0\n");
    for i in 1..8 {
        text.push_str(&format!("HEADER {}\n", i));
    }

    for hour in 0..HOURS_PER_YEAR {
        let (month, day, hr) = expected_stamp(hour);
        let t = dry_bulb(hour);
        let mut fields: Vec<String> = vec![
            "2001".into(),
            month.to_string(),
            day.to_string(),
            hr.to_string(),
            "60".into(),
            "?9?9?9?9E0?9?9?9".into(),
            format!("{:.1}", t),
            format!("{:.1}", t - 5.0),
            "60".into(),
            "101000".into(),
        ];
        fields.extend((10..13).map(|_| "0".to_owned()));
        fields.push(format!("{:.0}", global_horizontal(hour)));
        fields.extend((14..21).map(|_| "0".to_owned()));
        fields.push("4.0".into()); // wind speed
        fields.extend((22..28).map(|_| "0".to_owned()));
        fields.push("15.0".into()); // precipitable water
        fields.extend((29..35).map(|_| "0".to_owned()));
        assert_eq!(fields.len(), 35);

        text.push_str(&fields.join(","));
        text.push('\n');
    }

    fs::write(path, text).unwrap();
}

fn write_table(dir: &Path, var: &str, value: f64) {
    let mut text = format!(
        "IPCC Data Distribution Centre\nHADCM3 A2 {}\nFormat is 10F8.2, missing code is 9999\n",
        var
    );
    for month in MONTHS.iter() {
        text.push_str(&format!("Month is {}\n", month));
        text.push_str(&format!(" 9999.00{:8.2}{:8.2}\n", value, value));
    }
    fs::write(dir.join(format!("HADCM3_A2_{}_2050.dif", var)), text).unwrap();
}

fn setup() -> (TempDir, WeatherRecord, ClimateFileLocator) {
    let tmp = tempfile::tempdir().unwrap();

    let epw = tmp.path().join("NOR_OS_Oslo.Blindern.014920_TMYx.epw");
    write_record(&epw);
    let record = WeatherRecord::open(&epw).unwrap();

    let dif = tmp.path().join("dif");
    fs::create_dir_all(&dif).unwrap();
    write_table(&dif, "TEMP", 2.0);
    write_table(&dif, "TMAX", 1.0);
    write_table(&dif, "TMIN", 1.0);
    write_table(&dif, "RHUM", -5.0);
    write_table(&dif, "WIND", 0.5);
    write_table(&dif, "PREC", 1.0);
    // A second period that must not be picked up.
    fs::write(dif.join("HADCM3_A2_TEMP_2080.dif"), "junk").unwrap();

    let locator = ClimateFileLocator::new(&dif, SourceLayout::DifferenceTables).unwrap();
    (tmp, record, locator)
}

/// A 4x4 one degree grid over 58N-62N, 8E-12E holding `value` everywhere.
fn write_grid(path: &Path, value: f32) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let mut tiff = TiffEncoder::new(File::create(path).unwrap()).unwrap();
    let mut image = tiff.new_image::<colortype::Gray32Float>(4, 4).unwrap();
    image
        .encoder()
        .write_tag(Tag::ModelPixelScaleTag, &[1.0f64, 1.0, 0.0][..])
        .unwrap();
    image
        .encoder()
        .write_tag(Tag::ModelTiepointTag, &[0.0f64, 0.0, 0.0, 8.0, 62.0, 0.0][..])
        .unwrap();
    image.encoder().write_tag(Tag::GdalNodata, "-3.4e38").unwrap();
    image.write_data(&[value; 16]).unwrap();
}

fn setup_rasters() -> (TempDir, WeatherRecord, ClimateFileLocator) {
    let tmp = tempfile::tempdir().unwrap();

    let epw = tmp.path().join("NOR_OS_Oslo.Blindern.014920_TMYx.epw");
    write_record(&epw);
    let record = WeatherRecord::open(&epw).unwrap();

    let root = tmp.path().join("raster");
    for &(code, value) in &[
        ("tmax", 10.0),
        ("tmin", 0.0),
        ("srad", 150.0),
        ("wind", 4.0),
        ("prec", 10.0),
    ] {
        for month in 1..=12 {
            write_grid(
                &root.join(format!(
                    "historic/wc2.1_2.5m_{}/wc2.1_2.5m_{}_{:02}.tif",
                    code, code, month
                )),
                value,
            );
        }
    }

    // Future temperatures are stored in tenths of a degree.
    for &(code, value) in &[("tmax", 130.0), ("tmin", 20.0), ("wind", 5.0), ("prec", 12.0)] {
        write_grid(
            &root.join(format!(
                "future/ssp245/2041-2060/wc2.1_2.5m_{}_ACCESS-CM2_ssp245_2041-2060.tif",
                code
            )),
            value,
        );
    }

    let locator = ClimateFileLocator::new(&root, SourceLayout::Rasters).unwrap();
    (tmp, record, locator)
}

#[test]
fn discover_scenarios_and_periods() {
    let (_tmp, _record, locator) = setup();
    assert_eq!(locator.scenarios().unwrap(), vec!["A2"]);
    assert_eq!(locator.periods("A2").unwrap(), vec!["2050", "2080"]);

    let files = locator.locate("A2", "2050").unwrap();
    assert_eq!(files.len(), 6);
    assert!(files.contains("RHUM"));
}

#[test]
fn morph_write_and_verify() {
    let (tmp, record, locator) = setup();
    let files = locator.locate("A2", "2050").unwrap();
    let config = MorphConfig::default();

    let pipeline = MorphingPipeline::standard(SourceLayout::DifferenceTables, &config).unwrap();
    let outcome = pipeline.run(&record, &files, &config, None);

    assert!(outcome.manifest.is_success());
    for var in &[
        Variable::DryBulb,
        Variable::RelativeHumidity,
        Variable::DewPoint,
        Variable::WindSpeed,
        Variable::PrecipitableWater,
    ] {
        assert!(
            outcome.manifest.status(*var).map(|s| s.is_merged()).unwrap_or(false),
            "{} not merged: {:?}",
            var,
            outcome.manifest.status(*var)
        );
    }

    // Equal max and min changes leave the diurnal range alone, so only the shift remains.
    let temp = outcome.results.get(Variable::DryBulb).unwrap();
    for hour in month_range(0).chain(month_range(11)) {
        assert_abs_diff_eq!(temp[hour], dry_bulb(hour) + 2.0, epsilon = 1e-9);
    }

    let rh = outcome.results.get(Variable::RelativeHumidity).unwrap();
    assert!(rh.iter().all(|&v| (v - 55.0).abs() < 1e-9));

    let dpt = outcome.results.get(Variable::DewPoint).unwrap();
    assert!(dpt.iter().zip(temp.iter()).all(|(d, t)| d <= t));

    let wind = outcome.results.get(Variable::WindSpeed).unwrap();
    assert_abs_diff_eq!(wind[0], knots_to_ms(4.0) + 0.5, epsilon = 1e-9);

    let prec = outcome.results.get(Variable::PrecipitableWater).unwrap();
    assert_abs_diff_eq!(prec[4000], 16.0, epsilon = 1e-9);

    let plan = OutputPlan::new(&tmp.path().join("output"), "Oslo", "A2", "2050", &record);
    plan.write(&record, &outcome.columns).unwrap();
    assert!(plan
        .morphed_path()
        .ends_with("Oslo/A2_2050/NOR_OS_Oslo.Blindern.014920_TMYx_morphed_A2_2050.epw"));

    let checks = verify(&record, plan.morphed_path(), &outcome.columns).unwrap();
    assert_eq!(checks.len(), 5);
    assert!(checks.iter().all(|c| c.written_faithfully()));

    let temp_check = checks.iter().find(|c| c.column == 6).unwrap();
    assert_abs_diff_eq!(
        temp_check.morphed_mean - temp_check.baseline_mean,
        2.0,
        epsilon = 1e-6
    );

    // Header and untouched columns survive byte for byte.
    let written = fs::read_to_string(plan.morphed_path()).unwrap();
    let original = fs::read_to_string(record.path().unwrap()).unwrap();
    assert_eq!(
        written.lines().take(8).collect::<Vec<_>>(),
        original.lines().take(8).collect::<Vec<_>>()
    );
    let first_row: Vec<&str> = written.lines().nth(8).unwrap().split(',').collect();
    assert_eq!(first_row[9], "101000");
    assert_eq!(first_row[6], "7.0");
}

#[test]
fn missing_tables_skip_only_their_variables() {
    let (tmp, record, _) = setup();
    fs::remove_file(tmp.path().join("dif").join("HADCM3_A2_RHUM_2050.dif")).unwrap();

    let locator =
        ClimateFileLocator::new(tmp.path().join("dif"), SourceLayout::DifferenceTables).unwrap();
    let files = locator.locate("A2", "2050").unwrap();
    let config = MorphConfig::default();
    let outcome = MorphingPipeline::standard(SourceLayout::DifferenceTables, &config)
        .unwrap()
        .run(&record, &files, &config, None);

    assert!(outcome.manifest.is_success());
    assert!(matches!(
        outcome.manifest.status(Variable::RelativeHumidity),
        Some(VariableStatus::Skipped { .. })
    ));
    // Dew point needs the humidity result.
    assert!(matches!(
        outcome.manifest.status(Variable::DewPoint),
        Some(VariableStatus::Skipped { .. })
    ));
    assert!(outcome.columns.get(7).is_none());
    assert!(outcome.columns.get(6).is_some());
}

#[test]
fn sample_config_loads() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/morph.yaml");
    let config = MorphConfig::load(path).unwrap();

    let oslo = config
        .validation
        .range_for(Variable::DryBulb, Some("oslo"))
        .unwrap();
    assert_abs_diff_eq!(oslo.min, -35.0);

    let default = config
        .validation
        .range_for(Variable::RelativeHumidity, Some("Oslo"))
        .unwrap();
    assert_abs_diff_eq!(default.max, 100.0);
    assert_abs_diff_eq!(config.scale_for("TMAX_future"), 0.1);
}

#[test]
fn raster_morph_write_and_verify() {
    let (tmp, record, locator) = setup_rasters();
    assert_eq!(locator.scenarios().unwrap(), vec!["ssp245"]);

    let files = locator.locate("ssp245", "2041-2060").unwrap();
    assert_eq!(files.get("TMAX_historic").unwrap().len(), 12);
    assert!(!files.contains("SRAD_future"));

    let config = MorphConfig::default();
    let pipeline = MorphingPipeline::standard(SourceLayout::Rasters, &config).unwrap();
    let outcome = pipeline.run(&record, &files, &config, None);

    for var in &[
        Variable::DryBulb,
        Variable::RelativeHumidity,
        Variable::DewPoint,
        Variable::WindSpeed,
        Variable::PrecipitableWater,
        Variable::SolarRadiation,
    ] {
        assert!(
            outcome.manifest.status(*var).map(|s| s.is_merged()).unwrap_or(false),
            "{} not merged: {:?}",
            var,
            outcome.manifest.status(*var)
        );
    }

    // Minimum rises by 2 and maximum by 3, so each month lands in [7, 19.5].
    let temp = outcome.results.get(Variable::DryBulb).unwrap();
    for stat in temp.monthly_stats().iter() {
        assert!(stat.min >= 7.0 - 1e-6, "{:?}", stat);
        assert!(stat.max <= 19.5 + 1e-6, "{:?}", stat);
    }
    let base_temp = record.column(Variable::DryBulb.column()).unwrap();
    let rise = temp.mean() - base_temp.mean();
    assert!(rise > 1.5 && rise < 3.5, "rise {}", rise);

    // Same vapour pressure against a warmer dry bulb.
    let rh = outcome.results.get(Variable::RelativeHumidity).unwrap();
    assert!(rh.mean() < 60.0);
    assert!(rh.iter().all(|&v| v >= 0.0 && v <= 100.0));

    let dpt = outcome.results.get(Variable::DewPoint).unwrap();
    assert!(dpt.iter().zip(temp.iter()).all(|(d, t)| d <= t));

    let wind = outcome.results.get(Variable::WindSpeed).unwrap();
    assert_abs_diff_eq!(wind[5000], knots_to_ms(5.0), epsilon = 1e-9);

    let prec = outcome.results.get(Variable::PrecipitableWater).unwrap();
    assert_abs_diff_eq!(prec[100], 18.0, epsilon = 1e-9);

    let solar = outcome.results.get(Variable::SolarRadiation).unwrap();
    let base_solar = record.column(Variable::SolarRadiation.column()).unwrap();
    assert!(solar.mean() < base_solar.mean());
    assert!(solar.iter().all(|&v| v >= 0.0 && v <= 540.0 + 1e-9));

    let plan = OutputPlan::new(&tmp.path().join("output"), "Oslo", "ssp245", "2041-2060", &record);
    plan.write(&record, &outcome.columns).unwrap();
    let checks = verify(&record, plan.morphed_path(), &outcome.columns).unwrap();
    assert_eq!(checks.len(), 6);
    assert!(checks.iter().all(|c| c.written_faithfully()));
}
