//! Discover the climate source files for a scenario and period.
//!
//! Two directory layouts are understood:
//!
//! * difference tables, a flat directory of `MODEL_SCENARIO_VAR_PERIOD.dif` (or `.mea`) files,
//! * rasters, `historic/<prefix>_<var>/<prefix>_<var>_MM.tif` monthly grids plus
//!   `future/<scenario>/<period>/*_<var>_*.tif` single grids.
use crate::error::LocateError;
use log::debug;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::iter::FromIterator;
use std::path::{Path, PathBuf};
use strum_macros::{AsStaticStr, EnumIter, EnumString};

/// Variable codes used in raster file names.
const RASTER_CODES: &[&str] = &["tmin", "tmax", "tavg", "prec", "srad", "wind"];

/// The on-disk organisation of a climate source.
#[derive(Clone, Copy, PartialEq, Eq, Debug, EnumString, AsStaticStr, EnumIter, Hash)]
pub enum SourceLayout {
    #[strum(serialize = "dif")]
    DifferenceTables,
    #[strum(serialize = "raster")]
    Rasters,
}

impl fmt::Display for SourceLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceLayout::DifferenceTables => write!(f, "difference tables"),
            SourceLayout::Rasters => write!(f, "rasters"),
        }
    }
}

/// Source files for one scenario and period, keyed by climate file key.
///
/// Difference table keys are the variable code from the file name (`TEMP`, `RHUM`, ...). Raster
/// keys carry a suffix: `TMAX_historic` holds twelve monthly files, `TMAX_future` one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClimateFileSet(BTreeMap<String, Vec<PathBuf>>);

impl ClimateFileSet {
    pub fn get(&self, key: &str) -> Option<&[PathBuf]> {
        self.0.get(key).map(Vec::as_slice)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Of `keys`, the ones with no files.
    pub fn missing<'a>(&self, keys: &'a [String]) -> Vec<&'a str> {
        keys.iter()
            .filter(|k| !self.contains(k))
            .map(String::as_str)
            .collect()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[PathBuf])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, Vec<PathBuf>)> for ClimateFileSet {
    fn from_iter<I: IntoIterator<Item = (String, Vec<PathBuf>)>>(iter: I) -> Self {
        let mut map: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
        for (key, files) in iter {
            map.entry(key).or_default().extend(files);
        }
        for files in map.values_mut() {
            files.sort();
        }
        ClimateFileSet(map)
    }
}

/// Indexes a climate data directory.
#[derive(Debug, Clone)]
pub struct ClimateFileLocator {
    root: PathBuf,
    layout: SourceLayout,
}

impl ClimateFileLocator {
    pub fn new<P: AsRef<Path>>(root: P, layout: SourceLayout) -> Result<Self, LocateError> {
        let root = root.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(LocateError::MissingRoot(root));
        }

        Ok(ClimateFileLocator { root, layout })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn layout(&self) -> SourceLayout {
        self.layout
    }

    /// Build the file set for a scenario and period.
    pub fn locate(&self, scenario: &str, period: &str) -> Result<ClimateFileSet, LocateError> {
        let entries = match self.layout {
            SourceLayout::DifferenceTables => self.locate_tables(scenario, period)?,
            SourceLayout::Rasters => {
                let mut entries = self.locate_historic()?;
                entries.extend(self.locate_future(scenario, period)?);
                entries
            }
        };

        let set: ClimateFileSet = entries.into_iter().collect();
        for (key, files) in set.iter() {
            debug!("{}: {} file(s)", key, files.len());
        }

        Ok(set)
    }

    /// Scenario identifiers present under the root.
    pub fn scenarios(&self) -> Result<Vec<String>, LocateError> {
        match self.layout {
            SourceLayout::DifferenceTables => Ok(self
                .table_names()?
                .into_iter()
                .map(|name| name.scenario)
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect()),
            SourceLayout::Rasters => subdirectories(&self.root.join("future")),
        }
    }

    /// Period identifiers present under the root for a scenario.
    pub fn periods(&self, scenario: &str) -> Result<Vec<String>, LocateError> {
        match self.layout {
            SourceLayout::DifferenceTables => Ok(self
                .table_names()?
                .into_iter()
                .filter(|name| name.scenario == scenario)
                .map(|name| name.period)
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect()),
            SourceLayout::Rasters => subdirectories(&self.root.join("future").join(scenario)),
        }
    }

    fn table_names(&self) -> Result<Vec<TableName>, LocateError> {
        Ok(list_files(&self.root)?
            .into_iter()
            .filter_map(|path| TableName::parse(&path))
            .collect())
    }

    fn locate_tables(
        &self,
        scenario: &str,
        period: &str,
    ) -> Result<Vec<(String, Vec<PathBuf>)>, LocateError> {
        Ok(list_files(&self.root)?
            .into_iter()
            .filter_map(|path| {
                let name = TableName::parse(&path)?;
                if name.scenario == scenario && name.period == period {
                    Some((name.variable, vec![path]))
                } else {
                    None
                }
            })
            .collect())
    }

    fn locate_historic(&self) -> Result<Vec<(String, Vec<PathBuf>)>, LocateError> {
        let historic = self.root.join("historic");
        if !historic.is_dir() {
            debug!("no historic directory under {}", self.root.display());
            return Ok(vec![]);
        }

        let mut entries = vec![];
        for dir_name in subdirectories(&historic)? {
            let code = match raster_code(dir_name.rsplit('_').next().unwrap_or("")) {
                Some(code) => code,
                None => continue,
            };

            let files: Vec<PathBuf> = list_files(&historic.join(&dir_name))?
                .into_iter()
                .filter(|p| is_tif(p))
                .collect();

            if !files.is_empty() {
                entries.push((format!("{}_historic", code.to_uppercase()), files));
            }
        }

        Ok(entries)
    }

    fn locate_future(
        &self,
        scenario: &str,
        period: &str,
    ) -> Result<Vec<(String, Vec<PathBuf>)>, LocateError> {
        let dir = self.root.join("future").join(scenario).join(period);
        if !dir.is_dir() {
            debug!("no future rasters at {}", dir.display());
            return Ok(vec![]);
        }

        Ok(list_files(&dir)?
            .into_iter()
            .filter(|p| is_tif(p))
            .filter_map(|path| {
                let stem = path.file_stem()?.to_str()?.to_owned();
                let code = stem.split('_').find_map(raster_code)?;
                Some((format!("{}_future", code.to_uppercase()), vec![path]))
            })
            .collect())
    }
}

/// The parts of a `MODEL_SCENARIO_VAR_PERIOD` table file name.
#[derive(Debug, Clone, PartialEq, Eq)]
struct TableName {
    scenario: String,
    variable: String,
    period: String,
}

impl TableName {
    fn parse(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("dif") | Some("mea") => {}
            _ => return None,
        }

        let stem = path.file_stem()?.to_str()?;
        let parts: Vec<&str> = stem.split('_').collect();
        if parts.len() != 4 {
            return None;
        }

        Some(TableName {
            scenario: parts[1].to_owned(),
            variable: parts[2].to_owned(),
            period: parts[3].to_owned(),
        })
    }
}

fn raster_code(token: &str) -> Option<&'static str> {
    RASTER_CODES
        .iter()
        .find(|code| code.eq_ignore_ascii_case(token))
        .cloned()
}

fn is_tif(path: &Path) -> bool {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => ext.eq_ignore_ascii_case("tif") || ext.eq_ignore_ascii_case("tiff"),
        None => false,
    }
}

fn read_dir_entries(dir: &Path) -> Result<Vec<PathBuf>, LocateError> {
    let to_err = |source| LocateError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut paths = vec![];
    for entry in fs::read_dir(dir).map_err(to_err)? {
        paths.push(entry.map_err(to_err)?.path());
    }
    paths.sort();

    Ok(paths)
}

fn list_files(dir: &Path) -> Result<Vec<PathBuf>, LocateError> {
    Ok(read_dir_entries(dir)?
        .into_iter()
        .filter(|p| p.is_file())
        .collect())
}

fn subdirectories(dir: &Path) -> Result<Vec<String>, LocateError> {
    if !dir.is_dir() {
        return Ok(vec![]);
    }

    Ok(read_dir_entries(dir)?
        .into_iter()
        .filter(|p| p.is_dir())
        .filter_map(|p| p.file_name().and_then(|n| n.to_str()).map(str::to_owned))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{create_dir_all, File};
    use std::str::FromStr;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        create_dir_all(path.parent().unwrap()).unwrap();
        File::create(path).unwrap();
    }

    fn table_root() -> TempDir {
        let dir = TempDir::new().unwrap();
        for name in &[
            "HADCM3_A2a_TEMP_2020.dif",
            "HADCM3_A2a_TMAX_2020.dif",
            "HADCM3_A2a_TMIN_2020.dif",
            "HADCM3_A2a_PREC_2050.mea",
            "HADCM3_A2b_TEMP_2080.dif",
            "HADCM3_A2a_TEMP_2020.txt",
            "README_notes.dif",
        ] {
            touch(&dir.path().join(name));
        }
        dir
    }

    #[test]
    fn layout_names() {
        assert_eq!(
            SourceLayout::from_str("dif").unwrap(),
            SourceLayout::DifferenceTables
        );
        assert_eq!(SourceLayout::from_str("raster").unwrap(), SourceLayout::Rasters);
        assert!(SourceLayout::from_str("grib").is_err());
    }

    #[test]
    fn missing_root() {
        let dir = TempDir::new().unwrap();
        let result = ClimateFileLocator::new(dir.path().join("nope"), SourceLayout::Rasters);
        assert!(matches!(result, Err(LocateError::MissingRoot(_))));
    }

    #[test]
    fn locate_tables() {
        let dir = table_root();
        let locator = ClimateFileLocator::new(dir.path(), SourceLayout::DifferenceTables).unwrap();

        let set = locator.locate("A2a", "2020").unwrap();
        assert_eq!(set.keys().collect::<Vec<_>>(), vec!["TEMP", "TMAX", "TMIN"]);
        assert_eq!(set.get("TEMP").unwrap().len(), 1);
        assert!(set.get("TEMP").unwrap()[0].ends_with("HADCM3_A2a_TEMP_2020.dif"));

        let set = locator.locate("A2a", "2050").unwrap();
        assert!(set.contains("PREC"));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn discover_table_scenarios() {
        let dir = table_root();
        let locator = ClimateFileLocator::new(dir.path(), SourceLayout::DifferenceTables).unwrap();

        assert_eq!(locator.scenarios().unwrap(), vec!["A2a", "A2b"]);
        assert_eq!(locator.periods("A2a").unwrap(), vec!["2020", "2050"]);
        assert!(locator.periods("B1").unwrap().is_empty());
    }

    #[test]
    fn locate_rasters() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        for m in 1..=12 {
            touch(&root.join(format!(
                "historic/wc2.1_2.5m_srad/wc2.1_2.5m_srad_{:02}.tif",
                m
            )));
            touch(&root.join(format!(
                "historic/wc2.1_2.5m_tmax/wc2.1_2.5m_tmax_{:02}.tif",
                m
            )));
        }
        touch(&root.join("historic/wc2.1_2.5m_srad/readme.txt"));
        touch(&root.join("future/ssp245/2041-2060/wc2.1_2.5m_tmax_ACCESS-CM2_ssp245_2041-2060.tif"));
        touch(&root.join("future/ssp245/2041-2060/wc2.1_2.5m_tmin_ACCESS-CM2_ssp245_2041-2060.tif"));
        touch(&root.join("future/ssp585/2081-2100/wc2.1_2.5m_tmax_ACCESS-CM2_ssp585_2081-2100.tif"));

        let locator = ClimateFileLocator::new(root, SourceLayout::Rasters).unwrap();
        let set = locator.locate("ssp245", "2041-2060").unwrap();

        assert_eq!(set.get("SRAD_historic").unwrap().len(), 12);
        assert_eq!(set.get("TMAX_historic").unwrap().len(), 12);
        assert_eq!(set.get("TMAX_future").unwrap().len(), 1);
        assert_eq!(set.get("TMIN_future").unwrap().len(), 1);
        assert!(!set.contains("TMIN_historic"));

        let files = set.get("SRAD_historic").unwrap();
        assert!(files[0].ends_with("wc2.1_2.5m_srad_01.tif"));
        assert!(files[11].ends_with("wc2.1_2.5m_srad_12.tif"));

        assert_eq!(locator.scenarios().unwrap(), vec!["ssp245", "ssp585"]);
        assert_eq!(locator.periods("ssp585").unwrap(), vec!["2081-2100"]);
    }

    #[test]
    fn missing_keys() {
        let set: ClimateFileSet = vec![("TEMP".to_owned(), vec![PathBuf::from("a.dif")])]
            .into_iter()
            .collect();
        let wanted = vec!["TEMP".to_owned(), "TMAX".to_owned()];
        assert_eq!(set.missing(&wanted), vec!["TMAX"]);
    }
}
