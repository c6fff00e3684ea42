use geojson::GeoJson;
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::Deserialize;
use std::{
    collections::{HashMap, HashSet},
    fs,
    io::Read,
    path::Path,
    str::FromStr,
};
use tracing::{debug, info, warn};

use crate::codes::{ACTIVITY_LABELS, ISSUE_LABELS, POINT_COLORS, substitute_codes};
use crate::error::LoadError;

/// Column width of the wrapped hover summary.
pub const HOVER_WRAP: usize = 50;

/// Baseline area weights are drawn from `1..500`, studied areas from `750..1000`.
const BASELINE_WEIGHT: std::ops::Range<u32> = 1..500;
const STUDIED_WEIGHT: std::ops::Range<u32> = 750..1000;

/// One row of the area table.
#[derive(Clone, Debug, Deserialize)]
struct AreaRow {
    nuts318cd: String,
    #[serde(default)]
    nuts318nm: Option<String>,
}

/// One row of the case-study table, as written on disk.
#[derive(Clone, Debug, Deserialize)]
struct CaseRow {
    lat_approx: String,
    long_approx: String,
    issue: String,
    #[serde(default)]
    action: Option<String>,
    #[serde(default)]
    case_title: String,
    #[serde(default)]
    summary: String,
    nuts318cd: String,
    #[serde(default)]
    area: String,
    #[serde(default)]
    year: String,
    #[serde(default)]
    link: Option<String>,
    #[serde(default)]
    rel_tool_name: String,
    #[serde(default)]
    rel_tool_link: String,
    #[serde(default)]
    contact_name: String,
    #[serde(default)]
    contact_title: String,
    #[serde(default)]
    contactors: String,
    #[serde(default)]
    contact_email: String,
}

/// A geographic area and its background-layer weight.
#[derive(Clone, Debug, PartialEq)]
pub struct AreaRecord {
    pub code: String,
    pub name: Option<String>,
    pub weight: u32,
}

/// A case study with its display fields derived.
#[derive(Clone, Debug, PartialEq)]
pub struct CaseStudy {
    pub lat: f64,
    pub lon: f64,
    pub issue: String,
    /// Delimited activity codes, e.g. `"1,5"`.
    pub action: Option<String>,
    pub case_title: String,
    pub summary: String,
    pub area_code: String,
    pub area: String,
    pub year: String,
    pub link: Option<String>,
    pub rel_tool_name: String,
    pub rel_tool_link: String,
    pub contact_name: String,
    pub contact_title: String,
    pub contact_org: String,
    pub contact_email: String,
    pub point_color: String,
    pub hover_issue: String,
    pub hover_action: String,
    pub hover_summary: String,
    /// Region name attached by the join with the area table.
    pub region: Option<String>,
}

/// Row of the background layer: one per area identifier.
#[derive(Clone, Debug, PartialEq)]
pub struct AreaWeight {
    pub code: String,
    pub name: Option<String>,
    pub weight: u32,
    /// Index into [`CaseBook::cases`] of the first case study in this area.
    pub first_case: Option<usize>,
}

impl AreaWeight {
    pub fn is_studied(&self) -> bool {
        self.first_case.is_some()
    }
}

/// The cleaned, joined dataset. Immutable once loaded.
#[derive(Clone, Debug)]
pub struct CaseBook {
    pub cases: Vec<CaseStudy>,
    pub areas: Vec<AreaWeight>,
    pub jittered: usize,
}

impl CaseBook {
    /// Loads and cleans both tables. Any failure is fatal for the caller.
    pub fn load<R: Rng>(
        areas_path: &Path,
        cases_path: &Path,
        jitter: &Normal<f64>,
        rng: &mut R,
    ) -> Result<Self, LoadError> {
        let areas = read_areas(open_table(areas_path)?.as_bytes(), rng)?;
        let cases = read_cases(open_table(cases_path)?.as_bytes())?;
        info!(areas = areas.len(), cases = cases.len(), "loaded input tables");
        Ok(Self::build(areas, cases, jitter, rng))
    }

    /// Runs the cleaning pass over already-parsed tables.
    pub fn build<R: Rng>(
        areas: Vec<AreaRecord>,
        cases: Vec<CaseStudy>,
        jitter: &Normal<f64>,
        rng: &mut R,
    ) -> Self {
        let (cases, jittered) = jitter_duplicates(cases, jitter, rng);
        let (cases, areas) = join_areas(cases, &areas, rng);
        info!(
            jittered,
            studied = areas.iter().filter(|a| a.is_studied()).count(),
            unstudied = areas.iter().filter(|a| !a.is_studied()).count(),
            "cleaned case-study dataset"
        );
        Self { cases, areas, jittered }
    }
}

/// Reads a table into memory, dropping a leading UTF-8 byte-order mark.
fn open_table(path: &Path) -> Result<String, LoadError> {
    let text = fs::read_to_string(path).map_err(|source| LoadError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(match text.strip_prefix('\u{feff}') {
        Some(rest) => rest.to_string(),
        None => text,
    })
}

fn reader<R: Read>(input: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(input)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Parses the area table and assigns each area a random baseline weight.
pub fn read_areas<R: Read, G: Rng>(input: R, rng: &mut G) -> Result<Vec<AreaRecord>, LoadError> {
    let mut out = Vec::new();
    for row in reader(input).deserialize::<AreaRow>() {
        let row = row.map_err(|source| LoadError::Record { table: "area", source })?;
        out.push(AreaRecord {
            code: row.nuts318cd,
            name: non_empty(row.nuts318nm),
            weight: rng.random_range(BASELINE_WEIGHT),
        });
    }
    if out.is_empty() {
        return Err(LoadError::Empty { table: "area" });
    }
    Ok(out)
}

fn parse_coordinate(value: &str, record: usize, column: &'static str) -> Result<f64, LoadError> {
    f64::from_str(value)
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| LoadError::Coordinate {
            table: "case-study",
            record,
            column,
            value: value.to_string(),
        })
}

/// Parses the case-study table and derives the display fields of every row.
pub fn read_cases<R: Read>(input: R) -> Result<Vec<CaseStudy>, LoadError> {
    let mut out = Vec::new();
    for (idx, row) in reader(input).deserialize::<CaseRow>().enumerate() {
        let row = row.map_err(|source| LoadError::Record { table: "case-study", source })?;
        let record = idx + 1;
        let lat = parse_coordinate(&row.lat_approx, record, "lat_approx")?;
        let lon = parse_coordinate(&row.long_approx, record, "long_approx")?;
        let action = non_empty(row.action);
        out.push(CaseStudy {
            lat,
            lon,
            point_color: substitute_codes(&row.issue, &POINT_COLORS),
            hover_issue: substitute_codes(&row.issue, &ISSUE_LABELS),
            hover_action: action
                .as_deref()
                .map(|a| substitute_codes(a, &ACTIVITY_LABELS))
                .unwrap_or_default(),
            hover_summary: wrap_hover(&row.summary),
            issue: row.issue,
            action,
            case_title: row.case_title,
            summary: row.summary,
            area_code: row.nuts318cd,
            area: row.area,
            year: row.year,
            link: non_empty(row.link),
            rel_tool_name: row.rel_tool_name,
            rel_tool_link: row.rel_tool_link,
            contact_name: row.contact_name,
            contact_title: row.contact_title,
            contact_org: row.contactors,
            contact_email: row.contact_email,
            region: None,
        });
    }
    if out.is_empty() {
        return Err(LoadError::Empty { table: "case-study" });
    }
    Ok(out)
}

/// Wraps a summary at [`HOVER_WRAP`] columns with `<br>` between lines.
pub fn wrap_hover(summary: &str) -> String {
    let flat: String = summary
        .chars()
        .map(|c| if c.is_whitespace() { ' ' } else { c })
        .collect();
    textwrap::wrap(&flat, HOVER_WRAP).join("<br>")
}

/// Bit key of a point. Adding `0.0` folds `-0.0` into `0.0`.
fn point_key(lat: f64, lon: f64) -> (u64, u64) {
    ((lat + 0.0).to_bits(), (lon + 0.0).to_bits())
}

/// Samples drawn for one point before falling back to [`nudge`].
const MAX_REDRAWS: usize = 64;

/// Smallest step away from `value` that changes it, scaled by `step`.
fn nudge(value: f64, step: u32) -> f64 {
    value + f64::EPSILON * value.abs().max(1.0) * f64::from(step)
}

/// Moves every case that shares an exact point with an earlier case by a
/// normal sample around its original coordinates.
///
/// The first case at each point keeps its coordinates. A sample that lands
/// exactly on an occupied point is drawn again. Returns the jittered cases
/// followed by the untouched ones, plus the number jittered.
pub fn jitter_duplicates<R: Rng>(
    cases: Vec<CaseStudy>,
    jitter: &Normal<f64>,
    rng: &mut R,
) -> (Vec<CaseStudy>, usize) {
    let mut rank: HashMap<(u64, u64), usize> = HashMap::new();
    let mut dups = Vec::new();
    let mut originals = Vec::new();
    for case in cases {
        let seen = rank.entry(point_key(case.lat, case.lon)).or_insert(0);
        if *seen > 0 {
            dups.push(case);
        } else {
            originals.push(case);
        }
        *seen += 1;
    }

    let mut occupied: HashSet<(u64, u64)> = originals.iter().map(|c| point_key(c.lat, c.lon)).collect();
    for case in &mut dups {
        let (lat, lon) = (case.lat, case.lon);
        let mut placed = false;
        for _ in 0..MAX_REDRAWS {
            case.lat = lat + jitter.sample(rng);
            case.lon = lon + jitter.sample(rng);
            if occupied.insert(point_key(case.lat, case.lon)) {
                placed = true;
                break;
            }
        }
        if !placed {
            // sigma too small to move the point at this precision
            let mut step = 1;
            case.lat = lat;
            case.lon = nudge(lon, step);
            while !occupied.insert(point_key(case.lat, case.lon)) {
                step += 1;
                case.lon = nudge(lon, step);
            }
            warn!(title = %case.case_title, "jitter could not separate point, nudged longitude");
        }
        debug!(title = %case.case_title, lat = case.lat, lon = case.lon, "jittered overlapping point");
    }

    let jittered = dups.len();
    dups.extend(originals);
    (dups, jittered)
}

/// Joins case studies with the area table and builds the background weights.
///
/// Each case gains the region name of its area. The weight table lists
/// studied areas first (one row each, first case wins, elevated weight),
/// then unstudied areas with their baseline weight.
pub fn join_areas<R: Rng>(
    mut cases: Vec<CaseStudy>,
    areas: &[AreaRecord],
    rng: &mut R,
) -> (Vec<CaseStudy>, Vec<AreaWeight>) {
    let mut by_code: HashMap<&str, &AreaRecord> = HashMap::new();
    for area in areas {
        if by_code.insert(area.code.as_str(), area).is_some() {
            warn!(code = %area.code, "duplicate area identifier, keeping first");
        }
    }

    let mut weights = Vec::new();
    let mut placed: HashSet<String> = HashSet::new();
    for (idx, case) in cases.iter_mut().enumerate() {
        let area = by_code.get(case.area_code.as_str());
        case.region = area.and_then(|a| a.name.clone());
        if area.is_none() {
            debug!(code = %case.area_code, "case study area missing from area table");
        }
        if placed.insert(case.area_code.clone()) {
            weights.push(AreaWeight {
                code: case.area_code.clone(),
                name: case.region.clone(),
                weight: rng.random_range(STUDIED_WEIGHT),
                first_case: Some(idx),
            });
        }
    }

    for area in areas {
        if !placed.insert(area.code.clone()) {
            continue;
        }
        weights.push(AreaWeight {
            code: area.code.clone(),
            name: area.name.clone(),
            weight: area.weight,
            first_case: None,
        });
    }

    (cases, weights)
}

/// Reads the optional area boundaries. A missing file disables the layer.
pub fn load_boundaries(path: &Path) -> Result<Option<GeoJson>, LoadError> {
    if !path.exists() {
        info!(path = %path.display(), "no area boundaries, background layer disabled");
        return Ok(None);
    }
    let txt = fs::read_to_string(path).map_err(|source| LoadError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let geo = GeoJson::from_str(&txt).map_err(|e| LoadError::Boundaries {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    Ok(Some(geo))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use rand::{SeedableRng, rngs::StdRng};

    pub(crate) const AREAS: &str = "\u{feff}nuts318cd,nuts318nm\n\
UKC11, Hartlepool and Stockton-on-Tees\n\
UKD33,Manchester\n\
UKI31,Camden and City of London\n\
UKL22,Cardiff and Vale of Glamorgan\n";

    pub(crate) const CASES: &str = "lat_approx,long_approx,issue,action,case_title,summary,nuts318cd,area,year,link,rel_tool_name,rel_tool_link,contact_name,contact_title,contactors,contact_email\n\
54.57,-1.23,E,\"1,5\",Family hubs , A joined-up early years offer.,UKC11,Stockton,2021,https://example.org/a,Maturity Matrix,https://example.org/t,Ann,Lead,Council,ann@example.org\n\
54.57,-1.23,F,3,Parenting together,Reducing parental conflict.,UKC11,Stockton,2022,https://example.org/b,,,,,,\n\
53.48,-2.24,S,\"2,8\",Talk Manchester,Speech and language pathway.,UKD33,Manchester,2020,,,,,,,\n\
51.48,-3.18,E,9,Flying Start,Early years in Cardiff.,UKL22,Cardiff,2019,https://example.org/d,,,,,,\n";

    pub(crate) fn sample_book(seed: u64) -> CaseBook {
        let mut rng = StdRng::seed_from_u64(seed);
        let jitter = Normal::new(0.0, 0.025).unwrap();
        let areas = read_areas(AREAS.trim_start_matches('\u{feff}').as_bytes(), &mut rng).unwrap();
        let cases = read_cases(CASES.as_bytes()).unwrap();
        CaseBook::build(areas, cases, &jitter, &mut rng)
    }

    #[test]
    fn fields_are_trimmed_and_derived() {
        let cases = read_cases(CASES.as_bytes()).unwrap();
        let first = &cases[0];
        assert_eq!(first.case_title, "Family hubs");
        assert_eq!(first.summary, "A joined-up early years offer.");
        assert_eq!(first.point_color, "#007D8A");
        assert_eq!(first.hover_issue, "Early Childhood Services");
        assert_eq!(first.hover_action, "Strategy,Services & Interventions");
        assert_eq!(first.contact_org, "Council");
        assert_eq!(cases[2].link, None);
        assert_eq!(cases[3].hover_action, "None");
    }

    #[test]
    fn bad_coordinate_is_fatal() {
        let csv = "lat_approx,long_approx,issue,nuts318cd\nnorth,-1.0,E,UKC11\n";
        let err = read_cases(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, LoadError::Coordinate { record: 1, column: "lat_approx", .. }));
    }

    #[test]
    fn missing_required_column_is_fatal() {
        let csv = "lat_approx,long_approx,issue\n54.0,-1.0,E\n";
        assert!(matches!(read_cases(csv.as_bytes()), Err(LoadError::Record { .. })));
    }

    #[test]
    fn empty_tables_are_rejected() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(matches!(read_areas("nuts318cd\n".as_bytes(), &mut rng), Err(LoadError::Empty { .. })));
    }

    #[test]
    fn area_baseline_weights_stay_in_range() {
        let mut rng = StdRng::seed_from_u64(3);
        let areas = read_areas(AREAS.trim_start_matches('\u{feff}').as_bytes(), &mut rng).unwrap();
        assert_eq!(areas[0].name.as_deref(), Some("Hartlepool and Stockton-on-Tees"));
        assert!(areas.iter().all(|a| BASELINE_WEIGHT.contains(&a.weight)));
    }

    #[test]
    fn hover_summary_wraps_at_fifty_columns() {
        let text = "Partners across the borough agreed a shared outcomes framework\nfor families with young children.";
        let wrapped = wrap_hover(text);
        assert!(wrapped.contains("<br>"));
        assert!(!wrapped.contains('\n'));
        assert!(wrapped.split("<br>").all(|line| line.chars().count() <= HOVER_WRAP));
    }

    #[test]
    fn jitter_makes_points_pairwise_distinct() {
        let book = sample_book(7);
        let mut seen = HashSet::new();
        for case in &book.cases {
            assert!(seen.insert(point_key(case.lat, case.lon)));
        }
        assert_eq!(book.jittered, 1);
        // jittered rows lead, and only the later duplicate moved
        assert_eq!(book.cases[0].case_title, "Parenting together");
        assert_ne!((book.cases[0].lat, book.cases[0].lon), (54.57, -1.23));
        assert_eq!((book.cases[1].lat, book.cases[1].lon), (54.57, -1.23));
    }

    #[test]
    fn jitter_is_reproducible_with_a_seed() {
        let a = sample_book(11);
        let b = sample_book(11);
        assert_eq!(a.cases, b.cases);
    }

    #[test]
    fn jitter_stays_close_to_the_original_point() {
        let base = read_cases(CASES.as_bytes()).unwrap().remove(0);
        let cases = vec![base.clone(); 50];
        let mut rng = StdRng::seed_from_u64(5);
        let (out, moved) = jitter_duplicates(cases, &Normal::new(0.0, 0.025).unwrap(), &mut rng);
        assert_eq!(moved, 49);
        let distinct: HashSet<_> = out.iter().map(|c| point_key(c.lat, c.lon)).collect();
        assert_eq!(distinct.len(), 50);
        assert!(out.iter().all(|c| (c.lat - base.lat).abs() < 0.25 && (c.lon - base.lon).abs() < 0.25));
    }

    #[test]
    fn tiny_sigma_still_separates_points() {
        let base = read_cases(CASES.as_bytes()).unwrap().remove(0);
        let mut rng = StdRng::seed_from_u64(1);
        let (out, moved) = jitter_duplicates(vec![base.clone(); 3], &Normal::new(0.0, 1e-20).unwrap(), &mut rng);
        assert_eq!(moved, 2);
        let distinct: HashSet<_> = out.iter().map(|c| point_key(c.lat, c.lon)).collect();
        assert_eq!(distinct.len(), 3);
        assert!(out.iter().all(|c| (c.lon - base.lon).abs() < 1e-9 && c.lat == base.lat));
    }

    #[test]
    fn signed_zero_is_the_same_point() {
        let mut a = read_cases(CASES.as_bytes()).unwrap().remove(0);
        a.lat = 51.5;
        a.lon = 0.0;
        let mut b = a.clone();
        b.lon = -0.0;
        let mut rng = StdRng::seed_from_u64(2);
        let (out, moved) = jitter_duplicates(vec![a, b], &Normal::new(0.0, 0.025).unwrap(), &mut rng);
        assert_eq!(moved, 1);
        assert_ne!(point_key(out[0].lat, out[0].lon), point_key(out[1].lat, out[1].lon));
    }

    #[test]
    fn area_weights_have_one_row_per_area() {
        let book = sample_book(2);
        let codes: Vec<&str> = book.areas.iter().map(|a| a.code.as_str()).collect();
        // three studied areas, then the one unstudied area
        assert_eq!(book.areas.len(), 4);
        assert_eq!(codes.iter().collect::<HashSet<_>>().len(), 4);
        assert_eq!(codes[3], "UKI31");
        assert!(!book.areas[3].is_studied());
        for area in &book.areas[..3] {
            assert!(area.is_studied());
            assert!(STUDIED_WEIGHT.contains(&area.weight));
        }
        // join keeps one row per case study
        assert_eq!(book.cases.len(), 4);
    }

    #[test]
    fn join_attaches_region_names() {
        let book = sample_book(4);
        let cardiff = book.cases.iter().find(|c| c.area_code == "UKL22").unwrap();
        assert_eq!(cardiff.region.as_deref(), Some("Cardiff and Vale of Glamorgan"));
        let first = &book.areas[0];
        assert_eq!(book.cases[first.first_case.unwrap()].area_code, first.code);
    }

    #[test]
    fn missing_boundaries_file_is_not_an_error() {
        let path = Path::new("definitely/not/here.geojson");
        assert!(load_boundaries(path).unwrap().is_none());
    }
}
