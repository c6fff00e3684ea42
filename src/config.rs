use clap::{Parser, Subcommand, ValueEnum, ValueHint};
use rand::{SeedableRng, rngs::StdRng};
use rand_distr::Normal;
use std::path::PathBuf;

use crate::codes::{is_activity_code, is_issue_code};
use crate::error::ConfigError;
use crate::figure::TileSource;
use crate::filter::Selection;

#[derive(Parser, Debug)]
#[command(author, version, about = "Case studies from local areas, on a terminal map")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Directory holding the input tables
    #[arg(long, default_value = "data", value_hint = ValueHint::DirPath)]
    pub data_dir: PathBuf,

    /// Area table, relative to the data directory
    #[arg(long, default_value = "nuts3.csv")]
    pub areas: PathBuf,

    /// Case-study table, relative to the data directory
    #[arg(long, default_value = "case_studies.csv")]
    pub cases: PathBuf,

    /// Optional area boundaries for the background layer
    #[arg(long, default_value = "nuts3.geojson")]
    pub boundaries: PathBuf,

    /// Seed for the overlap jitter; random when omitted
    #[arg(long)]
    pub seed: Option<u64>,

    /// Standard deviation of the overlap jitter, in degrees
    #[arg(long, default_value_t = 0.025)]
    pub jitter_sigma: f64,

    /// Map tile access token, passed through to exported figures
    #[arg(long, env = "MAPBOX_ACCESS_TOKEN", default_value = "", hide_env_values = true)]
    pub map_token: String,

    /// Map tile style URL
    #[arg(long, default_value = "mapbox://styles/mapbox/light-v10")]
    pub map_style: String,

    /// Directory for the daily log file
    #[arg(long, default_value = "logs", value_hint = ValueHint::DirPath)]
    pub log_dir: PathBuf,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the map figure for a selection and exit
    Figure(FigureArgs),
}

#[derive(Parser, Debug)]
pub struct FigureArgs {
    /// Issue codes to include (E, F, S)
    #[arg(long, value_delimiter = ',', default_values = ["E", "F", "S"])]
    pub issues: Vec<String>,

    /// Activity codes to include (1-9)
    #[arg(long, value_delimiter = ',', default_values = ["1", "2", "3", "4", "5", "6", "7", "8", "9"])]
    pub activities: Vec<String>,

    #[arg(long, value_enum, default_value_t = FigureFormat::Json)]
    pub format: FigureFormat,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum FigureFormat {
    Json,
    Geojson,
}

/// About a tenth of a millimetre on the ground.
pub const MIN_JITTER_SIGMA: f64 = 1e-9;

impl Cli {
    pub fn areas_path(&self) -> PathBuf {
        self.data_dir.join(&self.areas)
    }

    pub fn cases_path(&self) -> PathBuf {
        self.data_dir.join(&self.cases)
    }

    pub fn boundaries_path(&self) -> PathBuf {
        self.data_dir.join(&self.boundaries)
    }

    /// Normal jitter around zero. Sigmas below [`MIN_JITTER_SIGMA`] are too small
    /// to separate points and are rejected.
    pub fn jitter(&self) -> Result<Normal<f64>, ConfigError> {
        if !(self.jitter_sigma.is_finite() && self.jitter_sigma >= MIN_JITTER_SIGMA) {
            return Err(ConfigError::InvalidSigma(self.jitter_sigma));
        }
        Normal::new(0.0, self.jitter_sigma).map_err(|_| ConfigError::InvalidSigma(self.jitter_sigma))
    }

    /// Seeded when `--seed` is given, otherwise from the OS.
    pub fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        }
    }

    pub fn tiles(&self) -> TileSource {
        TileSource {
            access_token: self.map_token.clone(),
            style: self.map_style.clone(),
        }
    }
}

impl FigureArgs {
    pub fn selection(&self) -> Result<Selection, ConfigError> {
        if let Some(code) = self.issues.iter().find(|c| !is_issue_code(c)) {
            return Err(ConfigError::UnknownCode { group: "issue", code: code.clone() });
        }
        if let Some(code) = self.activities.iter().find(|c| !is_activity_code(c)) {
            return Err(ConfigError::UnknownCode { group: "activity", code: code.clone() });
        }
        Ok(Selection::new(self.issues.iter().cloned(), self.activities.iter().cloned()))
    }
}
