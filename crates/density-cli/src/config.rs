//! Input locations from the environment.

use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    pub dataset_path: Option<PathBuf>,
    pub correlated_model_path: Option<PathBuf>,
    pub uncorrelated_model_path: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            dataset_path: env::var_os("DENSITY_DATASET").map(PathBuf::from),
            correlated_model_path: env::var_os("DENSITY_CORRELATED_MODEL").map(PathBuf::from),
            uncorrelated_model_path: env::var_os("DENSITY_UNCORRELATED_MODEL").map(PathBuf::from),
        }
    }

    /// Command-line values win over the environment.
    pub fn overridden_by(self, other: Config) -> Self {
        Self {
            dataset_path: other.dataset_path.or(self.dataset_path),
            correlated_model_path: other.correlated_model_path.or(self.correlated_model_path),
            uncorrelated_model_path: other
                .uncorrelated_model_path
                .or(self.uncorrelated_model_path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_take_precedence_over_env() {
        let env = Config {
            dataset_path: Some("env.json".into()),
            correlated_model_path: Some("env_cor.txt".into()),
            uncorrelated_model_path: None,
        };
        let flags = Config {
            dataset_path: Some("flag.json".into()),
            ..Config::default()
        };
        let merged = env.overridden_by(flags);
        assert_eq!(merged.dataset_path, Some(PathBuf::from("flag.json")));
        assert_eq!(merged.correlated_model_path, Some(PathBuf::from("env_cor.txt")));
        assert_eq!(merged.uncorrelated_model_path, None);
    }
}
