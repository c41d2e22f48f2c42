use std::{fs::File, io::BufReader, path::Path};

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

use crate::{
    foundation::error::{SongreelError, SongreelResult},
    policy::{ContainerFormat, ResolutionPreset},
};

/// Batch defaults read from a JSON file. Command-line flags take precedence.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BatchConfig {
    pub vid_format: Option<ContainerFormat>,
    pub use_x265: Option<bool>,
    pub resolution: Option<ResolutionPreset>,
    pub random_image_order: Option<bool>,
    pub seed: Option<u64>,
    pub recursive: Option<bool>,
    pub timeout_secs: Option<u64>,
    pub sequential: Option<bool>,
}

impl BatchConfig {
    pub fn load(path: &Path) -> SongreelResult<Self> {
        let file = File::open(path)
            .with_context(|| format!("failed to open config '{}'", path.display()))?;
        Self::from_reader(BufReader::new(file)).map_err(|e| match e {
            SongreelError::Configuration(msg) => {
                SongreelError::configuration(format!("{}: {msg}", path.display()))
            }
            other => other,
        })
    }

    pub fn from_reader(reader: impl std::io::Read) -> SongreelResult<Self> {
        let cfg: Self = serde_json::from_reader(reader)
            .map_err(|e| SongreelError::configuration(format!("invalid config: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> SongreelResult<()> {
        if self.timeout_secs == Some(0) {
            return Err(SongreelError::configuration(
                "timeout_secs must be greater than zero",
            ));
        }
        Ok(())
    }
}
