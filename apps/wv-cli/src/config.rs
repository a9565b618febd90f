//! Parameter files for the CLI.

use std::fs;
use std::path::Path;

use wv_sim::WaveParams;

use crate::error::CliResult;

/// Load parameters from YAML; missing fields take their defaults.
pub fn load_params(path: Option<&Path>) -> CliResult<WaveParams> {
    let Some(path) = path else {
        return Ok(WaveParams::default());
    };
    let text = fs::read_to_string(path)?;
    let params: WaveParams = serde_yaml::from_str(&text)?;
    params.validate()?;
    Ok(params)
}
