pub mod catalog;
pub mod clap_args;
pub mod config;
pub mod errors;
pub mod interpolate;
pub mod model;

use anyhow::Context;
use std::{fs, path::Path};
use tracing::info;

use crate::{
    catalog::Catalog,
    config::Config,
    model::{CcfModel, Impact, Observation},
};

/// Builds the catalog from the configured reference tables, configures the
/// model and calculates totals for the observations in the given JSON file.
pub fn run(config: &Config, observations_path: &Path) -> anyhow::Result<Impact> {
    let tables = config.reference_tables()?;
    let catalog = Catalog::from_tables(&tables)?;

    let mut model = CcfModel::new(catalog);
    model.configure("cloudcarbon", Some(&config.model))?;

    let observations = load_observations(observations_path)?;
    info!(
        "calculating impact of {} observations for {}/{}",
        observations.len(),
        config.model.provider,
        config.model.instance_type.as_deref().unwrap_or("<none>")
    );

    model.calculate(&observations)
}

/// Reads observations from a JSON file containing either a single observation
/// object or an array of them.
pub fn load_observations(path: &Path) -> anyhow::Result<Vec<Observation>> {
    let json = fs::read_to_string(path)
        .context(format!("unable to read observations file {:?}", path))?;
    parse_observations(&json).context(format!("unable to parse observations file {:?}", path))
}

fn parse_observations(json: &str) -> anyhow::Result<Vec<Observation>> {
    if let Ok(observations) = serde_json::from_str::<Vec<Observation>>(json) {
        return Ok(observations);
    }
    let observation = serde_json::from_str::<Observation>(json)?;
    Ok(vec![observation])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_an_observation_array() -> anyhow::Result<()> {
        let observations = parse_observations(
            r#"[
                { "datetime": "2024-06-01T00:00:00Z", "duration": 3600, "cpu": 0.5 },
                { "datetime": "2024-06-01T01:00:00Z", "duration": 1800, "cpu": 0.1 }
            ]"#,
        )?;

        assert_eq!(observations.len(), 2);
        assert_eq!(observations[0].duration, Some(3600.0));
        assert_eq!(observations[1].cpu, Some(0.1));
        Ok(())
    }

    #[test]
    fn parses_a_single_observation_object() -> anyhow::Result<()> {
        let observations = parse_observations(
            r#"{ "datetime": "2024-06-01T00:00:00Z", "duration": 300, "cpu": 1.0 }"#,
        )?;

        assert_eq!(observations.len(), 1);
        assert_eq!(observations[0].duration, Some(300.0));
        Ok(())
    }

    #[test]
    fn observations_may_omit_fields_at_parse_time() -> anyhow::Result<()> {
        // field presence is validated per-observation in calculate, not here
        let observations = parse_observations(r#"[{ "duration": 300 }]"#)?;

        assert_eq!(observations.len(), 1);
        assert_eq!(observations[0].cpu, None);
        assert_eq!(observations[0].datetime, None);
        Ok(())
    }
}
