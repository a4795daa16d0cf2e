use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

use crate::{
    catalog::{parse_table, ReferenceTables},
    model::ModelParams,
};

// ******** ******** ********
// **    CONFIGURATION     **
// ******** ******** ********
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    pub model: ModelParams,
    /// Optional path overrides for the reference datasets. Anything left
    /// unset falls back to the tables embedded in the binary.
    #[serde(default)]
    pub datasets: Option<DatasetPaths>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct DatasetPaths {
    pub aws_instances: Option<String>,
    pub aws_embodied: Option<String>,
    pub gcp_instances: Option<String>,
    pub gcp_use: Option<String>,
    pub gcp_embodied: Option<String>,
    pub azure_instances: Option<String>,
    pub azure_use: Option<String>,
    pub azure_embodied: Option<String>,
}

impl Config {
    pub fn try_from_path(path: &Path) -> anyhow::Result<Config> {
        let config_str = fs::read_to_string(path)
            .context(format!("unable to read config file {:?}", path))?;
        Config::try_from_str(&config_str)
    }

    pub fn try_from_str(conf_str: &str) -> anyhow::Result<Config> {
        toml::from_str::<Config>(conf_str).map_err(|e| anyhow::anyhow!("TOML parsing error: {}", e))
    }

    /// Loads the reference tables, applying any dataset path overrides on top
    /// of the embedded defaults.
    pub fn reference_tables(&self) -> anyhow::Result<ReferenceTables> {
        let mut tables = ReferenceTables::builtin()?;

        if let Some(paths) = &self.datasets {
            if let Some(path) = &paths.aws_instances {
                tables.aws_instances = load_table(path)?;
            }
            if let Some(path) = &paths.aws_embodied {
                tables.aws_embodied = load_table(path)?;
            }
            if let Some(path) = &paths.gcp_instances {
                tables.gcp_instances = load_table(path)?;
            }
            if let Some(path) = &paths.gcp_use {
                tables.gcp_use = load_table(path)?;
            }
            if let Some(path) = &paths.gcp_embodied {
                tables.gcp_embodied = load_table(path)?;
            }
            if let Some(path) = &paths.azure_instances {
                tables.azure_instances = load_table(path)?;
            }
            if let Some(path) = &paths.azure_use {
                tables.azure_use = load_table(path)?;
            }
            if let Some(path) = &paths.azure_embodied {
                tables.azure_embodied = load_table(path)?;
            }
        }

        Ok(tables)
    }
}

fn load_table<T: serde::de::DeserializeOwned>(path: &str) -> anyhow::Result<Vec<T>> {
    let json =
        fs::read_to_string(path).context(format!("unable to read dataset file {}", path))?;
    parse_table(&json).context(format!("unable to parse dataset file {}", path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn can_parse_a_minimal_config() -> anyhow::Result<()> {
        let config = Config::try_from_str(
            r#"
            [model]
            provider = "aws"
            instance_type = "m5.large"
            "#,
        )?;

        assert_eq!(config.model.provider, "aws");
        assert_eq!(config.model.instance_type.as_deref(), Some("m5.large"));
        assert_eq!(config.model.expected_lifespan, None);
        assert!(config.datasets.is_none());
        Ok(())
    }

    #[test]
    fn can_parse_dataset_overrides_and_lifespan() -> anyhow::Result<()> {
        let config = Config::try_from_str(
            r#"
            [model]
            provider = "gcp"
            instance_type = "n1-standard-4"
            expected_lifespan = 6.0

            [datasets]
            gcp_instances = "./data/gcp-instances.json"
            gcp_use = "./data/gcp-use.json"
            "#,
        )?;

        assert_eq!(config.model.expected_lifespan, Some(6.0));
        let datasets = config.datasets.expect("datasets section should parse");
        assert_eq!(
            datasets.gcp_instances.as_deref(),
            Some("./data/gcp-instances.json")
        );
        assert!(datasets.aws_instances.is_none());
        Ok(())
    }

    #[test]
    fn config_without_a_model_section_is_an_error() {
        assert!(Config::try_from_str("[datasets]\n").is_err());
    }
}
