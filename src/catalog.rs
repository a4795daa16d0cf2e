use anyhow::{bail, Context};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fmt, str::FromStr};

use crate::errors::ModelError;

/// Synthetic architecture substituted when an instance reports a
/// microarchitecture with no measured min/max watt entry.
const AVERAGE_ARCH: &str = "Average";

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Aws,
    Gcp,
    Azure,
}

impl Provider {
    pub const ALL: [Provider; 3] = [Provider::Aws, Provider::Gcp, Provider::Azure];
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Provider::Aws => write!(f, "aws"),
            Provider::Gcp => write!(f, "gcp"),
            Provider::Azure => write!(f, "azure"),
        }
    }
}

impl FromStr for Provider {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "aws" => Ok(Provider::Aws),
            "gcp" => Ok(Provider::Gcp),
            "azure" => Ok(Provider::Azure),
            _ => Err(ModelError::UnsupportedProvider(s.to_string())),
        }
    }
}

/// A (utilization %, watts) sample on an instance's power curve.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
pub struct CurvePoint {
    pub utilization: f64,
    pub watts: f64,
}

/// Unified per-instance-type power data, normalized from the provider
/// datasets. AWS profiles carry four measured load points (0/10/50/100%);
/// GCP and Azure profiles carry two (min/max watts scaled by vCPU count).
#[derive(Debug, Clone, PartialEq)]
pub struct PowerProfile {
    pub instance_type: String,
    pub curve_points: Vec<CurvePoint>,
    /// Total lifecycle embodied emissions for one unit of this instance type.
    pub embodied_emissions: Option<f64>,
    /// vCPUs reserved by this instance type.
    pub v_cpus: f64,
    /// Total vCPUs of the host platform this instance type runs on. The
    /// vendor datasets omit this for some SKUs.
    pub max_v_cpus: Option<f64>,
}

impl PowerProfile {
    /// Fraction of the host platform reserved by this instance. When the
    /// platform size is unknown the whole host is charged to the workload.
    pub fn resource_share(&self) -> f64 {
        match self.max_v_cpus {
            Some(max) if max > 0.0 => self.v_cpus / max,
            _ => 1.0,
        }
    }

    pub fn min_watts(&self) -> f64 {
        self.curve_points.first().map(|p| p.watts).unwrap_or(0.0)
    }

    pub fn max_watts(&self) -> f64 {
        self.curve_points.last().map(|p| p.watts).unwrap_or(0.0)
    }
}

// ******** ******** ********
// **   RAW TABLE ROWS     **
// ******** ******** ********

/// One row of the AWS instance dataset. Wattage columns use comma-decimal
/// notation and are normalized during the catalog build.
#[derive(Debug, Deserialize)]
pub struct AwsInstanceRow {
    #[serde(rename = "Instance type")]
    pub instance_type: String,
    #[serde(rename = "Instance @ Idle")]
    pub idle: String,
    #[serde(rename = "Instance @ 10%")]
    pub ten_percent: String,
    #[serde(rename = "Instance @ 50%")]
    pub fifty_percent: String,
    #[serde(rename = "Instance @ 100%")]
    pub hundred_percent: String,
    #[serde(rename = "Instance vCPU")]
    pub v_cpus: String,
    #[serde(rename = "Platform Total Number of vCPU")]
    pub platform_v_cpus: Option<String>,
}

/// One row of the GCP or Azure instance dataset (GCP names the key column
/// "Machine type", Azure "Virtual Machine").
#[derive(Debug, Deserialize)]
pub struct VmInstanceRow {
    #[serde(rename = "Machine type", alias = "Virtual Machine")]
    pub machine_type: String,
    #[serde(rename = "Microarchitecture")]
    pub microarchitecture: String,
    #[serde(rename = "Instance vCPUs")]
    pub v_cpus: String,
    #[serde(rename = "Platform vCPUs (highest vCPU possible)")]
    pub platform_v_cpus: Option<String>,
}

/// One row of a GCP/Azure usage dataset: average watt draw per vCPU for a
/// microarchitecture.
#[derive(Debug, Deserialize)]
pub struct ArchitectureRow {
    #[serde(rename = "Architecture")]
    pub architecture: String,
    #[serde(rename = "Min Watts")]
    pub min_watts: f64,
    #[serde(rename = "Max Watts")]
    pub max_watts: f64,
}

/// One row of an embodied-emissions dataset.
#[derive(Debug, Deserialize)]
pub struct EmbodiedRow {
    #[serde(rename = "type")]
    pub instance_type: String,
    pub total: f64,
}

/// The raw per-provider reference datasets the catalog is built from.
#[derive(Debug, Default)]
pub struct ReferenceTables {
    pub aws_instances: Vec<AwsInstanceRow>,
    pub aws_embodied: Vec<EmbodiedRow>,
    pub gcp_instances: Vec<VmInstanceRow>,
    pub gcp_use: Vec<ArchitectureRow>,
    pub gcp_embodied: Vec<EmbodiedRow>,
    pub azure_instances: Vec<VmInstanceRow>,
    pub azure_use: Vec<ArchitectureRow>,
    pub azure_embodied: Vec<EmbodiedRow>,
}

impl ReferenceTables {
    /// The reference datasets shipped with the crate.
    pub fn builtin() -> anyhow::Result<ReferenceTables> {
        Ok(ReferenceTables {
            aws_instances: parse_table(include_str!("data/aws-instances.json"))
                .context("parsing builtin aws-instances.json")?,
            aws_embodied: parse_table(include_str!("data/aws-embodied.json"))
                .context("parsing builtin aws-embodied.json")?,
            gcp_instances: parse_table(include_str!("data/gcp-instances.json"))
                .context("parsing builtin gcp-instances.json")?,
            gcp_use: parse_table(include_str!("data/gcp-use.json"))
                .context("parsing builtin gcp-use.json")?,
            gcp_embodied: parse_table(include_str!("data/gcp-embodied.json"))
                .context("parsing builtin gcp-embodied.json")?,
            azure_instances: parse_table(include_str!("data/azure-instances.json"))
                .context("parsing builtin azure-instances.json")?,
            azure_use: parse_table(include_str!("data/azure-use.json"))
                .context("parsing builtin azure-use.json")?,
            azure_embodied: parse_table(include_str!("data/azure-embodied.json"))
                .context("parsing builtin azure-embodied.json")?,
        })
    }
}

pub fn parse_table<T: serde::de::DeserializeOwned>(json: &str) -> anyhow::Result<Vec<T>> {
    serde_json::from_str(json).map_err(|e| anyhow::anyhow!("JSON parsing error: {}", e))
}

// ******** ******** ********
// **       CATALOG        **
// ******** ******** ********

/// Immutable `provider -> instance type -> PowerProfile` table. Built once
/// from the reference datasets; a refresh replaces the whole catalog rather
/// than patching it in place.
#[derive(Debug)]
pub struct Catalog {
    instances: HashMap<Provider, HashMap<String, PowerProfile>>,
}

impl Catalog {
    pub fn builtin() -> anyhow::Result<Catalog> {
        Catalog::from_tables(&ReferenceTables::builtin()?)
    }

    pub fn from_tables(tables: &ReferenceTables) -> anyhow::Result<Catalog> {
        let mut instances = HashMap::new();

        let mut aws = aws_profiles(&tables.aws_instances)?;
        join_embodied(&mut aws, &tables.aws_embodied, Provider::Aws);
        instances.insert(Provider::Aws, aws);

        let gcp_watts = architecture_watts(&tables.gcp_use, Provider::Gcp)?;
        let mut gcp = vm_profiles(&tables.gcp_instances, &gcp_watts, Provider::Gcp)?;
        join_embodied(&mut gcp, &tables.gcp_embodied, Provider::Gcp);
        instances.insert(Provider::Gcp, gcp);

        let azure_watts = architecture_watts(&tables.azure_use, Provider::Azure)?;
        let mut azure = vm_profiles(&tables.azure_instances, &azure_watts, Provider::Azure)?;
        join_embodied(&mut azure, &tables.azure_embodied, Provider::Azure);
        instances.insert(Provider::Azure, azure);

        for provider in Provider::ALL {
            tracing::debug!(
                "catalog built: {} {} instance types",
                instances[&provider].len(),
                provider
            );
        }

        Ok(Catalog { instances })
    }

    pub fn profile(&self, provider: Provider, instance_type: &str) -> Option<&PowerProfile> {
        self.instances.get(&provider)?.get(instance_type)
    }

    pub fn contains(&self, provider: Provider, instance_type: &str) -> bool {
        self.profile(provider, instance_type).is_some()
    }

    /// Instance types known for the given provider, sorted by name.
    pub fn instance_types(&self, provider: Provider) -> Vec<&PowerProfile> {
        self.instances
            .get(&provider)
            .map(|profiles| {
                profiles
                    .values()
                    .sorted_by(|a, b| a.instance_type.cmp(&b.instance_type))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Parses a vendor numeric field, normalizing decimal-comma notation to a
/// dot-decimal float.
fn parse_decimal(field: &str, what: &str) -> anyhow::Result<f64> {
    field
        .trim()
        .replace(',', ".")
        .parse::<f64>()
        .context(format!("unparsable numeric field `{}`: {:?}", what, field))
}

/// Platform vCPU counts are optional in the vendor data. An absent or
/// unparsable count becomes `None` and is logged, since it changes how
/// embodied emissions are allocated.
fn parse_platform_v_cpus(field: &Option<String>, instance_type: &str) -> Option<f64> {
    let parsed = field
        .as_deref()
        .and_then(|s| s.trim().replace(',', ".").parse::<f64>().ok());
    if parsed.is_none() {
        tracing::warn!(
            "no platform vCPU count for {}; embodied share assumes the whole host",
            instance_type
        );
    }
    parsed
}

fn aws_profiles(rows: &[AwsInstanceRow]) -> anyhow::Result<HashMap<String, PowerProfile>> {
    let mut profiles = HashMap::new();
    for row in rows {
        let curve_points = vec![
            CurvePoint {
                utilization: 0.0,
                watts: parse_decimal(&row.idle, "Instance @ Idle")?,
            },
            CurvePoint {
                utilization: 10.0,
                watts: parse_decimal(&row.ten_percent, "Instance @ 10%")?,
            },
            CurvePoint {
                utilization: 50.0,
                watts: parse_decimal(&row.fifty_percent, "Instance @ 50%")?,
            },
            CurvePoint {
                utilization: 100.0,
                watts: parse_decimal(&row.hundred_percent, "Instance @ 100%")?,
            },
        ];

        profiles.insert(
            row.instance_type.clone(),
            PowerProfile {
                instance_type: row.instance_type.clone(),
                curve_points,
                embodied_emissions: None,
                v_cpus: parse_decimal(&row.v_cpus, "Instance vCPU")?,
                max_v_cpus: parse_platform_v_cpus(&row.platform_v_cpus, &row.instance_type),
            },
        );
    }
    Ok(profiles)
}

/// Builds the architecture -> (min watts, max watts) table for a provider,
/// including the synthetic "Average" entry (arithmetic mean over all measured
/// architectures) used as a fallback for unmeasured microarchitectures.
fn architecture_watts(
    rows: &[ArchitectureRow],
    provider: Provider,
) -> anyhow::Result<HashMap<String, (f64, f64)>> {
    if rows.is_empty() {
        bail!("empty architecture usage table for provider {}", provider);
    }

    let mut watts = HashMap::new();
    let mut min_sum = 0.0;
    let mut max_sum = 0.0;
    for row in rows {
        watts.insert(row.architecture.clone(), (row.min_watts, row.max_watts));
        min_sum += row.min_watts;
        max_sum += row.max_watts;
    }

    let count = rows.len() as f64;
    watts.insert(AVERAGE_ARCH.to_string(), (min_sum / count, max_sum / count));
    Ok(watts)
}

fn vm_profiles(
    rows: &[VmInstanceRow],
    watts: &HashMap<String, (f64, f64)>,
    provider: Provider,
) -> anyhow::Result<HashMap<String, PowerProfile>> {
    let mut profiles = HashMap::new();
    for row in rows {
        let v_cpus = parse_decimal(&row.v_cpus, "Instance vCPUs")?;
        let (min_watts, max_watts) = watts
            .get(&row.microarchitecture)
            .or_else(|| {
                tracing::debug!(
                    "no {} usage data for microarchitecture {:?}, using {}",
                    provider,
                    row.microarchitecture,
                    AVERAGE_ARCH
                );
                watts.get(AVERAGE_ARCH)
            })
            .copied()
            .context(format!("no {} entry in {} usage table", AVERAGE_ARCH, provider))?;

        let curve_points = vec![
            CurvePoint {
                utilization: 0.0,
                watts: min_watts * v_cpus,
            },
            CurvePoint {
                utilization: 100.0,
                watts: max_watts * v_cpus,
            },
        ];

        profiles.insert(
            row.machine_type.clone(),
            PowerProfile {
                instance_type: row.machine_type.clone(),
                curve_points,
                embodied_emissions: None,
                v_cpus,
                max_v_cpus: parse_platform_v_cpus(&row.platform_v_cpus, &row.machine_type),
            },
        );
    }
    Ok(profiles)
}

/// Joins an embodied-emissions dataset onto the profiles by instance-type
/// key. Rows naming unknown instance types are skipped, not fatal.
fn join_embodied(
    profiles: &mut HashMap<String, PowerProfile>,
    rows: &[EmbodiedRow],
    provider: Provider,
) {
    for row in rows {
        match profiles.get_mut(&row.instance_type) {
            Some(profile) => profile.embodied_emissions = Some(row.total),
            None => tracing::warn!(
                "embodied dataset names unknown {} instance type {:?}",
                provider,
                row.instance_type
            ),
        }
    }
}
