use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    catalog::{Catalog, PowerProfile, Provider},
    errors::ModelError,
    interpolate::Spline,
};

/// Fixed identifier for this model variant, used by the surrounding pipeline
/// for routing and logging.
pub const MODEL_ID: &str = "ccf.cloud.sci";

pub const DEFAULT_EXPECTED_LIFESPAN_YEARS: f64 = 4.0;

const SECONDS_PER_HOUR: f64 = 3600.0;
const WATTS_PER_KILOWATT: f64 = 1000.0;
// hours in a non-leap year; the allocation formula is not calendar-aware
const HOURS_PER_YEAR: f64 = 8760.0;

/// One usage-window sample handed in by the pipeline. Fields are optional
/// because upstream data is loosely typed; `calculate` validates each
/// observation and names the missing field. `datetime` identifies the window
/// and plays no part in the math.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Observation {
    #[serde(default)]
    pub datetime: Option<DateTime<Utc>>,
    /// Window length in seconds.
    #[serde(default)]
    pub duration: Option<f64>,
    /// Fractional CPU utilization over the window, in [0, 1].
    #[serde(default)]
    pub cpu: Option<f64>,
}

impl Observation {
    pub fn new(datetime: DateTime<Utc>, duration: f64, cpu: f64) -> Observation {
        Observation {
            datetime: Some(datetime),
            duration: Some(duration),
            cpu: Some(cpu),
        }
    }

    fn require(&self, index: usize) -> Result<(f64, f64), ModelError> {
        let duration = self
            .duration
            .ok_or(ModelError::MissingObservationField {
                index,
                field: "duration",
            })?;
        let cpu = self.cpu.ok_or(ModelError::MissingObservationField {
            index,
            field: "cpu",
        })?;
        if self.datetime.is_none() {
            return Err(ModelError::MissingObservationField {
                index,
                field: "datetime",
            });
        }
        Ok((duration, cpu))
    }
}

/// Static parameters accepted by `configure`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModelParams {
    pub provider: String,
    #[serde(default)]
    pub instance_type: Option<String>,
    /// Expected operational lifespan of the hardware, in years.
    #[serde(default)]
    pub expected_lifespan: Option<f64>,
}

/// Totals returned by `calculate`. Serializes as `{"e": …, "m": …}`, the
/// shape the downstream accounting pipeline expects.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Impact {
    /// Operational energy over the observation sequence, in kWh.
    #[serde(rename = "e")]
    pub energy_kwh: f64,
    /// Allocated share of lifecycle embodied emissions.
    #[serde(rename = "m")]
    pub embodied_emissions: f64,
}

/// Converts one observation into energy (kWh) using the fitted wattage curve.
pub fn energy_kwh(curve: &Spline, duration_secs: f64, cpu_fraction: f64) -> f64 {
    let wattage = curve.at(cpu_fraction * 100.0);
    //  wattage (W) * duration (s) = J
    //  J / 3600 = Wh
    //  Wh / 1000 = kWh
    wattage * duration_secs / SECONDS_PER_HOUR / WATTS_PER_KILOWATT
}

/// Allocates a share of the instance's total lifecycle embodied emissions to
/// one observation: the fraction of the hardware's expected lifetime consumed,
/// times the fraction of the host's resources reserved. An instance with no
/// embodied dataset entry contributes 0.
pub fn embodied_share(
    profile: &PowerProfile,
    duration_secs: f64,
    expected_lifespan_years: f64,
) -> f64 {
    let total_emissions = profile.embodied_emissions.unwrap_or(0.0);
    let time_reserved_hours = duration_secs / SECONDS_PER_HOUR;
    let expected_lifespan_hours = HOURS_PER_YEAR * expected_lifespan_years;

    total_emissions * (time_reserved_hours / expected_lifespan_hours) * profile.resource_share()
}

struct ConfiguredInstance {
    profile: PowerProfile,
    curve: Spline,
}

/// The model facade. Holds the injected catalog and the current
/// provider/instance-type/lifespan selection; unconfigured until a successful
/// `configure` call.
pub struct CcfModel {
    catalog: Catalog,
    name: Option<String>,
    provider: Option<Provider>,
    instance: Option<ConfiguredInstance>,
    expected_lifespan_years: f64,
}

impl CcfModel {
    pub fn new(catalog: Catalog) -> CcfModel {
        CcfModel {
            catalog,
            name: None,
            provider: None,
            instance: None,
            expected_lifespan_years: DEFAULT_EXPECTED_LIFESPAN_YEARS,
        }
    }

    pub fn model_identifier(&self) -> &'static str {
        MODEL_ID
    }

    /// The data-source name given to `configure`, if any.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Selects the provider and instance type for subsequent `calculate`
    /// calls. The wattage curve is fitted once here and reused for every
    /// observation.
    pub fn configure(&mut self, name: &str, params: Option<&ModelParams>) -> anyhow::Result<()> {
        let params = params
            .ok_or_else(|| ModelError::MissingParameter("static params".to_string()))?;

        let provider = params.provider.parse::<Provider>()?;
        self.name = Some(name.to_string());
        self.provider = Some(provider);

        if let Some(instance_type) = &params.instance_type {
            let profile = self
                .catalog
                .profile(provider, instance_type)
                .ok_or_else(|| ModelError::UnsupportedInstanceType {
                    provider: provider.to_string(),
                    instance_type: instance_type.clone(),
                })?
                .clone();

            let curve = Spline::new(&profile.curve_points)?;
            self.instance = Some(ConfiguredInstance { profile, curve });
        }

        if let Some(years) = params.expected_lifespan {
            self.expected_lifespan_years = years;
        }

        debug!(
            "configured model {} for {} / {}",
            name,
            provider,
            params.instance_type.as_deref().unwrap_or("<none>")
        );
        Ok(())
    }

    /// Sums energy and embodied emissions over the observation sequence.
    ///
    /// The per-observation computations are independent and the totals are
    /// plain associative sums, so observation order does not matter beyond
    /// float rounding. A malformed observation aborts the whole batch; no
    /// partial totals are returned.
    pub fn calculate(&self, observations: &[Observation]) -> anyhow::Result<Impact> {
        let instance = self.instance.as_ref().ok_or(ModelError::NotConfigured)?;

        let mut energy = 0.0;
        let mut embodied = 0.0;
        for (index, observation) in observations.iter().enumerate() {
            let (duration, cpu) = observation.require(index)?;
            energy += energy_kwh(&instance.curve, duration, cpu);
            embodied += embodied_share(&instance.profile, duration, self.expected_lifespan_years);
        }

        Ok(Impact {
            energy_kwh: energy,
            embodied_emissions: embodied,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CurvePoint;

    fn flat_profile(watts: f64) -> PowerProfile {
        PowerProfile {
            instance_type: "test".to_string(),
            curve_points: vec![
                CurvePoint {
                    utilization: 0.0,
                    watts,
                },
                CurvePoint {
                    utilization: 100.0,
                    watts,
                },
            ],
            embodied_emissions: None,
            v_cpus: 1.0,
            max_v_cpus: None,
        }
    }

    #[test]
    fn thirty_watts_for_five_minutes_is_0_0025_kwh() -> anyhow::Result<()> {
        // 30 W × 300 s = 9000 J = 2.5 Wh = 0.0025 kWh
        let profile = flat_profile(30.0);
        let curve = Spline::new(&profile.curve_points)?;

        let kwh = energy_kwh(&curve, 300.0, 0.5);
        assert!((kwh - 0.0025).abs() < 1e-12);
        Ok(())
    }

    #[test]
    fn embodied_share_allocates_by_lifetime_and_resource_fraction() {
        let mut profile = flat_profile(10.0);
        profile.embodied_emissions = Some(1000.0);
        profile.v_cpus = 2.0;
        profile.max_v_cpus = Some(4.0);

        // 1000 * (1h / 35040h) * (2/4)
        let share = embodied_share(&profile, 3600.0, 4.0);
        assert!((share - 1000.0 * (1.0 / 35040.0) * 0.5).abs() < 1e-12);
    }

    #[test]
    fn unset_embodied_total_contributes_zero() {
        let profile = flat_profile(10.0);
        assert_eq!(embodied_share(&profile, 3600.0, 4.0), 0.0);
    }

    #[test]
    fn observation_validation_names_the_missing_field() {
        let observation = Observation {
            datetime: Some(Utc::now()),
            duration: Some(60.0),
            cpu: None,
        };

        match observation.require(3) {
            Err(ModelError::MissingObservationField { index: 3, field: "cpu" }) => {}
            other => panic!("expected missing cpu field, got {:?}", other),
        }
    }

    #[test]
    fn calculate_before_configure_is_rejected() {
        let model = CcfModel::new(Catalog::builtin().unwrap());
        let err = model.calculate(&[]).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<ModelError>(),
            Some(ModelError::NotConfigured)
        ));
    }
}
