use anyhow::Context;
use cloudcarbon::{
    catalog::{Catalog, Provider},
    clap_args,
    config::Config,
    model::Impact,
};
use colored::*;
use std::path::Path;
use term_table::{row, row::Row, rows, table_cell::*, Table, TableStyle};
use tracing::{subscriber::set_global_default, Subscriber};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let args = clap_args::parse();

    let default_filter = if args.verbose { "debug" } else { "warn" };
    let subscriber = get_subscriber(default_filter.into());
    init_subscriber(subscriber);

    match args.command {
        clap_args::Commands::Run {
            config,
            observations,
        } => {
            let config = Config::try_from_path(Path::new(&config))?;
            let impact = cloudcarbon::run(&config, Path::new(&observations))?;
            print_impact(&config, &impact);
        }

        clap_args::Commands::Instances { provider } => {
            let catalog = Catalog::builtin().context("unable to build builtin catalog")?;
            let providers = match provider {
                Some(provider) => vec![provider.parse::<Provider>()?],
                None => Provider::ALL.to_vec(),
            };
            print_instances(&catalog, &providers);
        }
    }

    Ok(())
}

fn print_impact(config: &Config, impact: &Impact) {
    println!("\n{}", " Impact ".reversed().green());
    let table = Table::builder()
        .rows(rows![
            row![
                TableCell::builder("Provider".bold()).build(),
                TableCell::builder("Instance type".bold()).build(),
                TableCell::builder("Energy (kWh)".bold()).build(),
                TableCell::builder("Embodied (gCO2e)".bold()).build()
            ],
            row![
                TableCell::new(&config.model.provider),
                TableCell::new(config.model.instance_type.as_deref().unwrap_or("--")),
                TableCell::new(format!("{:.6}", impact.energy_kwh)),
                TableCell::new(format!("{:.6}", impact.embodied_emissions))
            ]
        ])
        .style(TableStyle::rounded())
        .build();

    println!("{}", table.render());
}

fn print_instances(catalog: &Catalog, providers: &[Provider]) {
    for provider in providers {
        println!("\n{}:", provider.to_string().green());

        let mut rows: Vec<Row> = vec![row![
            TableCell::builder("Instance type".bold()).build(),
            TableCell::builder("vCPUs".bold()).build(),
            TableCell::builder("Min W".bold()).build(),
            TableCell::builder("Max W".bold()).build(),
            TableCell::builder("Embodied total".bold()).build()
        ]];
        for profile in catalog.instance_types(*provider) {
            rows.push(row![
                TableCell::new(&profile.instance_type),
                TableCell::new(profile.v_cpus),
                TableCell::new(format!("{:.2}", profile.min_watts())),
                TableCell::new(format!("{:.2}", profile.max_watts())),
                TableCell::new(
                    profile
                        .embodied_emissions
                        .map(|total| format!("{:.1}", total))
                        .unwrap_or("--".to_string())
                )
            ]);
        }

        let table = Table::builder()
            .rows(rows)
            .style(TableStyle::rounded())
            .build();
        println!("{}", table.render());
    }
}

fn get_subscriber(env_filter: String) -> impl Subscriber + Sync + Send {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(env_filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .finish()
}

fn init_subscriber(subscriber: impl Subscriber + Sync + Send) {
    set_global_default(subscriber).expect("Failed to set subscriber");
}
