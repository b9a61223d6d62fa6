//! One full evaluation: configuration in, [`Output`] out.

use crate::capability::Capabilities;
use crate::config::{EvaluationMode, RunConfig};
use crate::dataset::Dataset;
use crate::engine::{compute_density, DensityField, DensitySettings};
use crate::error::{Advisory, Result};
use crate::filter::{Region, ValidityMask};
use crate::output::{Count, ModeKind, Output, RegionStatistics};
use crate::risk::{self, cross_section_nm2};
use crate::track::Track;

/// Run one configuration against a dataset.
///
/// Pure: nothing is cached between calls, so the same inputs always give the
/// same output. Configuration and range problems fail before any
/// computation; soft problems come back as advisories on the output.
pub fn evaluate(
    config: &RunConfig,
    dataset: &Dataset,
    capabilities: &Capabilities,
) -> Result<Output> {
    config.validate()?;
    let (statistics, negotiated) = capabilities.negotiate(&config.statistics);

    let table = dataset.table();
    let region = match &config.mode {
        EvaluationMode::Area(bounds) => Region::from(bounds),
        EvaluationMode::Track(track) => Region::from(track),
    };

    let mut advisories = Vec::new();
    if let EvaluationMode::Track(track) = &config.mode {
        advisories.extend(track.low_altitude_advisories());
    }

    let mask = ValidityMask::build(
        table,
        &region,
        &config.filters,
        &config.coverage,
        config.airspace_class.as_ref(),
    )?;

    let field = compute_density(
        table,
        &mask,
        DensitySettings {
            coverage: &config.coverage,
            noncoop: &config.noncoop,
            statistics: &statistics,
        },
        capabilities,
    );
    advisories.extend(field.advisories.iter().cloned());

    let cross_section = cross_section_nm2(&config.geometry);
    let mut output = match &config.mode {
        EvaluationMode::Area(_) => {
            evaluate_area(config, dataset, mask, &field, cross_section, &mut advisories)
        }
        EvaluationMode::Track(track) => evaluate_track(
            config,
            dataset,
            track,
            mask,
            &field,
            cross_section,
            &mut advisories,
        ),
    };

    for advisory in &advisories {
        advisory.log();
    }
    output.advisories = negotiated.into_iter().chain(advisories).collect();

    tracing::info!(
        "{:?} evaluation: density {:.4e} AC/NM^3, rate {:.4e} /hr, {} advisories",
        output.mode,
        output.density,
        output.rate,
        output.advisories.len()
    );
    Ok(output)
}

fn evaluate_area(
    config: &RunConfig,
    dataset: &Dataset,
    mask: ValidityMask,
    field: &DensityField,
    cross_section: f64,
    advisories: &mut Vec<Advisory>,
) -> Output {
    let table = dataset.table();
    if mask.is_empty() {
        advisories.push(Advisory::data_absence(
            "no grid cell matches the selected area and filters",
        ));
    } else if field.totals.exposure <= 0.0 {
        advisories.push(Advisory::data_absence(
            "selected area and filters have no observation hours",
        ));
    }

    let cells = risk::cell_results(field, dataset, config.own_speed_kts, cross_section);
    let (rate, relative_speed) = risk::regional_rate(&cells, cross_section);
    let totals = &field.totals;

    Output {
        mode: ModeKind::Area,
        density: totals.density,
        rate,
        count: Count {
            aircraft: totals.aircraft,
            aircraft_hours: totals.raw_count,
        },
        summarize: risk::summarize(&cells, table, cross_section),
        airspace_class: risk::area_airspace_mix(table, &mask),
        statistics: region_statistics(field, relative_speed, cross_section),
        cells,
        track: None,
        mask,
        lat_cutpoints: table.grid().lat_cutpoints().to_vec(),
        lon_cutpoints: table.grid().lon_cutpoints().to_vec(),
        advisories: Vec::new(),
    }
}

fn evaluate_track(
    config: &RunConfig,
    dataset: &Dataset,
    track: &Track,
    mask: ValidityMask,
    field: &DensityField,
    cross_section: f64,
    advisories: &mut Vec<Advisory>,
) -> Output {
    let table = dataset.table();
    let evaluation = risk::evaluate_track(
        track,
        field,
        dataset,
        config.own_speed_kts,
        cross_section,
        config.altitude_rule,
    );
    advisories.extend(evaluation.advisories.iter().cloned());

    // per-cell context over the track's bounding box
    let mean_speed = track.samples().iter().map(|s| s.speed_kts).sum::<f64>()
        / track.len() as f64;
    let cells = risk::cell_results(
        field,
        dataset,
        Some(config.own_speed_kts.unwrap_or(mean_speed)),
        cross_section,
    );

    Output {
        mode: ModeKind::Track,
        density: evaluation.mean_density,
        rate: evaluation.rate(),
        count: Count {
            aircraft: evaluation.result.expected_encounters,
            aircraft_hours: evaluation.observed_aircraft_hours,
        },
        summarize: risk::summarize(&cells, table, cross_section),
        airspace_class: evaluation.airspace_class.clone(),
        statistics: region_statistics(field, evaluation.mean_relative_speed_kts, cross_section),
        cells,
        track: Some(evaluation.result),
        mask,
        lat_cutpoints: table.grid().lat_cutpoints().to_vec(),
        lon_cutpoints: table.grid().lon_cutpoints().to_vec(),
        advisories: Vec::new(),
    }
}

fn region_statistics(
    field: &DensityField,
    relative_speed_kts: f64,
    cross_section: f64,
) -> RegionStatistics {
    let density_ub = field.totals.density_ub;
    RegionStatistics {
        density_ub,
        rate_ub: density_ub.map(|ub| risk::encounter_rate(ub, relative_speed_kts, cross_section)),
        density_max: field.totals.density_max,
    }
}
