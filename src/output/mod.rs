use crate::residual::ResidualLoadSnapshot;
use crate::simulation::engine::SubstanceStatus;
use crate::simulation::{ChartPoint, CombinedPoint};
use crate::dosing::hours_between;
use crate::error::PKResult;
use std::path::Path;
use std::fs::File;
use log::info;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Everything one CLI run produces.
pub struct Exports<'a> {
    pub status: &'a SubstanceStatus,
    pub chart: &'a [ChartPoint],
    pub residual: &'a [ResidualLoadSnapshot],
    pub combined: Option<&'a [CombinedPoint]>,
}

pub fn save_results<P: AsRef<Path>>(exports: &Exports<'_>, output_dir: P) -> PKResult<()> {
    let output_path = output_dir.as_ref();
    let tag = exports.status.substance.tag();

    save_chart(exports.chart, output_path.join(format!("{}_chart.csv", tag)))?;
    save_residual_load(exports.residual, output_path.join(format!("{}_residual_load.csv", tag)))?;
    if let Some(combined) = exports.combined {
        save_combined_effects(combined, output_path.join("pain_relief_effects.csv"))?;
    }
    save_status(exports.status, output_path.join(format!("{}_status.json", tag)))?;
    generate_report(exports.status, exports.chart, output_path)?;

    info!("All results saved to {:?}", output_path);
    Ok(())
}

pub fn save_chart<P: AsRef<Path>>(points: &[ChartPoint], path: P) -> PKResult<()> {
    let mut writer = csv::Writer::from_path(path)?;

    writer.write_record(["TIME", "CONCENTRATION"])?;
    for point in points {
        writer.write_record(&[
            point.time.format(TIME_FORMAT).to_string(),
            format!("{:.4}", point.concentration),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

pub fn save_combined_effects<P: AsRef<Path>>(points: &[CombinedPoint], path: P) -> PKResult<()> {
    let mut writer = csv::Writer::from_path(path)?;

    writer.write_record(["TIME", "PARACETAMOL_EFFECT", "IBUPROFEN_EFFECT", "COMBINED_EFFECT"])?;
    for point in points {
        writer.write_record(&[
            point.time.format(TIME_FORMAT).to_string(),
            format!("{:.2}", point.paracetamol_effect),
            format!("{:.2}", point.ibuprofen_effect),
            format!("{:.2}", point.combined_effect),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

pub fn save_residual_load<P: AsRef<Path>>(snapshots: &[ResidualLoadSnapshot], path: P) -> PKResult<()> {
    let mut writer = csv::Writer::from_path(path)?;

    writer.write_record(["TIME", "SUBSTANCE", "RESIDUAL_AMOUNT"])?;
    for snapshot in snapshots {
        writer.write_record(&[
            snapshot.timestamp.format(TIME_FORMAT).to_string(),
            snapshot.substance.tag().to_string(),
            format!("{:.4}", snapshot.residual_amount),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

fn save_status<P: AsRef<Path>>(status: &SubstanceStatus, path: P) -> PKResult<()> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, status)?;
    Ok(())
}

/// Markdown summary of the current status and the sampled curve.
pub fn generate_report<P: AsRef<Path>>(status: &SubstanceStatus, chart: &[ChartPoint], output_dir: P) -> PKResult<()> {
    let report_path = output_dir.as_ref().join(format!("{}_report.md", status.substance.tag()));

    let peak = chart.iter().max_by(|a, b| a.concentration.total_cmp(&b.concentration));
    let effect_end = match status.effect_end {
        Some(end) if end <= status.at => "already negligible".to_string(),
        Some(end) => format!("{} (in {:.1} h)", end.format(TIME_FORMAT), hours_between(status.at, end)),
        None => "still active beyond the prediction horizon".to_string(),
    };

    let report_content = format!(
        r#"# {} Status Report

## Current Estimate ({})
- **Concentration**: {:.3} {}
- **Remaining amount**: {:.2} {}
- **Effect**: {:.1} % ({:?})
- **Effect end**: {}

## Sampled Curve
- **Points**: {}
- **Peak**: {}

## Notes
Estimates come from a simplified pharmacokinetic model for personal tracking.
They are not medical advice.
"#,
        status.substance.display_name(),
        status.at.format(TIME_FORMAT),
        status.concentration,
        status.concentration_unit,
        status.remaining_amount,
        status.dose_unit,
        status.effect_percent,
        status.level,
        effect_end,
        chart.len(),
        match peak {
            Some(point) => format!("{:.3} {} at {}", point.concentration, status.concentration_unit, point.time.format(TIME_FORMAT)),
            None => "n/a".to_string(),
        },
    );

    std::fs::write(report_path, report_content)?;
    Ok(())
}
