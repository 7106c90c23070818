//! Output formatting and persistence for the insights report.
//!
//! Renders the markdown report and the JSON summary, and writes the
//! per-country latest-metrics CSV. Numbers are rounded here and nowhere else.

use anyhow::Result;
use csv::WriterBuilder;
use std::fs;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::analyzers::types::{AggregateRow, LatestMetricsRow, Rate, TierMean};
use crate::report::InsightsReport;

pub const REPORT_FILE: &str = "insights_report.md";
pub const SUMMARY_FILE: &str = "summary_statistics.json";
pub const LATEST_METRICS_FILE: &str = "latest_metrics_by_country.csv";

/// Logs the headline numbers of a report.
pub fn print_summary(report: &InsightsReport) {
    let totals = &report.global_totals;
    info!(
        as_of = %report.as_of,
        total_cases = %format_count(totals.total_cases),
        total_deaths = %format_count(totals.total_deaths),
        mortality = %format_fraction_pct(totals.mortality_rate),
        "Global totals"
    );
}

/// Serializes the report as pretty-printed JSON.
pub fn summary_json(report: &InsightsReport) -> Result<String> {
    let mut json = serde_json::to_string_pretty(report)?;
    json.push('\n');
    Ok(json)
}

/// Paths of the files written by [`write_artifacts`].
#[derive(Debug)]
pub struct Artifacts {
    pub report: PathBuf,
    pub summary: PathBuf,
    pub latest_metrics: Option<PathBuf>,
}

/// Writes the markdown report and JSON summary into `out_dir`, plus the
/// latest-metrics CSV when `export_csv` is set. Existing files are replaced.
pub fn write_artifacts(
    report: &InsightsReport,
    out_dir: &Path,
    export_csv: bool,
) -> Result<Artifacts> {
    fs::create_dir_all(out_dir)?;

    let report_path = out_dir.join(REPORT_FILE);
    fs::write(&report_path, render_markdown(report))?;
    debug!(path = %report_path.display(), "Markdown report written");

    let summary_path = out_dir.join(SUMMARY_FILE);
    fs::write(&summary_path, summary_json(report)?)?;
    debug!(path = %summary_path.display(), "JSON summary written");

    let latest_metrics = if export_csv {
        let path = out_dir.join(LATEST_METRICS_FILE);
        write_latest_metrics_csv(&path, &report.latest_metrics)?;
        Some(path)
    } else {
        None
    };

    info!(out_dir = %out_dir.display(), export_csv, "Artifacts written");
    Ok(Artifacts {
        report: report_path,
        summary: summary_path,
        latest_metrics,
    })
}

/// Writes one row per entity with a header line, replacing any existing file.
pub fn write_latest_metrics_csv(path: &Path, rows: &[LatestMetricsRow]) -> Result<()> {
    debug!(path = %path.display(), rows = rows.len(), "Writing latest metrics CSV");

    let file = File::create(path)?;
    let mut writer = WriterBuilder::new().has_headers(true).from_writer(file);

    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;

    Ok(())
}

/// Renders the full markdown report.
pub fn render_markdown(report: &InsightsReport) -> String {
    let mut output = String::new();

    output.push_str("# COVID-19 Insights Report\n\n");
    output.push_str(&format!("Data as of **{}**.\n\n", report.as_of.format("%Y-%m-%d")));

    output.push_str(&overview_section(report));
    output.push_str(&global_totals_section(report));
    output.push_str(&ranking_section(
        "Most Affected Countries",
        "Ranked by total cases. Regional and income groupings are included.",
        &report.top_affected,
    ));
    output.push_str(&ranking_section(
        "Mortality by Country",
        "Ranked by deaths per confirmed case.",
        &report.mortality_ranking,
    ));
    output.push_str(&vaccination_leaders_section(report));
    output.push_str(&vaccination_impact_section(report));
    output.push_str(&correlation_section(report));
    output.push_str(&trends_section(report));
    output.push_str(&waves_section(report));
    output.push_str(&focus_section(report));

    output
}

fn overview_section(report: &InsightsReport) -> String {
    let overview = &report.overview;
    let mut section = String::new();

    section.push_str("## Dataset Overview\n\n");
    section.push_str(&format!("- **Rows:** {}\n", format_count(overview.rows as f64)));
    section.push_str(&format!(
        "- **Entities:** {} ({} regional or income groupings)\n",
        overview.entities, overview.aggregate_entities
    ));
    if let (Some(first), Some(last)) = (overview.first_date, overview.last_date) {
        section.push_str(&format!(
            "- **Date Range:** {} to {}\n",
            first.format("%Y-%m-%d"),
            last.format("%Y-%m-%d")
        ));
    }
    section.push('\n');

    let missing: Vec<_> = overview.missing.iter().filter(|m| m.missing > 0).collect();
    if !missing.is_empty() {
        section.push_str("| Column | Missing Values |\n");
        section.push_str("|--------|----------------|\n");
        for m in missing {
            section.push_str(&format!("| {} | {} |\n", m.column, format_count(m.missing as f64)));
        }
        section.push('\n');
    }

    section
}

fn global_totals_section(report: &InsightsReport) -> String {
    let totals = &report.global_totals;
    let mut section = String::new();

    section.push_str("## Global Totals\n\n");
    section.push_str(&format!("- **Countries:** {}\n", totals.entities));
    section.push_str(&format!("- **Total Cases:** {}\n", format_count(totals.total_cases)));
    section.push_str(&format!("- **Total Deaths:** {}\n", format_count(totals.total_deaths)));
    section.push_str(&format!(
        "- **Total Vaccinations:** {}\n",
        format_count(totals.total_vaccinations)
    ));
    section.push_str(&format!(
        "- **Global Mortality Rate:** {}\n\n",
        format_fraction_pct(totals.mortality_rate)
    ));

    section
}

fn ranking_section(title: &str, caption: &str, rows: &[AggregateRow]) -> String {
    let mut section = String::new();

    section.push_str(&format!("## {}\n\n{}\n\n", title, caption));
    if rows.is_empty() {
        section.push_str("_no data_\n\n");
        return section;
    }

    section.push_str("| Rank | Country | Total Cases | Total Deaths | Mortality Rate |\n");
    section.push_str("|------|---------|-------------|--------------|----------------|\n");
    for (i, row) in rows.iter().enumerate() {
        section.push_str(&format!(
            "| {} | {} | {} | {} | {} |\n",
            i + 1,
            escape_cell(&row.country),
            format_optional_count(row.total_cases),
            format_optional_count(row.total_deaths),
            format_fraction_pct(row.mortality_rate),
        ));
    }
    section.push('\n');

    section
}

fn vaccination_leaders_section(report: &InsightsReport) -> String {
    let mut section = String::new();

    section.push_str("## Vaccination Leaders\n\n");
    section.push_str(&format!(
        "Countries with a population of at least {}, ranked by share fully vaccinated.\n\n",
        format_count(report.min_population)
    ));
    if report.vaccination_leaders.is_empty() {
        section.push_str("_no data_\n\n");
        return section;
    }

    section.push_str("| Rank | Country | At Least One Dose | Fully Vaccinated |\n");
    section.push_str("|------|---------|-------------------|------------------|\n");
    for (i, leader) in report.vaccination_leaders.iter().enumerate() {
        section.push_str(&format!(
            "| {} | {} | {} | {:.1}% |\n",
            i + 1,
            escape_cell(&leader.country),
            format_pct(leader.at_least_one_dose_pct),
            leader.fully_vaccinated_pct,
        ));
    }
    section.push('\n');

    section
}

fn vaccination_impact_section(report: &InsightsReport) -> String {
    let impact = &report.vaccination_impact;
    let mut section = String::new();

    section.push_str("## Vaccination Impact\n\n");
    section.push_str("| Tier | Countries | Mean Mortality Rate |\n");
    section.push_str("|------|-----------|---------------------|\n");
    section.push_str(&format!(
        "| Highly vaccinated (> {:.1}%) | {} | {} |\n",
        impact.high_threshold,
        impact.highly_vaccinated.members,
        format_tier_mean(impact.highly_vaccinated.mean_mortality_rate),
    ));
    section.push_str(&format!(
        "| Less vaccinated (< {:.1}%) | {} | {} |\n\n",
        impact.low_threshold,
        impact.less_vaccinated.members,
        format_tier_mean(impact.less_vaccinated.mean_mortality_rate),
    ));

    section
}

fn correlation_section(report: &InsightsReport) -> String {
    let matrix = &report.correlation_matrix;
    let metrics = matrix.metrics();
    let mut section = String::new();

    section.push_str("## Correlation Matrix\n\n");
    section.push_str("Pearson coefficients over countries reporting both metrics.\n\n");

    section.push_str("| |");
    for metric in metrics {
        section.push_str(&format!(" {} |", metric.label()));
    }
    section.push_str("\n|---|");
    for _ in metrics {
        section.push_str("---|");
    }
    section.push('\n');

    for a in metrics {
        section.push_str(&format!("| **{}** |", a.label()));
        for b in metrics {
            let cell = matrix.get(*a, *b).unwrap_or(Rate::Undefined);
            section.push_str(&format!(" {} |", format_decimal(cell)));
        }
        section.push('\n');
    }
    section.push('\n');

    section
}

fn trends_section(report: &InsightsReport) -> String {
    let mut section = String::new();

    section.push_str(&format!("## Recent Trends ({}-day)\n\n", report.trend_window));
    if report.recent_trends.is_empty() {
        section.push_str("_no data_\n\n");
        return section;
    }

    section.push_str("| Rank | Country | Avg New Cases | Latest New Cases | Growth Factor |\n");
    section.push_str("|------|---------|---------------|------------------|---------------|\n");
    for (i, trend) in report.recent_trends.iter().enumerate() {
        section.push_str(&format!(
            "| {} | {} | {} | {} | {} |\n",
            i + 1,
            escape_cell(&trend.country),
            format_count(trend.mean_new_cases),
            format_optional_count(trend.latest_new_cases),
            format_decimal(trend.growth_factor),
        ));
    }
    section.push('\n');

    section
}

fn waves_section(report: &InsightsReport) -> String {
    let mut section = String::new();

    section.push_str(&format!("## Case Waves ({}-day average)\n\n", report.wave_window));
    if report.case_waves.is_empty() {
        section.push_str("_no data_\n\n");
        return section;
    }

    section.push_str("| Rank | Country | Waves | Avg New Cases | Direction |\n");
    section.push_str("|------|---------|-------|---------------|-----------|\n");
    for (i, wave) in report.case_waves.iter().enumerate() {
        section.push_str(&format!(
            "| {} | {} | {} | {} | {} |\n",
            i + 1,
            escape_cell(&wave.country),
            wave.waves,
            format_optional_count(wave.moving_average),
            if wave.rising { "rising" } else { "flat or falling" },
        ));
    }
    section.push('\n');

    section
}

fn focus_section(report: &InsightsReport) -> String {
    let mut section = String::new();

    section.push_str("## Focus Countries\n\n");
    if report.focus_countries.is_empty() {
        section.push_str("_no data_\n\n");
        return section;
    }

    section.push_str(
        "| Country | Date | Total Cases | Total Deaths | New Cases | Mortality Rate | Fully Vaccinated |\n",
    );
    section.push_str(
        "|---------|------|-------------|--------------|-----------|----------------|------------------|\n",
    );
    for snapshot in &report.focus_countries {
        section.push_str(&format!(
            "| {} | {} | {} | {} | {} | {} | {} |\n",
            escape_cell(&snapshot.country),
            snapshot.date.format("%Y-%m-%d"),
            format_optional_count(snapshot.total_cases),
            format_optional_count(snapshot.total_deaths),
            format_optional_count(snapshot.new_cases),
            format_fraction_pct(snapshot.mortality_rate),
            format_pct(snapshot.vaccination_rate.percent()),
        ));
    }
    section.push('\n');

    section
}

/// Rounds to a whole number and groups thousands: `343999.0` → `343,999`.
pub fn format_count(value: f64) -> String {
    let rounded = value.round();
    let digits = format!("{:.0}", rounded.abs());
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);

    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    if rounded < 0.0 {
        format!("-{}", grouped)
    } else {
        grouped
    }
}

fn format_optional_count(value: Option<f64>) -> String {
    value.map(format_count).unwrap_or_else(|| "-".to_string())
}

/// A fraction as a percentage with two decimals: `0.016538` → `1.65%`.
pub fn format_fraction_pct(rate: Rate) -> String {
    match rate {
        Rate::Value(v) => format!("{:.2}%", v * 100.0),
        Rate::Undefined => "undefined".to_string(),
    }
}

/// An already-scaled percentage with one decimal: `78.34` → `78.3%`.
pub fn format_pct(rate: Rate) -> String {
    match rate {
        Rate::Value(v) => format!("{:.1}%", v),
        Rate::Undefined => "undefined".to_string(),
    }
}

fn format_decimal(rate: Rate) -> String {
    match rate {
        Rate::Value(v) => format!("{:.2}", v),
        Rate::Undefined => "undefined".to_string(),
    }
}

fn format_tier_mean(mean: TierMean) -> String {
    match mean {
        TierMean::Mean(v) => format!("{:.2}%", v * 100.0),
        TierMean::NoData => "no data".to_string(),
    }
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use crate::report::build_report;
    use crate::table::Table;
    use crate::table::tests::record;
    use std::env;

    fn temp_dir(name: &str) -> PathBuf {
        env::temp_dir().join(name)
    }

    fn sample_report() -> InsightsReport {
        let mut kenya = record("Kenya", "2022-11-01");
        kenya.total_cases = Some(343_999.0);
        kenya.total_deaths = Some(5_689.0);
        kenya.population = Some(54_027_484.0);
        kenya.people_vaccinated = Some(13_000_000.0);
        kenya.people_fully_vaccinated = Some(10_000_000.0);
        let mut empty = record("Nowhere", "2022-11-01");
        empty.total_cases = Some(0.0);
        empty.total_deaths = Some(0.0);

        let table = Table::new(vec![kenya, empty]);
        build_report(&table, &AnalysisConfig::default()).unwrap()
    }

    #[test]
    fn test_format_count_groups_thousands() {
        assert_eq!(format_count(0.0), "0");
        assert_eq!(format_count(999.0), "999");
        assert_eq!(format_count(343_999.0), "343,999");
        assert_eq!(format_count(1_234_567.4), "1,234,567");
        assert_eq!(format_count(-1_500.0), "-1,500");
    }

    #[test]
    fn test_percentage_formats() {
        assert_eq!(format_fraction_pct(Rate::ratio(5689.0, 343999.0)), "1.65%");
        assert_eq!(format_pct(Rate::Value(78.34)), "78.3%");
        assert_eq!(format_pct(Rate::Undefined), "undefined");
        assert_eq!(format_tier_mean(TierMean::NoData), "no data");
    }

    #[test]
    fn test_markdown_contains_sections_and_markers() {
        let markdown = render_markdown(&sample_report());

        assert!(markdown.starts_with("# COVID-19 Insights Report"));
        for heading in [
            "## Dataset Overview",
            "## Global Totals",
            "## Most Affected Countries",
            "## Mortality by Country",
            "## Vaccination Leaders",
            "## Vaccination Impact",
            "## Correlation Matrix",
            "## Recent Trends (7-day)",
            "## Case Waves (30-day average)",
            "## Focus Countries",
        ] {
            assert!(markdown.contains(heading), "missing {}", heading);
        }
        assert!(markdown.contains("| 1 | Kenya | 343,999 | 5,689 | 1.65% |"));
        assert!(markdown.contains("| 2 | Nowhere | 0 | 0 | undefined |"));
        assert!(markdown.contains("no data"));
    }

    #[test]
    fn test_summary_json_mirrors_report() {
        let json = summary_json(&sample_report()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["as_of"], "2022-11-01");
        assert_eq!(value["top_affected"][1]["mortality_rate"], "undefined");
        assert_eq!(
            value["correlation_matrix"]["mortality_rate"]["mortality_rate"],
            1.0
        );
        assert!(value.get("latest_metrics").is_none());
    }

    #[test]
    fn test_write_artifacts_is_idempotent() {
        let dir = temp_dir("covid_insights_artifacts_test");
        let _ = fs::remove_dir_all(&dir);
        let report = sample_report();

        let first = write_artifacts(&report, &dir, true).unwrap();
        let markdown = fs::read(&first.report).unwrap();
        let json = fs::read(&first.summary).unwrap();

        let second = write_artifacts(&report, &dir, true).unwrap();
        assert_eq!(markdown, fs::read(&second.report).unwrap());
        assert_eq!(json, fs::read(&second.summary).unwrap());

        let csv = fs::read_to_string(second.latest_metrics.unwrap()).unwrap();
        let lines: Vec<_> = csv.lines().collect();
        // header + 2 entities
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("country,aggregate,last_date"));

        fs::remove_dir_all(&dir).unwrap();
    }
}
