use pricepromo_core::config::{AppConfig, LoadOptions};
use pricepromo_core::holiday::{HolidayCalendar, Region};
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> String {
    let report = build_report(AppConfig::load(LoadOptions::default()));

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
    }

    render_human(&report)
}

fn build_report(
    loaded: Result<AppConfig, pricepromo_core::config::ConfigError>,
) -> DoctorReport {
    let mut checks = Vec::new();

    match loaded {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_holiday_calendar(&config));
            checks.push(check_llm_credential(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in ["holiday_calendar", "llm_credential"] {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    let all_pass = checks.iter().all(|check| check.status != CheckStatus::Fail);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_holiday_calendar(config: &AppConfig) -> DoctorCheck {
    let region_code = &config.pipeline.default_region;
    if Region::from_code(region_code).is_none() {
        return DoctorCheck {
            name: "holiday_calendar",
            status: CheckStatus::Fail,
            details: format!(
                "no holiday calendar for default region `{region_code}`; RU would be used"
            ),
        };
    }

    let calendar = HolidayCalendar::new(region_code);
    match calendar.lookup(region_code, config.pipeline.reference_date) {
        Ok(in_window) => DoctorCheck {
            name: "holiday_calendar",
            status: CheckStatus::Pass,
            details: format!(
                "{} calendar resolves {}; holiday window {}",
                calendar.fallback().code(),
                config.pipeline.reference_date,
                if in_window { "active" } else { "inactive" }
            ),
        },
        Err(error) => DoctorCheck {
            name: "holiday_calendar",
            status: CheckStatus::Fail,
            details: error.to_string(),
        },
    }
}

/// A missing credential is a supported mode, so it is reported as skipped.
fn check_llm_credential(config: &AppConfig) -> DoctorCheck {
    match config.llm.credential() {
        Some(_) => DoctorCheck {
            name: "llm_credential",
            status: CheckStatus::Pass,
            details: format!(
                "credential configured; LLM recommendations via model `{}`",
                config.llm.model
            ),
        },
        None => DoctorCheck {
            name: "llm_credential",
            status: CheckStatus::Skipped,
            details: "no credential configured; rule-based recommendations".to_string(),
        },
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
