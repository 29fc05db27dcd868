use std::path::Path;

use ccm_analyze::{analyze, ComplianceReport, Outlook};
use ccm_conductor::state::persist::read_result;

pub fn execute(result_path: &Path, json: bool) -> anyhow::Result<()> {
    let result = read_result(result_path)?;
    let report = analyze(&result);
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", render(&report));
    }
    Ok(())
}

fn marker(outlook: Outlook) -> &'static str {
    match outlook {
        Outlook::Positive => "+",
        Outlook::Negative => "!",
        Outlook::Neutral => " ",
    }
}

fn render(report: &ComplianceReport) -> String {
    let mut out = String::new();
    out.push_str(&format!("{} ({})\n", report.url, report.audit_id));
    match &report.provider {
        Some(p) => out.push_str(&format!("Consent platform: {p}\n")),
        None => out.push_str("Consent platform: none detected\n"),
    }
    for phase in &report.phases {
        out.push('\n');
        if !phase.captured {
            out.push_str(&format!("[{}] not captured\n", phase.label));
            continue;
        }
        let c = &phase.counts;
        out.push_str(&format!(
            "[{}] {} cookies ({} first-party, {} third-party, {} platform), {} requests\n",
            phase.label,
            c.cookies,
            c.first_party_cookies,
            c.third_party_cookies,
            c.ccm_provider_cookies,
            c.requests
        ));
        for f in &phase.flags {
            out.push_str(&format!(
                "  {} {:<28} {:<5} {}\n",
                marker(f.outlook),
                f.flag.as_str(),
                f.value,
                f.meaning
            ));
        }
    }
    let negatives = report.negatives().count();
    out.push_str(&format!("\n{negatives} negative finding(s), {} error(s)", report.error_count));
    if report.fatal {
        out.push_str(", audit incomplete");
    }
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ccm_conductor::state::persist::save_result;
    use ccm_core::{AuditResult, CookieRecord, PartyClass, Phase, PhaseState, RawCookie};

    fn result() -> AuditResult {
        let mut result = AuditResult::new("abc", "https://example.com/");
        let mut state = PhaseState::empty(Phase::PreConsent);
        state.cookies = vec![CookieRecord {
            classification: Some(PartyClass::ThirdParty),
            ..CookieRecord::from_raw(&RawCookie {
                name: "_ga".into(),
                domain: "google-analytics.com".into(),
                ..Default::default()
            })
        }];
        result.page_landing = Some(state);
        result
    }

    #[test]
    fn render_marks_negatives() {
        let text = render(&analyze(&result()));
        assert!(text.contains("Consent platform: none detected"));
        assert!(text.contains("! no_third_party_cookies"));
        assert!(text.contains("not captured"));
        assert!(text.contains("1 negative finding(s), 0 error(s)"));
    }

    #[test]
    fn execute_reads_saved_result() {
        let tmp = tempfile::tempdir().unwrap();
        let path = save_result(tmp.path(), &result()).unwrap();
        execute(&path, true).unwrap();
        assert!(execute(&tmp.path().join("missing.json"), false).is_err());
    }
}
