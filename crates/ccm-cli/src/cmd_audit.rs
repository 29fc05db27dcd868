use std::path::{Path, PathBuf};
use std::sync::Arc;

use ccm_analyze::{summarize, AuditSummary};
use ccm_conductor::browser::scripted::{ScriptedBrowserFactory, SiteFixture};
use ccm_conductor::state::persist::{load_result, result_path};
use ccm_conductor::Conductor;
use ccm_core::AuditResult;
use tracing::warn;

use crate::config::CliConfig;

pub fn execute(
    cfg: &CliConfig,
    out_dir: &Path,
    fixture_path: &Path,
    url: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let fixture = SiteFixture::from_path(fixture_path)?;
    let url = url.map(str::to_string).unwrap_or_else(|| fixture.url.clone());

    let rt = tokio::runtime::Runtime::new()?;
    let result = rt.block_on(run(cfg, out_dir, fixture, &url))?;

    let saved = verify_saved(out_dir, &result);
    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_summary(&summarize(&result));
    }
    let path = saved?;
    if !json {
        println!("Saved: {}", path.display());
    }
    Ok(())
}

/// The conductor only warns when saving fails, so read the file back.
fn verify_saved(out_dir: &Path, result: &AuditResult) -> anyhow::Result<PathBuf> {
    let path = result_path(out_dir, &result.audit_id);
    match load_result(out_dir, &result.audit_id) {
        Ok(Some(saved)) if saved == *result => Ok(path),
        Ok(_) => anyhow::bail!("result was not saved to {}", path.display()),
        Err(e) => {
            warn!(error = %e, "saved result unreadable");
            Err(e.context(format!("result was not saved to {}", path.display())))
        }
    }
}

async fn run(
    cfg: &CliConfig,
    out_dir: &Path,
    fixture: SiteFixture,
    url: &str,
) -> anyhow::Result<AuditResult> {
    let conductor = Conductor::new(
        Arc::new(ScriptedBrowserFactory::new(fixture)),
        Arc::new(cfg.registry()?),
        cfg.audit.clone(),
    )
    .with_output(out_dir);
    Ok(conductor.create_result(url).await)
}

fn yes_no(v: bool) -> &'static str {
    if v {
        "yes"
    } else {
        "no"
    }
}

fn print_summary(s: &AuditSummary) {
    println!("URL:      {}", s.url);
    if let Some(status) = s.status {
        println!("Status:   {status}");
    }
    match &s.provider {
        Some(p) => println!("Banner:   {p}"),
        None => println!("Banner:   {}", yes_no(s.banner_found)),
    }
    if let Some(accessible) = s.accessible {
        println!("Usable behind banner: {}", yes_no(accessible));
    }
    println!(
        "Cookies:  initial {} / accept {} / reject {}",
        s.initial_cookies, s.accept_cookies, s.reject_cookies
    );
    println!(
        "Consent:  accept {} / reject {}",
        yes_no(s.accept_successful),
        yes_no(s.reject_successful)
    );
    if s.has_errors {
        println!("Errors recorded; see result.json");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ccm_conductor::state::persist::load_result;
    use ccm_conductor::AuditConfig;

    const SITE: &str = r#"
url: https://shop.example.com/
elements:
  - { id: didomi-notice, tag: div, banner: true }
  - { id: didomi-notice-agree-button, tag: button, parent: didomi-notice, consent: accept, text: Agree }
  - { id: didomi-notice-disagree-button, tag: button, parent: didomi-notice, consent: reject, text: Disagree }
initial:
  cookies:
    - { name: cart, value: "1", domain: shop.example.com }
accepted:
  cookies:
    - { name: _ga, value: x, domain: .example.com }
"#;

    #[test]
    fn replays_fixture_and_persists() {
        let tmp = tempfile::tempdir().unwrap();
        let fixture = SiteFixture::from_yaml(SITE).unwrap();
        let cfg = CliConfig {
            audit: AuditConfig::instant(),
            ..CliConfig::default()
        };

        let rt = tokio::runtime::Runtime::new().unwrap();
        let result = rt
            .block_on(run(&cfg, tmp.path(), fixture, "https://shop.example.com/"))
            .unwrap();
        assert!(result.ccm_detection.banner_found);
        assert!(result.accept_flow.consent.succeeded);

        let saved = load_result(tmp.path(), &result.audit_id).unwrap().unwrap();
        assert_eq!(saved.audit_id, result.audit_id);
        let s = summarize(&saved);
        assert_eq!(s.accept_cookies, 2);
        assert_eq!(s.initial_cookies, 1);
    }

    #[test]
    fn execute_reads_fixture_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("site.yaml");
        std::fs::write(&path, SITE).unwrap();
        let out = tmp.path().join("out");
        let cfg = CliConfig {
            audit: AuditConfig::instant(),
            ..CliConfig::default()
        };
        execute(&cfg, &out, &path, None, true).unwrap();
        let id = ccm_conductor::audit_id("https://shop.example.com/");
        assert!(result_path(&out, &id).exists());
    }

    #[test]
    fn unwritable_output_dir_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("site.yaml");
        std::fs::write(&path, SITE).unwrap();
        let blocked = tmp.path().join("blocked");
        std::fs::write(&blocked, "not a directory").unwrap();
        let cfg = CliConfig {
            audit: AuditConfig::instant(),
            ..CliConfig::default()
        };

        let err = execute(&cfg, &blocked, &path, None, false).unwrap_err();
        assert!(err.to_string().contains("not saved"), "{err:#}");
    }

    #[test]
    fn stale_result_does_not_count_as_saved() {
        let tmp = tempfile::tempdir().unwrap();
        let mut stale = AuditResult::new("abc", "https://shop.example.com/");
        ccm_conductor::state::persist::save_result(tmp.path(), &stale).unwrap();
        stale.url_info.domain = "changed.example".into();
        assert!(verify_saved(tmp.path(), &stale).is_err());
    }
}
