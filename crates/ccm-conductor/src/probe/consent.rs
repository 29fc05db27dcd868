use ccm_core::{AuditError, ConsentAction, ConsentKind, ProviderSignature};
use tracing::info;

use crate::browser::{BrowserError, BrowserSession};

/// Click the first displayed control of `kind` in the platform's id order.
///
/// Missing or hidden controls move on to the next id. An error on a found,
/// visible control ends the search. The returned error, if any, is what
/// the audit should record.
pub async fn click_consent(
    browser: &mut dyn BrowserSession,
    provider: &ProviderSignature,
    kind: ConsentKind,
) -> (ConsentAction, Option<AuditError>) {
    let mut action = ConsentAction::not_performed(kind);
    action.performed = true;
    let mut saw_hidden = false;

    for id in provider.element_ids(kind) {
        let el = match browser.find_element_by_id(id).await {
            Ok(Some(el)) => el,
            Ok(None) | Err(BrowserError::NoSuchElement(_)) => continue,
            Err(e) => return fail(action, id, e),
        };
        match browser.element_displayed(el).await {
            Ok(true) => {}
            Ok(false) => {
                saw_hidden = true;
                continue;
            }
            Err(BrowserError::NoSuchElement(_)) => continue,
            Err(e) => return fail(action, id, e),
        }

        action.button_found = true;
        action.button_id = Some(id.clone());
        if let Err(e) = browser.click(el).await {
            return fail(action, id, e);
        }
        action.succeeded = true;
        info!(action = %kind, button = %id, provider = %provider.provider_name, "consent clicked");
        return (action, None);
    }

    let msg = format!("No visible {kind} button found");
    action.error = Some(msg.clone());
    let err = if saw_hidden {
        AuditError::ElementNotVisible(msg)
    } else {
        AuditError::ElementNotFound(msg)
    };
    (action, Some(err))
}

fn fail(
    mut action: ConsentAction,
    id: &str,
    e: BrowserError,
) -> (ConsentAction, Option<AuditError>) {
    action.error = Some(format!("Error clicking button: {e}"));
    (action, Some(e.into_audit(id)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::scripted::{ScriptedBrowserFactory, SiteFixture};
    use crate::browser::BrowserFactory;
    use ccm_core::ErrorKind;

    async fn click(yaml: &str, kind: ConsentKind) -> (ConsentAction, Option<AuditError>) {
        let factory = ScriptedBrowserFactory::new(SiteFixture::from_yaml(yaml).unwrap());
        let mut b = factory.launch().await.unwrap();
        b.navigate("https://example.com/").await.unwrap();
        let provider = ccm_core::provider::onetrust();
        click_consent(b.as_mut(), &provider, kind).await
    }

    #[tokio::test]
    async fn first_visible_control_wins() {
        let (action, err) = click(
            r#"
url: https://example.com/
elements:
  - { id: onetrust-accept-btn-handler, tag: button, displayed: false }
  - { id: accept-all-cookies-button, tag: button, consent: accept }
"#,
            ConsentKind::Accept,
        )
        .await;
        assert!(err.is_none());
        assert!(action.performed && action.succeeded && action.button_found);
        assert_eq!(action.button_id.as_deref(), Some("accept-all-cookies-button"));
    }

    #[tokio::test]
    async fn no_control_reports_not_found() {
        let (action, err) = click("url: https://example.com/\n", ConsentKind::Reject).await;
        assert!(action.performed);
        assert!(!action.button_found);
        assert!(!action.succeeded);
        assert_eq!(action.error.as_deref(), Some("No visible reject button found"));
        assert_eq!(err.unwrap().kind(), ErrorKind::ElementNotFound);
    }

    #[tokio::test]
    async fn hidden_control_reports_not_visible() {
        let (_, err) = click(
            r#"
url: https://example.com/
elements:
  - { id: onetrust-reject-all-handler, tag: button, displayed: false }
"#,
            ConsentKind::Reject,
        )
        .await;
        assert_eq!(err.unwrap().kind(), ErrorKind::ElementNotVisible);
    }

    #[tokio::test]
    async fn click_error_stops_search() {
        let (action, err) = click(
            r#"
url: https://example.com/
elements:
  - { id: onetrust-reject-all-handler, tag: button, click_error: "element click intercepted" }
  - { id: reject-all-cookies-button, tag: button, consent: reject }
"#,
            ConsentKind::Reject,
        )
        .await;
        assert!(action.button_found);
        assert!(!action.succeeded);
        assert!(action
            .error
            .as_deref()
            .unwrap()
            .starts_with("Error clicking button:"));
        assert_eq!(err.unwrap().kind(), ErrorKind::ScriptExecutionFailure);
    }
}
