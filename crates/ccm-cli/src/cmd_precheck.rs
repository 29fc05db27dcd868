use ccm_precheck::{UrlProcessor, UrlResult};

pub fn execute(urls: &[String], json: bool) -> anyhow::Result<()> {
    let results = UrlProcessor::new().process_urls(urls);
    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        for r in &results {
            println!("{}", render(r));
        }
    }
    let invalid = results.iter().filter(|r| !r.is_valid).count();
    tracing::info!(checked = results.len(), invalid, "precheck done");
    Ok(())
}

fn render(r: &UrlResult) -> String {
    let mark = if r.is_valid { "ok " } else { "ERR" };
    match &r.error_message {
        Some(msg) => format!("{mark} {} ({msg})", r.requested_url),
        None if r.destination_url != r.requested_url.trim_end_matches('/') => {
            format!("{mark} {} [{}] -> {}", r.requested_url, r.status_code, r.destination_url)
        }
        None => format!("{mark} {} [{}]", r.requested_url, r.status_code),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_lines() {
        let ok = UrlResult {
            requested_url: "https://example.com/".into(),
            destination_url: "https://example.com".into(),
            status_code: 200,
            domain: "example.com".into(),
            is_valid: true,
            error_message: None,
        };
        assert_eq!(render(&ok), "ok  https://example.com/ [200]");

        let moved = UrlResult {
            destination_url: "https://www.example.com".into(),
            status_code: 301,
            ..ok.clone()
        };
        assert_eq!(
            render(&moved),
            "ok  https://example.com/ [301] -> https://www.example.com"
        );

        let bad = UrlResult {
            requested_url: "nope".into(),
            error_message: Some("Invalid URL format".into()),
            ..Default::default()
        };
        assert_eq!(render(&bad), "ERR nope (Invalid URL format)");
    }
}
