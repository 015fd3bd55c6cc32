#[cfg(test)]
mod tests {
    use super::super::*;

    #[test]
    fn user_agent_matches_crate_name_and_version() {
        let sink = WebhookSink::new("https://example.com/webhook".to_string());
        let expected = format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
        assert_eq!(sink.user_agent, expected);
    }

    #[test]
    fn payload_omits_html_body_when_absent() {
        let payload = EmailPayload {
            sender: "a@x".to_string(),
            recipients: vec!["b@x".to_string()],
            subject: "hi".to_string(),
            body: "hello".to_string(),
            html_body: None,
        };

        let json = serde_json::to_string(&payload).unwrap();
        assert!(!json.contains("html_body"));
    }

    #[test]
    fn payload_includes_html_body_when_present() {
        let payload = EmailPayload {
            sender: "a@x".to_string(),
            recipients: vec!["b@x".to_string()],
            subject: "hi".to_string(),
            body: "hello".to_string(),
            html_body: Some("<p>hello</p>".to_string()),
        };

        let json = serde_json::to_string(&payload).unwrap();
        assert!(json.contains("html_body"));
    }
}
