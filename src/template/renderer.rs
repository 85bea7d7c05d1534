//! Template validation and rendering.

use serde_json::Value as Json;

use super::engine::{self, FuncMap, Mode, Value};
use super::types::{
    RenderedTemplate, Template, TemplateError, TemplateResult, Variables, CONTENT_TYPE_HTML,
};

/// Validates and renders template text.
///
/// Rendering is pure: no I/O, no shared mutable state. It never looks at the
/// template's status; callers decide whether a template may be rendered.
pub trait TemplateRenderer: Send + Sync {
    /// Parse `content` without executing it. Empty content is valid.
    fn validate_template(&self, content: &str) -> TemplateResult<()>;

    /// Render subject (plain text, trimmed) and content (HTML-escaped).
    /// A missing variable map renders as an empty one.
    fn render(
        &self,
        template: &Template,
        variables: Option<&Variables>,
    ) -> TemplateResult<RenderedTemplate>;
}

/// Renderer for Go-style templates with contextual HTML escaping.
#[derive(Debug, Clone)]
pub struct HtmlTemplateRenderer {
    funcs: FuncMap,
}

impl Default for HtmlTemplateRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl HtmlTemplateRenderer {
    /// Renderer with the standard helper functions.
    pub fn new() -> Self {
        Self::with_funcs(FuncMap::with_helpers())
    }

    pub fn with_funcs(funcs: FuncMap) -> Self {
        Self { funcs }
    }

    fn execute(&self, source: &str, mode: Mode, data: &Value, part: &str) -> TemplateResult<String> {
        if source.is_empty() {
            return Ok(String::new());
        }

        let tree = engine::parse(source, &self.funcs)
            .map_err(|e| TemplateError::RenderFailed(format!("{}: {}", part, e)))?;

        engine::execute(&tree, &self.funcs, mode, data)
            .map_err(|e| TemplateError::RenderFailed(format!("{}: {}", part, e)))
    }
}

impl TemplateRenderer for HtmlTemplateRenderer {
    fn validate_template(&self, content: &str) -> TemplateResult<()> {
        engine::parse(content, &self.funcs)
            .map(|_| ())
            .map_err(|e| TemplateError::Syntax(e.to_string()))
    }

    fn render(
        &self,
        template: &Template,
        variables: Option<&Variables>,
    ) -> TemplateResult<RenderedTemplate> {
        let data = Value::Data(Json::Object(variables.cloned().unwrap_or_default()));

        let subject = self.execute(template.subject(), Mode::Text, &data, "subject")?;
        let content = self.execute(template.content(), Mode::Html, &data, "content")?;

        Ok(RenderedTemplate {
            subject: subject.trim().to_string(),
            content,
            content_type: CONTENT_TYPE_HTML.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::types::ErrorKind;
    use serde_json::json;

    fn template(subject: &str, content: &str) -> Template {
        Template::new("Test", "test", subject, content, "email", vec![], "", 1).unwrap()
    }

    fn vars(value: Json) -> Variables {
        match value {
            Json::Object(map) => map,
            _ => panic!("variables must be an object"),
        }
    }

    fn render(subject: &str, content: &str, variables: Option<Json>) -> RenderedTemplate {
        let variables = variables.map(vars);
        HtmlTemplateRenderer::new()
            .render(&template(subject, content), variables.as_ref())
            .unwrap()
    }

    #[test]
    fn test_simple_email_template() {
        let rendered = render(
            "Welcome {{.Name}}!",
            "<h1>Hello {{.Name}}</h1>",
            Some(json!({"Name": "John Doe"})),
        );
        assert_eq!(
            rendered,
            RenderedTemplate {
                subject: "Welcome John Doe!".to_string(),
                content: "<h1>Hello John Doe</h1>".to_string(),
                content_type: "text/html".to_string(),
            }
        );
    }

    #[test]
    fn test_helper_functions() {
        let rendered = render(
            "Welcome {{upper .Name}}!",
            "<h1>Hello {{title .Name}}</h1><p>Your email: {{lower .Email}}</p>",
            Some(json!({"Name": "john doe", "Email": "JOHN@EXAMPLE.COM"})),
        );
        assert_eq!(rendered.subject, "Welcome JOHN DOE!");
        assert_eq!(
            rendered.content,
            "<h1>Hello John Doe</h1><p>Your email: john@example.com</p>"
        );
    }

    #[test]
    fn test_default_function() {
        let content = r#"{{default "User" .Name}}"#;
        assert_eq!(render("", content, Some(json!({}))).content, "User");
        assert_eq!(render("", content, Some(json!({"Name": "Ann"}))).content, "Ann");
        assert_eq!(
            render(r#"Hello {{default "User" .Name}}"#, "x", Some(json!({"Name": "John"}))).subject,
            "Hello John"
        );
    }

    #[test]
    fn test_absent_variables() {
        let rendered = render("Hello World", "Hello {{.Name}}", None);
        assert_eq!(rendered.subject, "Hello World");
        assert_eq!(rendered.content, "Hello ");
    }

    #[test]
    fn test_missing_variable_subject_is_trimmed() {
        let rendered = render("Hello {{.Name}}", "<p>Hello {{.Name}}</p>", Some(json!({})));
        assert_eq!(rendered.subject, "Hello");
        assert_eq!(rendered.content, "<p>Hello </p>");
    }

    #[test]
    fn test_content_is_escaped_subject_is_not() {
        let rendered = render(
            "{{.Title}}",
            "<p>{{.Title}}</p>{{safeHTML .Footer}}",
            Some(json!({"Title": "Tom & Jerry <live>", "Footer": "<hr>"})),
        );
        assert_eq!(rendered.subject, "Tom & Jerry <live>");
        assert_eq!(
            rendered.content,
            "<p>Tom &amp; Jerry &lt;live&gt;</p><hr>"
        );
    }

    #[test]
    fn test_unicode_variable_names() {
        let renderer = HtmlTemplateRenderer::new();
        assert!(renderer.validate_template("{{.Tên}}").is_ok());

        let rendered = render(
            "Chào {{.Tên}}",
            "<p>Mã: {{.Mã_OTP}}</p>",
            Some(json!({"Tên": "Lan", "Mã_OTP": "4+2"})),
        );
        assert_eq!(rendered.subject, "Chào Lan");
        assert_eq!(rendered.content, "<p>Mã: 4&#43;2</p>");
    }

    #[test]
    fn test_empty_subject_renders_empty() {
        let rendered = render("", "Body", None);
        assert_eq!(rendered.subject, "");
    }

    #[test]
    fn test_render_is_deterministic() {
        let renderer = HtmlTemplateRenderer::new();
        let template = template(
            "{{range $k, $v := .Seats}}{{$k}}{{end}}",
            "{{range .Seats}}<b>{{.}}</b>{{end}}",
        );
        let variables = vars(json!({"Seats": {"C3": 1, "A1": 2, "B2": 3}}));

        let first = renderer.render(&template, Some(&variables)).unwrap();
        for _ in 0..5 {
            assert_eq!(renderer.render(&template, Some(&variables)).unwrap(), first);
        }
        assert_eq!(first.subject, "A1B2C3");
    }

    #[test]
    fn test_validate_template() {
        let renderer = HtmlTemplateRenderer::new();
        assert!(renderer.validate_template("<h1>Hello {{.Name}}</h1>").is_ok());
        assert!(renderer.validate_template("<h1>Hello {{upper .Name}}</h1>").is_ok());
        assert!(renderer.validate_template("").is_ok());
        assert!(renderer
            .validate_template("{{range .Items}}<p>{{.}}</p>{{end}}")
            .is_ok());

        let err = renderer
            .validate_template("<h1>Hello {{.Name</h1>")
            .unwrap_err();
        assert!(matches!(err, TemplateError::Syntax(_)));
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_validate_rejects_unknown_function() {
        let err = HtmlTemplateRenderer::new()
            .validate_template("{{shout .Name}}")
            .unwrap_err();
        assert!(err.to_string().contains("shout"));
    }

    #[test]
    fn test_custom_function_table() {
        let mut funcs = FuncMap::builtins();
        funcs.insert("shout", |args| {
            let text = args.first().map(Value::to_display).unwrap_or_default();
            Ok(Value::from(format!("{}!", text.to_uppercase())))
        });
        let renderer = HtmlTemplateRenderer::with_funcs(funcs);

        assert!(renderer.validate_template("{{upper .Name}}").is_err());
        let rendered = renderer
            .render(&template("", "{{shout .Name}}"), Some(&vars(json!({"Name": "hey"}))))
            .unwrap();
        assert_eq!(rendered.content, "HEY!");
    }

    #[test]
    fn test_execution_failure_names_part() {
        let renderer = HtmlTemplateRenderer::new();
        let variables = vars(json!({"Name": "Ann"}));

        let err = renderer
            .render(&template("{{.Name.First}}", "ok"), Some(&variables))
            .unwrap_err();
        assert!(matches!(err, TemplateError::RenderFailed(_)));
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert!(err.to_string().contains("subject"));

        let err = renderer
            .render(&template("ok", "{{upper 5}}"), Some(&variables))
            .unwrap_err();
        assert!(err.to_string().contains("content"));
    }

    #[test]
    fn test_render_ignores_status() {
        let mut inactive = template("Hi", "Body");
        inactive.deactivate();
        assert!(HtmlTemplateRenderer::new().render(&inactive, None).is_ok());
    }

    #[test]
    fn test_complex_otp_template() {
        let content = r#"
<!DOCTYPE html>
<html>
<head>
    <title>{{.Subject}}</title>
</head>
<body>
    <div style="max-width: 600px; margin: 0 auto; font-family: Arial, sans-serif;">
        <h1>{{title .AppName}} - Email Verification</h1>
        <p>Hello {{default "User" .Name}},</p>
        <p>Your OTP code is: <strong>{{.OTP}}</strong></p>
        <p>This code will expire in {{default "10" .ExpiryMinutes}} minutes.</p>
        {{if .LoginLink}}
        <p><a href="{{.LoginLink}}">Click here to login</a></p>
        {{end}}
        <p>Best regards,<br>The {{.AppName}} Team</p>
    </div>
</body>
</html>"#;
        let rendered = render(
            "OTP Verification - {{.AppName}}",
            content,
            Some(json!({
                "AppName": "tixgo",
                "Name": "John Doe",
                "OTP": "123456",
                "ExpiryMinutes": "15",
                "LoginLink": "https://app.tixgo.com/login"
            })),
        );

        assert_eq!(rendered.subject, "OTP Verification - tixgo");
        assert!(rendered.content.contains("Tixgo - Email Verification"));
        assert!(rendered.content.contains("Hello John Doe"));
        assert!(rendered
            .content
            .contains("Your OTP code is: <strong>123456</strong>"));
        assert!(rendered.content.contains("expire in 15 minutes"));
        assert!(rendered
            .content
            .contains(r#"<a href="https://app.tixgo.com/login">Click here to login</a>"#));
    }

    #[test]
    fn test_unsafe_link_is_filtered() {
        let rendered = render(
            "",
            r#"<a href="{{.Link}}">go</a>"#,
            Some(json!({"Link": "javascript:alert(document.cookie)"})),
        );
        assert_eq!(rendered.content, r##"<a href="#ZgotmplZ">go</a>"##);
    }
}
