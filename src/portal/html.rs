//! Page rendering. The template is compiled into the binary so the portal
//! has no runtime file dependencies.

use lazy_static::lazy_static;
use tera::{Context, Tera};
use tracing::error;

const PORTAL_TEMPLATE: &str = include_str!("../../templates/portal.html");

lazy_static! {
    pub static ref TEMPLATES: Tera = {
        let mut tera = Tera::default();
        if let Err(e) = tera.add_raw_template("portal.html", PORTAL_TEMPLATE) {
            error!("Template parsing error: {}", e);
            std::process::exit(1);
        }
        tera.autoescape_on(vec![".html"]);
        tera
    };
}

/// Render the credential form with an optional status line. `message` is
/// HTML-escaped.
pub fn render_form(message: Option<&str>, is_error: bool) -> tera::Result<String> {
    let mut context = Context::new();
    context.insert("message", message.unwrap_or(""));
    context.insert("is_error", &is_error);
    TEMPLATES.render("portal.html", &context)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_form_has_both_fields() {
        let html = render_form(None, false).unwrap();
        assert!(html.contains(r#"name="ssid""#));
        assert!(html.contains(r#"name="password""#));
        assert!(html.contains(r#"method="post""#));
    }

    #[test]
    fn message_is_escaped() {
        let html = render_form(Some("<script>alert(\"x\")</script>"), true).unwrap();
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(html.contains(r#"class="msg error""#));
    }

    #[test]
    fn success_uses_ok_style() {
        let html = render_form(Some("done"), false).unwrap();
        assert!(html.contains(r#"class="msg ok""#));
        assert!(html.contains("done"));
    }
}
