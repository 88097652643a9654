use cmdbridge_types::PackagedResult;
use cmdbridge_util::escape_markup;

/// Turns a packaged result into a fragment for embedding in a page.
pub trait OutputRenderer: Send + Sync {
    fn render(&self, result: &PackagedResult) -> String;
}

/// Default HTML fragment: the command output followed by the history log
/// id and, when a file was staged, a download link under `/static`.
#[derive(Debug, Default, Clone, Copy)]
pub struct HtmlFragmentRenderer;

impl OutputRenderer for HtmlFragmentRenderer {
    fn render(&self, result: &PackagedResult) -> String {
        let mut fragment = String::new();
        fragment.push_str("<div class=\"output\">\n");
        fragment.push_str(&format!(
            "<h4>{} <small>{}</small></h4>\n",
            escape_markup(&result.command),
            escape_markup(&result.timestamp)
        ));
        // command output is markup by contract and is embedded verbatim
        fragment.push_str(&format!("<div class=\"display-output\">{}</div>\n", result.display_output));
        if let Some(history_id) = &result.history_id {
            fragment.push_str(&format!(
                "<p class=\"history\">Request history: {}</p>\n",
                escape_markup(history_id)
            ));
        }
        if let Some(download) = &result.download {
            fragment.push_str(&format!(
                "<a class=\"download\" href=\"/static/{}\">{}</a>\n",
                escape_markup(&download.static_path),
                escape_markup(&download.filename)
            ));
        }
        fragment.push_str("</div>");
        fragment
    }
}
