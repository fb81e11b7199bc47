use playground_core::model::ProjectSource;

/// Assemble the standalone preview document.
///
/// The three sources are inserted verbatim. Nothing is escaped: the preview
/// runs the author's own code, and isolation comes from the sandboxed frame
/// it is loaded into, not from filtering its content.
pub fn render_document(source: &ProjectSource) -> String {
    let ProjectSource {
        markup,
        style,
        script,
    } = source;
    let mut doc = String::with_capacity(markup.len() + style.len() + script.len() + 256);
    doc.push_str("<!DOCTYPE html>\n<html>\n<head>\n");
    doc.push_str("    <meta charset=\"UTF-8\">\n");
    doc.push_str(
        "    <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n",
    );
    doc.push_str("    <style>");
    doc.push_str(style);
    doc.push_str("</style>\n</head>\n<body>\n");
    doc.push_str(markup);
    doc.push_str("\n    <script>");
    doc.push_str(script);
    doc.push_str("</script>\n</body>\n</html>\n");
    doc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sections_appear_in_order() {
        let doc = render_document(&ProjectSource::new(
            "<p id=\"m\">hi</p>",
            "p { color: red; }",
            "document.getElementById('m').textContent = 'js';",
        ));
        assert!(doc.starts_with("<!DOCTYPE html>"));
        let style = doc.find("<style>p { color: red; }</style>").unwrap();
        let body = doc.find("<body>").unwrap();
        let markup = doc.find("<p id=\"m\">hi</p>").unwrap();
        let script = doc
            .find("<script>document.getElementById('m').textContent = 'js';</script>")
            .unwrap();
        assert!(style < body && body < markup && markup < script);
        assert!(doc.trim_end().ends_with("</html>"));
    }

    #[test]
    fn inputs_are_not_escaped() {
        let doc = render_document(&ProjectSource::new(
            "<b>&amp;</b>",
            "a::after { content: \"</\"; }",
            "if (1 < 2 && \"x\") {}",
        ));
        assert!(doc.contains("<b>&amp;</b>"));
        assert!(doc.contains("content: \"</\";"));
        assert!(doc.contains("if (1 < 2 && \"x\") {}"));
    }

    #[test]
    fn empty_project_still_builds_a_document() {
        let doc = render_document(&ProjectSource::default());
        assert!(doc.contains("<style></style>"));
        assert!(doc.contains("<script></script>"));
    }
}
