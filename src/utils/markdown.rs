use pulldown_cmark::{html, Options, Parser};

/// 将正文渲染为 HTML，正文中的原始 HTML 原样保留
pub fn render(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let parser = Parser::new_ext(markdown, options);
    let mut html_output = String::new();
    html::push_html(&mut html_output, parser);
    html_output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_markdown_and_keeps_html() {
        assert_eq!(render("**hi**"), "<p><strong>hi</strong></p>\n");
        assert!(render("<div class=\"x\">raw</div>").contains("<div class=\"x\">raw</div>"));
    }
}
