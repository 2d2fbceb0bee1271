#[derive(Debug, Clone, Copy)]
pub struct ArticleParts<'a> {
    pub banners: &'a [String],
    pub body: &'a str,
    pub templates: &'a [String],
    pub categories: &'a [String],
}

/// Banners, body, a blank line, then the trailing templates and categories.
pub fn compose(parts: ArticleParts<'_>) -> String {
    let mut output = String::new();
    for banner in parts.banners {
        output.push_str(banner);
        output.push('\n');
    }
    output.push_str(parts.body.trim());

    let trailer = parts
        .templates
        .iter()
        .chain(parts.categories)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join("\n");
    if !trailer.is_empty() {
        output.push_str("\n\n");
        output.push_str(&trailer);
    }
    output.trim().to_string()
}
