use indexmap::IndexSet;

/// The name of the artifact that lists the files of the website.
pub const SITEMAP: &str = "sitemap";

/// Parses the content of a sitemap artifact.
///
/// Every line of the form `- <file name>` contributes a file name, other lines are ignored. The
/// names are returned in order of first appearance without duplicates.
pub fn parse_sitemap(content: &str) -> Vec<String> {
    content
        .lines()
        .filter_map(|line| line.trim_start().strip_prefix("- "))
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect::<IndexSet<_>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_parse_sitemap() {
        let content = "Files of the website:\n- index.html\n- style.css\n  - js/app.js\n\n- style.css\n";
        assert_eq!(
            parse_sitemap(content),
            vec!["index.html", "style.css", "js/app.js"]
        );
    }

    #[rstest]
    #[case::empty("")]
    #[case::prose("index.html and style.css")]
    #[case::no_space("-index.html")]
    #[case::empty_item("- \n-   ")]
    fn test_no_files(#[case] content: &str) {
        assert!(parse_sitemap(content).is_empty());
    }

    #[test]
    fn test_crlf_and_trailing_whitespace() {
        assert_eq!(
            parse_sitemap("- about.html  \r\n- contact.html\r\n"),
            vec!["about.html", "contact.html"]
        );
    }
}
