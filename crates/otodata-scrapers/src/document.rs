use scraper::{ElementRef, Html, Selector};

/// Queries the extractor needs from a parsed listing page.
pub trait ListingDocument {
    /// Trimmed text of the first `<title>` element.
    fn title(&self) -> Option<String>;

    /// `content` of the first `<meta>` whose `attr` attribute equals `value`.
    fn meta_content(&self, attr: &str, value: &str) -> Option<String>;

    /// Text of the paragraph that follows the paragraph reading `label`.
    fn find_label_value(&self, label: &str) -> Option<String>;

    /// Body of the first `<script>` whose text contains `needle`.
    fn script_containing(&self, needle: &str) -> Option<String>;

    /// Trimmed text of the first element matching a CSS selector.
    fn first_text(&self, selector: &str) -> Option<String>;
}

/// A listing page parsed with `scraper`.
pub struct HtmlDocument {
    html: Html,
}

impl HtmlDocument {
    pub fn parse(body: &str) -> Self {
        Self {
            html: Html::parse_document(body),
        }
    }

    fn select<'a>(&'a self, selector: &str) -> Vec<ElementRef<'a>> {
        match Selector::parse(selector) {
            Ok(selector) => self.html.select(&selector).collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Every `href` of an anchor element, in document order.
    pub fn hrefs(&self) -> Vec<String> {
        self.select("a[href]")
            .into_iter()
            .filter_map(|a| a.value().attr("href"))
            .map(str::to_string)
            .collect()
    }
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

fn label_matches(text: &str, label: &str) -> bool {
    text == label || text.strip_suffix(':').map(str::trim_end) == Some(label)
}

impl ListingDocument for HtmlDocument {
    fn title(&self) -> Option<String> {
        self.select("title")
            .into_iter()
            .next()
            .map(element_text)
            .filter(|t| !t.is_empty())
    }

    fn meta_content(&self, attr: &str, value: &str) -> Option<String> {
        self.select("meta")
            .into_iter()
            .find(|meta| meta.value().attr(attr) == Some(value))
            .and_then(|meta| meta.value().attr("content"))
            .map(str::to_string)
    }

    fn find_label_value(&self, label: &str) -> Option<String> {
        let paragraphs: Vec<String> = self.select("p").into_iter().map(element_text).collect();
        let position = paragraphs.iter().position(|text| label_matches(text, label))?;
        paragraphs
            .get(position + 1)
            .filter(|value| !value.is_empty())
            .cloned()
    }

    fn script_containing(&self, needle: &str) -> Option<String> {
        self.select("script")
            .into_iter()
            .map(|script| script.text().collect::<String>())
            .find(|text| text.contains(needle))
    }

    fn first_text(&self, selector: &str) -> Option<String> {
        self.select(selector)
            .into_iter()
            .next()
            .map(element_text)
            .filter(|t| !t.is_empty())
    }
}
