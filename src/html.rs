//! Thin helpers over `scraper` that turn "element missing" into `Error::Scrape`.
//!
//! Parsed documents are not `Send`, so callers parse and extract owned data in synchronous code
//! and never hold a `Document` across an `.await`.

use crate::error::{Error, Result};
use scraper::{ElementRef, Html, Selector};

/// A parsed HTML page.
pub(crate) struct Document(Html);

impl Document {
    pub(crate) fn parse(markup: &str) -> Self {
        Self(Html::parse_document(markup))
    }

    /// Parses a fragment of table rows. Rows are only kept by the HTML parser inside a table, so
    /// bare rows are wrapped in one.
    pub(crate) fn parse_rows(markup: &str) -> Self {
        if markup.contains("<table") {
            Self::parse(markup)
        } else {
            Self::parse(&format!("<table>{markup}</table>"))
        }
    }

    pub(crate) fn select_one(&self, css: &str) -> Result<Option<ElementRef<'_>>> {
        let selector = selector(css)?;
        Ok(self.0.select(&selector).next())
    }

    pub(crate) fn select_all(&self, css: &str) -> Result<Vec<ElementRef<'_>>> {
        let selector = selector(css)?;
        Ok(self.0.select(&selector).collect())
    }

    /// Like `select_one` but a missing element is an error.
    pub(crate) fn require(&self, css: &str) -> Result<ElementRef<'_>> {
        self.select_one(css)?
            .ok_or_else(|| Error::scrape(format!("No element matches '{css}'")))
    }

    /// All elements matching `css` that also carry `class`. Classes are matched this way rather
    /// than in the selector because the site uses ids, which may start with a digit, as classes.
    pub(crate) fn select_with_class(&self, css: &str, class: &str) -> Result<Vec<ElementRef<'_>>> {
        Ok(self
            .select_all(css)?
            .into_iter()
            .filter(|e| e.has_class(class))
            .collect())
    }
}

pub(crate) fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| Error::scrape(format!("Invalid selector '{css}': {e}")))
}

/// Reading helpers on elements.
pub(crate) trait ElementExt<'a> {
    /// All descendant text, concatenated.
    fn text_content(&self) -> String;

    /// Descendant text, skipping any subtree whose root matches one of `excluded`.
    fn text_without(&self, excluded: &[&Selector]) -> String;

    fn attr_value(&self, name: &str) -> Option<&'a str>;

    /// Like `attr_value` but a missing attribute is an error.
    fn require_attr(&self, name: &str) -> Result<&'a str>;

    fn has_attr(&self, name: &str) -> bool;

    fn has_class(&self, class: &str) -> bool;

    /// The text of the node right after this element, whether it is a text node or an element.
    fn next_sibling_text(&self) -> String;

    fn select_one(&self, css: &str) -> Result<Option<ElementRef<'a>>>;

    fn select_all(&self, css: &str) -> Result<Vec<ElementRef<'a>>>;

    fn require(&self, css: &str) -> Result<ElementRef<'a>>;

    /// Splits this element into its own text without the first subtree matching `css`, and the
    /// text of that subtree, both skipping subtrees matching `excluded`. The subtree is required.
    /// The document is left untouched.
    fn split_off(&self, css: &str, excluded: &[&Selector]) -> Result<(String, String)>;

    /// The `n`th ancestor, where `1` is the parent.
    fn ancestor(&self, n: usize) -> Option<ElementRef<'a>>;
}

impl<'a> ElementExt<'a> for ElementRef<'a> {
    fn text_content(&self) -> String {
        self.text().collect()
    }

    fn text_without(&self, excluded: &[&Selector]) -> String {
        collect_text(self, |e| excluded.iter().any(|s| s.matches(e)))
    }

    fn attr_value(&self, name: &str) -> Option<&'a str> {
        self.value().attr(name)
    }

    fn require_attr(&self, name: &str) -> Result<&'a str> {
        self.attr_value(name).ok_or_else(|| {
            Error::scrape(format!(
                "Element <{}> has no '{name}' attribute",
                self.value().name()
            ))
        })
    }

    fn has_attr(&self, name: &str) -> bool {
        self.value().attr(name).is_some()
    }

    fn has_class(&self, class: &str) -> bool {
        self.value().classes().any(|c| c == class)
    }

    fn next_sibling_text(&self) -> String {
        match self.next_sibling() {
            Some(node) => match node.value().as_text() {
                Some(text) => {
                    let text: &str = text;
                    text.to_string()
                }
                None => ElementRef::wrap(node)
                    .map(|e| e.text_content())
                    .unwrap_or_default(),
            },
            None => String::new(),
        }
    }

    fn select_one(&self, css: &str) -> Result<Option<ElementRef<'a>>> {
        let selector = selector(css)?;
        Ok(self.select(&selector).next())
    }

    fn select_all(&self, css: &str) -> Result<Vec<ElementRef<'a>>> {
        let selector = selector(css)?;
        Ok(self.select(&selector).collect())
    }

    fn require(&self, css: &str) -> Result<ElementRef<'a>> {
        ElementExt::select_one(self, css)?
            .ok_or_else(|| Error::scrape(format!("No element matches '{css}'")))
    }

    fn split_off(&self, css: &str, excluded: &[&Selector]) -> Result<(String, String)> {
        let sub = ElementExt::require(self, css)?;
        let sub_id = sub.id();
        let rest = collect_text(self, |e| {
            e.id() == sub_id || excluded.iter().any(|s| s.matches(e))
        });
        Ok((rest, sub.text_without(excluded)))
    }

    fn ancestor(&self, n: usize) -> Option<ElementRef<'a>> {
        let mut node = **self;
        for _ in 0..n {
            node = node.parent()?;
        }
        ElementRef::wrap(node)
    }
}

/// Concatenates the text below `root`, skipping every subtree whose root element satisfies `skip`.
fn collect_text(root: &ElementRef<'_>, skip: impl Fn(&ElementRef<'_>) -> bool) -> String {
    let root_id = root.id();
    let mut out = String::new();
    for node in root.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node
            .ancestors()
            .take_while(|a| a.id() != root_id)
            .filter_map(ElementRef::wrap)
            .any(|a| skip(&a));
        if !hidden {
            out.push_str(text);
        }
    }
    out
}

/// Removes every newline and trims surrounding whitespace.
pub(crate) fn clean(s: &str) -> String {
    s.replace('\n', "").trim().to_string()
}

/// Collapses every run of whitespace into one space and trims the ends.
pub(crate) fn squash(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
