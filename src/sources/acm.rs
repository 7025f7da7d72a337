//! ACM Digital Library backend.
//!
//! The ACM DL has no public search API, so result pages are scraped. Each
//! `li.search__item` of a result page becomes one HTML raw entry. Venue
//! pages carry the average citation and download counts.

use async_trait::async_trait;
use chrono::Datelike;
use scraper::{Html, Selector};
use url::Url;

use crate::models::{Bibliometrics, Paper, Publication, SearchParams};
use crate::sources::{
    Backend, BackendCapabilities, PageCursor, ParseError, ParsedEntry, PublicationLookup,
    RawEntry, RawPage, SourceError, VenueDetails,
};
use crate::utils::{
    parse_date, select_attr, select_text, select_texts, with_retry, HttpClient, RetryConfig,
};

const ACM_BASE_URL: &str = "https://dl.acm.org";

/// ACM Digital Library backend
#[derive(Debug, Clone)]
pub struct AcmBackend {
    client: HttpClient,
    base_url: String,
    page_size: usize,
    retry: RetryConfig,
}

impl AcmBackend {
    pub fn new(client: HttpClient, page_size: usize) -> Self {
        Self {
            client,
            base_url: ACM_BASE_URL.to_string(),
            page_size: page_size.clamp(1, 50),
            retry: RetryConfig::default(),
        }
    }

    /// Point requests at another host
    pub fn with_base_url(mut self, base: impl Into<String>) -> Self {
        self.base_url = base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Resolve a site-relative link
    fn absolute(&self, href: &str) -> String {
        match Url::parse(&self.base_url).and_then(|base| base.join(href)) {
            Ok(url) => url.to_string(),
            Err(_) => href.to_string(),
        }
    }

    async fn get_html(&self, url: &str) -> Result<String, SourceError> {
        let client = &self.client;

        with_retry(self.retry, || async move {
            let request = client.get(url).await.header("Accept", "text/html");
            client.fetch_text(request).await
        })
        .await
    }
}

/// Split a result page into entries, next page and total hit count
fn parse_result_page(body: &str, page: usize) -> RawPage {
    let document = Html::parse_document(body);
    let root = document.root_element();

    let entries = Selector::parse("li.search__item")
        .map(|selector| {
            root.select(&selector)
                .map(|item| RawEntry::Html(item.html()))
                .collect()
        })
        .unwrap_or_default();

    let has_next = Selector::parse("a.pagination__btn--next")
        .map(|selector| root.select(&selector).next().is_some())
        .unwrap_or(false);

    RawPage {
        entries,
        next: has_next.then_some(PageCursor::Offset(page + 1)),
        total_hint: select_text(root, "span.hitsLength").and_then(|hits| parse_count(&hits)),
    }
}

/// Parse counts such as "1,234"
fn parse_count(text: &str) -> Option<usize> {
    text.trim().replace(',', "").parse().ok()
}

fn parse_decimal(text: &str) -> Option<f64> {
    text.trim().replace(',', "").parse().ok()
}

/// Extract a DOI from an ACM link such as `/doi/abs/10.1145/3313831.3376727`
fn doi_from_link(href: &str) -> Option<String> {
    let re = regex::Regex::new(r"(10\.\d{4,9}/[^\s?#]+)").ok()?;
    re.captures(href)?.get(1).map(|m| m.as_str().to_string())
}

/// Venue category implied by the venue link
fn venue_category(href: &str) -> Option<&'static str> {
    if href.contains("/doi/proceedings") || href.contains("/conference/") {
        Some("Conference Proceedings")
    } else if href.contains("/toc/") || href.contains("/journal/") || href.contains("/magazine/") {
        Some("Journal")
    } else if href.contains("/doi/book") {
        Some("Book")
    } else {
        None
    }
}

#[async_trait]
impl Backend for AcmBackend {
    fn id(&self) -> &str {
        "acm"
    }

    fn name(&self) -> &str {
        "ACM"
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities::SEARCH | BackendCapabilities::BIBLIOMETRICS
    }

    fn translate_query(&self, params: &SearchParams) -> String {
        let mut query = format!("AllField={}", urlencoding::encode(params.query.trim()));

        if let Some(since) = params.since {
            query.push_str(&format!("&AfterYear={}", since.year()));
        }
        if let Some(until) = params.until {
            query.push_str(&format!("&BeforeYear={}", until.year()));
        }
        if !params.areas.is_empty() {
            tracing::debug!("ACM search does not filter by subject area, ignoring areas");
        }

        query
    }

    async fn fetch_page(&self, query: &str, cursor: &PageCursor) -> Result<RawPage, SourceError> {
        let page = match cursor {
            PageCursor::Start => 0,
            PageCursor::Offset(page) => *page,
            PageCursor::Url(url) => {
                return Err(SourceError::InvalidRequest(format!(
                    "ACM pages are addressed by number, got {}",
                    url
                )))
            }
        };

        let url = format!(
            "{}/action/doSearch?{}&pageSize={}&startPage={}",
            self.base_url, query, self.page_size, page
        );
        let body = self.get_html(&url).await?;
        Ok(parse_result_page(&body, page))
    }

    fn parse_entry(&self, entry: &RawEntry) -> Result<ParsedEntry, ParseError> {
        let RawEntry::Html(fragment) = entry else {
            return Err(ParseError::Unsupported(entry.kind()));
        };
        let html = Html::parse_fragment(fragment);
        let root = html.root_element();

        let title = select_text(root, ".issue-item__title").ok_or(ParseError::MissingTitle)?;
        let mut paper = Paper::new(title);

        let link = select_attr(root, ".issue-item__title a", "href");
        let doi = link.as_deref().and_then(doi_from_link);
        if let Some(href) = &link {
            paper.add_url(&self.absolute(href));
        }
        paper.doi = doi.clone();

        for author in select_texts(root, "ul[aria-label=\"authors\"] li a span, ul.loa li a span") {
            paper.add_author(&author);
        }

        let abstract_text = select_texts(root, ".issue-item__abstract p").join(" ");
        paper.offer_abstract(&abstract_text);

        paper.publication_date = select_text(root, ".bookPubDate")
            .or_else(|| select_text(root, ".dot-separator span"))
            .and_then(|date| parse_date(&date));

        paper.citations = select_text(root, ".citation span")
            .and_then(|count| parse_count(&count))
            .map(|count| count as u32);

        let mut lookup = None;
        if let Some(mut publication) = select_text(root, ".epub-section__title").and_then(Publication::new) {
            let venue_link = select_attr(root, ".issue-item__detail a", "href");
            if let Some(category) = venue_link.as_deref().and_then(venue_category) {
                publication.category = Some(category.to_string());
            }
            lookup = Some(PublicationLookup::new(
                publication.title.clone(),
                venue_link.map(|href| self.absolute(&href)),
            ));
            paper.publication = Some(publication);
        }

        Ok(ParsedEntry {
            paper,
            id: doi,
            publication_lookup: lookup,
            details_url: None,
        })
    }

    async fn fetch_publication(&self, lookup: &PublicationLookup) -> Result<RawEntry, SourceError> {
        let url = lookup.identifier.as_deref().ok_or_else(|| {
            SourceError::NotFound(format!("no ACM venue page for '{}'", lookup.title))
        })?;
        let body = self.get_html(&self.absolute(url)).await?;
        Ok(RawEntry::Html(body))
    }

    fn parse_publication(&self, entry: &RawEntry) -> Result<VenueDetails, ParseError> {
        let RawEntry::Html(page) = entry else {
            return Err(ParseError::Unsupported(entry.kind()));
        };
        let document = Html::parse_document(page);
        let root = document.root_element();

        let mut avg_citations = None;
        let mut avg_downloads = None;
        if let Ok(selector) = Selector::parse(".bibliometrics__block") {
            for block in root.select(&selector) {
                let Some(label) = select_text(block, ".bibliometrics__title") else {
                    continue;
                };
                let value = select_text(block, ".bibliometrics__count").and_then(|v| parse_decimal(&v));
                let label = label.to_lowercase();
                if label.contains("average citation") {
                    avg_citations = value;
                } else if label.contains("average download") {
                    avg_downloads = value;
                }
            }
        }
        let bibliometrics = Bibliometrics::acm(avg_citations, avg_downloads);

        Ok(VenueDetails {
            publisher: select_text(root, ".publisher__name"),
            subject_areas: Default::default(),
            bibliometrics: (!bibliometrics.is_empty()).then_some(bibliometrics),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const RESULT_ITEM: &str = r#"
        <li class="search__item issue-item-container">
          <div class="issue-item issue-item--search clearfix">
            <div class="issue-item__content">
              <div class="issue-heading">research-article</div>
              <h5 class="issue-item__title">
                <span class="hlFld-Title"><a href="/doi/10.1145/3313831.3376727">Awesome <span>paper</span> title</a></span>
              </h5>
              <ul class="rlist--inline loa truncate-list" aria-label="authors">
                <li><a href="/profile/1" title="Dr Paul"><span>Dr Paul</span></a>, </li>
                <li><a href="/profile/2" title="Dr John"><span>Dr John</span></a></li>
              </ul>
              <div class="issue-item__detail">
                <a href="/toc/csur/2020/53/1" title="ACM Computing Surveys"><span class="epub-section__title">ACM Computing Surveys</span></a>
                <span class="dot-separator"><span>January 1969</span></span>
              </div>
              <div class="issue-item__abstract truncate-text"><p>a long</p><p>abstract</p></div>
              <div class="issue-item__footer"><span class="citation"><span>1,204</span></span></div>
            </div>
          </div>
        </li>"#;

    fn backend() -> AcmBackend {
        AcmBackend::new(HttpClient::new().unwrap(), 20).with_retry_config(RetryConfig::none())
    }

    #[test]
    fn test_translate_query() {
        let params = SearchParams::new("this AND that")
            .since(NaiveDate::from_ymd_opt(1969, 1, 30).unwrap())
            .until(NaiveDate::from_ymd_opt(2020, 1, 1).unwrap())
            .area("economics");

        assert_eq!(
            backend().translate_query(&params),
            "AllField=this%20AND%20that&AfterYear=1969&BeforeYear=2020"
        );
    }

    #[test]
    fn test_parse_result_item() {
        let parsed = backend()
            .parse_entry(&RawEntry::Html(RESULT_ITEM.to_string()))
            .unwrap();
        let paper = &parsed.paper;

        assert_eq!(paper.title, "Awesome paper title");
        assert_eq!(paper.author_list(), vec!["Dr John", "Dr Paul"]);
        assert_eq!(paper.r#abstract.as_deref(), Some("a long abstract"));
        assert_eq!(paper.publication_date, NaiveDate::from_ymd_opt(1969, 1, 1));
        assert_eq!(paper.doi.as_deref(), Some("10.1145/3313831.3376727"));
        assert_eq!(paper.citations, Some(1204));
        assert!(paper
            .urls
            .contains("https://dl.acm.org/doi/10.1145/3313831.3376727"));

        let publication = paper.publication.as_ref().unwrap();
        assert_eq!(publication.title, "ACM Computing Surveys");
        assert_eq!(publication.category.as_deref(), Some("Journal"));
        assert_eq!(
            parsed.publication_lookup.unwrap().identifier.as_deref(),
            Some("https://dl.acm.org/toc/csur/2020/53/1")
        );
    }

    #[test]
    fn test_parse_item_without_title() {
        let result = backend().parse_entry(&RawEntry::Html(
            r#"<li class="search__item"><div class="issue-item__abstract"><p>x</p></div></li>"#
                .to_string(),
        ));
        assert_eq!(result.unwrap_err(), ParseError::MissingTitle);
    }

    #[test]
    fn test_parse_result_page() {
        let body = format!(
            r#"<html><body>
                <span class="hitsLength">1,234</span>
                <ul class="search-result__xsl-body items-results">{item}{item}</ul>
                <a class="pagination__btn--next" href="?startPage=3">next</a>
            </body></html>"#,
            item = RESULT_ITEM
        );

        let page = parse_result_page(&body, 2);
        assert_eq!(page.entries.len(), 2);
        assert_eq!(page.next, Some(PageCursor::Offset(3)));
        assert_eq!(page.total_hint, Some(1234));

        let last = parse_result_page("<html><body><ul></ul></body></html>", 5);
        assert!(last.entries.is_empty());
        assert_eq!(last.next, None);
        assert_eq!(last.total_hint, None);
    }

    #[test]
    fn test_parse_venue_page() {
        let page = r#"<html><body>
            <span class="publisher__name">Association for Computing Machinery</span>
            <div class="bibliometrics">
              <div class="bibliometrics__block"><div class="bibliometrics__title">Average Citation per Article</div><div class="bibliometrics__count"><span>2.2</span></div></div>
              <div class="bibliometrics__block"><div class="bibliometrics__title">Average Downloads per Article</div><div class="bibliometrics__count"><span>4.7</span></div></div>
              <div class="bibliometrics__block"><div class="bibliometrics__title">Total Citations</div><div class="bibliometrics__count"><span>12,000</span></div></div>
            </div>
        </body></html>"#;

        let details = backend()
            .parse_publication(&RawEntry::Html(page.to_string()))
            .unwrap();
        assert_eq!(
            details.publisher.as_deref(),
            Some("Association for Computing Machinery")
        );
        assert_eq!(details.bibliometrics, Some(Bibliometrics::acm(Some(2.2), Some(4.7))));
    }

    #[test]
    fn test_doi_and_category_helpers() {
        assert_eq!(
            doi_from_link("/doi/abs/10.1145/3313831.3376727?cookieSet=1").as_deref(),
            Some("10.1145/3313831.3376727")
        );
        assert_eq!(doi_from_link("/action/showFeed"), None);
        assert_eq!(
            venue_category("/doi/proceedings/10.1145/3313831"),
            Some("Conference Proceedings")
        );
        assert_eq!(venue_category("/somewhere"), None);
    }

    #[tokio::test]
    async fn test_fetch_page_against_local_server() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/action/doSearch")
            .match_query(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("AllField".into(), "privacy".into()),
                mockito::Matcher::UrlEncoded("startPage".into(), "0".into()),
            ]))
            .with_header("content-type", "text/html")
            .with_body(format!("<html><body><ul>{}</ul></body></html>", RESULT_ITEM))
            .create_async()
            .await;

        let backend = backend().with_base_url(server.url());
        let query = backend.translate_query(&SearchParams::new("privacy"));
        let page = backend.fetch_page(&query, &PageCursor::Start).await.unwrap();

        assert_eq!(page.entries.len(), 1);
        assert_eq!(page.next, None);
        mock.assert_async().await;
    }
}
