use crate::{
    fakejobs::{JobBoard, JobPosting},
    Crawler, CrawlerResult,
};
use chrono::NaiveDate;
use itertools::Itertools;
use lazy_regex::regex;
use lazy_static::lazy_static;
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};

const E: &str = "Invalid selector";
lazy_static! {
    static ref CARD: Selector = Selector::parse("div.card").expect(E);
    static ref TITLE: Selector = Selector::parse("h2.title").expect(E);
    static ref APPLY: Selector = Selector::parse(".card-footer>a:nth-child(2)").expect(E);
    static ref COMPANY: Selector = Selector::parse("h3.company").expect(E);
    static ref LOCATION: Selector = Selector::parse("p.location").expect(E);
    static ref POSTED: Selector = Selector::parse("time[datetime]").expect(E);
    static ref NEXT_PAGE: Selector =
        Selector::parse(r#"a[rel="next"], a.pagination-next"#).expect(E);
}

#[derive(Debug)]
pub struct FakeJobsCrawler;

fn clean_text(el: ElementRef) -> Option<String> {
    let text = el.text().collect::<String>();
    let text = regex!(r"\s+").replace_all(text.trim(), " ").into_owned();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn select_text(card: &ElementRef, selector: &Selector) -> Option<String> {
    card.select(selector).next().and_then(clean_text)
}

fn parse_posting(card: ElementRef, page_url: &Url) -> Option<JobPosting> {
    let title = select_text(&card, &TITLE)?;

    let apply_url = card
        .select(&APPLY)
        .next()
        .and_then(|a| a.value().attr("href"))
        .map(str::trim)
        .filter(|href| !href.is_empty())
        .and_then(|href| page_url.join(href).ok())
        .map(String::from);

    let posted = card
        .select(&POSTED)
        .next()
        .and_then(|el| el.value().attr("datetime"))
        .and_then(|raw| NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok());

    Some(JobPosting {
        title,
        company: select_text(&card, &COMPANY),
        location: select_text(&card, &LOCATION),
        posted,
        apply_url,
    })
}

impl Crawler for FakeJobsCrawler {
    type Document = JobBoard;

    fn can_be_scrapped(&self, doc: &Html) -> bool {
        doc.select(&CARD).next().is_some()
    }

    fn extract_links(&self, doc: &Html, page_url: &Url) -> Vec<String> {
        doc.select(&NEXT_PAGE)
            .filter_map(|a| a.value().attr("href"))
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .filter_map(|l| page_url.join(l).ok())
            .filter(|url| url.host() == page_url.host() && url.port() == page_url.port())
            .map(String::from)
            .sorted()
            .dedup()
            .collect()
    }

    fn crawl(&self, doc: &Html, page_url: &Url) -> CrawlerResult<Self::Document> {
        let links = self.extract_links(doc, page_url);

        if !self.can_be_scrapped(doc) {
            return CrawlerResult::Links(links);
        }

        let postings = doc
            .select(&CARD)
            .filter_map(|card| parse_posting(card, page_url))
            .collect();

        CrawlerResult::DocumentAndLinks(JobBoard { postings }, links)
    }
}
