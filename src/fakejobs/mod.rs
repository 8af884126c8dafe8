mod crawler;
mod data;

pub use crawler::FakeJobsCrawler;
pub use data::JobData;

use crate::Board;

use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobPosting {
    pub title: String,
    pub company: Option<String>,
    pub location: Option<String>,
    pub posted: Option<NaiveDate>,
    pub apply_url: Option<String>,
}

/// Every job card found on one listing page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobBoard {
    pub postings: Vec<JobPosting>,
}

impl fmt::Display for JobPosting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}",
            self.title,
            self.apply_url.as_deref().unwrap_or("-")
        )
    }
}

impl fmt::Display for JobBoard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for posting in &self.postings {
            writeln!(f, "{}", posting)?;
        }
        Ok(())
    }
}

impl Board for JobBoard {
    fn is_empty(&self) -> bool {
        self.postings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use crate::fakejobs::crawler::FakeJobsCrawler;
    use crate::Crawler;
    use crate::CrawlerResult;

    use super::*;
    use pretty_assertions::assert_eq;
    use reqwest::Url;
    use scraper::html::Html;
    use std::fs;

    fn crawl_fixture() -> (JobBoard, Vec<String>) {
        let s = FakeJobsCrawler {};
        let html = fs::read_to_string("tests/htmls/fake-jobs.html").expect("Invalid file url");
        let html = Html::parse_document(&html);
        let url = Url::parse("https://realpython.github.io/fake-jobs/").unwrap();

        let res = s.crawl(&html, &url);
        assert!(matches!(&res, CrawlerResult::DocumentAndLinks(_, _)));

        let CrawlerResult::DocumentAndLinks(board, links) = res else {
            unreachable!()
        };
        (board, links)
    }

    #[test]
    fn test_parsing_job_board() {
        let (board, links) = crawl_fixture();
        assert!(links.is_empty());

        let date = |s: &str| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok();
        let expected = JobBoard {
            postings: vec![
                JobPosting {
                    title: "Senior Python Developer".to_string(),
                    company: Some("Payne, Roberts and Davis".to_string()),
                    location: Some("Stewartbury, AA".to_string()),
                    posted: date("2021-04-08"),
                    apply_url: Some("https://realpython.github.io/fake-jobs/jobs/senior-python-developer-0.html".to_string()),
                },
                JobPosting {
                    title: "Energy engineer".to_string(),
                    company: Some("Vasquez-Davidson".to_string()),
                    location: Some("Christopherville, AA".to_string()),
                    posted: date("2021-04-08"),
                    apply_url: Some("https://realpython.github.io/fake-jobs/jobs/energy-engineer-1.html".to_string()),
                },
                JobPosting {
                    title: "Legal executive".to_string(),
                    company: Some("Jackson, Chambers and Levy".to_string()),
                    location: Some("Port Ericaburgh, AA".to_string()),
                    posted: date("2021-04-08"),
                    apply_url: Some("https://realpython.github.io/fake-jobs/jobs/legal-executive-2.html".to_string()),
                },
                JobPosting {
                    title: "Fitness centre manager".to_string(),
                    company: Some("Savage-Bradley".to_string()),
                    location: Some("East Seanview, AP".to_string()),
                    posted: date("2021-04-08"),
                    apply_url: Some("https://realpython.github.io/fake-jobs/jobs/fitness-centre-manager-3.html".to_string()),
                },
            ],
        };
        assert_eq!(board, expected);
    }

    #[test]
    fn test_display_prints_title_and_link() {
        let (board, _) = crawl_fixture();
        let printed = board.to_string();
        let first = printed.lines().next().unwrap();

        assert_eq!(printed.lines().count(), 4);
        assert_eq!(
            first,
            "Senior Python Developer\thttps://realpython.github.io/fake-jobs/jobs/senior-python-developer-0.html"
        );
    }

    #[test]
    fn test_missing_link_prints_dash() {
        let posting = JobPosting {
            title: "Unlinked".to_string(),
            company: None,
            location: None,
            posted: None,
            apply_url: None,
        };
        assert_eq!(posting.to_string(), "Unlinked\t-");
        assert!(JobBoard::default().is_empty());
    }
}
