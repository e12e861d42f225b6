//! Property test for the crawler's core safety invariant: a URL that appears
//! as a link many times over is still fetched over HTTP at most once.

use bluesnake::CrawlerConfig;
use proptest::prelude::*;

fn crawl_with_duplicate_links(duplicate_count: usize) -> usize {
    let rt = tokio::runtime::Runtime::new().unwrap();
    rt.block_on(async move {
        let mut server = mockito::Server::new_async().await;
        let base = server.url();

        let links: String = (0..duplicate_count)
            .map(|i| format!("<a href=\"{base}/shared\">link {i}</a>"))
            .collect();
        let _home = server
            .mock("GET", "/")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body(format!("<html><body>{links}</body></html>"))
            .create_async()
            .await;
        let shared = server
            .mock("GET", "/shared")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body("<html></html>")
            .create_async()
            .await;

        let config = CrawlerConfig::builder().start_url(base).build().unwrap();
        let crawler = bluesnake::Crawler::new(config).unwrap();
        crawler.run().await.unwrap();

        shared.matched_calls()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    #[test]
    fn duplicate_links_to_the_same_url_fetch_it_at_most_once(duplicate_count in 2usize..20) {
        let calls = crawl_with_duplicate_links(duplicate_count);
        prop_assert_eq!(calls, 1);
    }
}
