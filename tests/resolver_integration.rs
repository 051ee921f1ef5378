//! Integration tests for the resolver module.
//!
//! Tests the full resolution flow (dispatch, metadata, mirror scan) through
//! the public API against mock metadata services and mirrors.

use std::sync::Arc;

use shdl_core::autoname;
use shdl_core::naming::DEFAULT_AUTONAME_FORMAT;
use shdl_core::resolver::{
    Endpoints, HandlerRegistry, MetadataOutcome, RepoKind, ResolveError, ResolverContext,
};
use wiremock::matchers::{body_string, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod support;
use support::socket_guard::start_mock_server_or_skip;

const CSL_JSON: &str = "application/vnd.citationstyles.csl+json";
const RIS: &str = "application/x-research-info-systems";

fn endpoints(server: &MockServer) -> Endpoints {
    let base = server.uri();
    Endpoints {
        doi_base: format!("{base}/doi"),
        arxiv_api: format!("{base}/api/query"),
        arxiv_pdf_mirror: format!("{base}/pdf/"),
        jstor_base: format!("{base}/jstor"),
        ieee_base: format!("{base}/ieee"),
        sciencedirect_base: format!("{base}/sd"),
        eutils_base: format!("{base}/eutils"),
    }
}

fn registry(server: &MockServer) -> HandlerRegistry {
    let ctx = ResolverContext::with_client(reqwest::Client::new(), endpoints(server));
    HandlerRegistry::new(Arc::new(ctx))
}

fn mirror_page(link: &str) -> String {
    format!(
        "<html><body>\n<div id=\"buttons\">\n<button onclick=\"location.href='{link}?download=true'\">save</button>\n</div>\n</body></html>"
    )
}

fn html(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body, "text/html; charset=utf-8")
}

async fn mount_mirror(server: &MockServer, mirror_path: &str, doc_path: &str, link: &str) {
    Mock::given(method("GET"))
        .and(path(mirror_path))
        .respond_with(html("<html>mirror</html>".to_string()))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(doc_path))
        .respond_with(html(mirror_page(link)))
        .mount(server)
        .await;
}

fn csl_record() -> String {
    serde_json::json!({
        "title": "A study of x",
        "author": [{"given": "Alice", "family": "Smith"}],
        "issued": {"date-parts": [[2020, 3, 1]]}
    })
    .to_string()
}

#[tokio::test]
async fn test_doi_resolution_with_metadata_and_autoname() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };

    Mock::given(method("GET"))
        .and(path("/doi/10.1000/182"))
        .and(header("accept", CSL_JSON))
        .respond_with(ResponseTemplate::new(200).set_body_raw(csl_record(), CSL_JSON))
        .mount(&server)
        .await;
    mount_mirror(&server, "/m1", "/m1/10.1000/182", "/files/paper.pdf").await;

    let mirrors = vec![format!("{}/m1", server.uri())];
    let resolution = registry(&server)
        .resolve("10.1000/182", None, &mirrors)
        .await
        .unwrap();

    assert_eq!(resolution.repo_name, "DOI");
    assert_eq!(resolution.identifier, "10.1000/182");
    assert_eq!(
        resolution.download_url,
        format!("{}/files/paper.pdf", server.uri())
    );

    let metadata = resolution.metadata.metadata().unwrap();
    assert_eq!(metadata.title, "A study of x");
    assert_eq!(metadata.year, "2020");
    assert_eq!(metadata.repo, "DOI");
    assert_eq!(
        autoname(metadata, DEFAULT_AUTONAME_FORMAT).unwrap(),
        "[A. Smith, doi 10.1000@182]A Study of X"
    );
    assert_eq!(resolution.link_candidates, vec![resolution.download_url.clone()]);
}

#[tokio::test]
async fn test_incomplete_doi_record_follows_landing_page_and_still_downloads() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };

    let incomplete = serde_json::json!({"title": "Only a title"}).to_string();
    Mock::given(method("GET"))
        .and(path("/doi/10.1000/182"))
        .and(header("accept", CSL_JSON))
        .respond_with(ResponseTemplate::new(200).set_body_raw(incomplete, CSL_JSON))
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/doi/10.1000/182"))
        .respond_with(html("<html>landing page</html>".to_string()))
        .expect(1)
        .mount(&server)
        .await;
    mount_mirror(&server, "/m1", "/m1/10.1000/182", "/files/paper.pdf").await;

    let mirrors = vec![format!("{}/m1", server.uri())];
    let resolution = registry(&server)
        .resolve("10.1000/182", None, &mirrors)
        .await
        .unwrap();

    // The landing host is the mock server, which has no alternate strategy.
    assert_eq!(resolution.metadata, MetadataOutcome::Unavailable);
    assert!(resolution.download_url.ends_with("/files/paper.pdf"));
}

#[tokio::test]
async fn test_unrecognized_query_falls_back_to_doi_and_still_downloads() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };

    Mock::given(method("GET"))
        .and(path("/doi/banana"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    mount_mirror(&server, "/m1", "/m1/banana", "/files/banana.pdf").await;

    let mirrors = vec![format!("{}/m1", server.uri())];
    let resolution = registry(&server)
        .resolve("banana", None, &mirrors)
        .await
        .unwrap();

    assert_eq!(resolution.repo_name, "DOI");
    assert_eq!(resolution.metadata, MetadataOutcome::Unavailable);
    assert!(resolution.download_url.ends_with("/files/banana.pdf"));
}

#[tokio::test]
async fn test_mirrors_are_tried_in_order_and_first_success_wins() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };

    Mock::given(method("GET"))
        .and(path("/doi/10.1000/182"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(csl_record(), CSL_JSON))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/m1"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;
    mount_mirror(&server, "/m2", "/m2/10.1000/182", "/files/from-m2.pdf").await;
    Mock::given(method("GET"))
        .and(path("/m3"))
        .respond_with(html("<html>mirror</html>".to_string()))
        .expect(0)
        .mount(&server)
        .await;

    let mirrors: Vec<String> = ["m1", "m2", "m3"]
        .iter()
        .map(|name| format!("{}/{name}", server.uri()))
        .collect();
    let resolution = registry(&server)
        .resolve("10.1000/182", None, &mirrors)
        .await
        .unwrap();

    assert!(resolution.download_url.ends_with("/files/from-m2.pdf"));
}

#[tokio::test]
async fn test_first_of_several_download_links_is_used() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };

    Mock::given(method("GET"))
        .and(path("/m1"))
        .respond_with(html("<html>mirror</html>".to_string()))
        .mount(&server)
        .await;
    let page = format!(
        "{}\n{}",
        mirror_page("/files/first.pdf"),
        mirror_page("/files/second.pdf")
    );
    Mock::given(method("GET"))
        .and(path("/m1/10.1000/182"))
        .respond_with(html(page))
        .mount(&server)
        .await;

    let mirrors = vec![format!("{}/m1", server.uri())];
    let resolution = registry(&server)
        .resolve("10.1000/182", None, &mirrors)
        .await
        .unwrap();

    assert!(resolution.download_url.ends_with("/files/first.pdf"));
    assert_eq!(
        resolution.link_candidates,
        vec![
            format!("{}/files/first.pdf", server.uri()),
            format!("{}/files/second.pdf", server.uri()),
        ]
    );
}

#[tokio::test]
async fn test_all_mirrors_failing_is_file_not_found() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };

    Mock::given(method("GET"))
        .and(path("/m1"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/m2"))
        .respond_with(html("<html>mirror</html>".to_string()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/m2/10.1000/182"))
        .respond_with(html("<html>no such article</html>".to_string()))
        .mount(&server)
        .await;

    let mirrors = vec![format!("{}/m1", server.uri()), format!("{}/m2", server.uri())];
    let err = registry(&server)
        .resolve("10.1000/182", None, &mirrors)
        .await
        .err()
        .unwrap();

    assert!(
        matches!(err, ResolveError::FileNotFound { tried_count: 2, .. }),
        "unexpected error: {err}"
    );
}

#[tokio::test]
async fn test_doi_without_mirrors_is_no_mirror_configured() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };

    let err = registry(&server)
        .resolve("10.1000/182", None, &[])
        .await
        .err()
        .unwrap();
    assert!(matches!(err, ResolveError::NoMirrorConfigured { .. }));
}

#[tokio::test]
async fn test_arxiv_uses_builtin_mirror_and_atom_metadata() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };

    let feed = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>ArXiv Query</title>
  <entry>
    <id>http://arxiv.org/abs/2101.00001v1</id>
    <updated>2021-02-01T00:00:00Z</updated>
    <published>2020-12-31T18:00:00Z</published>
    <title>Quantum   walks on graphs</title>
    <author><name>Jane Q. Doe</name></author>
    <author><name>John Roe</name></author>
  </entry>
</feed>"#;
    Mock::given(method("GET"))
        .and(path("/api/query"))
        .and(query_param("id_list", "2101.00001"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(feed, "application/atom+xml"))
        .mount(&server)
        .await;

    let resolution = registry(&server)
        .resolve("arXiv:2101.00001", None, &[])
        .await
        .unwrap();

    assert_eq!(resolution.repo_name, "arXiv");
    assert_eq!(
        resolution.download_url,
        format!("{}/pdf/2101.00001.pdf", server.uri())
    );
    let metadata = resolution.metadata.metadata().unwrap();
    assert_eq!(metadata.title, "Quantum walks on graphs");
    assert_eq!(metadata.year, "2020");
    assert_eq!(metadata.authors.len(), 2);
    assert_eq!(metadata.authors[0].family, "Doe");
}

#[tokio::test]
async fn test_pmid_without_doi_posts_identifier_to_mirror() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };

    let summary = serde_json::json!({
        "result": {
            "uids": ["31452104"],
            "31452104": {
                "title": "Gut microbes and health.",
                "pubdate": "2019 Aug 26",
                "authors": [
                    {"name": "Smith AB", "authtype": "Author"},
                    {"name": "Consortium X", "authtype": "CollectiveName"}
                ],
                "articleids": [{"idtype": "pubmed", "value": "31452104"}]
            }
        }
    });
    Mock::given(method("GET"))
        .and(path("/eutils/esummary.fcgi"))
        .and(query_param("id", "31452104"))
        .respond_with(ResponseTemplate::new(200).set_body_json(summary))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/m1"))
        .respond_with(html("<html>mirror</html>".to_string()))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/m1"))
        .and(body_string("request=31452104"))
        .respond_with(html(mirror_page("/files/pmid.pdf")))
        .expect(1)
        .mount(&server)
        .await;

    let mirrors = vec![format!("{}/m1", server.uri())];
    let resolution = registry(&server)
        .resolve("pmid:31452104", None, &mirrors)
        .await
        .unwrap();

    assert_eq!(resolution.repo_name, "PMID");
    assert!(resolution.download_url.ends_with("/files/pmid.pdf"));
    let metadata = resolution.metadata.metadata().unwrap();
    assert_eq!(metadata.title, "Gut microbes and health");
    assert_eq!(metadata.year, "2019");
    assert_eq!(metadata.authors.len(), 1);
    assert_eq!(metadata.authors[0].given, "A B");
}

#[tokio::test]
async fn test_sciencedirect_queries_mirror_with_record_doi() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };

    let ris = "TY  - JOUR\r\nTI  - Battery ageing\r\nAU  - Lee, Kim\r\nPY  - 2021\r\nDO  - https://doi.org/10.1016/j.est.2021.1\r\nER  - \r\n";
    Mock::given(method("GET"))
        .and(path("/sd/sdfe/arp/cite"))
        .and(query_param("pii", "S2352152X21000001"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(ris, RIS))
        .mount(&server)
        .await;
    mount_mirror(
        &server,
        "/m1",
        "/m1/10.1016/j.est.2021.1",
        "/files/battery.pdf",
    )
    .await;

    let mirrors = vec![format!("{}/m1", server.uri())];
    let resolution = registry(&server)
        .resolve(
            "https://www.sciencedirect.com/science/article/pii/S2352152X21000001",
            None,
            &mirrors,
        )
        .await
        .unwrap();

    assert_eq!(resolution.repo_name, "ScienceDirect");
    assert!(resolution.download_url.ends_with("/files/battery.pdf"));
    let metadata = resolution.metadata.metadata().unwrap();
    assert_eq!(metadata.title, "Battery ageing");
    assert_eq!(metadata.authors[0].family, "Lee");
}

#[tokio::test]
async fn test_forced_type_skips_detection() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };

    let ris = "TY  - JOUR\nTI  - Stable title\nAU  - Roe, John\nPY  - 1999\nER  - \n";
    Mock::given(method("GET"))
        .and(path("/jstor/citation/ris/1234"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(ris, RIS))
        .expect(1)
        .mount(&server)
        .await;

    let resolution = registry(&server)
        .resolve("1234", Some(RepoKind::Jstor), &[])
        .await;
    let err = resolution.err().unwrap();
    assert!(
        matches!(err, ResolveError::NoMirrorConfigured { ref repo, .. } if repo == "JSTOR"),
        "unexpected error: {err}"
    );
}
