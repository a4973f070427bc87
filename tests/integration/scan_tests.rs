//! Integration tests for the marketplace scans
//!
//! These tests use wiremock to stand in for the marketplace and run each
//! scan end-to-end into a temporary SQLite database.

use bazaar_sweep::config::{Config, OutputConfig, ScanConfig, SiteConfig};
use bazaar_sweep::crawler::{
    discover_categories, run_link_scan, run_update_scan, scrape_product_details,
    scrape_seller_profiles, update_product_counts, ScanEnd, SiteClient,
};
use bazaar_sweep::state::ProductStatus;
use bazaar_sweep::storage::{ProductSummary, RunStatus, SqliteStorage, Storage};
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration pointing at the mock server
fn create_test_config(base_url: &str, db_path: &str) -> Config {
    Config {
        site: SiteConfig {
            base_url: base_url.to_string(),
            user_agent: "bazaar-sweep-test/1.0".to_string(),
            request_timeout_secs: 5,
            max_retries: 2,
            retry_backoff_ms: 1,
        },
        scan: ScanConfig {
            link_workers: 2,
            update_workers: 2,
            ..ScanConfig::default()
        },
        output: OutputConfig {
            database_path: db_path.to_string(),
        },
    }
}

fn open_storage(dir: &TempDir) -> (SqliteStorage, String) {
    let db_path = dir.path().join("sweep.db");
    let storage = SqliteStorage::new(&db_path).expect("Failed to open database");
    (storage, db_path.to_string_lossy().to_string())
}

/// Renders a search result page listing the given `(href, name)` items
fn listing_page(items: &[(&str, &str)]) -> String {
    let body: String = items
        .iter()
        .map(|(href, name)| {
            format!(
                r#"<div class="bg-light latest-list-item">
                     <div class="col m7 s8"><h5><a href="{}">{}</a></h5></div>
                   </div>"#,
                href, name
            )
        })
        .collect();
    format!("<html><body>{}</body></html>", body)
}

/// Answers every search page not mounted before it with no results
async fn mount_empty_results(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/index.php"))
        .and(query_param("page", "search"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing_page(&[])))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_update_scan_sends_filters_and_stores_listings() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let (mut storage, db_path) = open_storage(&dir);
    let config = create_test_config(&server.uri(), &db_path);

    Mock::given(method("GET"))
        .and(path("/index.php"))
        .and(query_param("page", "search"))
        .and(query_param("hw_timeframe", "3"))
        .and(query_param("hw_num", "100"))
        .and(query_param("off", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing_page(&[
            ("/toyota-axio-o501.html", "Toyota Axio"),
            ("/suzuki-swift-o502.html", "Suzuki Swift"),
        ])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/index.php"))
        .and(query_param("hw_timeframe", "3"))
        .and(query_param("off", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing_page(&[(
            "/honda-fit-o503.html",
            "Honda Fit",
        )])))
        .expect(1)
        .mount(&server)
        .await;
    mount_empty_results(&server).await;

    let report = run_update_scan(&config, "hash", &mut storage, None, Some(3))
        .await
        .unwrap()
        .expect("scan should run with a day window");

    assert_eq!(report.pages_delivered, 2);
    assert_eq!(report.products_delivered, 3);
    assert_eq!(report.end, ScanEnd::Exhausted);

    let product = storage.get_product_by_listing_id(503).unwrap().unwrap();
    assert_eq!(product.name, "Honda Fit");
    assert_eq!(product.url, format!("{}/honda-fit-o503.html", server.uri()));
    assert_eq!(product.status, ProductStatus::NotScraped);
}

#[tokio::test]
async fn test_update_scan_without_filters_sends_nothing() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let (mut storage, db_path) = open_storage(&dir);
    let config = create_test_config(&server.uri(), &db_path);

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let report = run_update_scan(&config, "hash", &mut storage, None, None)
        .await
        .unwrap();

    assert!(report.is_none());
}

#[tokio::test]
async fn test_not_found_page_ends_scan() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let (mut storage, db_path) = open_storage(&dir);
    let config = create_test_config(&server.uri(), &db_path);

    Mock::given(method("GET"))
        .and(path("/index.php"))
        .and(query_param("off", "0"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(listing_page(&[("/dhoni-o900.html", "Dhoni")])),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/index.php"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let report = run_update_scan(&config, "hash", &mut storage, Some(8), Some(1))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(report.pages_delivered, 1);
    assert_eq!(report.end_page, 1);
    assert_eq!(report.end, ScanEnd::Exhausted);
}

#[tokio::test]
async fn test_server_errors_are_retried_then_end_scan() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let (mut storage, db_path) = open_storage(&dir);
    let config = create_test_config(&server.uri(), &db_path);

    // One attempt plus two retries
    Mock::given(method("GET"))
        .and(path("/index.php"))
        .and(query_param("off", "0"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;
    mount_empty_results(&server).await;

    let report = run_update_scan(&config, "hash", &mut storage, None, Some(2))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(report.pages_delivered, 0);
    assert!(matches!(report.end, ScanEnd::Failed(_)));

    let runs = storage.recent_runs(1).unwrap();
    assert_eq!(runs[0].status, RunStatus::Failed);
    assert_eq!(runs[0].kind, "updates");
}

#[tokio::test]
async fn test_link_scan_covers_each_top_level_category() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let (mut storage, db_path) = open_storage(&dir);
    let config = create_test_config(&server.uri(), &db_path);

    storage.insert_category(1, "Vehicles", None).unwrap();
    storage.insert_category(2, "Electronics", None).unwrap();
    storage.insert_category(11, "Cars", Some(1)).unwrap();

    Mock::given(method("GET"))
        .and(path("/index.php"))
        .and(query_param("cid", "1"))
        .and(query_param("off", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing_page(&[
            ("/pickup-o11.html", "Pickup"),
            ("/scooter-o12.html", "Scooter"),
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/index.php"))
        .and(query_param("cid", "2"))
        .and(query_param("off", "0"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(listing_page(&[("/tv-o21.html", "TV")])),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/index.php"))
        .and(query_param("cid", "11"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    mount_empty_results(&server).await;

    let scans = run_link_scan(&config, "hash", &mut storage).await.unwrap();

    assert_eq!(scans.len(), 2);
    assert_eq!(scans[0].report.products_delivered, 2);
    assert_eq!(scans[1].report.products_delivered, 1);

    let tv = storage.get_product_by_listing_id(21).unwrap().unwrap();
    assert_eq!(storage.get_product_categories(tv.id).unwrap(), vec![2]);
    assert_eq!(storage.recent_runs(10).unwrap().len(), 2);
}

#[tokio::test]
async fn test_category_discovery_walks_tree() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let (mut storage, db_path) = open_storage(&dir);
    let config = create_test_config(&server.uri(), &db_path);

    let children = [
        ("0", r#"[{"1":"Vehicles"},{"2":"Electronics"}]"#),
        ("1", r#"[{"11":"Cars"}]"#),
        ("2", "<html>Server error</html>"),
        ("11", "[]"),
    ];
    for (id, body) in children {
        Mock::given(method("GET"))
            .and(path("/index.php"))
            .and(query_param("page", "cat_ajax"))
            .and(query_param("id", id))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .expect(1)
            .mount(&server)
            .await;
    }

    let client = SiteClient::new(&config.site, true).unwrap();
    let summary = discover_categories(&client, &mut storage).await.unwrap();

    assert_eq!(summary.discovered, 3);
    assert_eq!(summary.inserted, 3);
    assert_eq!(summary.failed_nodes, 1);

    let top: Vec<i64> = storage
        .list_top_level_categories()
        .unwrap()
        .iter()
        .map(|c| c.id)
        .collect();
    assert_eq!(top, vec![1, 2]);

    let cars = storage
        .list_all_categories()
        .unwrap()
        .into_iter()
        .find(|c| c.id == 11)
        .unwrap();
    assert_eq!(cars.parent_id, Some(1));
    assert_eq!(cars.name, "Cars");

    // Second pass finds the same tree and inserts nothing new
    let server_again = MockServer::start().await;
    Mock::given(method("GET"))
        .and(query_param("id", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"[{"1":"Vehicles"}]"#))
        .mount(&server_again)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
        .mount(&server_again)
        .await;
    let client = SiteClient::new(&create_test_config(&server_again.uri(), &db_path).site, true)
        .unwrap();
    let summary = discover_categories(&client, &mut storage).await.unwrap();
    assert_eq!(summary.inserted, 0);
}

#[tokio::test]
async fn test_counts_are_recorded() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let (mut storage, db_path) = open_storage(&dir);
    let config = create_test_config(&server.uri(), &db_path);

    storage.insert_category(1, "Vehicles", None).unwrap();
    storage.insert_category(2, "Electronics", None).unwrap();
    storage.insert_category(3, "Jobs", None).unwrap();

    Mock::given(method("GET"))
        .and(path("/processor-b1_0.html"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<div class="view-switch"><b>1,234</b> ads found</div>"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/processor-b2_0.html"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<div>No ads</div>"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/processor-b3_0.html"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = SiteClient::new(&config.site, true).unwrap();
    let updated = update_product_counts(&client, &mut storage).await.unwrap();

    assert_eq!(updated, 2);
    let counts: Vec<(i64, i64)> = storage
        .list_all_categories()
        .unwrap()
        .iter()
        .map(|c| (c.id, c.product_count))
        .collect();
    assert_eq!(counts, vec![(1, 1234), (2, 0), (3, 0)]);
}

#[tokio::test]
async fn test_details_and_seller_profiles() {
    let server = MockServer::start().await;
    let base = server.uri();
    let dir = TempDir::new().unwrap();
    let (mut storage, db_path) = open_storage(&dir);
    let config = create_test_config(&base, &db_path);

    let listings: Vec<ProductSummary> = [(10, "car"), (11, "gone"), (12, "missing"), (13, "blocked")]
        .iter()
        .map(|(id, slug)| ProductSummary {
            listing_id: *id,
            name: slug.to_string(),
            url: format!("{}/{}-o{}.html", base, slug, id),
        })
        .collect();
    storage.upsert_products(&listings, None).unwrap();

    Mock::given(method("GET"))
        .and(path("/car-o10.html"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<html><body>
                 <div class="iw-details-heading"><h5>Nissan Sunny 2015</h5></div>
                 <div class="details-page_product-info"><span class="price">MVR 95,000</span></div>
                 <div id="fullscreen-viewer"><img src="/img/1.jpg"></div>
                 <div class="item-info-table"><table>
                   <tr><td>Location</td><td>Hulhumale'</td></tr>
                   <tr><td>Mileage</td><td>40000</td></tr>
                 </table></div>
                 <a class="iw-user-name" href="/index.php?page=profile&amp;id=77"><b>Aminath</b></a>
                 <span class="i-detail-des-n">9601234</span>
               </body></html>"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/gone-o11.html"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/missing-o12.html"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/blocked-o13.html"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/index.php"))
        .and(query_param("page", "profile"))
        .and(query_param("id", "77"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<html><body><div class="bg-light">
                 <div class="col s6 l2"><img src="/avatars/77.png"></div>
                 <div class="col s12 l6"><p><b>Hulhumale'</b><b>2020</b></p></div>
               </div></body></html>"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    let client = SiteClient::new(&config.site, false).unwrap();
    let summary = scrape_product_details(&client, &mut storage, None).await.unwrap();

    assert_eq!(summary.scraped, 1);
    assert_eq!(summary.missing, 2);
    assert_eq!(summary.failed, 1);

    let status = |storage: &SqliteStorage, id| {
        storage.get_product_by_listing_id(id).unwrap().unwrap().status
    };
    assert_eq!(status(&storage, 10), ProductStatus::Scraped);
    assert_eq!(status(&storage, 11), ProductStatus::Missing);
    assert_eq!(status(&storage, 12), ProductStatus::Missing);
    assert_eq!(status(&storage, 13), ProductStatus::Failed);

    let car = storage.get_product_by_listing_id(10).unwrap().unwrap();
    assert_eq!(car.name, "Nissan Sunny 2015");
    assert_eq!(car.price, Some(95000.0));
    assert_eq!(car.location.as_deref(), Some("Hulhumale'"));
    assert_eq!(car.seller_id, Some(77));
    assert_eq!(
        storage.get_product_images(car.id).unwrap(),
        vec![format!("{}/img/1.jpg", base)]
    );
    assert_eq!(
        storage.get_product_info(car.id).unwrap(),
        vec![("Mileage".to_string(), "40000".to_string())]
    );

    // Nothing left to scrape on a second pass
    let summary = scrape_product_details(&client, &mut storage, None).await.unwrap();
    assert_eq!(summary.scraped + summary.missing + summary.failed, 0);

    let client = SiteClient::new(&config.site, true).unwrap();
    let sellers = scrape_seller_profiles(&client, &mut storage).await.unwrap();
    assert_eq!(sellers.updated, 1);

    let seller = storage.get_seller(77).unwrap().unwrap();
    assert_eq!(seller.name.as_deref(), Some("Aminath"));
    assert_eq!(seller.contact_number.as_deref(), Some("9601234"));
    assert_eq!(
        seller.profile.image_src,
        Some(format!("{}/avatars/77.png", base))
    );
    assert_eq!(seller.profile.location.as_deref(), Some("Hulhumale'"));
    assert!(!seller.profile.is_premium);
}
