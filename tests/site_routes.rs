mod common;

use dankdrafts::pages::{generate_sitemap, render_sitemap};
use dankdrafts::settings::Settings;
use dankdrafts::templates::{Template, TemplateRepository};
use reqwest::StatusCode;
use time::OffsetDateTime;

async fn site() -> String {
    let addr = common::spawn_site(Settings::default(), common::catalog()).await;
    format!("http://{}", addr)
}

#[tokio::test]
async fn templates_api_lists_by_name() {
    let base = site().await;
    let templates: Vec<Template> = reqwest::get(format!("{}/api/templates", base))
        .await
        .expect("request")
        .json()
        .await
        .expect("json");
    let names: Vec<&str> = templates.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["Buttons", "Drake"]);

    let response = reqwest::get(format!("{}/api/templates/A", base))
        .await
        .expect("request");
    assert_eq!(response.status(), StatusCode::OK);
    let template: Template = response.json().await.expect("json");
    assert_eq!(template, common::template("A", "Drake"));

    let response = reqwest::get(format!("{}/api/templates/missing-id", base))
        .await
        .expect("request");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn gallery_and_editor_pages() {
    let base = site().await;
    let response = reqwest::get(format!("{}/", base)).await.expect("request");
    assert_eq!(response.status(), StatusCode::OK);
    let html = response.text().await.expect("html");
    let buttons = html.find(">Buttons<").expect("buttons card");
    let drake = html.find(">Drake<").expect("drake card");
    assert!(buttons < drake);

    let response = reqwest::get(format!("{}/editor/A", base))
        .await
        .expect("request");
    assert_eq!(response.status(), StatusCode::OK);
    let html = response.text().await.expect("html");
    assert!(html.contains("<title>Drake Meme Generator</title>"));
    assert!(html.contains("Text goes here..."));

    let response = reqwest::get(format!("{}/editor/missing-id", base))
        .await
        .expect("request");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let html = response.text().await.expect("html");
    assert!(html.contains("Template not found"));
}

#[tokio::test]
async fn health_and_sitemap_routes() {
    let base = site().await;
    let health: serde_json::Value = reqwest::get(format!("{}/health", base))
        .await
        .expect("request")
        .json()
        .await
        .expect("json");
    assert_eq!(health["status"], "ok");

    let response = reqwest::get(format!("{}/sitemap.xml", base))
        .await
        .expect("request");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "application/xml");
    let xml = response.text().await.expect("xml");
    assert!(xml.contains("<loc>https://dankdrafts.com/editor/B</loc>"));
    assert_eq!(xml.matches("<url>").count(), 3);
}

#[tokio::test]
async fn sitemap_snapshot() {
    let repository = TemplateRepository::new(common::catalog());
    let now = OffsetDateTime::from_unix_timestamp(1_700_000_000).expect("timestamp");
    let entries = generate_sitemap(&repository, "https://dankdrafts.com", now).await;
    let xml = render_sitemap(&entries).expect("xml");
    insta::assert_snapshot!("sitemap", xml);
}
