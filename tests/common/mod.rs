use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use dankdrafts::server::{AppState, build_router};
use dankdrafts::settings::Settings;
use dankdrafts::templates::{CatalogStore, StoreImpl, Template};

pub fn template(id: &str, name: &str) -> Template {
    Template {
        id: id.to_string(),
        name: name.to_string(),
        image: format!("https://firebasestorage.googleapis.com/{}.jpg", id),
        width: 1200,
        height: 900,
    }
}

pub fn catalog() -> StoreImpl {
    StoreImpl::Catalog(CatalogStore::new(vec![
        template("A", "Drake"),
        template("B", "Buttons"),
    ]))
}

pub async fn spawn(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    addr
}

pub async fn spawn_site(settings: Settings, store: StoreImpl) -> SocketAddr {
    let state = AppState::with_store(settings, store).expect("state");
    spawn(build_router(Arc::new(state))).await
}
