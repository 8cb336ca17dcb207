//! Test helpers for integration tests.
//!
//! Provides an in-process HTTP server and feed fixtures.

#![allow(dead_code)]

use std::net::SocketAddr;

use axum::Router;
use chrono::{DateTime, Utc};
use tokio::net::TcpListener;

/// Serve `router` on an ephemeral local port and return its base URL.
pub async fn spawn_server(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr: SocketAddr = listener.local_addr().expect("Failed to get local addr");

    tokio::spawn(async move {
        axum::serve(listener, router)
            .await
            .expect("Test server failed");
    });

    format!("http://{addr}")
}

/// A feed item fixture.
pub struct Item<'a> {
    pub guid: &'a str,
    pub title: &'a str,
    pub description: &'a str,
    pub published: DateTime<Utc>,
}

impl<'a> Item<'a> {
    pub fn new(guid: &'a str, title: &'a str, published: DateTime<Utc>) -> Self {
        Self {
            guid,
            title,
            description: "",
            published,
        }
    }

    pub fn with_description(mut self, description: &'a str) -> Self {
        self.description = description;
        self
    }
}

/// Render an RSS 2.0 document.
pub fn rss_document(items: &[Item<'_>]) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Test Feed</title>
    <link>https://example.tld/</link>
    <description>Integration test feed</description>
"#,
    );

    for item in items {
        xml.push_str(&format!(
            "    <item>\n      <title>{}</title>\n      <link>https://example.tld/{}</link>\n      \
             <guid>{}</guid>\n      <description>{}</description>\n      <pubDate>{}</pubDate>\n    </item>\n",
            item.title,
            item.guid,
            item.guid,
            item.description,
            item.published.to_rfc2822()
        ));
    }

    xml.push_str("  </channel>\n</rss>\n");
    xml
}
