//! Shared fixtures for imgprep-core integration tests.
//!
//! Serves in-memory files over HTTP from a background thread so the blocking fetcher can be
//! exercised without external network access.

#![allow(dead_code)]

use axum::Router;
use axum::routing::get;
use image::{ImageFormat, Rgb, RgbImage};
use std::io::{Cursor, Write};
use std::net::SocketAddr;

pub struct FixtureServer {
    base_url: String,
}

impl FixtureServer {
    /// Serve each `(path, body)` pair with `GET` (and implicit `HEAD`).
    pub fn start(files: Vec<(&'static str, Vec<u8>)>) -> Self {
        let mut app = Router::new();
        for (path, body) in files {
            app = app.route(
                path,
                get(move || {
                    let body = body.clone();
                    async move { body }
                }),
            );
        }
        Self::serve(app)
    }

    /// Serve a prebuilt router, for routes that need more than a fixed `GET` body.
    pub fn serve(app: Router) -> Self {
        let (tx, rx) = std::sync::mpsc::channel::<SocketAddr>();
        std::thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            runtime.block_on(async move {
                let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
                tx.send(listener.local_addr().unwrap()).unwrap();
                axum::serve(listener, app).await.unwrap();
            });
        });

        let addr = rx.recv().unwrap();
        Self {
            base_url: format!("http://{addr}"),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// PNG bytes of a solid-color image.
pub fn png_bytes(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    RgbImage::from_pixel(width, height, Rgb(color))
        .write_to(&mut out, ImageFormat::Png)
        .unwrap();
    out.into_inner()
}

/// Zip archive bytes holding `entries`.
pub fn zip_bytes(entries: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);
    for (name, data) in entries {
        zip.start_file(*name, options).unwrap();
        zip.write_all(data).unwrap();
    }
    zip.finish().unwrap().into_inner()
}
