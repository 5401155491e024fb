//! Helpers shared by the registry and tarball tests.

use axum::Router;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::{self, Write};
use std::net::TcpListener;
use std::thread;
use tar::{Builder, EntryType, Header};

/// Serve `app` on an ephemeral local port from a background thread.
///
/// The socket is bound before this returns, so requests made right away
/// queue up instead of being refused. Returns the base URL without a
/// trailing slash.
pub fn serve(app: Router) -> String {
    serve_with(|_| app)
}

/// Like [`serve`], but builds the router from the base URL it will be
/// reachable at (for documents that link back to the server).
pub fn serve_with(make_app: impl FnOnce(String) -> Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.set_nonblocking(true).unwrap();
    let addr = listener.local_addr().unwrap();
    let app = make_app(format!("http://{addr}"));

    thread::spawn(move || {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async move {
            let listener = tokio::net::TcpListener::from_std(listener).unwrap();
            axum::serve(listener, app).await.unwrap();
        });
    });

    format!("http://{addr}")
}

/// A local URL nothing is listening on.
pub fn unused_local_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

/// Builds gzip-compressed tarballs in memory.
pub struct TarballBuilder {
    builder: Builder<Vec<u8>>,
}

impl TarballBuilder {
    pub fn new() -> Self {
        Self {
            builder: Builder::new(Vec::new()),
        }
    }

    pub fn file(self, path: &str, data: &[u8]) -> Self {
        self.file_with_mode(path, data, 0o644)
    }

    pub fn file_with_mode(mut self, path: &str, data: &[u8], mode: u32) -> Self {
        let mut header = Header::new_gnu();
        header.set_path(path).unwrap();
        header.set_size(data.len() as u64);
        header.set_mode(mode);
        header.set_entry_type(EntryType::Regular);
        header.set_cksum();
        self.builder.append(&header, data).unwrap();
        self
    }

    pub fn dir(mut self, path: &str) -> Self {
        let mut header = Header::new_gnu();
        header.set_path(path).unwrap();
        header.set_size(0);
        header.set_mode(0o755);
        header.set_entry_type(EntryType::Directory);
        header.set_cksum();
        self.builder.append(&header, io::empty()).unwrap();
        self
    }

    pub fn symlink(mut self, path: &str, target: &str) -> Self {
        let mut header = Header::new_gnu();
        header.set_path(path).unwrap();
        header.set_link_name(target).unwrap();
        header.set_size(0);
        header.set_mode(0o777);
        header.set_entry_type(EntryType::Symlink);
        header.set_cksum();
        self.builder.append(&header, io::empty()).unwrap();
        self
    }

    pub fn finish(self) -> Vec<u8> {
        let tar_bytes = self.builder.into_inner().unwrap();
        Self::gzip(&tar_bytes)
    }

    pub fn gzip(tar_bytes: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(tar_bytes).unwrap();
        encoder.finish().unwrap()
    }
}
