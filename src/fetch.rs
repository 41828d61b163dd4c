// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
//! Streaming byte sources for sample data.
use std::fmt;

use async_trait::async_trait;
use futures_util::stream::BoxStream;

mod error;
mod file;
mod http;

pub use self::error::FetchError;
pub use self::file::FileFetcher;
pub use self::http::HttpFetcher;

/// A stream of body chunks.
pub type ByteStream = BoxStream<'static, Result<Vec<u8>, FetchError>>;

/// The start of a streamed response: the advertised length and the body.
pub struct FetchResponse {
    /// Total body size in bytes if the source advertises one.
    pub content_length: Option<u64>,
    pub body: ByteStream,
}

impl fmt::Debug for FetchResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchResponse")
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Opens a streaming read of the bytes behind a URL.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchResponse, FetchError>;
}

/// Routes http(s) URLs to [`HttpFetcher`] and everything else to [`FileFetcher`].
#[derive(Default)]
pub struct SourceFetcher {
    http: HttpFetcher,
    file: FileFetcher,
}

impl SourceFetcher {
    pub fn new() -> SourceFetcher {
        SourceFetcher::default()
    }
}

#[async_trait]
impl Fetcher for SourceFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchResponse, FetchError> {
        if is_http(url) {
            self.http.fetch(url).await
        } else {
            self.file.fetch(url).await
        }
    }
}

fn is_http(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}
