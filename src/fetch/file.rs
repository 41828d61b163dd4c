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
use std::path::PathBuf;

use async_trait::async_trait;
use futures_util::{stream, StreamExt};
use tokio::{fs, io::AsyncReadExt};
use tracing::debug;

use super::{FetchError, FetchResponse, Fetcher};

const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Streams sample bytes from the local filesystem. Accepts `file://` URLs and
/// plain paths.
#[derive(Clone)]
pub struct FileFetcher {
    chunk_size: usize,
}

impl FileFetcher {
    pub fn new(chunk_size: usize) -> FileFetcher {
        FileFetcher {
            chunk_size: chunk_size.max(1),
        }
    }
}

impl Default for FileFetcher {
    fn default() -> Self {
        FileFetcher::new(DEFAULT_CHUNK_SIZE)
    }
}

fn to_path(url: &str) -> Result<PathBuf, FetchError> {
    match url.split_once("://") {
        Some(("file", path)) => Ok(PathBuf::from(path)),
        Some(_) => Err(FetchError::UnsupportedUrl(url.to_string())),
        None => Ok(PathBuf::from(url)),
    }
}

#[async_trait]
impl Fetcher for FileFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchResponse, FetchError> {
        let path = to_path(url)?;
        let io_error = |source| FetchError::Io {
            path: path.display().to_string(),
            source,
        };

        let file = fs::File::open(&path).await.map_err(io_error)?;
        let content_length = file.metadata().await.map_err(io_error)?.len();
        debug!(path = %path.display(), content_length, "Streaming sample from file");

        let chunk_size = self.chunk_size;
        let display = path.display().to_string();
        let body = stream::unfold(Some(file), move |file| {
            let display = display.clone();
            async move {
                let mut file = file?;
                let mut chunk = vec![0u8; chunk_size];
                match file.read(&mut chunk).await {
                    Ok(0) => None,
                    Ok(read) => {
                        chunk.truncate(read);
                        Some((Ok(chunk), Some(file)))
                    }
                    Err(source) => Some((
                        Err(FetchError::Io {
                            path: display,
                            source,
                        }),
                        None,
                    )),
                }
            }
        })
        .boxed();

        Ok(FetchResponse {
            content_length: Some(content_length),
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use futures_util::StreamExt;

    use super::*;

    #[test]
    fn test_to_path() {
        assert_eq!(to_path("file:///tmp/a.wav").unwrap(), PathBuf::from("/tmp/a.wav"));
        assert_eq!(to_path("samples/a.wav").unwrap(), PathBuf::from("samples/a.wav"));
        assert!(matches!(
            to_path("ftp://host/a.wav"),
            Err(FetchError::UnsupportedUrl(_))
        ));
    }

    #[tokio::test]
    async fn test_chunked_read() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let data: Vec<u8> = (0..=9).collect();
        file.write_all(&data).unwrap();

        let url = format!("file://{}", file.path().display());
        let response = FileFetcher::new(4).fetch(&url).await.unwrap();
        assert_eq!(response.content_length, Some(10));

        let chunks: Vec<Vec<u8>> = response.body.map(|c| c.unwrap()).collect().await;
        assert!(chunks.len() >= 3);
        assert!(chunks.iter().all(|chunk| !chunk.is_empty() && chunk.len() <= 4));
        assert_eq!(chunks.concat(), data);
    }

    #[tokio::test]
    async fn test_missing_file() {
        let result = FileFetcher::default().fetch("/definitely/not/here.wav").await;
        assert!(matches!(result, Err(FetchError::Io { .. })));
    }
}
