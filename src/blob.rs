use std::future::Future;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::pin::Pin;

use axum::body::Bytes;
use tokio::fs as tokio_fs;

pub type BlobFuture<'a, T> = Pin<Box<dyn Future<Output = io::Result<T>> + Send + 'a>>;

/// Where uploaded image bytes live. Not transactional with the database.
pub trait BlobStore: Send + Sync {
    /// Stores `bytes` under `key` and returns the public URL.
    fn put<'a>(&'a self, key: &'a str, bytes: Bytes) -> BlobFuture<'a, String>;

    fn open<'a>(&'a self, key: &'a str) -> BlobFuture<'a, tokio_fs::File>;

    fn remove<'a>(&'a self, key: &'a str) -> BlobFuture<'a, ()>;
}

/// Blob store backed by a local directory, served back through `/uploads/:key`.
#[derive(Clone, Debug)]
pub struct LocalBlobStore {
    root: PathBuf,
    public_url: String,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>, public_url: impl Into<String>) -> LocalBlobStore {
        LocalBlobStore {
            root: root.into(),
            public_url: public_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn path_for(&self, key: &str) -> io::Result<PathBuf> {
        let relative = Path::new(key);
        let plain = relative
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
        if !plain || key.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid blob key {key:?}"),
            ));
        }
        Ok(self.root.join(relative))
    }
}

impl BlobStore for LocalBlobStore {
    fn put<'a>(&'a self, key: &'a str, bytes: Bytes) -> BlobFuture<'a, String> {
        Box::pin(async move {
            let path = self.path_for(key)?;
            tokio_fs::create_dir_all(&self.root).await?;
            tokio_fs::write(&path, &bytes).await?;
            Ok(format!("{}/uploads/{}", self.public_url, key))
        })
    }

    fn open<'a>(&'a self, key: &'a str) -> BlobFuture<'a, tokio_fs::File> {
        Box::pin(async move {
            let path = self.path_for(key)?;
            tokio_fs::File::open(path).await
        })
    }

    fn remove<'a>(&'a self, key: &'a str) -> BlobFuture<'a, ()> {
        Box::pin(async move {
            let path = self.path_for(key)?;
            match tokio_fs::remove_file(path).await {
                Ok(()) => Ok(()),
                Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
                Err(err) => Err(err),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_open_remove_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path(), "http://localhost:3000/");

        let url = store
            .put("photo.png", Bytes::from_static(b"png-bytes"))
            .await
            .unwrap();
        assert_eq!(url, "http://localhost:3000/uploads/photo.png");
        assert!(store.open("photo.png").await.is_ok());

        store.remove("photo.png").await.unwrap();
        assert!(store.open("photo.png").await.is_err());
        // Removing twice is not an error.
        store.remove("photo.png").await.unwrap();
    }

    #[tokio::test]
    async fn rejects_keys_escaping_the_root() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path(), "http://localhost:3000");

        let err = store
            .put("../outside.png", Bytes::from_static(b"x"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }
}
