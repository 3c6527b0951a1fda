//! The Uploader capability: finds/creates playlists and uploads videos to
//! the configured video host (YouTube Data API v3 in production).

use std::path::Path;

use async_trait::async_trait;
use base::Error;
use tracing::{debug, warn};

#[async_trait]
pub trait Uploader: Send + Sync {
    async fn authenticate(&self) -> Result<(), Error>;
    async fn find_playlist(&self, name: &str) -> Result<Option<String>, Error>;
    async fn create_playlist(&self, name: &str, description: &str, privacy: &str) -> Result<String, Error>;
    async fn upload(
        &self,
        file: &Path,
        title: &str,
        description: &str,
        tags: &[String],
        privacy: &str,
        playlist_id: Option<&str>,
    ) -> Result<Option<String>, Error>;
    async fn add_to_playlist(&self, video_id: &str, playlist_id: &str) -> Result<bool, Error>;
}

pub struct YoutubeUploader {
    client: reqwest::Client,
    access_token: String,
}

impl YoutubeUploader {
    pub fn new(access_token: String) -> Self {
        YoutubeUploader {
            client: reqwest::Client::new(),
            access_token,
        }
    }
}

#[async_trait]
impl Uploader for YoutubeUploader {
    async fn authenticate(&self) -> Result<(), Error> {
        let resp = self
            .client
            .get("https://www.googleapis.com/oauth2/v3/tokeninfo")
            .query(&[("access_token", &self.access_token)])
            .send()
            .await
            .map_err(|e| Error::wrap(base::ErrorKind::Unauthenticated, "validating youtube token", e))?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(Error::new(base::ErrorKind::Unauthenticated, "youtube access token rejected"))
        }
    }

    async fn find_playlist(&self, name: &str) -> Result<Option<String>, Error> {
        let resp = self
            .client
            .get("https://www.googleapis.com/youtube/v3/playlists")
            .bearer_auth(&self.access_token)
            .query(&[("part", "snippet"), ("mine", "true"), ("maxResults", "50")])
            .send()
            .await
            .map_err(|e| Error::wrap(base::ErrorKind::Unavailable, "listing youtube playlists", e))?;
        if !resp.status().is_success() {
            return Err(Error::new(
                base::ErrorKind::Unavailable,
                format!("playlists.list returned {}", resp.status()),
            ));
        }
        #[derive(serde::Deserialize)]
        struct Snippet {
            title: String,
        }
        #[derive(serde::Deserialize)]
        struct Item {
            id: String,
            snippet: Snippet,
        }
        #[derive(serde::Deserialize)]
        struct ListResponse {
            #[serde(default)]
            items: Vec<Item>,
        }
        let body: ListResponse = resp
            .json()
            .await
            .map_err(|e| Error::wrap(base::ErrorKind::Internal, "parsing playlists.list response", e))?;
        Ok(body.items.into_iter().find(|i| i.snippet.title == name).map(|i| i.id))
    }

    async fn create_playlist(&self, name: &str, description: &str, privacy: &str) -> Result<String, Error> {
        let body = serde_json::json!({
            "snippet": {"title": name, "description": description},
            "status": {"privacyStatus": privacy},
        });
        let resp = self
            .client
            .post("https://www.googleapis.com/youtube/v3/playlists")
            .bearer_auth(&self.access_token)
            .query(&[("part", "snippet,status")])
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::wrap(base::ErrorKind::Unavailable, "creating youtube playlist", e))?;
        if !resp.status().is_success() {
            return Err(Error::new(
                base::ErrorKind::Unavailable,
                format!("playlists.insert returned {}", resp.status()),
            ));
        }
        #[derive(serde::Deserialize)]
        struct Created {
            id: String,
        }
        let created: Created = resp
            .json()
            .await
            .map_err(|e| Error::wrap(base::ErrorKind::Internal, "parsing playlists.insert response", e))?;
        debug!(playlist = %name, id = %created.id, "created youtube playlist");
        Ok(created.id)
    }

    async fn upload(
        &self,
        file: &Path,
        title: &str,
        description: &str,
        tags: &[String],
        privacy: &str,
        playlist_id: Option<&str>,
    ) -> Result<Option<String>, Error> {
        let bytes = tokio::fs::read(file)
            .await
            .map_err(|e| Error::wrap(base::ErrorKind::Internal, format!("reading {}", file.display()), e))?;
        let metadata = serde_json::json!({
            "snippet": {"title": title, "description": description, "tags": tags},
            "status": {"privacyStatus": privacy},
        });
        let resp = self
            .client
            .post("https://www.googleapis.com/upload/youtube/v3/videos")
            .bearer_auth(&self.access_token)
            .query(&[("part", "snippet,status"), ("uploadType", "multipart")])
            .header("content-type", "application/octet-stream")
            .json(&metadata)
            .body(bytes)
            .send()
            .await
            .map_err(|e| Error::wrap(base::ErrorKind::Unavailable, "uploading video", e))?;
        if !resp.status().is_success() {
            warn!(status = %resp.status(), "youtube upload failed");
            return Ok(None);
        }
        #[derive(serde::Deserialize)]
        struct Created {
            id: String,
        }
        let created: Created = resp
            .json()
            .await
            .map_err(|e| Error::wrap(base::ErrorKind::Internal, "parsing videos.insert response", e))?;
        if let Some(playlist_id) = playlist_id {
            self.add_to_playlist(&created.id, playlist_id).await?;
        }
        Ok(Some(created.id))
    }

    async fn add_to_playlist(&self, video_id: &str, playlist_id: &str) -> Result<bool, Error> {
        let body = serde_json::json!({
            "snippet": {
                "playlistId": playlist_id,
                "resourceId": {"kind": "youtube#video", "videoId": video_id},
            },
        });
        let resp = self
            .client
            .post("https://www.googleapis.com/youtube/v3/playlistItems")
            .bearer_auth(&self.access_token)
            .query(&[("part", "snippet")])
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::wrap(base::ErrorKind::Unavailable, "adding video to playlist", e))?;
        Ok(resp.status().is_success())
    }
}

#[derive(Debug, Clone, Default)]
pub struct FakeUploader {
    pub playlists: std::sync::Arc<std::sync::Mutex<std::collections::HashMap<String, String>>>,
    pub uploaded: std::sync::Arc<std::sync::Mutex<Vec<(String, Option<String>)>>>,
}

#[async_trait]
impl Uploader for FakeUploader {
    async fn authenticate(&self) -> Result<(), Error> {
        Ok(())
    }

    async fn find_playlist(&self, name: &str) -> Result<Option<String>, Error> {
        Ok(self.playlists.lock().unwrap().get(name).cloned())
    }

    async fn create_playlist(&self, name: &str, _description: &str, _privacy: &str) -> Result<String, Error> {
        let id = format!("PL-{name}");
        self.playlists.lock().unwrap().insert(name.to_owned(), id.clone());
        Ok(id)
    }

    async fn upload(
        &self,
        file: &Path,
        _title: &str,
        _description: &str,
        _tags: &[String],
        _privacy: &str,
        playlist_id: Option<&str>,
    ) -> Result<Option<String>, Error> {
        let video_id = format!("VID-{}", file.display());
        self.uploaded
            .lock()
            .unwrap()
            .push((video_id.clone(), playlist_id.map(str::to_owned)));
        Ok(Some(video_id))
    }

    async fn add_to_playlist(&self, _video_id: &str, _playlist_id: &str) -> Result<bool, Error> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fake_uploader_creates_and_finds_playlist() {
        let uploader = FakeUploader::default();
        assert!(uploader.find_playlist("U10 Red").await.unwrap().is_none());
        let id = uploader.create_playlist("U10 Red", "desc", "private").await.unwrap();
        assert_eq!(uploader.find_playlist("U10 Red").await.unwrap(), Some(id));
    }

    #[tokio::test]
    async fn fake_uploader_records_uploads() {
        let uploader = FakeUploader::default();
        let video_id = uploader
            .upload(Path::new("/tmp/out.mp4"), "t", "d", &[], "private", Some("PL1"))
            .await
            .unwrap();
        assert!(video_id.is_some());
        assert_eq!(uploader.uploaded.lock().unwrap().len(), 1);
    }
}
