//! Instagram publishing, comments and profile endpoints

use crate::graph::client::GraphClient;
use crate::graph::error::GraphError;
use crate::graph::Page;
use serde::{Deserialize, Serialize};
use tracing::info;

const PROFILE_FIELDS: &str = "id,username,account_type,media_count,followers_count,biography";
const COMMENT_FIELDS: &str = "id,text,timestamp,username,like_count";
const POST_FIELDS: &str =
    "id,caption,media_type,media_url,thumbnail_url,timestamp,like_count,comments_count";

/// Business account profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub username: Option<String>,
    pub account_type: Option<String>,
    pub media_count: Option<u64>,
    pub followers_count: Option<u64>,
    pub biography: Option<String>,
}

/// Response carrying only the id of a created object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatedObject {
    pub id: String,
}

/// A comment as returned by the comments edge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostComment {
    pub id: String,
    pub text: Option<String>,
    pub timestamp: Option<String>,
    pub username: Option<String>,
    pub like_count: Option<u64>,
}

/// A media object on the account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub caption: Option<String>,
    pub media_type: Option<String>,
    pub media_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub timestamp: Option<String>,
    pub like_count: Option<u64>,
    pub comments_count: Option<u64>,
}

/// Client for the business account's Instagram endpoints
#[derive(Debug, Clone)]
pub struct InstagramClient {
    graph: GraphClient,
    account_id: String,
}

impl InstagramClient {
    pub fn new(graph: GraphClient, account_id: impl Into<String>) -> Self {
        Self {
            graph,
            account_id: account_id.into(),
        }
    }

    pub async fn profile_info(&self) -> Result<Profile, GraphError> {
        self.graph
            .get(
                "profile_info",
                &self.account_id,
                &[("fields", PROFILE_FIELDS.to_string())],
            )
            .await
    }

    /// Stage an image for publishing; the image must be at a public URL
    pub async fn create_image_container(
        &self,
        image_url: &str,
        caption: &str,
    ) -> Result<CreatedObject, GraphError> {
        self.graph
            .post_params(
                "create_image_container",
                &format!("{}/media", self.account_id),
                &[
                    ("image_url", image_url.to_string()),
                    ("caption", caption.to_string()),
                ],
            )
            .await
    }

    pub async fn publish_media(&self, creation_id: &str) -> Result<CreatedObject, GraphError> {
        self.graph
            .post_params(
                "publish_media",
                &format!("{}/media_publish", self.account_id),
                &[("creation_id", creation_id.to_string())],
            )
            .await
    }

    /// Create a container and publish it
    pub async fn post_image(&self, image_url: &str, caption: &str) -> Result<CreatedObject, GraphError> {
        let container = self.create_image_container(image_url, caption).await?;
        info!(container_id = %container.id, "Media container created");

        let published = self.publish_media(&container.id).await?;
        info!(media_id = %published.id, "Media published");
        Ok(published)
    }

    pub async fn comments(&self, post_id: &str, limit: u32) -> Result<Page<PostComment>, GraphError> {
        self.graph
            .get(
                "comments",
                &format!("{}/comments", post_id),
                &[
                    ("fields", COMMENT_FIELDS.to_string()),
                    ("limit", limit.to_string()),
                ],
            )
            .await
    }

    pub async fn reply_to_comment(&self, comment_id: &str, message: &str) -> Result<CreatedObject, GraphError> {
        self.graph
            .post_params(
                "reply_to_comment",
                &format!("{}/replies", comment_id),
                &[("message", message.to_string())],
            )
            .await
    }

    pub async fn recent_posts(&self, limit: u32) -> Result<Page<Post>, GraphError> {
        self.graph
            .get(
                "recent_posts",
                &format!("{}/media", self.account_id),
                &[
                    ("fields", POST_FIELDS.to_string()),
                    ("limit", limit.to_string()),
                ],
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GraphConfig;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> InstagramClient {
        let config = GraphConfig {
            base_url: server.uri(),
            ..Default::default()
        };
        InstagramClient::new(GraphClient::new(&config, "tok").unwrap(), "17841400")
    }

    #[tokio::test]
    async fn test_post_image_creates_then_publishes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v18.0/17841400/media"))
            .and(query_param("image_url", "https://cdn.example.com/a.jpg"))
            .and(query_param("caption", "Hello"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "container-1"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v18.0/17841400/media_publish"))
            .and(query_param("creation_id", "container-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "media-9"})))
            .expect(1)
            .mount(&server)
            .await;

        let published = client_for(&server)
            .post_image("https://cdn.example.com/a.jpg", "Hello")
            .await
            .unwrap();
        assert_eq!(published.id, "media-9");
    }

    #[tokio::test]
    async fn test_publish_skipped_when_container_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v18.0/17841400/media"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {"message": "Only photo or video can be accepted as media type.", "code": 9004}
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v18.0/17841400/media_publish"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = client_for(&server).post_image("x", "y").await.unwrap_err();
        assert_eq!(err.to_string(), "Only photo or video can be accepted as media type.");
    }

    #[tokio::test]
    async fn test_comments_and_reply() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v18.0/post-1/comments"))
            .and(query_param("limit", "5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [
                    {"id": "c1", "text": "Love it", "username": "fan", "like_count": 3},
                    {"id": "c2"}
                ]
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v18.0/c1/replies"))
            .and(query_param("message", "Thanks!"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "r1"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let page = client.comments("post-1", 5).await.unwrap();
        assert_eq!(page.data.len(), 2);
        assert_eq!(page.data[0].username.as_deref(), Some("fan"));
        assert_eq!(page.data[1].text, None);

        let reply = client.reply_to_comment("c1", "Thanks!").await.unwrap();
        assert_eq!(reply.id, "r1");
    }

    #[tokio::test]
    async fn test_profile_and_posts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v18.0/17841400"))
            .and(query_param("fields", PROFILE_FIELDS))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "17841400", "username": "shop", "followers_count": 1200
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v18.0/17841400/media"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"id": "m1", "media_type": "IMAGE", "comments_count": 4}]
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let profile = client.profile_info().await.unwrap();
        assert_eq!(profile.username.as_deref(), Some("shop"));
        assert_eq!(profile.followers_count, Some(1200));

        let posts = client.recent_posts(10).await.unwrap();
        assert_eq!(posts.data[0].comments_count, Some(4));
    }
}
