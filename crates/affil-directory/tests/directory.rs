//! Integration tests for the directory clients against mock services.

use affil_core::{
  Coded, ErrorKind,
  remote::{OrganizationDirectory, UserDirectory},
};
use affil_directory::{DirectoryConfig, OrganizationDirectoryClient, UserDirectoryClient};
use serde_json::json;
use wiremock::{
  Mock, MockServer, ResponseTemplate,
  matchers::{header, method, path, query_param},
};

fn config(server: &MockServer) -> DirectoryConfig {
  DirectoryConfig { token: Some("t0ken".into()), ..DirectoryConfig::new(server.uri()) }
}

#[tokio::test]
async fn lookup_finds_exact_match() {
  let server = MockServer::start().await;
  Mock::given(method("GET"))
    .and(path("/orgs/lookup"))
    .and(query_param("name", "Acme"))
    .and(header("authorization", "Bearer t0ken"))
    .respond_with(ResponseTemplate::new(200).set_body_json(json!({
      "ID": "0014100000Te1", "Name": "Acme", "Link": "acme.com"
    })))
    .expect(1)
    .mount(&server)
    .await;

  let client = OrganizationDirectoryClient::new(config(&server)).unwrap();
  let org = client.lookup_organization("Acme").await.unwrap().unwrap();
  assert_eq!(org.id, "0014100000Te1");
  assert_eq!(org.link.as_deref(), Some("acme.com"));
}

#[tokio::test]
async fn lookup_miss_is_none() {
  let server = MockServer::start().await;
  Mock::given(method("GET"))
    .and(path("/orgs/lookup"))
    .and(query_param("name", "Nobody"))
    .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ID": "", "Name": "" })))
    .mount(&server)
    .await;
  Mock::given(method("GET"))
    .and(path("/orgs/lookup"))
    .and(query_param("name", "Gone"))
    .respond_with(ResponseTemplate::new(404))
    .mount(&server)
    .await;

  let client = OrganizationDirectoryClient::new(config(&server)).unwrap();
  assert!(client.lookup_organization("Nobody").await.unwrap().is_none());
  assert!(client.lookup_organization("Gone").await.unwrap().is_none());
}

#[tokio::test]
async fn search_uses_zero_based_offset() {
  let server = MockServer::start().await;
  Mock::given(method("GET"))
    .and(path("/orgs/search"))
    .and(query_param("name", "ac"))
    .and(query_param("pageSize", "5"))
    .and(query_param("offset", "1"))
    .respond_with(ResponseTemplate::new(200).set_body_json(json!({
      "Data": [
        { "ID": "1", "Name": "Acme" },
        { "ID": "2", "Name": "Acorn" },
      ],
      "Metadata": { "TotalSize": 7 }
    })))
    .expect(1)
    .mount(&server)
    .await;

  let client = OrganizationDirectoryClient::new(config(&server)).unwrap();
  let orgs = client.search_organizations("ac", 5, 2).await.unwrap();
  let names: Vec<_> = orgs.iter().map(|o| o.name.as_str()).collect();
  assert_eq!(names, ["Acme", "Acorn"]);
}

#[tokio::test]
async fn list_users_maps_records() {
  let server = MockServer::start().await;
  Mock::given(method("GET"))
    .and(path("/users/search"))
    .and(query_param("q", "jane"))
    .and(query_param("offset", "0"))
    .respond_with(ResponseTemplate::new(200).set_body_json(json!({
      "Data": [{ "ID": "u-1", "Name": "Jane Roe", "Email": "jane@acme.com", "Username": "jroe" }]
    })))
    .mount(&server)
    .await;

  let client = UserDirectoryClient::new(config(&server)).unwrap();
  let users = client.list_users("jane", 10, 1).await.unwrap();
  assert_eq!(users.len(), 1);
  assert_eq!(users[0].username.as_deref(), Some("jroe"));
}

#[tokio::test]
async fn rejected_token_is_unauthorized() {
  let server = MockServer::start().await;
  Mock::given(method("GET"))
    .respond_with(ResponseTemplate::new(401).set_body_string("bad token"))
    .mount(&server)
    .await;

  let client = UserDirectoryClient::new(config(&server)).unwrap();
  let err = client.list_users("jane", 10, 1).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Unauthorized);
}
