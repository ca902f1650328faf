//! ServiceProvider endpoint integration tests.

use eidas_saml::bindings::HttpPostBinding;
use eidas_saml::{AttributeRegistry, ImmutableAttributeMap, PersonType, SamlBinding};
use reqwest::StatusCode;

use crate::common::{form_field, TestEnv, BIRTH_NAME, CONNECTOR_ACS, FAMILY_NAME};

#[tokio::test]
async fn test_health_endpoint() -> anyhow::Result<()> {
    let env = TestEnv::new().await?;
    let response = env
        .client
        .get(format!("{}/health", env.base_url))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["status"], "healthy");
    Ok(())
}

#[tokio::test]
async fn test_post_request_accepted() -> anyhow::Result<()> {
    let env = TestEnv::new().await?;
    let response = env.post(&env.valid_request("_accepted"), Some("rs-1")).await?;

    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["id"], "_accepted");
    assert_eq!(body["citizen_country_code"], "CC");
    assert_eq!(body["sp_type"], "public");
    assert_eq!(body["assertion_consumer_service_url"], CONNECTOR_ACS);
    assert_eq!(body["requested_attributes"].as_array().map(Vec::len), Some(4));
    Ok(())
}

#[tokio::test]
async fn test_redirect_request_accepted() -> anyhow::Result<()> {
    let env = TestEnv::new().await?;
    let encoded = env
        .connector
        .encode_request(&env.valid_request("_redirect"), SamlBinding::HttpRedirect)?;

    let response = env
        .client
        .get(env.service_provider())
        .query(&[("SAMLRequest", encoded.as_str()), ("RelayState", "rs-2")])
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["id"], "_redirect");
    Ok(())
}

#[tokio::test]
async fn test_destination_mismatch_posts_failure_to_connector() -> anyhow::Result<()> {
    let env = TestEnv::new().await?;
    let request = env
        .valid_request("_wrong_destination")
        .with_destination("https://other-node.example/ServiceProvider");
    let response = env.post(&request, Some("rs-3")).await?;

    assert_eq!(response.status(), StatusCode::OK);
    let html = response.text().await?;
    assert!(html.contains(&format!(r#"action="{CONNECTOR_ACS}""#)));
    assert_eq!(form_field(&html, "RelayState").as_deref(), Some("rs-3"));

    let encoded = form_field(&html, "SAMLResponse").ok_or_else(|| anyhow::anyhow!("no SAMLResponse"))?;
    let xml = HttpPostBinding::decode(&encoded)?;
    assert!(xml.contains("_wrong_destination"), "InResponseTo missing: {xml}");
    assert!(xml.contains("203006"), "status message missing: {xml}");
    Ok(())
}

#[tokio::test]
async fn test_replayed_request_is_forbidden() -> anyhow::Result<()> {
    let env = TestEnv::new().await?;
    let request = env.valid_request("_replayed");

    let first = env.post(&request, None).await?;
    assert_eq!(first.status(), StatusCode::OK);

    let second = env.post(&request, None).await?;
    assert_eq!(second.status(), StatusCode::FORBIDDEN);
    let body: serde_json::Value = second.json().await?;
    assert_eq!(body["code"], "203015");
    assert!(body.get("message").is_none());
    Ok(())
}

#[tokio::test]
async fn test_unsupported_attributes() -> anyhow::Result<()> {
    let env = TestEnv::with_config(|config| {
        config.unsupported_attributes = vec![BIRTH_NAME.to_string(), FAMILY_NAME.to_string()];
    })
    .await?;

    let registry = AttributeRegistry::eidas();
    let with_optional = ImmutableAttributeMap::of_definitions(
        registry
            .minimum_data_set(PersonType::NaturalPerson)
            .filter(|d| d.name_uri != FAMILY_NAME)
            .cloned()
            .chain(registry.get(BIRTH_NAME).cloned()),
    );
    let optional_only = env
        .valid_request("_optional_unsupported")
        .with_requested_attributes(with_optional);
    assert_eq!(env.post(&optional_only, None).await?.status(), StatusCode::OK);

    let mandatory = env.post(&env.valid_request("_mandatory_unsupported"), None).await?;
    assert_eq!(mandatory.status(), StatusCode::OK);
    let html = mandatory.text().await?;
    let encoded = form_field(&html, "SAMLResponse").ok_or_else(|| anyhow::anyhow!("no SAMLResponse"))?;
    assert!(HttpPostBinding::decode(&encoded)?.contains("203003"));
    Ok(())
}

#[tokio::test]
async fn test_unreadable_request_is_bad_request() -> anyhow::Result<()> {
    let env = TestEnv::new().await?;
    let response = env
        .client
        .post(env.service_provider())
        .form(&[("SAMLRequest", "bm90IGEgc2FtbCBtZXNzYWdl")])
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json().await?;
    assert!(body["code"].is_string());
    Ok(())
}
