use super::*;

#[tokio::test]
async fn test_anonymous_identity_has_no_user() {
    assert_eq!(AnonymousIdentity.current_user_id().await, Ok(None));
}

#[tokio::test]
async fn test_static_identity_returns_its_user() {
    let identity = StaticIdentity::new("alice");
    assert_eq!(identity.user_id(), "alice");
    assert_eq!(
        identity.current_user_id().await,
        Ok(Some("alice".to_string()))
    );
}

#[tokio::test]
async fn test_identity_usable_as_trait_object() {
    let providers: Vec<Box<dyn IdentityProvider>> =
        vec![Box::new(AnonymousIdentity), Box::new(StaticIdentity::new("bob"))];

    let mut users = Vec::new();
    for provider in &providers {
        users.push(provider.current_user_id().await.expect("identity"));
    }
    assert_eq!(users, vec![None, Some("bob".to_string())]);
}
