use std::time::{SystemTime, UNIX_EPOCH};

use cds_webapi::{RequestDispatcher, ServiceConfig, StaticToken, WebApiError};
use serde_json::json;

fn load_live_dispatcher() -> Result<RequestDispatcher, String> {
    let config = ServiceConfig::from_env().map_err(|err| err.to_string())?;
    let token = std::env::var("CDS_ACCESS_TOKEN")
        .map_err(|_| "missing CDS_ACCESS_TOKEN environment variable".to_owned())?;
    RequestDispatcher::new(config, StaticToken::new(token)).map_err(|err| err.to_string())
}

fn unique_suffix() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock must be after epoch")
        .as_millis()
}

#[tokio::test]
async fn live_create_conditional_get_and_delete() {
    let service = match load_live_dispatcher() {
        Ok(service) => service,
        Err(_) => {
            eprintln!("skipping live test: CDS_URL/CDS_ACCESS_TOKEN not set");
            return;
        }
    };

    let whoami = service
        .get("WhoAmI", &[])
        .await
        .expect("WhoAmI must succeed")
        .expect("WhoAmI must return a body");
    assert!(whoami["UserId"].is_string());

    let lastname = format!("live {}", unique_suffix());
    let contact = service
        .post_create("contacts", &json!({"firstname": "cds-webapi", "lastname": lastname}))
        .await
        .expect("create must succeed");

    let record = service
        .get(&format!("{contact}?$select=lastname"), &[])
        .await
        .expect("retrieve must succeed")
        .expect("record must have a body");
    assert_eq!(record["lastname"], lastname.as_str());

    let etag = record["@odata.etag"]
        .as_str()
        .expect("record must carry an etag")
        .to_owned();
    let unchanged = service
        .get(
            &format!("{contact}?$select=lastname"),
            &[("If-None-Match", etag.as_str())],
        )
        .await
        .expect("conditional retrieve must succeed");
    assert!(unchanged.is_none());

    service
        .delete(contact.as_str(), &[])
        .await
        .expect("delete must succeed");

    let gone = service.get(contact.as_str(), &[]).await;
    match gone {
        Err(WebApiError::Service(error)) => assert_eq!(error.status_code, 404),
        other => panic!("expected 404 after delete, got {other:?}"),
    }
}
