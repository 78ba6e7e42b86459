mod common;

use axum::http::{Method, StatusCode};
use serde_json::{Value, json};

use common::{ORG_A, ORG_B, TestServer};
use leadline::store::Store;

async fn create_lead(server: &TestServer, body: Value) -> Value {
    let (status, lead) = server.send(Method::POST, "/api/v1/leads", Some(body)).await;
    assert_eq!(status, StatusCode::CREATED, "{lead}");
    lead
}

fn id_of(value: &Value) -> String {
    value["id"].as_str().expect("id").to_string()
}

fn names(leads: &Value) -> Vec<String> {
    let mut names: Vec<String> = leads
        .as_array()
        .expect("array")
        .iter()
        .map(|l| l["name"].as_str().expect("name").to_string())
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn test_health() {
    let server = TestServer::start();
    let (status, body) = server
        .send_as(None, None, Method::GET, "/health", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "OK");
}

#[tokio::test]
async fn test_identity_headers_required() {
    let server = TestServer::start();

    let (status, body) = server
        .send_as(None, Some("alice"), Method::GET, "/api/v1/leads", None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].is_string());

    let (status, _) = server
        .send_as(Some(ORG_A), None, Method::GET, "/api/v1/leads", None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = server
        .send_as(Some("org-missing"), Some("alice"), Method::GET, "/api/v1/leads", None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_create_and_get_lead() {
    let server = TestServer::start();

    let lead = create_lead(
        &server,
        json!({
            "name": "Acme",
            "email": "Buyer@Acme.test",
            "value": "1200.50",
            "source": "WEB",
            "assignedToId": "bob",
            "tags": ["vip", "hot"]
        }),
    )
    .await;

    assert_eq!(lead["name"], "Acme");
    assert_eq!(lead["email"], "buyer@acme.test");
    assert_eq!(lead["status"], "Nuevo");
    assert_eq!(lead["source"], "WEB");
    assert_eq!(lead["assignedToId"], "bob");
    assert_eq!(lead["createdById"], "alice");
    assert_eq!(lead["convertedToId"], Value::Null);
    assert_eq!(lead["tags"], json!(["hot", "vip"]));

    let (status, fetched) = server
        .send(Method::GET, &format!("/api/v1/leads/{}", id_of(&lead)), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["id"], lead["id"]);
    assert_eq!(fetched["tags"], json!(["hot", "vip"]));

    let (status, tags) = server.send(Method::GET, "/api/v1/tags", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tags.as_array().expect("array").len(), 2);
}

#[tokio::test]
async fn test_create_lead_validation() {
    let server = TestServer::start();

    let (status, body) = server
        .send(Method::POST, "/api/v1/leads", Some(json!({ "name": "  " })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().expect("error").contains("name"));

    let (status, _) = server
        .send(
            Method::POST,
            "/api/v1/leads",
            Some(json!({ "name": "Acme", "assignedToId": "carol" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_list_leads_any_tag_filter() {
    let server = TestServer::start();
    create_lead(&server, json!({ "name": "Red", "tags": ["red"] })).await;
    create_lead(&server, json!({ "name": "Blue", "tags": ["blue"] })).await;
    create_lead(&server, json!({ "name": "Green", "tags": ["green"] })).await;

    let (status, leads) = server
        .send(Method::GET, "/api/v1/leads?tags=red,blue,,red", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(names(&leads), vec!["Blue", "Red"]);

    let (_, all) = server.send(Method::GET, "/api/v1/leads", None).await;
    assert_eq!(names(&all).len(), 3);

    let (_, none) = server.send(Method::GET, "/api/v1/leads?tags=purple", None).await;
    assert!(none.as_array().expect("array").is_empty());
}

#[tokio::test]
async fn test_update_lead_tags() {
    let server = TestServer::start();
    let lead = create_lead(&server, json!({ "name": "Acme", "tags": ["a", "b"] })).await;
    let uri = format!("/api/v1/leads/{}", id_of(&lead));

    let (status, updated) = server
        .send(Method::PUT, &uri, Some(json!({ "tags": ["c"] })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["tags"], json!(["c"]));

    let (_, updated) = server
        .send(Method::PUT, &uri, Some(json!({ "status": "Contactado" })))
        .await;
    assert_eq!(updated["status"], "Contactado");
    assert_eq!(updated["tags"], json!(["c"]));

    let (_, updated) = server
        .send(Method::PUT, &uri, Some(json!({ "tags": [] })))
        .await;
    assert_eq!(updated["tags"], json!([]));
}

#[tokio::test]
async fn test_tenant_isolation() {
    let server = TestServer::start();
    let lead = create_lead(&server, json!({ "name": "Acme" })).await;
    let uri = format!("/api/v1/leads/{}", id_of(&lead));

    let (status, _) = server
        .send_as(Some(ORG_B), Some("carol"), Method::GET, &uri, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = server
        .send_as(
            Some(ORG_B),
            Some("carol"),
            Method::PUT,
            &uri,
            Some(json!({ "name": "Hijacked" })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Lead not found");

    let (status, _) = server
        .send_as(Some(ORG_B), Some("carol"), Method::DELETE, &uri, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, leads) = server
        .send_as(Some(ORG_B), Some("carol"), Method::GET, "/api/v1/leads", None)
        .await;
    assert!(leads.as_array().expect("array").is_empty());

    let (_, fetched) = server.send(Method::GET, &uri, None).await;
    assert_eq!(fetched["name"], "Acme");
}

#[tokio::test]
async fn test_delete_lead() {
    let server = TestServer::start();
    let lead = create_lead(&server, json!({ "name": "Acme" })).await;
    let uri = format!("/api/v1/leads/{}", id_of(&lead));

    let (status, body) = server.send(Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": true }));

    let (status, _) = server.send(Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_bulk_create() {
    let server = TestServer::start();

    let (status, body) = server
        .send(
            Method::POST,
            "/api/v1/leads/bulk",
            Some(json!({
                "leads": [
                    { "name": "One", "status": "NEW", "tags": ["fair"] },
                    { "name": "Two", "notes": "met at fair", "tags": ["fair"] },
                    { "name": "Three", "status": "Calificado" }
                ]
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["success"], true);
    assert_eq!(body["count"], 3);
    assert_eq!(body["ids"].as_array().expect("ids").len(), 3);

    let (_, leads) = server.send(Method::GET, "/api/v1/leads?tags=fair", None).await;
    assert_eq!(names(&leads), vec!["One", "Two"]);
    let two = leads
        .as_array()
        .expect("array")
        .iter()
        .find(|l| l["name"] == "Two")
        .expect("lead Two");
    assert_eq!(two["notes"], "met at fair\n[Importado]");
    assert_eq!(two["status"], "Nuevo");
    assert_eq!(two["source"], "MANUAL");
}

#[tokio::test]
async fn test_bulk_create_rejections() {
    let server = TestServer::start();

    let (status, body) = server
        .send(
            Method::POST,
            "/api/v1/leads/bulk",
            Some(json!({ "leads": { "name": "not an array" } })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let oversized: Vec<Value> = (0..501).map(|i| json!({ "name": format!("Lead {i}") })).collect();
    let (status, _) = server
        .send(
            Method::POST,
            "/api/v1/leads/bulk",
            Some(json!({ "leads": oversized })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = server
        .send(
            Method::POST,
            "/api/v1/leads/bulk",
            Some(json!({ "leads": [{ "name": "ok" }, { "email": "nameless@example.com" }] })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().expect("error").starts_with("Row 1"));

    let (status, body) = server
        .send(
            Method::POST,
            "/api/v1/leads/bulk",
            Some(json!({ "leads": [
                { "name": "ok", "assignedToId": "ghost" },
                { "name": "negative", "value": -5 },
            ] })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().expect("error").starts_with("Row 0"));

    let (_, leads) = server.send(Method::GET, "/api/v1/leads", None).await;
    assert!(leads.as_array().expect("array").is_empty());
}

#[tokio::test]
async fn test_convert_lead() {
    let server = TestServer::start();
    let lead = create_lead(
        &server,
        json!({ "name": "Acme", "email": "buyer@acme.test", "phone": "+34 600 000 000", "value": 900 }),
    )
    .await;
    let uri = format!("/api/v1/leads/{}/convert", id_of(&lead));

    let (status, body) = server
        .send(
            Method::POST,
            &uri,
            Some(json!({ "plan": "PRO", "generateInvoice": true })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["success"], true);
    let customer_id = body["customerId"].as_str().expect("customerId").to_string();
    assert_eq!(body["customer"]["id"], customer_id.as_str());
    assert_eq!(body["customer"]["plan"], "PRO");
    assert_eq!(body["customer"]["status"], "ACTIVE");

    let (_, converted) = server
        .send(Method::GET, &format!("/api/v1/leads/{}", id_of(&lead)), None)
        .await;
    assert_eq!(converted["status"], "WON");
    assert_eq!(converted["convertedToId"], customer_id.as_str());

    let (status, again) = server.send(Method::POST, &uri, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(again["customerId"], customer_id.as_str());
    assert!(again["error"].is_string());

    let (status, _) = server
        .send(
            Method::PUT,
            &format!("/api/v1/leads/{}", id_of(&lead)),
            Some(json!({ "status": "Nuevo" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (_, still_won) = server
        .send(Method::GET, &format!("/api/v1/leads/{}", id_of(&lead)), None)
        .await;
    assert_eq!(still_won["status"], "WON");

    let invoices = server
        .store
        .list_customer_invoices(&customer_id)
        .expect("list invoices");
    assert_eq!(invoices.len(), 1);

    let (status, customer) = server
        .send(Method::GET, &format!("/api/v1/customers/{customer_id}"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(customer["email"], "buyer@acme.test");

    let (status, _) = server
        .send_as(
            Some(ORG_B),
            Some("carol"),
            Method::GET,
            &format!("/api/v1/customers/{customer_id}"),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_convert_unknown_lead() {
    let server = TestServer::start();
    let (status, body) = server
        .send(Method::POST, "/api/v1/leads/nope/convert", Some(json!({})))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Lead not found");
}

#[tokio::test]
async fn test_assignment_creates_notification() {
    let server = TestServer::start();
    let lead = create_lead(&server, json!({ "name": "Acme" })).await;

    server
        .send(
            Method::PUT,
            &format!("/api/v1/leads/{}", id_of(&lead)),
            Some(json!({ "assignedToId": "bob" })),
        )
        .await;

    let mut notifications = Value::Null;
    for _ in 0..100 {
        let (status, body) = server
            .send_as(Some(ORG_A), Some("bob"), Method::GET, "/api/v1/notifications", None)
            .await;
        assert_eq!(status, StatusCode::OK);
        if !body.as_array().expect("array").is_empty() {
            notifications = body;
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }

    assert_eq!(notifications[0]["type"], "lead_assigned");
    assert_eq!(notifications[0]["data"]["leadId"], lead["id"]);
    assert_eq!(notifications[0]["read"], false);

    let (_, alice) = server.send(Method::GET, "/api/v1/notifications", None).await;
    assert!(alice.as_array().expect("array").is_empty());
}
