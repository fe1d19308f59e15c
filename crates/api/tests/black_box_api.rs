use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{Value, json};

use pettycash_auth::{JwtClaims, Role};
use pettycash_core::{BranchId, OrganizationId, UserId};
use pettycash_infra::PettyCashConfig;

const JWT_SECRET: &str = "test-secret";

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        let config = PettyCashConfig {
            jwt_secret: JWT_SECRET.to_string(),
            ..PettyCashConfig::default()
        };

        // Same router as prod, bound to an ephemeral port.
        let app = pettycash_api::app::build_app(&config);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

struct Caller {
    user_id: UserId,
    name: String,
    token: String,
}

fn caller(
    organization_id: OrganizationId,
    branch_id: Option<BranchId>,
    name: &str,
    roles: Vec<Role>,
) -> Caller {
    let now = Utc::now();
    let user_id = UserId::new();
    let claims = JwtClaims {
        sub: user_id,
        name: name.to_string(),
        organization_id,
        branch_id,
        roles,
        issued_at: now,
        expires_at: now + ChronoDuration::minutes(10),
    };

    let token = jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("failed to encode jwt");

    Caller {
        user_id,
        name: name.to_string(),
        token,
    }
}

fn amount(v: &Value) -> Decimal {
    match v {
        Value::String(s) => s.parse().unwrap(),
        Value::Number(n) => n.to_string().parse().unwrap(),
        other => panic!("not an amount: {other}"),
    }
}

async fn post(client: &reqwest::Client, url: String, token: &str, body: Value) -> (StatusCode, Value) {
    let res = client.post(url).bearer_auth(token).json(&body).send().await.unwrap();
    let status = res.status();
    (status, res.json().await.unwrap_or(Value::Null))
}

async fn get(client: &reqwest::Client, url: String, token: &str) -> (StatusCode, Value) {
    let res = client.get(url).bearer_auth(token).send().await.unwrap();
    let status = res.status();
    (status, res.json().await.unwrap_or(Value::Null))
}

async fn open_deposit(srv: &TestServer, client: &reqwest::Client, who: &Caller, amt: &str) -> String {
    let (status, body) = post(
        client,
        srv.url("/petty-cash/deposits"),
        &who.token,
        json!({ "amount": amt }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "open deposit: {body}");
    body["id"].as_str().unwrap().to_string()
}

async fn draw_for(
    srv: &TestServer,
    client: &reqwest::Client,
    cashier: &Caller,
    deposit_id: &str,
    holder: &Caller,
    amt: &str,
) -> (StatusCode, Value) {
    post(
        client,
        srv.url(&format!("/petty-cash/deposits/{deposit_id}/withdrawals")),
        &cashier.token,
        json!({ "amount": amt, "user_id": holder.user_id, "user_name": holder.name }),
    )
    .await
}

#[tokio::test]
async fn auth_required_for_protected_endpoints() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client.get(srv.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client.get(srv.url("/whoami")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .get(srv.url("/petty-cash/deposits"))
        .bearer_auth("not-a-jwt")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn organization_context_is_derived_from_token() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let organization_id = OrganizationId::new();
    let who = caller(organization_id, None, "Nerea", vec![Role::CASHIER]);

    let (status, body) = get(&client, srv.url("/whoami"), &who.token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["organization_id"].as_str().unwrap(), organization_id.to_string());
    assert_eq!(body["name"], "Nerea");
    assert!(body["permissions"].as_array().unwrap().iter().any(|p| p == "petty_cash.reconcile"));
}

#[tokio::test]
async fn deposit_closes_once_every_withdrawal_is_justified() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let org = OrganizationId::new();
    let cashier = caller(org, None, "Carmen", vec![Role::CASHIER]);
    let ana = caller(org, None, "Ana", vec![Role::EMPLOYEE]);
    let beto = caller(org, None, "Beto", vec![Role::EMPLOYEE]);

    let deposit_id = open_deposit(&srv, &client, &cashier, "10000").await;

    let (status, body) = draw_for(&srv, &client, &cashier, &deposit_id, &ana, "4000").await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(amount(&body["deposit"]["remaining_amount"]), dec!(6000));
    assert_eq!(body["deposit"]["status"], "open");
    let a_id = body["withdrawal"]["id"].as_str().unwrap().to_string();

    let (status, body) = post(
        &client,
        srv.url(&format!("/petty-cash/withdrawals/{a_id}/spends")),
        &ana.token,
        json!({ "description": "printer toner", "amount": "4000", "ticket_url": "https://r.example/t.png" }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["withdrawal"]["status"], "justified");

    let (status, body) = draw_for(&srv, &client, &cashier, &deposit_id, &beto, "6000").await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["deposit"]["status"], "pending_funding");
    let b_id = body["withdrawal"]["id"].as_str().unwrap().to_string();

    let (status, _) = post(
        &client,
        srv.url(&format!("/petty-cash/withdrawals/{b_id}/spends")),
        &beto.token,
        json!({ "description": "courier", "amount": 6000 }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, summary) = get(
        &client,
        srv.url(&format!("/petty-cash/deposits/{deposit_id}/summary")),
        &cashier.token,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["status"], "closed");
    assert_eq!(amount(&summary["remaining_amount"]), dec!(0));
    assert_eq!(amount(&summary["total_justified"]), dec!(10000));
    assert_eq!(summary["withdrawals"]["justified"], 2);

    let (status, mine) = get(&client, srv.url("/petty-cash/me/withdrawals"), &ana.token).await;
    assert_eq!(status, StatusCode::OK);
    let mine = mine.as_array().unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0]["deposit_id"].as_str().unwrap(), deposit_id);
}

#[tokio::test]
async fn ledger_rule_violations_are_unprocessable() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let org = OrganizationId::new();
    let cashier = caller(org, None, "Carmen", vec![Role::CASHIER]);
    let ana = caller(org, None, "Ana", vec![Role::EMPLOYEE]);

    let deposit_id = open_deposit(&srv, &client, &cashier, "100").await;

    let (status, body) = draw_for(&srv, &client, &cashier, &deposit_id, &ana, "150").await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "insufficient_funds");

    let (status, body) = draw_for(&srv, &client, &cashier, &deposit_id, &ana, "0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_amount");

    let (_, body) = draw_for(&srv, &client, &cashier, &deposit_id, &ana, "60").await;
    let w_id = body["withdrawal"]["id"].as_str().unwrap().to_string();

    let (status, body) = post(
        &client,
        srv.url(&format!("/petty-cash/withdrawals/{w_id}/spends")),
        &ana.token,
        json!({ "description": "lunch", "amount": "60.01" }),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "over_justification");
}

#[tokio::test]
async fn removing_a_spend_reopens_and_void_returns_funds() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let org = OrganizationId::new();
    let cashier = caller(org, None, "Carmen", vec![Role::CASHIER]);
    let ana = caller(org, None, "Ana", vec![Role::EMPLOYEE]);

    let deposit_id = open_deposit(&srv, &client, &cashier, "500").await;

    let (_, body) = draw_for(&srv, &client, &cashier, &deposit_id, &ana, "200").await;
    let spent_id = body["withdrawal"]["id"].as_str().unwrap().to_string();
    let (_, body) = post(
        &client,
        srv.url(&format!("/petty-cash/withdrawals/{spent_id}/spends")),
        &ana.token,
        json!({ "description": "tools", "amount": "200" }),
    )
    .await;
    assert_eq!(body["withdrawal"]["status"], "justified");
    let spend_id = body["spend_id"].as_str().unwrap().to_string();

    let res = client
        .delete(srv.url(&format!("/petty-cash/withdrawals/{spent_id}/spends/{spend_id}")))
        .bearer_auth(&ana.token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "pending");

    let (_, body) = draw_for(&srv, &client, &cashier, &deposit_id, &ana, "300").await;
    let untouched_id = body["withdrawal"]["id"].as_str().unwrap().to_string();

    // Employees cannot void.
    let (status, _) = post(
        &client,
        srv.url(&format!("/petty-cash/withdrawals/{untouched_id}/void")),
        &ana.token,
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = post(
        &client,
        srv.url(&format!("/petty-cash/withdrawals/{untouched_id}/void")),
        &cashier.token,
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "voided");

    let (_, deposit) = get(
        &client,
        srv.url(&format!("/petty-cash/deposits/{deposit_id}")),
        &cashier.token,
    )
    .await;
    assert_eq!(amount(&deposit["remaining_amount"]), dec!(300));
}

#[tokio::test]
async fn reconcile_flags_overdue_withdrawals_once() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let org = OrganizationId::new();
    let cashier = caller(org, None, "Carmen", vec![Role::CASHIER]);
    let ana = caller(org, None, "Ana", vec![Role::EMPLOYEE]);

    let deposit_id = open_deposit(&srv, &client, &cashier, "1000").await;
    let (_, body) = draw_for(&srv, &client, &cashier, &deposit_id, &ana, "500").await;
    let w_id = body["withdrawal"]["id"].as_str().unwrap().to_string();

    let as_of = Utc::now() + ChronoDuration::days(40);

    let (status, _) = post(&client, srv.url("/petty-cash/reconcile"), &ana.token, json!({})).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = post(
        &client,
        srv.url("/petty-cash/reconcile"),
        &cashier.token,
        json!({ "as_of": as_of }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["count"], 1);
    assert_eq!(body["transitioned"][0].as_str().unwrap(), w_id);

    let (_, body) = post(
        &client,
        srv.url("/petty-cash/reconcile"),
        &cashier.token,
        json!({ "as_of": as_of }),
    )
    .await;
    assert_eq!(body["count"], 0);

    let (_, mine) = get(&client, srv.url("/petty-cash/me/withdrawals"), &ana.token).await;
    assert_eq!(mine[0]["status"], "not_closed");
}

#[tokio::test]
async fn employees_cannot_open_deposits() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let who = caller(OrganizationId::new(), None, "Ana", vec![Role::EMPLOYEE]);
    let (status, body) = post(
        &client,
        srv.url("/petty-cash/deposits"),
        &who.token,
        json!({ "amount": "100" }),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");
}

#[tokio::test]
async fn organization_and_branch_isolation() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let org = OrganizationId::new();
    let north = BranchId::new();
    let south = BranchId::new();

    let north_cashier = caller(org, Some(north), "Norte", vec![Role::CASHIER]);
    let south_cashier = caller(org, Some(south), "Sur", vec![Role::CASHIER]);
    let outsider = caller(OrganizationId::new(), None, "Otra", vec![Role::ADMIN]);

    let deposit_id = open_deposit(&srv, &client, &north_cashier, "250").await;
    let path = format!("/petty-cash/deposits/{deposit_id}");

    let (status, body) = get(&client, srv.url(&path), &north_cashier.token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["branch_id"].as_str().unwrap(), north.to_string());

    let (status, _) = get(&client, srv.url(&path), &south_cashier.token).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, list) = get(&client, srv.url("/petty-cash/deposits"), &south_cashier.token).await;
    assert_eq!(status, StatusCode::OK);
    assert!(list.as_array().unwrap().is_empty());

    let (status, _) = get(&client, srv.url(&path), &outsider.token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn branch_cashier_reconciles_only_their_branch() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let org = OrganizationId::new();
    let north = BranchId::new();
    let south = BranchId::new();

    let north_cashier = caller(org, Some(north), "Norte", vec![Role::CASHIER]);
    let south_cashier = caller(org, Some(south), "Sur", vec![Role::CASHIER]);
    let head_office = caller(org, None, "Central", vec![Role::CASHIER]);
    let lucia = caller(org, Some(north), "Lucía", vec![Role::EMPLOYEE]);

    let deposit_id = open_deposit(&srv, &client, &north_cashier, "1000").await;
    let (status, body) = draw_for(&srv, &client, &north_cashier, &deposit_id, &lucia, "500").await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let w_id = body["withdrawal"]["id"].as_str().unwrap().to_string();

    let as_of = Utc::now() + ChronoDuration::days(40);

    let (status, body) = post(
        &client,
        srv.url("/petty-cash/reconcile"),
        &south_cashier.token,
        json!({ "as_of": as_of }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["count"], 0);

    let path = format!("/petty-cash/deposits/{deposit_id}");
    let (_, deposit) = get(&client, srv.url(&path), &north_cashier.token).await;
    assert_eq!(deposit["withdrawals"][0]["status"], "pending");

    let (status, body) = post(
        &client,
        srv.url("/petty-cash/reconcile"),
        &head_office.token,
        json!({ "as_of": as_of }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["transitioned"][0].as_str().unwrap(), w_id);
}

#[tokio::test]
async fn reconcile_rejects_an_unparsable_as_of() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let org = OrganizationId::new();
    let cashier = caller(org, None, "Carmen", vec![Role::CASHIER]);
    let ana = caller(org, None, "Ana", vec![Role::EMPLOYEE]);

    let deposit_id = open_deposit(&srv, &client, &cashier, "1000").await;
    draw_for(&srv, &client, &cashier, &deposit_id, &ana, "500").await;

    let (status, body) = post(
        &client,
        srv.url("/petty-cash/reconcile"),
        &cashier.token,
        json!({ "as_of": "not-a-date" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    assert_eq!(body["error"], "validation_error");

    // No body at all sweeps as of now.
    let res = client
        .post(srv.url("/petty-cash/reconcile"))
        .bearer_auth(&cashier.token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["count"], 0);
}
