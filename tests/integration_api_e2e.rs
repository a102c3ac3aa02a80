// End-to-end tests against a running server (`cargo run`) with Postgres
// and Redis behind it. Run them explicitly with:
//
//   cargo test --test integration_api_e2e -- --ignored

use std::time::{SystemTime, UNIX_EPOCH};
use serde_json::json;
use once_cell::sync::Lazy;
use redis::aio::ConnectionManager;

// Shared test context
struct TestContext {
    client: reqwest::Client,
    base_url: String,
}

static REDIS_CLIENT: Lazy<redis::Client> = Lazy::new(|| {
    redis::Client::open("redis://127.0.0.1:6379/").unwrap()
});

impl TestContext {
    fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .cookie_store(true)
                .build()
                .unwrap(),
            base_url: "http://127.0.0.1:3000".to_string(),
        }
    }

    fn get_timestamp() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs()
    }
}

async fn get_redis_conn() -> ConnectionManager {
    REDIS_CLIENT.get_connection_manager().await.unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    async fn setup() {
        let mut con = get_redis_conn().await;
        let _: () = redis::cmd("DEL")
            .arg("rate_limit:signup:127.0.0.1")
            .query_async(&mut con)
            .await
            .unwrap();
    }

    async fn signup(context: &TestContext, username: &str) -> (Value, String) {
        let response = context
            .client
            .post(format!("{}/api/signup", context.base_url))
            .json(&json!({
                "username": username,
                "password": "SecurePass123!@#"
            }))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status().as_u16(), 201, "Signup failed");

        let csrf_token = response
            .cookies()
            .find(|c| c.name() == "csrf_token")
            .expect("CSRF token not found in signup response")
            .value()
            .to_string();

        let body: Value = response.json().await.unwrap();
        (body, csrf_token)
    }

    #[tokio::test]
    #[ignore]
    async fn test_signup_login_and_account_state() {
        setup().await;
        let context = TestContext::new();
        let timestamp = TestContext::get_timestamp();
        let username = format!("testuser_{}", timestamp);

        // Step 1: Signup
        let (signup_body, _csrf) = signup(&context, &username).await;
        assert_eq!(signup_body["message"], "Signup successful!");
        assert_eq!(signup_body["points"]["total"], 15);
        assert_eq!(signup_body["points"]["available"], 15);
        let referral_code = signup_body["referral_code"].as_str().unwrap().to_string();
        assert_eq!(referral_code.len(), 8);

        // Step 2: The fresh session authenticates
        let check_response = context
            .client
            .get(format!("{}/api/check-auth", context.base_url))
            .send()
            .await
            .unwrap();
        assert_eq!(check_response.status().as_u16(), 200);
        let check_body: Value = check_response.json().await.unwrap();
        assert_eq!(check_body["authenticated"], true);
        assert_eq!(check_body["username"], username.as_str());

        // Step 3: Usage widget reports three free generations
        let usage_response = context
            .client
            .get(format!("{}/api/usage", context.base_url))
            .send()
            .await
            .unwrap();
        assert_eq!(usage_response.status().as_u16(), 200);
        let usage_body: Value = usage_response.json().await.unwrap();
        assert_eq!(usage_body["totalPoints"], 15);
        assert_eq!(usage_body["freeGenerations"], 3);
        assert_eq!(usage_body["referralCode"], referral_code.as_str());

        // Step 4: Login from a second client
        let second = TestContext::new();
        let login_response = second
            .client
            .post(format!("{}/api/login", second.base_url))
            .json(&json!({
                "username": username,
                "password": "SecurePass123!@#"
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(login_response.status().as_u16(), 200, "Login failed");
        let login_body: Value = login_response.json().await.unwrap();
        assert_eq!(login_body["message"], "Login successful!");
        assert_eq!(login_body["points"]["total"], 15);

        // Step 5: Logout drops the first session
        let logout_response = context
            .client
            .post(format!("{}/api/logout", context.base_url))
            .send()
            .await
            .unwrap();
        assert_eq!(logout_response.status().as_u16(), 200);

        let check_response = context
            .client
            .get(format!("{}/api/check-auth", context.base_url))
            .send()
            .await
            .unwrap();
        assert_eq!(check_response.status().as_u16(), 401);
        let check_body: Value = check_response.json().await.unwrap();
        assert_eq!(check_body["authenticated"], false);
    }

    #[tokio::test]
    #[ignore]
    async fn test_referral_bonus_applies_to_both_accounts() {
        setup().await;
        let context = TestContext::new();
        let timestamp = TestContext::get_timestamp();

        let referrer = format!("referrer_{}", timestamp);
        let (referrer_body, _) = signup(&context, &referrer).await;
        let referral_code = referrer_body["referral_code"].as_str().unwrap().to_string();

        setup().await;
        let referee_context = TestContext::new();
        let referee = format!("referee_{}", timestamp);
        let response = referee_context
            .client
            .post(format!("{}/api/signup", referee_context.base_url))
            .json(&json!({
                "username": referee,
                "password": "SecurePass123!@#",
                "referral_code": referral_code.to_lowercase()
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 201);
        let body: Value = response.json().await.unwrap();

        // 15 signup points plus the 5 point referral bonus
        assert_eq!(body["points"]["total"], 20);

        let usage_response = context
            .client
            .get(format!("{}/api/usage", context.base_url))
            .send()
            .await
            .unwrap();
        let usage_body: Value = usage_response.json().await.unwrap();
        assert_eq!(usage_body["totalPoints"], 20);
        assert_eq!(usage_body["referralsCount"], 1);
    }

    #[tokio::test]
    #[ignore]
    async fn test_generate_rejects_blank_prompt() {
        setup().await;
        let context = TestContext::new();
        let timestamp = TestContext::get_timestamp();
        let username = format!("promptless_{}", timestamp);
        let (_, csrf_token) = signup(&context, &username).await;

        let response = context
            .client
            .post(format!("{}/api/generate", context.base_url))
            .header("X-CSRF-Token", csrf_token)
            .json(&json!({ "prompt": "   " }))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status().as_u16(), 400);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["error"], "Prompt required");
    }

    #[tokio::test]
    #[ignore]
    async fn test_scheduling_requires_a_prepared_platform_session() {
        setup().await;
        let context = TestContext::new();
        let timestamp = TestContext::get_timestamp();
        let username = format!("scheduler_{}", timestamp);
        let (_, csrf_token) = signup(&context, &username).await;

        let response = context
            .client
            .post(format!("{}/api/schedule-post", context.base_url))
            .header("X-CSRF-Token", csrf_token)
            .json(&json!({
                "caption": "Sunset over the bay",
                "scheduled_time": "2031-01-01T12:00:00"
            }))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status().as_u16(), 400);
        let body: Value = response.json().await.unwrap();
        assert_eq!(
            body["error"],
            "Instagram session not ready. Please verify OTP first."
        );
    }

    #[tokio::test]
    #[ignore]
    async fn test_mutating_requests_without_csrf_are_rejected() {
        setup().await;
        let context = TestContext::new();
        let timestamp = TestContext::get_timestamp();
        let username = format!("nocsrf_{}", timestamp);
        let _ = signup(&context, &username).await;

        // Session cookie is present, CSRF header is not
        let response = context
            .client
            .post(format!("{}/api/generate", context.base_url))
            .json(&json!({ "prompt": "a red panda" }))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status().as_u16(), 401);
    }
}
