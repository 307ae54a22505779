use chrono::Utc;
use rocket::{
    http::{Cookie, CookieJar, Status},
    serde::json::Json,
    Route, State,
};

use crate::{
    error::Result,
    model::{
        api::{
            admin::UserSummary,
            auth::{AuthToken, LoginCredentials, Registration, Voter, AUTH_TOKEN_COOKIE},
        },
        db::user::{self, NewUser, User},
        mongodb::Coll,
    },
    Config,
};

pub fn routes() -> Vec<Route> {
    routes![register, login, logout]
}

#[post("/auth/register", data = "<registration>", format = "json")]
pub async fn register(
    registration: Json<Registration>,
    new_users: Coll<NewUser>,
    users: Coll<User>,
) -> Result<Json<UserSummary>> {
    let user = user::register(&new_users, &users, registration.into_inner(), Utc::now()).await?;
    info!("Registered user '{}'", user.username);
    Ok(Json(user.into()))
}

#[post("/auth/login", data = "<credentials>", format = "json")]
pub async fn login(
    cookies: &CookieJar<'_>,
    credentials: Json<LoginCredentials>,
    users: Coll<User>,
    config: &State<Config>,
) -> Result<Json<UserSummary>> {
    let user = user::authenticate(&users, &credentials).await?;

    let token = AuthToken::<Voter>::new(&user);
    cookies.add(token.into_cookie(config)?);

    Ok(Json(user.into()))
}

#[delete("/auth")]
pub fn logout(cookies: &CookieJar<'_>) -> Status {
    cookies.remove(Cookie::named(AUTH_TOKEN_COOKIE));
    Status::Ok
}

#[cfg(test)]
mod tests {
    use mongodb::bson::doc;
    use rocket::{
        http::ContentType,
        local::asynchronous::Client,
        serde::json::serde_json::{json, Value},
    };

    use super::*;

    async fn register_expect_status(client: &Client, registration: &Registration, status: Status) {
        let response = client
            .post(uri!(register))
            .header(ContentType::JSON)
            .body(json!(registration).to_string())
            .dispatch()
            .await;
        assert_eq!(status, response.status());
    }

    #[backend_test]
    async fn register_and_login(client: Client, users: Coll<User>) {
        let registration = Registration::example1();
        register_expect_status(&client, &registration, Status::Ok).await;

        // Only the hash is stored.
        let user = users
            .find_one(doc! { "username": &registration.username }, None)
            .await
            .unwrap()
            .unwrap();
        assert_ne!(user.password_hash, registration.password);
        assert!(!user.is_admin);

        let response = client
            .post(uri!(login))
            .header(ContentType::JSON)
            .body(json!(LoginCredentials::for_registration(&registration)).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let summary: Value = response.into_json().await.unwrap();
        assert_eq!(summary["username"], registration.username);
        assert_eq!(summary["is_admin"], false);
        assert!(summary.get("password_hash").is_none());
        assert!(client.cookies().get(AUTH_TOKEN_COOKIE).is_some());

        let response = client.delete(uri!(logout)).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        assert!(client.cookies().get(AUTH_TOKEN_COOKIE).is_none());
    }

    #[backend_test]
    async fn duplicate_registration(client: Client, users: Coll<User>) {
        register_expect_status(&client, &Registration::example1(), Status::Ok).await;

        let same_username = Registration {
            email: "other@example.com".to_string(),
            ..Registration::example1()
        };
        register_expect_status(&client, &same_username, Status::Conflict).await;

        let same_email = Registration {
            username: "someone_else".to_string(),
            ..Registration::example1()
        };
        register_expect_status(&client, &same_email, Status::Conflict).await;

        let too_short = Registration {
            password: "abc".to_string(),
            ..Registration::example2()
        };
        register_expect_status(&client, &too_short, Status::BadRequest).await;

        let count = users
            .count_documents(doc! { "is_admin": false }, None)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[backend_test]
    async fn bad_login(client: Client) {
        register_expect_status(&client, &Registration::example2(), Status::Ok).await;

        let response = client
            .post(uri!(login))
            .header(ContentType::JSON)
            .body(
                json!({
                    "username": Registration::example2().username,
                    "password": "not it",
                })
                .to_string(),
            )
            .dispatch()
            .await;
        assert_eq!(Status::Unauthorized, response.status());
        assert!(client.cookies().get(AUTH_TOKEN_COOKIE).is_none());
    }
}
