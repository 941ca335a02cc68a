use warp::{Filter, Rejection, Reply};

use crate::auth;
use crate::db;
use crate::error::{handle_rejection, AppError};
use crate::models::Credentials;
use crate::state::{with_state, AppState};
use crate::ws::handle_websocket;

/// Headroom for the base64 expansion and JSON envelope of an attachment frame.
fn max_frame_bytes(state: &AppState) -> usize {
    state.config.max_upload_bytes / 3 * 4 + 64 * 1024
}

fn cookie_header() -> impl Filter<Extract = (Option<String>,), Error = Rejection> + Clone {
    warp::header::optional::<String>("cookie")
}

pub fn routes(state: AppState) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    // Sockets upgrade on `/` like the browser client expects, `/ws` is an alias.
    let websocket = warp::path::end()
        .or(warp::path("ws").and(warp::path::end()))
        .unify()
        .and(warp::ws())
        .and(cookie_header())
        .and(with_state(state.clone()))
        .map(|ws: warp::ws::Ws, cookie: Option<String>, state: AppState| {
            let limit = max_frame_bytes(&state);
            ws.max_message_size(limit)
                .max_frame_size(limit)
                .on_upgrade(move |socket| handle_websocket(socket, state, cookie))
        });

    let index = warp::path::end()
        .and(warp::get())
        .map(|| warp::reply::json(&"test ok"));

    let health = warp::path("health")
        .and(warp::path::end())
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(handle_health);

    let profile = warp::path("profile")
        .and(warp::path::end())
        .and(warp::get())
        .and(cookie_header())
        .and(with_state(state.clone()))
        .and_then(handle_profile);

    let messages = warp::path!("messages" / String)
        .and(warp::get())
        .and(cookie_header())
        .and(with_state(state.clone()))
        .and_then(handle_messages);

    let people = warp::path("people")
        .and(warp::path::end())
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(handle_people);

    let login = warp::path("login")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::json())
        .and(with_state(state.clone()))
        .and_then(handle_login);

    let logout = warp::path("logout")
        .and(warp::path::end())
        .and(warp::post())
        .and(with_state(state.clone()))
        .map(handle_logout);

    let register = warp::path("register")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::json())
        .and(with_state(state.clone()))
        .and_then(handle_register);

    let uploads = warp::path("uploads").and(warp::fs::dir(state.uploads.dir().to_path_buf()));

    let cors = match &state.config.client_url {
        Some(origin) => warp::cors()
            .allow_origin(origin.as_str())
            .allow_credentials(true),
        None => warp::cors().allow_any_origin(),
    }
    .allow_headers(vec!["content-type", "cookie"])
    .allow_methods(vec!["GET", "POST", "OPTIONS"]);

    websocket
        .or(index)
        .or(health)
        .or(profile)
        .or(messages)
        .or(people)
        .or(login)
        .or(logout)
        .or(register)
        .or(uploads)
        .with(cors)
        .with(warp::trace::request())
        .recover(handle_rejection)
}

async fn handle_health(state: AppState) -> Result<impl Reply, Rejection> {
    Ok(warp::reply::json(&serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "online": state.hub.online().await.len(),
    })))
}

async fn handle_profile(cookie: Option<String>, state: AppState) -> Result<impl Reply, Rejection> {
    let claims = auth::claims_from_cookie_header(cookie.as_deref(), &state.config.jwt_secret)?;
    if db::get_user_by_id(&state.db, &claims.user_id).await?.is_none() {
        return Err(AppError::Unauthorized("User not found".to_string()).into());
    }
    Ok(warp::reply::json(&claims))
}

async fn handle_messages(
    other_user: String,
    cookie: Option<String>,
    state: AppState,
) -> Result<impl Reply, Rejection> {
    let claims = auth::claims_from_cookie_header(cookie.as_deref(), &state.config.jwt_secret)?;
    let history = db::messages_between(&state.db, &claims.user_id, &other_user).await?;
    Ok(warp::reply::json(&history))
}

async fn handle_people(state: AppState) -> Result<impl Reply, Rejection> {
    let people = db::list_people(&state.db).await?;
    Ok(warp::reply::json(&people))
}

async fn handle_login(credentials: Credentials, state: AppState) -> Result<impl Reply, Rejection> {
    let user = db::find_user_by_username(&state.db, credentials.username.trim())
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found".to_string()))?;

    if !auth::verify_password(&credentials.password, &user.password_hash)? {
        return Err(AppError::Unauthorized("Invalid password".to_string()).into());
    }

    let token = auth::issue_token(
        &user.id,
        &user.username,
        &state.config.jwt_secret,
        state.config.token_ttl,
    )?;
    tracing::info!("{} logged in", user.username);

    Ok(warp::reply::with_header(
        warp::reply::json(&serde_json::json!({ "id": user.id })),
        "set-cookie",
        auth::session_cookie(&token, &state.config),
    ))
}

fn handle_logout(state: AppState) -> impl Reply {
    warp::reply::with_header(
        warp::reply::json(&"ok"),
        "set-cookie",
        auth::expired_cookie(&state.config),
    )
}

async fn handle_register(
    credentials: Credentials,
    state: AppState,
) -> Result<impl Reply, Rejection> {
    let username = credentials.username.trim();
    if username.is_empty() || credentials.password.is_empty() {
        return Err(AppError::Validation("Username and password are required".to_string()).into());
    }

    let password_hash = auth::hash_password(&credentials.password, state.config.bcrypt_cost)?;
    let user = db::create_user(&state.db, username, &password_hash).await?;
    let token = auth::issue_token(
        &user.id,
        &user.username,
        &state.config.jwt_secret,
        state.config.token_ttl,
    )?;
    tracing::info!("Registered {} ({})", user.username, user.id);

    Ok(warp::reply::with_header(
        warp::reply::json(&serde_json::json!({
            "message": "Created successfully",
            "id": user.id,
        })),
        "set-cookie",
        auth::session_cookie(&token, &state.config),
    ))
}
