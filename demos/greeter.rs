//! Serve a wrapped function over HTTP.
//!
//! ```text
//! cargo run --example greeter
//! curl -X POST http://127.0.0.1:8080/ \
//!     -H 'Authorization: Bearer letmein' \
//!     -H 'Content-Type: application/json' \
//!     -d '{"name":"Ada"}'
//! ```

use std::time::Duration;
use log::info;
use serde::Deserialize;

use hwrap_rs::broker::{AcceptAll, BoxError, Broker, JsonDecoder};
use hwrap_rs::{HttpRequest, HttpServer, RequestContext, ServerConfig};

#[derive(Deserialize)]
struct Greeting {
    name: String,
}

fn greet(ctx: RequestContext, greeting: Greeting) -> Result<String, BoxError> {
    if ctx.is_cancelled() {
        return Err("request cancelled".into());
    }
    let caller = ctx.value("caller").unwrap_or("stranger");
    Ok(format!("Hello, {}! (asked by {caller})\n", greeting.name))
}

fn bearer_token(request: HttpRequest) -> Result<HttpRequest, BoxError> {
    match request.get_header("Authorization").map(String::as_str) {
        Some("Bearer letmein") => {
            let context = request.context.clone().with_value("caller", "demo-user");
            Ok(request.with_context(context))
        }
        Some(_) => Err("unknown token".into()),
        None => Err("missing Authorization header".into()),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let handler = Broker::new(greet, JsonDecoder, bearer_token, AcceptAll).into_handler();

    let config = ServerConfig {
        request_timeout: Some(Duration::from_secs(10)),
        ..ServerConfig::default()
    };
    info!("Try: curl -X POST http://{}/ -H 'Authorization: Bearer letmein' -H 'Content-Type: application/json' -d '{{\"name\":\"Ada\"}}'", config.addr);

    HttpServer::new(config).serve(handler).await?;
    Ok(())
}
