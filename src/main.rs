use std::sync::Arc;

use keelhttp::config::ServerConfig;
use keelhttp::handler::codec::TextCodec;
use keelhttp::handler::router::{HandlerError, ParameterBinding, RouteTable};
use keelhttp::handler::value::{ParamType, Value};
use keelhttp::net::server::Server;

#[async_std::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let path = std::env::args().nth(1).unwrap_or_else(|| "server.toml".to_string());
    let config = ServerConfig::from_file(&path);

    let routes = RouteTable::builder()
        .get(
            "/hot-dog",
            vec![
                ParameterBinding::body(ParamType::Str),
                ParameterBinding::query(ParamType::Str),
                ParameterBinding::query(ParamType::Bool),
                ParameterBinding::header("meat", ParamType::Str),
            ],
            hot_dog,
        )
        .build();

    let server = Server::bind(config, routes, Arc::new(TextCodec)).await?;
    server.run().await
}

/// `GET /hot-dog?sauce=..&burnt=..` with a `meat` header.
fn hot_dog(args: Vec<Value>) -> Result<Value, HandlerError> {
    match args.as_slice() {
        [body, sauce, burnt, meat] => {
            let mut order = format!(
                "{}{}{}",
                body.as_str().unwrap_or_default(),
                sauce.as_str().unwrap_or_default(),
                meat.as_str().unwrap_or("no meat"),
            );
            if burnt.as_bool() == Some(true) {
                order.push_str(" (burnt)");
            }
            Ok(Value::Str(order))
        }
        _ => Err(format!("hot-dog expects 4 arguments, got {}", args.len()).into()),
    }
}
