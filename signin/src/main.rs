use appleid::{AppleIdClient, Config, ReqwestTransport};
use dotenv::dotenv;
use std::error::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: signin <command>

commands:
    authorize-url [state]   print the url of apple's sign in page
    exchange <code>         exchange an authorization code for tokens
    verify <id_token>       verify an identity token and print its claims";

#[derive(Debug, PartialEq, Eq)]
enum Command {
    AuthorizeUrl { state: Option<String> },
    Exchange { code: String },
    Verify { token: String },
}

impl Command {
    fn parse<I>(mut args: I) -> Option<Self>
    where
        I: Iterator<Item = String>,
    {
        let command = match args.next()?.as_str() {
            "authorize-url" => Command::AuthorizeUrl { state: args.next() },
            "exchange" => Command::Exchange { code: args.next()? },
            "verify" => Command::Verify { token: args.next()? },
            _ => return None,
        };
        args.next().is_none().then_some(command)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let Some(command) = Command::parse(std::env::args().skip(1)) else {
        eprintln!("{USAGE}");
        std::process::exit(2);
    };

    let client = AppleIdClient::new(Config::from_env())?;
    match command {
        Command::AuthorizeUrl { state } => {
            let state = state.unwrap_or_else(AppleIdClient::<ReqwestTransport>::generate_state);
            info!(state = %state, "keep the state to compare it on callback");
            println!("{}", client.authorize_url(&state)?);
        }
        Command::Exchange { code } => {
            let tokens = client.exchange_code(&code).await?;
            println!("{}", serde_json::to_string_pretty(&tokens)?);
        }
        Command::Verify { token } => {
            let claims = client.verify_and_decode_jwt(&token).await?;
            info!(sub = claims.subject().unwrap_or_default(), "identity token verified");
            println!("{}", serde_json::to_string_pretty(claims.claims())?);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::authorize_url(&["authorize-url"], Some(Command::AuthorizeUrl { state: None }))]
    #[case::authorize_url_with_state(
        &["authorize-url", "abc"],
        Some(Command::AuthorizeUrl { state: Some("abc".to_string()) })
    )]
    #[case::exchange(&["exchange", "code"], Some(Command::Exchange { code: "code".to_string() }))]
    #[case::verify(&["verify", "ey.x.y"], Some(Command::Verify { token: "ey.x.y".to_string() }))]
    #[case::exchange_without_code(&["exchange"], None)]
    #[case::trailing_args(&["verify", "a", "b"], None)]
    #[case::unknown(&["refresh"], None)]
    #[case::empty(&[], None)]
    fn test_parse_command(#[case] args: &[&str], #[case] want: Option<Command>) {
        let got = Command::parse(args.iter().map(|arg| arg.to_string()));

        assert_eq!(got, want);
    }
}
