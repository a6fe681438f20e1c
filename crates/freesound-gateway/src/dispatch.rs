//! Mode dispatch: one invocation, one operation, one serialized result.
//!
//! The first argument selects the mode; the rest are positional per mode.
//! Every outcome, including argument errors and unexpected faults, is folded
//! into a result object so the host script always receives a readable chunk.

use std::path::Path;

use serde_json::{json, Value};

use crate::client::FreesoundClient;
use crate::download;
use crate::error::{GatewayError, GatewayResult};
use crate::oauth;
use crate::query::SearchQuery;

/// Run one gateway invocation. Never fails: errors become the error-object
/// shape the host expects.
pub async fn run(args: &[String]) -> Value {
    match dispatch(args).await {
        Ok(value) => value,
        Err(error) => json!({ "error": error.to_string() }),
    }
}

async fn dispatch(args: &[String]) -> GatewayResult<Value> {
    let mode = args.first().ok_or_else(|| {
        GatewayError::InvalidInput("Insufficient arguments provided to gateway.".to_string())
    })?;
    let client = FreesoundClient::new()?;

    match mode.as_str() {
        "authorize" => {
            let [client_id, client_secret] = expect_args(args, mode)?;
            oauth::authorize(&client, client_id, client_secret).await
        }
        "get_user" => {
            let [access_token] = expect_args(args, mode)?;
            client.user_info(access_token).await
        }
        "search" => {
            let [api_key, text, cc0, max_duration, tags, category, page, sort] =
                expect_args(args, mode)?;
            let mut query = SearchQuery::new(text.as_str());
            query.cc0_only = cc0.eq_ignore_ascii_case("true");
            query.max_duration = parse_number(max_duration, "max duration")?;
            query.tags = if tags == "NONE" { String::new() } else { tags.clone() };
            query.category = category.clone();
            query.page = parse_number(page, "page")?;
            query.sort = sort.clone();
            client.search(api_key, &query).await
        }
        "get_similar" => {
            let [api_key, sound_id, page] = expect_args(args, mode)?;
            let page = parse_number(page, "page")?;
            client.similar(api_key, sound_id, page).await
        }
        "get_favorites_details" => {
            let [api_key, ids] = expect_args(args, mode)?;
            client.favorites_details(api_key, ids).await
        }
        "download_preview" => {
            let [url, output_path] = expect_args(args, mode)?;
            Ok(download_result(
                download::download_file(url, Path::new(output_path), None).await,
            ))
        }
        "download_original" => {
            let [sound_id, download_dir, access_token] = expect_args(args, mode)?;
            download_original(&client, sound_id, download_dir, access_token).await
        }
        other => Err(GatewayError::InvalidInput(format!(
            "Invalid mode: '{other}'."
        ))),
    }
}

/// Resolve name and download URL via an authenticated detail lookup, then
/// stream the original file. Detail-lookup failures propagate as error
/// objects; download failures use the status/message shape.
async fn download_original(
    client: &FreesoundClient,
    sound_id: &str,
    download_dir: &str,
    access_token: &str,
) -> GatewayResult<Value> {
    let details = client.sound_details(sound_id, access_token).await?;
    let name = details.get("name").and_then(Value::as_str).ok_or_else(|| {
        GatewayError::Network("sound details response missing 'name'".to_string())
    })?;
    let kind = details.get("type").and_then(Value::as_str).ok_or_else(|| {
        GatewayError::Network("sound details response missing 'type'".to_string())
    })?;
    let url = details.get("download").and_then(Value::as_str).ok_or_else(|| {
        GatewayError::Network("sound details response missing 'download'".to_string())
    })?;

    let filename = download::sanitize_filename(&format!("{name}.{kind}"));
    let output_path = Path::new(download_dir).join(filename);
    Ok(download_result(
        download::download_file(url, &output_path, Some(access_token)).await,
    ))
}

fn download_result(result: GatewayResult<std::path::PathBuf>) -> Value {
    match result {
        Ok(path) => json!({ "status": "success", "path": path.to_string_lossy() }),
        Err(error) => json!({ "status": "error", "message": error.to_string() }),
    }
}

/// Take exactly `N` positional arguments after the mode token.
fn expect_args<'a, const N: usize>(
    args: &'a [String],
    mode: &str,
) -> GatewayResult<[&'a String; N]> {
    let rest = &args[1..];
    if rest.len() < N {
        return Err(GatewayError::InvalidInput(format!(
            "mode '{mode}' expects {N} arguments, got {}",
            rest.len()
        )));
    }
    let mut taken = [&args[0]; N];
    for (slot, value) in taken.iter_mut().zip(rest.iter()) {
        *slot = value;
    }
    Ok(taken)
}

fn parse_number<T: std::str::FromStr>(raw: &str, what: &str) -> GatewayResult<T> {
    raw.trim()
        .parse()
        .map_err(|_| GatewayError::InvalidInput(format!("invalid {what}: '{raw}'")))
}
